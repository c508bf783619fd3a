use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Authentication(_) => "authentication",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {key}: {hint}")]
    Missing { key: &'static str, hint: &'static str },
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, ExporterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_reasons_are_stable() {
        assert_eq!(FetchError::Connection("x".into()).reason(), "connection");
        assert_eq!(
            FetchError::Authentication("x".into()).reason(),
            "authentication"
        );
        assert_eq!(
            FetchError::MalformedResponse("x".into()).reason(),
            "malformed_response"
        );
    }

    #[test]
    fn config_error_converts_into_exporter_error() {
        let err: ExporterError = ConfigError::Missing {
            key: "QBITTORRENT_HOST",
            hint: "set the QBITTORRENT_HOST environment variable",
        }
        .into();

        assert!(matches!(err, ExporterError::Config(_)));
        assert!(err.to_string().contains("QBITTORRENT_HOST"));
    }
}
