use clap::ValueEnum;
use qbit_exporter_common::{ConfigError, ExporterError, Result};
use tracing_subscriber::EnvFilter;

const LOG_LEVEL_KEY: &str = "EXPORTER_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// `level` is a level name (Python-style `WARNING` and `CRITICAL` included)
/// or an `EnvFilter` directive list such as `qbit_exporter_client=debug,info`.
pub fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let directive = filter_directive(level)?;
    let filter = EnvFilter::try_new(&directive).map_err(|err| ConfigError::Invalid {
        key: LOG_LEVEL_KEY,
        value: level.to_string(),
        reason: err.to_string(),
    })?;

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    installed.map_err(|err| ExporterError::InternalError(err.to_string()))
}

fn filter_directive(level: &str) -> std::result::Result<String, ConfigError> {
    let trimmed = level.trim();
    if trimmed.is_empty() {
        return Ok("info".to_string());
    }

    trimmed
        .split(',')
        .map(|part| {
            let part = part.trim();
            if part.contains('=') {
                return Ok(part.to_string());
            }
            level_name(part).map(str::to_string).ok_or_else(|| ConfigError::Invalid {
                key: LOG_LEVEL_KEY,
                value: level.to_string(),
                reason: format!("unknown log level {part:?}"),
            })
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(|parts| parts.join(","))
}

fn level_name(name: &str) -> Option<&'static str> {
    let level = match name.to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" | "FATAL" => "error",
        "OFF" => "off",
        _ => return None,
    };
    Some(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_level_names_are_translated() {
        assert_eq!(filter_directive("INFO").unwrap(), "info");
        assert_eq!(filter_directive("WARNING").unwrap(), "warn");
        assert_eq!(filter_directive("critical").unwrap(), "error");
        assert_eq!(filter_directive(" Debug ").unwrap(), "debug");
        assert_eq!(filter_directive("").unwrap(), "info");
    }

    #[test]
    fn directives_pass_through() {
        let directive = filter_directive("qbit_exporter_client=debug,WARNING").unwrap();
        assert_eq!(directive, "qbit_exporter_client=debug,warn");
        assert!(EnvFilter::try_new(directive).is_ok());
    }

    #[test]
    fn unknown_level_is_invalid_config() {
        let err = filter_directive("VERBOSE").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "EXPORTER_LOG_LEVEL",
                ..
            }
        ));

        assert!(matches!(
            init_tracing("VERBOSE", LogFormat::Text),
            Err(ExporterError::Config(_))
        ));
    }
}
