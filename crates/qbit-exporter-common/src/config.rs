use std::{collections::HashMap, fmt, time::Duration};

use tracing::error;

use crate::{error::ConfigError, metric_name::is_valid_metric_name};

/// Environment variables with this prefix name a file holding the real value.
pub const FILE_PREFIX: &str = "FILE__";

pub const DEFAULT_EXPORTER_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_EXPORTER_PORT: u16 = 8000;
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_METRICS_PREFIX: &str = "qbittorrent";
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Snapshot of the process environment used to resolve configuration keys.
///
/// A key `K` resolves to the trimmed contents of the file named by `FILE__K`
/// when that variable is set and readable, otherwise to `K` itself.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    vars: HashMap<String, String>,
}

impl ConfigSource {
    pub fn from_env() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(path) = self.vars.get(&format!("{FILE_PREFIX}{key}")) {
            match std::fs::read_to_string(path) {
                Ok(contents) => return Some(contents.trim().to_string()),
                Err(err) => {
                    error!(key, path = %path, error = %err, "unable to read config value from file");
                }
            }
        }

        self.vars.get(key).cloned()
    }

    /// Like [`ConfigSource::get`], but blank values count as unset.
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

#[derive(Clone)]
pub struct ExporterConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub url_base: String,
    pub username: String,
    pub password: String,
    pub verify_webui_certificate: bool,
    pub fetch_timeout: Duration,
    pub exporter_address: String,
    pub exporter_port: u16,
    pub log_level: String,
    pub metrics_prefix: String,
    pub export_metrics_by_torrent: bool,
}

impl ExporterConfig {
    pub fn load(source: &ConfigSource) -> Result<Self, ConfigError> {
        let host = source
            .get_non_empty("QBITTORRENT_HOST")
            .ok_or(ConfigError::Missing {
                key: "QBITTORRENT_HOST",
                hint: "please set the QBITTORRENT_HOST environment variable",
            })?;
        let raw_port = source
            .get_non_empty("QBITTORRENT_PORT")
            .ok_or(ConfigError::Missing {
                key: "QBITTORRENT_PORT",
                hint: "please set the QBITTORRENT_PORT environment variable",
            })?;
        let port = parse_port("QBITTORRENT_PORT", &raw_port)?;

        let exporter_port = match source.get_non_empty("EXPORTER_PORT") {
            Some(value) => parse_port("EXPORTER_PORT", &value)?,
            None => DEFAULT_EXPORTER_PORT,
        };

        let fetch_timeout = match source.get_non_empty("QBITTORRENT_TIMEOUT_SECONDS") {
            Some(value) => parse_timeout("QBITTORRENT_TIMEOUT_SECONDS", &value)?,
            None => Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
        };

        let metrics_prefix = source
            .get_non_empty("METRICS_PREFIX")
            .unwrap_or_else(|| DEFAULT_METRICS_PREFIX.to_string());
        if !is_valid_metric_name(&metrics_prefix) {
            return Err(ConfigError::Invalid {
                key: "METRICS_PREFIX",
                value: metrics_prefix,
                reason: "must contain only letters, digits, '_' or ':' and not start with a digit"
                    .to_string(),
            });
        }

        let config = Self {
            host,
            port,
            ssl: bool_setting(source, "QBITTORRENT_SSL", false)?,
            url_base: source
                .get_non_empty("QBITTORRENT_URL_BASE")
                .map(|value| value.trim_matches('/').to_string())
                .unwrap_or_default(),
            username: source.get("QBITTORRENT_USER").unwrap_or_default(),
            password: source.get("QBITTORRENT_PASS").unwrap_or_default(),
            verify_webui_certificate: bool_setting(source, "VERIFY_WEBUI_CERTIFICATE", true)?,
            fetch_timeout,
            exporter_address: source
                .get_non_empty("EXPORTER_ADDRESS")
                .unwrap_or_else(|| DEFAULT_EXPORTER_ADDRESS.to_string()),
            exporter_port,
            log_level: source
                .get_non_empty("EXPORTER_LOG_LEVEL")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            metrics_prefix,
            export_metrics_by_torrent: bool_setting(source, "EXPORT_METRICS_BY_TORRENT", false)?,
        };

        url::Url::parse(&config.base_url()).map_err(|err| ConfigError::Invalid {
            key: "QBITTORRENT_HOST",
            value: config.host.clone(),
            reason: format!("does not form a valid URL: {err}"),
        })?;

        Ok(config)
    }

    /// `host:port`, followed by `/url_base` when one is configured.
    pub fn server_identity(&self) -> String {
        if self.url_base.is_empty() {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("{}:{}/{}", self.host, self.port, self.url_base)
        }
    }

    pub fn uses_https(&self) -> bool {
        self.ssl || self.port == 443
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.uses_https() { "https" } else { "http" };
        format!("{scheme}://{}", self.server_identity())
    }
}

impl fmt::Debug for ExporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExporterConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssl", &self.ssl)
            .field("url_base", &self.url_base)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("verify_webui_certificate", &self.verify_webui_certificate)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("exporter_address", &self.exporter_address)
            .field("exporter_port", &self.exporter_port)
            .field("log_level", &self.log_level)
            .field("metrics_prefix", &self.metrics_prefix)
            .field("export_metrics_by_torrent", &self.export_metrics_by_torrent)
            .finish()
    }
}

fn bool_setting(source: &ConfigSource, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match source.get_non_empty(key) {
        Some(value) => parse_bool(key, &value),
        None => Ok(default),
    }
}

pub fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_port(key: &'static str, value: &str) -> Result<u16, ConfigError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected a port number between 1 and 65535".to_string(),
        }),
    }
}

fn parse_timeout(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected a positive number of seconds".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn minimal() -> Vec<(&'static str, String)> {
        vec![
            ("QBITTORRENT_HOST", "localhost".to_string()),
            ("QBITTORRENT_PORT", "8080".to_string()),
        ]
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "qbit-exporter-config-{}-{name}",
            std::process::id()
        ));
        std::fs::write(&path, contents).expect("write temp file");
        path
    }

    #[test]
    fn defaults_apply_when_only_mandatory_settings_exist() {
        let config = ExporterConfig::load(&ConfigSource::from_pairs(minimal())).unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8080);
        assert!(!config.ssl);
        assert!(config.verify_webui_certificate);
        assert!(!config.export_metrics_by_torrent);
        assert_eq!(config.exporter_address, "0.0.0.0");
        assert_eq!(config.exporter_port, 8000);
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.metrics_prefix, "qbittorrent");
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.base_url(), "http://localhost:8080");
        assert_eq!(config.server_identity(), "localhost:8080");
    }

    #[test]
    fn missing_host_is_rejected() {
        let source = ConfigSource::from_pairs([("QBITTORRENT_PORT", "8080")]);
        let err = ExporterConfig::load(&source).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: "QBITTORRENT_HOST",
                ..
            }
        ));
    }

    #[test]
    fn blank_port_counts_as_missing() {
        let source = ConfigSource::from_pairs([("QBITTORRENT_HOST", "nas"), ("QBITTORRENT_PORT", "  ")]);
        let err = ExporterConfig::load(&source).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                key: "QBITTORRENT_PORT",
                ..
            }
        ));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let source = ConfigSource::from_pairs([("QBITTORRENT_HOST", "nas"), ("QBITTORRENT_PORT", "http")]);
        let err = ExporterConfig::load(&source).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "QBITTORRENT_PORT",
                ..
            }
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut pairs = minimal();
        pairs.push(("QBITTORRENT_TIMEOUT_SECONDS", "0".to_string()));

        let err = ExporterConfig::load(&ConfigSource::from_pairs(pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "QBITTORRENT_TIMEOUT_SECONDS",
                ..
            }
        ));
    }

    #[test]
    fn timeout_is_read_in_seconds() {
        let mut pairs = minimal();
        pairs.push(("QBITTORRENT_TIMEOUT_SECONDS", "3".to_string()));

        let config = ExporterConfig::load(&ConfigSource::from_pairs(pairs)).unwrap();
        assert_eq!(config.fetch_timeout, Duration::from_secs(3));
    }

    #[test]
    fn port_443_implies_https_and_url_base_is_appended() {
        let mut pairs = vec![
            ("QBITTORRENT_HOST", "torrents.example.com".to_string()),
            ("QBITTORRENT_PORT", "443".to_string()),
        ];
        pairs.push(("QBITTORRENT_URL_BASE", "/qbt/".to_string()));
        let config = ExporterConfig::load(&ConfigSource::from_pairs(pairs)).unwrap();

        assert!(config.uses_https());
        assert_eq!(config.server_identity(), "torrents.example.com:443/qbt");
        assert_eq!(config.base_url(), "https://torrents.example.com:443/qbt");
    }

    #[test]
    fn booleans_accept_common_spellings() {
        assert_eq!(parse_bool("K", "True"), Ok(true));
        assert_eq!(parse_bool("K", "yes"), Ok(true));
        assert_eq!(parse_bool("K", "0"), Ok(false));
        assert_eq!(parse_bool("K", "False"), Ok(false));
        assert!(parse_bool("K", "maybe").is_err());
    }

    #[test]
    fn file_override_takes_precedence() {
        let path = temp_file("password", "from-file\n");
        let mut pairs = minimal();
        pairs.push(("QBITTORRENT_PASS", "from-env".to_string()));
        pairs.push(("FILE__QBITTORRENT_PASS", path.display().to_string()));

        let config = ExporterConfig::load(&ConfigSource::from_pairs(pairs)).unwrap();
        assert_eq!(config.password, "from-file");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn unreadable_file_falls_back_to_plain_variable() {
        let mut pairs = minimal();
        pairs.push(("QBITTORRENT_USER", "admin".to_string()));
        pairs.push((
            "FILE__QBITTORRENT_USER",
            "/nonexistent/qbit-exporter/user".to_string(),
        ));

        let config = ExporterConfig::load(&ConfigSource::from_pairs(pairs)).unwrap();
        assert_eq!(config.username, "admin");
    }

    #[test]
    fn invalid_metrics_prefix_is_rejected() {
        let mut pairs = minimal();
        pairs.push(("METRICS_PREFIX", "9lives-torrent".to_string()));
        let err = ExporterConfig::load(&ConfigSource::from_pairs(pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "METRICS_PREFIX",
                ..
            }
        ));
    }

    #[test]
    fn debug_output_redacts_password() {
        let mut pairs = minimal();
        pairs.push(("QBITTORRENT_PASS", "hunter2".to_string()));
        let config = ExporterConfig::load(&ConfigSource::from_pairs(pairs)).unwrap();

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
