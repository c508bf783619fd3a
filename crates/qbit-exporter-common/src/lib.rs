pub mod config;
pub mod error;
pub mod metric_name;

pub use config::{ConfigSource, ExporterConfig};
pub use error::{ConfigError, ExporterError, FetchError, Result};
