use std::sync::Arc;

use clap::Parser;
use qbit_exporter_client::QbittorrentClient;
use qbit_exporter_common::config::DEFAULT_LOG_LEVEL;
use qbit_exporter_common::{ConfigSource, ExporterConfig};
use qbit_exporter_metrics::Collector;
use qbit_exporter_server::{AppState, LogFormat, app_router, init_tracing, shutdown_signal};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "qbittorrent-exporter",
    about = "Prometheus exporter for the qBittorrent Web API",
    version
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let source = ConfigSource::from_env();

    let log_level = source
        .get("EXPORTER_LOG_LEVEL")
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    init_tracing(&log_level, cli.log_format)?;

    let config = match ExporterConfig::load(&source) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    info!(
        server = %config.server_identity(),
        https = config.uses_https(),
        by_torrent = config.export_metrics_by_torrent,
        "exporter is starting up"
    );

    let client = Arc::new(QbittorrentClient::new(&config)?);
    let collector = Arc::new(Collector::from_config(client, &config));
    let app = app_router(Arc::new(AppState::new(collector)));

    let listener =
        tokio::net::TcpListener::bind((config.exporter_address.as_str(), config.exporter_port))
            .await?;
    info!(address = %listener.local_addr()?, "exporter listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("exporter has shutdown");
    Ok(())
}
