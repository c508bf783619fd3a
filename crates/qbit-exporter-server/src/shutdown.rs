use tracing::{error, info, warn};

/// Resolves on the first SIGINT or SIGTERM. A second signal received while
/// the server drains exits the process with status 1.
pub async fn shutdown_signal() {
    wait_for_signal().await;
    info!("exporter is shutting down");

    tokio::spawn(async {
        wait_for_signal().await;
        warn!("forcibly killing exporter");
        std::process::exit(1);
    });
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
