//! Graceful shutdown and signal handling.
//!
//! SIGTERM/SIGINT stop the listener; in-flight requests then get
//! `SHUTDOWN_GRACE_SECS` to finish before the process exits.

use std::time::Duration;

use crate::config::SHUTDOWN_GRACE_SECS;

/// Resolves once SIGTERM or Ctrl+C is received.
///
/// After it resolves, a watchdog exits the process if draining connections
/// takes longer than the grace period.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    tracing::info!(
        grace_secs = SHUTDOWN_GRACE_SECS,
        "Graceful shutdown initiated, waiting for connections to close"
    );
    tokio::spawn(async {
        tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_SECS)).await;
        tracing::warn!("Connections still open after grace period, exiting");
        std::process::exit(1);
    });
}
