//! OS signal handling.
//!
//! # Responsibilities
//! - SIGINT / SIGTERM trigger graceful shutdown
//! - SIGHUP (Unix) asks for an archive reload, not a shutdown

use tokio::sync::mpsc;

use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::ReloadTrigger;

/// Resolve on the first Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Spawn the signal listeners.
pub fn spawn_signal_handlers(shutdown: Shutdown, reload_tx: mpsc::UnboundedSender<ReloadTrigger>) {
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "SIGHUP reload unavailable");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            tracing::info!("Received SIGHUP, reloading archives");
            if reload_tx.send(ReloadTrigger::Signal).is_err() {
                break;
            }
        }
    });

    #[cfg(not(unix))]
    drop(reload_tx);
}
