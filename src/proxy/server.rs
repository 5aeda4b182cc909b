//! Accept loop: one task per client connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::config::ReplayConfig;
use crate::net::{ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::proxy::error::ProxyError;
use crate::proxy::handler::{handle_connection, ConnectionContext};
use crate::replay::ReplayEngine;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

pub struct ReplayServer {
    context: Arc<ConnectionContext>,
    tracker: ConnectionTracker,
    shutdown_grace: Duration,
}

impl ReplayServer {
    pub fn new(config: &ReplayConfig, engine: ReplayEngine, tls: TlsAcceptor) -> Self {
        Self {
            context: Arc::new(ConnectionContext::new(config, engine, tls)),
            tracker: ConnectionTracker::new(),
            shutdown_grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
        }
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(
        &self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Replay proxy accepting connections");
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn(stream, peer, permit),
                    Err(ListenerError::Closed) => return Err(ListenerError::Closed),
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        let remaining = self.tracker.drain(self.shutdown_grace).await;
        if remaining > 0 {
            tracing::warn!(open_connections = remaining, "Grace period over, closing open connections");
        }
        Ok(())
    }

    fn spawn(&self, stream: tokio::net::TcpStream, peer: std::net::SocketAddr, permit: ConnectionPermit) {
        let guard = self.tracker.track();
        let ctx = Arc::clone(&self.context);
        let span = tracing::info_span!("connection", id = %guard.id(), peer = %peer);

        tokio::spawn(
            async move {
                let _permit = permit;
                let _guard = guard;
                match handle_connection(stream, &ctx).await {
                    Ok(()) => tracing::debug!("Connection finished"),
                    Err(ProxyError::Parse(e)) => {
                        metrics::record_parse_error();
                        tracing::debug!(error = %e, "Closing connection after parse error");
                    }
                    Err(e) if e.is_benign() => tracing::debug!(error = %e, "Connection ended"),
                    Err(e) => tracing::warn!(error = %e, "Connection failed"),
                }
            }
            .instrument(span),
        );
    }
}
