//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start background tasks (signals, archive watcher, reloads)
//! - Bind the listener last and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast on TLS, listener and metrics errors
//! - An archive that cannot be loaded is logged and left out; the rest serve
//! - Reloads build a fresh index off the runtime and swap it in

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::archive::{watcher, ArchiveStore, ArchiveWatcher};
use crate::config::ReplayConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handlers;
use crate::lifecycle::ReloadTrigger;
use crate::net::{load_tls_acceptor, Listener, ListenerError, TlsError};
use crate::observability::metrics;
use crate::proxy::ReplayServer;
use crate::replay::ReplayEngine;

const WATCH_SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to watch archives: {0}")]
    Watch(#[from] notify::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A server whose archives are loaded and whose listener is bound.
pub struct Prepared {
    pub server: ReplayServer,
    pub listener: Listener,
    pub store: Arc<ArchiveStore>,
}

/// Load archives and TLS identity, then bind.
///
/// Archives that fail to open are logged and skipped.
pub async fn prepare(config: &ReplayConfig) -> Result<Prepared, StartupError> {
    let store = Arc::new(ArchiveStore::new(config.archive.lookup_policy));
    let files = config.archive.files.clone();
    let loader = Arc::clone(&store);
    let failures = tokio::task::spawn_blocking(move || {
        files
            .iter()
            .filter_map(|file| loader.load(file).err())
            .collect::<Vec<_>>()
    })
    .await?;
    for e in &failures {
        tracing::error!(error = %e, "Archive left out of the index");
    }

    let tls = load_tls_acceptor(&config.tls.cert_path, &config.tls.key_path)?;
    let engine = ReplayEngine::new(Arc::clone(&store));
    let server = ReplayServer::new(config, engine, tls);
    let listener = Listener::bind(&config.listener).await?;

    Ok(Prepared {
        server,
        listener,
        store,
    })
}

/// Rebuild the index from `files` whenever a trigger arrives.
pub fn spawn_reloader(
    store: Arc<ArchiveStore>,
    files: Vec<PathBuf>,
    mut triggers: mpsc::UnboundedReceiver<ReloadTrigger>,
) {
    tokio::spawn(async move {
        while let Some(trigger) = triggers.recv().await {
            tracing::info!(trigger = ?trigger, "Reloading archives");
            let store = Arc::clone(&store);
            let files = files.clone();
            let reloaded = tokio::task::spawn_blocking(move || {
                let results = store.reload(&files);
                (results, store.snapshot().response_count())
            })
            .await;
            match reloaded {
                Ok((results, responses)) => {
                    for e in results.into_iter().filter_map(Result::err) {
                        tracing::error!(error = %e, "Archive left out of reloaded index");
                    }
                    tracing::info!(responses, "Archive index reloaded");
                }
                Err(e) => tracing::error!(error = %e, "Archive reload task failed"),
            }
        }
    });
}

/// Start everything and serve until a shutdown signal.
pub async fn run(config: ReplayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let config = Arc::new(config);
    let Prepared {
        server,
        listener,
        store,
    } = prepare(&config).await?;

    let shutdown = Shutdown::new();
    let (reload_tx, reload_rx) = mpsc::unbounded_channel();
    spawn_signal_handlers(shutdown.clone(), reload_tx.clone());
    spawn_reloader(Arc::clone(&store), config.archive.files.clone(), reload_rx);

    let _watcher = if config.archive.watch {
        let (archive_watcher, mut changes) = ArchiveWatcher::new(config.archive.files.clone());
        let handle = archive_watcher.run()?;
        tokio::spawn(async move {
            while let Some(path) = watcher::next_change(&mut changes, WATCH_SETTLE).await {
                if reload_tx.send(ReloadTrigger::FileChanged(path)).is_err() {
                    break;
                }
            }
        });
        Some(handle)
    } else {
        None
    };

    server.run(listener, shutdown.subscribe()).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::{gzip, http_response, warc_record};

    #[tokio::test]
    async fn unreadable_archive_does_not_stop_startup() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.warc.gz");
        let block = http_response("HTTP/1.1 200 OK", &[], b"ok");
        std::fs::write(&good, gzip(&warc_record("response", "http://a.test/", &block))).unwrap();

        let generated = rcgen::generate_simple_self_signed(vec!["a.test".to_string()]).unwrap();
        let cert_path = dir.path().join("ca.crt");
        let key_path = dir.path().join("ca.key");
        std::fs::write(&cert_path, generated.cert.pem()).unwrap();
        std::fs::write(&key_path, generated.key_pair.serialize_pem()).unwrap();

        let mut config = ReplayConfig::default();
        config.listener.host = "127.0.0.1".to_string();
        config.listener.port = 0;
        config.archive.files = vec![dir.path().join("missing.warc.gz"), good];
        config.tls.cert_path = cert_path;
        config.tls.key_path = key_path;

        let prepared = prepare(&config).await.unwrap();
        assert_eq!(prepared.store.snapshot().response_count(), 1);
        assert!(prepared.store.lookup("http://a.test/").is_some());
    }
}
