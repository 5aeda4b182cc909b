//! Archive file watcher for live reload.

use std::path::PathBuf;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watches archive files and signals when any of them changes.
pub struct ArchiveWatcher {
    paths: Vec<PathBuf>,
    change_tx: mpsc::UnboundedSender<PathBuf>,
}

impl ArchiveWatcher {
    /// Returns the watcher and a receiver of changed paths.
    pub fn new(paths: Vec<PathBuf>) -> (Self, mpsc::UnboundedReceiver<PathBuf>) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        (Self { paths, change_tx }, change_rx)
    }

    /// Start watching. Dropping the returned watcher stops notifications.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        for path in event.paths {
                            tracing::debug!(path = %path.display(), "Archive file changed");
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => tracing::error!(error = %e, "Archive watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for path in &self.paths {
            watcher.watch(path, RecursiveMode::NonRecursive)?;
        }

        tracing::info!(files = self.paths.len(), "Archive watcher started");
        Ok(watcher)
    }
}

/// Wait for the next change, then swallow the burst that usually follows.
pub async fn next_change(rx: &mut mpsc::UnboundedReceiver<PathBuf>, settle: Duration) -> Option<PathBuf> {
    let first = rx.recv().await?;
    tokio::time::sleep(settle).await;
    while rx.try_recv().is_ok() {}
    Some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bursts_collapse_into_one_change() {
        let (watcher, mut rx) = ArchiveWatcher::new(Vec::new());
        for _ in 0..5 {
            watcher.change_tx.send(PathBuf::from("a.warc")).unwrap();
        }
        let changed = next_change(&mut rx, Duration::from_millis(1)).await;
        assert_eq!(changed, Some(PathBuf::from("a.warc")));
        assert!(rx.try_recv().is_err());

        drop(watcher);
        assert_eq!(next_change(&mut rx, Duration::from_millis(1)).await, None);
    }
}
