//! Replay engine: canonical URL in, archived (or synthesized) response out.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::archive::{ArchiveReader, ArchiveStore};
use crate::observability::metrics;
use crate::replay::rewrite::{bad_gateway, not_found, rewrite_response};

/// How a replay request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Archived response sent.
    Hit,
    /// 404 sent.
    Miss,
    /// Locator found but the record could not be decoded; 502 sent.
    Undecodable,
}

impl ReplayOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplayOutcome::Hit => "hit",
            ReplayOutcome::Miss => "miss",
            ReplayOutcome::Undecodable => "undecodable",
        }
    }
}

#[derive(Clone)]
pub struct ReplayEngine {
    store: Arc<ArchiveStore>,
    reader: ArchiveReader,
}

impl ReplayEngine {
    pub fn new(store: Arc<ArchiveStore>) -> Self {
        Self {
            store,
            reader: ArchiveReader::new(),
        }
    }

    /// Build the response for `canonical_url`. Blocks on disk reads.
    pub fn render(&self, canonical_url: &str) -> (ReplayOutcome, Vec<u8>) {
        let Some(locator) = self.store.lookup(canonical_url) else {
            tracing::info!(url = %canonical_url, "URL not found in archives");
            return (ReplayOutcome::Miss, not_found());
        };

        match self.reader.read_response(&locator) {
            Ok(message) => {
                tracing::debug!(
                    url = %canonical_url,
                    status = message.code,
                    file = %locator.source_file.display(),
                    offset = locator.offset,
                    "Replaying archived response"
                );
                (ReplayOutcome::Hit, rewrite_response(&message))
            }
            Err(e) => {
                tracing::warn!(
                    url = %canonical_url,
                    file = %locator.source_file.display(),
                    offset = locator.offset,
                    error = %e,
                    "Archived record could not be replayed"
                );
                (ReplayOutcome::Undecodable, bad_gateway())
            }
        }
    }

    /// Replay `canonical_url` onto `writer`.
    ///
    /// The archive work runs on the blocking pool.
    pub async fn replay_to<W>(&self, canonical_url: &str, writer: &mut W) -> io::Result<ReplayOutcome>
    where
        W: AsyncWrite + Unpin,
    {
        let start = Instant::now();
        let engine = self.clone();
        let url = canonical_url.to_string();
        let (outcome, bytes) = tokio::task::spawn_blocking(move || engine.render(&url))
            .await
            .map_err(io::Error::other)?;

        writer.write_all(&bytes).await?;
        writer.flush().await?;
        metrics::record_request(outcome.as_str(), start);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::{gzip, http_response, warc_record};
    use std::io::Write;

    fn engine_with(records: &[Vec<u8>]) -> (ReplayEngine, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for record in records {
            file.write_all(record).unwrap();
        }
        file.flush().unwrap();
        let store = Arc::new(ArchiveStore::default());
        store.load(file.path()).unwrap();
        (ReplayEngine::new(store), file)
    }

    #[tokio::test]
    async fn hit_writes_rewritten_response() {
        let (engine, _file) = engine_with(&[gzip(&warc_record(
            "response",
            "http://a.test/page",
            &http_response("HTTP/1.1 200 OK", &[("ETag", "x")], b"<html>hi</html>\n"),
        ))]);

        let mut out = Vec::new();
        let outcome = engine.replay_to("https://a.test/page", &mut out).await.unwrap();
        assert_eq!(outcome, ReplayOutcome::Hit);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 16\r\n"));
        assert!(text.contains("X-Archive-Orig-ETag: x\r\n"));
        assert!(text.ends_with("\r\n\r\n<html>hi</html>\n"));
    }

    #[tokio::test]
    async fn miss_writes_not_found() {
        let (engine, _file) = engine_with(&[]);
        let mut out = Vec::new();
        let outcome = engine.replay_to("http://nothing.test/", &mut out).await.unwrap();
        assert_eq!(outcome, ReplayOutcome::Miss);
        assert_eq!(out, not_found());
    }

    #[tokio::test]
    async fn non_http_block_is_bad_gateway() {
        let (engine, _file) = engine_with(&[gzip(&warc_record(
            "response",
            "http://broken.test/",
            b"this is not an http response",
        ))]);
        let mut out = Vec::new();
        let outcome = engine.replay_to("http://broken.test/", &mut out).await.unwrap();
        assert_eq!(outcome, ReplayOutcome::Undecodable);
        assert_eq!(out, bad_gateway());
    }
}
