//! Archive record store: the catalog of locators and the response lookup.
//!
//! # Responsibilities
//! - Scan archive files and append a locator per decodable record
//! - Keep a response-only view keyed by scheme-less URL
//! - Serve concurrent lookups while loads and clears publish new indexes
//!
//! # Design Decisions
//! - `ArcSwap` snapshot per lookup: readers never block and never see a
//!   half-built index
//! - Writers are serialized by a mutex; each write clones, extends, publishes
//! - Duplicate URLs resolve through `LookupPolicy`

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use url::{Position, Url};

use crate::archive::error::ArchiveError;
use crate::archive::record::{RecordKind, RecordLocator};
use crate::archive::warc::open_archive;
use crate::observability::metrics;

/// Which locator wins when several responses share a URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupPolicy {
    /// Earliest loaded record.
    #[default]
    First,
    /// Most recently loaded record.
    Last,
}

/// Key used for response lookups: the URL without its scheme.
///
/// Parseable URLs are normalized first (lowercase host, default port
/// dropped, empty path becomes `/`).
pub fn lookup_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => parsed[Position::BeforeUsername..].to_string(),
        _ => match url.split_once("://") {
            Some((_, rest)) => rest.to_string(),
            None => url.to_string(),
        },
    }
}

/// Ordered catalog of every loaded record plus the response view.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    locators: Vec<RecordLocator>,
    responses: Vec<usize>,
    by_key: HashMap<String, Vec<usize>>,
}

impl ArchiveIndex {
    /// All locators in load order.
    pub fn locators(&self) -> &[RecordLocator] {
        &self.locators
    }

    /// Response locators in load order.
    pub fn responses(&self) -> impl Iterator<Item = &RecordLocator> {
        self.responses.iter().map(|&i| &self.locators[i])
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    pub fn lookup(&self, url: &str, policy: LookupPolicy) -> Option<&RecordLocator> {
        let hits = self.by_key.get(&lookup_key(url))?;
        let index = match policy {
            LookupPolicy::First => hits.first(),
            LookupPolicy::Last => hits.last(),
        }?;
        self.locators.get(*index)
    }

    fn push(&mut self, locator: RecordLocator) {
        let index = self.locators.len();
        if locator.kind == RecordKind::Response {
            self.responses.push(index);
            self.by_key
                .entry(lookup_key(&locator.url))
                .or_default()
                .push(index);
        }
        self.locators.push(locator);
    }
}

/// A record skipped during a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadIssue {
    pub offset: u64,
    pub message: String,
}

/// Summary of one `load` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub records: usize,
    pub responses: usize,
    pub errors: Vec<LoadIssue>,
}

/// Shared, swappable archive index.
pub struct ArchiveStore {
    index: ArcSwap<ArchiveIndex>,
    policy: LookupPolicy,
    writer: Mutex<()>,
}

impl ArchiveStore {
    pub fn new(policy: LookupPolicy) -> Self {
        Self {
            index: ArcSwap::from_pointee(ArchiveIndex::default()),
            policy,
            writer: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> LookupPolicy {
        self.policy
    }

    /// Scan `path` and append its records to the index.
    ///
    /// Records with decode errors are skipped and reported; only failing to
    /// open the file is an `Err`.
    pub fn load(&self, path: &Path) -> Result<LoadReport, ArchiveError> {
        let reader = open_archive(path).map_err(|e| ArchiveError::io(path, e))?;

        let mut report = LoadReport::default();
        let mut found = Vec::new();
        for entry in reader {
            if !entry.errors.is_empty() {
                for message in &entry.errors {
                    tracing::warn!(
                        file = %path.display(),
                        offset = entry.offset,
                        error = %message,
                        "Skipping undecodable archive record"
                    );
                }
                report.errors.push(LoadIssue {
                    offset: entry.offset,
                    message: entry.errors.join("; "),
                });
                continue;
            }
            let Some(record) = entry.record else {
                continue;
            };
            let kind = record.kind();
            if kind == RecordKind::Response {
                report.responses += 1;
            }
            found.push(RecordLocator {
                url: record.target_uri().unwrap_or_default().to_string(),
                offset: entry.offset,
                kind,
                source_file: path.to_path_buf(),
            });
        }
        report.records = found.len();

        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = ArchiveIndex::clone(&self.index.load());
        for locator in found {
            next.push(locator);
        }
        metrics::record_index_size(next.response_count());
        self.index.store(Arc::new(next));

        tracing::info!(
            file = %path.display(),
            records = report.records,
            responses = report.responses,
            errors = report.errors.len(),
            "Archive loaded"
        );
        Ok(report)
    }

    /// Drop every locator.
    pub fn clear(&self) {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        self.index.store(Arc::new(ArchiveIndex::default()));
        metrics::record_index_size(0);
        tracing::debug!("Archive index cleared");
    }

    /// Replace the index with the contents of `paths`, atomically.
    ///
    /// Files that fail to open are left out; their errors are returned in
    /// the same order as `paths`.
    pub fn reload(&self, paths: &[impl AsRef<Path>]) -> Vec<Result<LoadReport, ArchiveError>> {
        let staging = ArchiveStore::new(self.policy);
        let results: Vec<_> = paths.iter().map(|path| staging.load(path.as_ref())).collect();

        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let next = staging.snapshot();
        metrics::record_index_size(next.response_count());
        self.index.store(next);
        results
    }

    /// Current index; stays valid while later loads publish new ones.
    pub fn snapshot(&self) -> Arc<ArchiveIndex> {
        self.index.load_full()
    }

    /// Every locator, in load order.
    pub fn record_locators(&self) -> Vec<RecordLocator> {
        self.index.load().locators().to_vec()
    }

    /// Response locator for `url`, ignoring the scheme.
    pub fn lookup(&self, url: &str) -> Option<RecordLocator> {
        self.index.load().lookup(url, self.policy).cloned()
    }
}

impl Default for ArchiveStore {
    fn default() -> Self {
        Self::new(LookupPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::{gzip, http_response, warc_record};
    use std::io::Write;

    fn archive(records: &[Vec<u8>]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for record in records {
            file.write_all(record).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn response(url: &str, body: &[u8]) -> Vec<u8> {
        gzip(&warc_record(
            "response",
            url,
            &http_response("HTTP/1.1 200 OK", &[], body),
        ))
    }

    #[test]
    fn lookup_key_ignores_scheme_and_default_port() {
        assert_eq!(lookup_key("http://example.com/a?b"), "example.com/a?b");
        assert_eq!(lookup_key("https://example.com/a?b"), "example.com/a?b");
        assert_eq!(lookup_key("https://Example.com:443"), "example.com/");
        assert_eq!(lookup_key("http://example.com:8080/"), "example.com:8080/");
        assert_eq!(lookup_key("not a url"), "not a url");
    }

    #[test]
    fn load_indexes_responses_and_skips_broken_records() {
        let file = archive(&[
            gzip(&warc_record("warcinfo", "", b"software: test\r\n")),
            gzip(&warc_record("request", "http://a.test/", b"GET / HTTP/1.1\r\n\r\n")),
            response("http://a.test/", b"a"),
            b"WARC/1.0\r\nbroken header line\r\n\r\n".to_vec(),
            response("http://b.test/x", b"b"),
        ]);

        let store = ArchiveStore::default();
        let report = store.load(file.path()).unwrap();
        assert_eq!(report.records, 4);
        assert_eq!(report.responses, 2);
        assert_eq!(report.errors.len(), 1);

        let index = store.snapshot();
        assert_eq!(index.len(), 4);
        assert_eq!(index.response_count(), 2);
        assert_eq!(index.locators()[0].kind, RecordKind::WarcInfo);
        assert!(index
            .locators()
            .iter()
            .all(|l| l.source_file == file.path()));
    }

    #[test]
    fn lookup_collapses_http_and_https() {
        let file = archive(&[response("http://a.test/page", b"a")]);
        let store = ArchiveStore::default();
        store.load(file.path()).unwrap();

        let hit = store.lookup("https://a.test/page").unwrap();
        assert_eq!(hit.url, "http://a.test/page");
        assert_eq!(hit.offset, 0);
        assert!(store.lookup("https://a.test/other").is_none());
    }

    #[test]
    fn requests_are_not_lookup_candidates() {
        let file = archive(&[gzip(&warc_record(
            "request",
            "http://a.test/",
            b"GET / HTTP/1.1\r\n\r\n",
        ))]);
        let store = ArchiveStore::default();
        store.load(file.path()).unwrap();
        assert!(store.lookup("http://a.test/").is_none());
        assert_eq!(store.record_locators().len(), 1);
    }

    #[test]
    fn duplicate_urls_follow_policy() {
        let first = response("http://dup.test/", b"one");
        let second_offset = first.len() as u64;
        let file = archive(&[first, response("http://dup.test/", b"two")]);

        let store = ArchiveStore::new(LookupPolicy::First);
        store.load(file.path()).unwrap();
        assert_eq!(store.lookup("http://dup.test/").unwrap().offset, 0);

        let store = ArchiveStore::new(LookupPolicy::Last);
        store.load(file.path()).unwrap();
        assert_eq!(store.lookup("http://dup.test/").unwrap().offset, second_offset);
    }

    #[test]
    fn loads_append_and_clear_discards() {
        let a = archive(&[response("http://a.test/", b"a")]);
        let b = archive(&[response("http://b.test/", b"b")]);

        let store = ArchiveStore::default();
        store.load(a.path()).unwrap();
        let before = store.snapshot();
        store.load(b.path()).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(
            store.lookup("http://b.test/").unwrap().source_file,
            b.path()
        );

        store.clear();
        assert!(store.snapshot().is_empty());
        assert!(store.lookup("http://a.test/").is_none());
    }

    #[test]
    fn reload_replaces_contents() {
        let a = archive(&[response("http://a.test/", b"a")]);
        let b = archive(&[response("http://b.test/", b"b")]);

        let store = ArchiveStore::default();
        store.load(a.path()).unwrap();
        let results = store.reload(&[b.path()]);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(store.lookup("http://a.test/").is_none());
        assert!(store.lookup("http://b.test/").is_some());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let store = ArchiveStore::default();
        let err = store.load(Path::new("/definitely/not/here.warc.gz")).unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));
    }
}
