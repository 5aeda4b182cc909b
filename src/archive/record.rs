//! Record locators and decoded records.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// WARC record kinds the replay pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Response,
    Request,
    WarcInfo,
    Other,
}

impl RecordKind {
    /// Map a `WARC-Type` header value.
    pub fn from_warc_type(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "response" => RecordKind::Response,
            "request" => RecordKind::Request,
            "warcinfo" => RecordKind::WarcInfo,
            _ => RecordKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Response => "response",
            RecordKind::Request => "request",
            RecordKind::WarcInfo => "warcinfo",
            RecordKind::Other => "other",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index entry pointing at one record inside one archive file.
///
/// Identity is `(source_file, offset)`; several locators may share a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordLocator {
    pub url: String,
    pub offset: u64,
    pub kind: RecordKind,
    pub source_file: PathBuf,
}

/// A record read back from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchivedRecord {
    /// WARC headers in file order.
    pub headers: Vec<(String, String)>,
    /// `Content-Type` of the record block.
    pub content_type: String,
    /// The record block, e.g. a complete HTTP response message.
    pub body: Vec<u8>,
    /// Decode problems found while reading this record.
    pub errors: Vec<String>,
}

impl ArchivedRecord {
    /// A record that could not be decoded at all.
    pub fn errored(errors: Vec<String>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_errored(&self) -> bool {
        !self.errors.is_empty()
    }
}
