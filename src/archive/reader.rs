//! On-demand record reads.
//!
//! Every call re-opens the source file; nothing is cached between reads.

use std::fmt::Write as _;

use crate::archive::error::ArchiveError;
use crate::archive::payload::{self, ResponseMessage};
use crate::archive::record::{ArchivedRecord, RecordLocator};
use crate::archive::warc::read_entry_at;

/// Body bytes shown by `dump` before truncating.
pub const DUMP_BODY_LIMIT: usize = 2048;

/// Stateless, re-entrant record reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveReader;

impl ArchiveReader {
    pub fn new() -> Self {
        Self
    }

    /// Decode the record `locator` points at.
    ///
    /// Decode problems come back inside the record (`errors`); only a file
    /// that cannot be opened or read is an `Err`.
    pub fn read(&self, locator: &RecordLocator) -> Result<ArchivedRecord, ArchiveError> {
        let entry = read_entry_at(&locator.source_file, locator.offset)
            .map_err(|e| ArchiveError::io(&locator.source_file, e))?;
        if entry.offset != locator.offset {
            return Ok(ArchivedRecord::errored(vec![format!(
                "expected a record at offset {}, found one at {}",
                locator.offset, entry.offset
            )]));
        }
        Ok(entry.into_archived())
    }

    /// Read the record and decode it as an HTTP response.
    pub fn read_response(&self, locator: &RecordLocator) -> Result<ResponseMessage, ArchiveError> {
        let record = self.read(locator)?;
        if record.is_errored() {
            return Err(ArchiveError::Decode {
                offset: locator.offset,
                message: record.errors.join("; "),
            });
        }
        Ok(ResponseMessage::parse(&record.body)?)
    }

    /// Response body of `record`, gzip-inflated when possible.
    pub fn extract_payload(&self, record: &ArchivedRecord) -> Result<Vec<u8>, ArchiveError> {
        Ok(payload::extract_payload(record)?)
    }
}

/// Human-readable rendering of a record for inspection tools.
pub fn dump(record: &ArchivedRecord) -> String {
    let mut out = String::from("Headers:\n");
    for (name, value) in &record.headers {
        let _ = writeln!(out, "\t{}:{}", name, value);
    }

    if record.body.is_empty() && record.content_type.is_empty() {
        out.push_str("Content: none\n\n");
    } else {
        out.push_str("Content Headers:\n");
        let _ = writeln!(out, "\t Content-Type: {}", record.content_type);
        let _ = writeln!(out, "\t Content-Length: {}", record.body.len());
        out.push_str("Content:\n");
        let shown = record.body.len().min(DUMP_BODY_LIMIT);
        out.push_str(&String::from_utf8_lossy(&record.body[..shown]));
        if shown < record.body.len() {
            out.push_str("\t...\n");
        }
    }

    if !record.errors.is_empty() {
        out.push_str("Errors:\n");
        for error in &record.errors {
            let _ = writeln!(out, "\t{}", error);
        }
    }
    out
}
