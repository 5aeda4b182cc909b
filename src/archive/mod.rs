//! Archive subsystem: WARC decoding, the record index and record reads.
//!
//! # Data Flow
//! ```text
//! startup / reload
//!     → store.rs (load: scan file via warc.rs, append locators, publish index)
//!
//! replay engine
//!     → store.rs (lookup by scheme-less URL)
//!     → reader.rs (re-open file at offset, decode one record)
//!     → payload.rs (split HTTP response, de-chunk, optional inflate)
//!
//! archive-cli
//!     → store.rs (record_locators) / reader.rs (dump, extract_payload)
//! ```
//!
//! # Design Decisions
//! - Records are never cached; a read always goes back to disk
//! - Per-record decode failures are reported, never fatal to a load
//! - The index is shared behind `ArcSwap` so lookups stay lock-free

pub mod error;
pub mod payload;
pub mod reader;
pub mod record;
pub mod store;
pub mod warc;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::ArchiveError;
pub use payload::{extract_payload, try_inflate, Inflated, PayloadError, ResponseMessage};
pub use reader::{dump, ArchiveReader};
pub use record::{ArchivedRecord, RecordKind, RecordLocator};
pub use store::{lookup_key, ArchiveIndex, ArchiveStore, LoadIssue, LoadReport, LookupPolicy};
pub use warc::{open_archive, RecordEntry, WarcReader, WarcRecord};
pub use watcher::ArchiveWatcher;
