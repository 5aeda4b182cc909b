//! WARC container decoding.
//!
//! # Responsibilities
//! - Walk an archive file record by record, reporting each record's offset
//! - Handle plain files and per-record gzip members (detected per record)
//! - Re-open a file at a recorded offset and decode exactly one record
//!
//! # Design Decisions
//! - Decode problems are data, not control flow: every step yields a
//!   `RecordEntry` carrying the record (if any) and its error messages
//! - A malformed plain record is skipped by scanning to the next `WARC/` line
//! - A broken gzip stream ends the scan; nothing after it can be located

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::bufread::GzDecoder;

use crate::archive::record::{ArchivedRecord, RecordKind};

const GZIP_FIRST_BYTE: u8 = 0x1f;
const GZIP_MAGIC: [u8; 2] = [GZIP_FIRST_BYTE, 0x8b];
const VERSION_PREFIX: &str = "WARC/";
const MAX_PREALLOC: usize = 1 << 20;

/// A decoded WARC record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarcRecord {
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub block: Vec<u8>,
}

impl WarcRecord {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn kind(&self) -> RecordKind {
        self.header("WARC-Type")
            .map(RecordKind::from_warc_type)
            .unwrap_or(RecordKind::Other)
    }

    /// `WARC-Target-URI`, with the `<...>` wrapping some writers emit removed.
    pub fn target_uri(&self) -> Option<&str> {
        self.header("WARC-Target-URI").map(|uri| {
            let uri = uri.trim();
            uri.strip_prefix('<')
                .and_then(|u| u.strip_suffix('>'))
                .unwrap_or(uri)
        })
    }

    pub fn content_type(&self) -> &str {
        self.header("Content-Type").unwrap_or("")
    }

    pub fn into_archived(self, errors: Vec<String>) -> ArchivedRecord {
        ArchivedRecord {
            content_type: self.content_type().to_string(),
            headers: self.headers,
            body: self.block,
            errors,
        }
    }
}

/// One step of a sequential scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub offset: u64,
    pub record: Option<WarcRecord>,
    pub errors: Vec<String>,
}

impl RecordEntry {
    fn failed(offset: u64, message: String) -> Self {
        Self {
            offset,
            record: None,
            errors: vec![message],
        }
    }

    pub fn into_archived(self) -> ArchivedRecord {
        match self.record {
            Some(record) => record.into_archived(self.errors),
            None => ArchivedRecord::errored(self.errors),
        }
    }
}

#[derive(Debug)]
enum RecordError {
    Eof,
    Malformed(String),
    Truncated(String),
    Io(io::Error),
}

impl From<io::Error> for RecordError {
    fn from(e: io::Error) -> Self {
        RecordError::Io(e)
    }
}

/// `BufRead` adapter that tracks how many bytes were consumed.
#[derive(Debug)]
struct Counting<R> {
    inner: R,
    position: u64,
}

impl<R: BufRead> Read for Counting<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: BufRead> BufRead for Counting<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.position += amt as u64;
    }
}

/// Sequential WARC reader.
#[derive(Debug)]
pub struct WarcReader<R> {
    reader: Counting<R>,
    done: bool,
}

impl WarcReader<BufReader<File>> {
    /// Open an archive for a full scan.
    pub fn open(path: &Path) -> io::Result<Self> {
        Self::open_at(path, 0)
    }

    /// Open an archive positioned at `offset`.
    pub fn open_at(path: &Path, offset: u64) -> io::Result<Self> {
        let mut file = File::open(path)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset))?;
        }
        Ok(Self::new(BufReader::new(file), offset))
    }
}

impl<R: BufRead> WarcReader<R> {
    /// Wrap a reader whose first byte sits at `start_offset` in the file.
    pub fn new(reader: R, start_offset: u64) -> Self {
        Self {
            reader: Counting {
                inner: reader,
                position: start_offset,
            },
            done: false,
        }
    }

    /// Decode the next record, or `None` at end of file.
    pub fn next_entry(&mut self) -> Option<RecordEntry> {
        if self.done {
            return None;
        }

        let first = match self.skip_separators() {
            Ok(Some(byte)) => byte,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(RecordEntry::failed(self.reader.position, e.to_string()));
            }
        };

        let offset = self.reader.position;
        if first == GZIP_FIRST_BYTE {
            Some(self.next_gzip_member(offset))
        } else {
            Some(self.next_plain(offset))
        }
    }

    /// Skip blank bytes between records; returns the next byte, unconsumed.
    fn skip_separators(&mut self) -> io::Result<Option<u8>> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }
            let skip = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            let next = buf.get(skip).copied();
            self.reader.consume(skip);
            if next.is_some() {
                return Ok(next);
            }
        }
    }

    fn next_gzip_member(&mut self, offset: u64) -> RecordEntry {
        let mut data = Vec::new();
        let inflated = GzDecoder::new(&mut self.reader).read_to_end(&mut data);
        if let Err(e) = inflated {
            self.done = true;
            return RecordEntry::failed(offset, format!("corrupt gzip member: {}", e));
        }

        let mut member: &[u8] = &data;
        match read_record(&mut member) {
            Ok(record) => {
                let mut errors = Vec::new();
                if member.iter().any(|b| !b.is_ascii_whitespace()) {
                    errors.push(format!(
                        "{} unexpected bytes after record in gzip member",
                        member.len()
                    ));
                }
                RecordEntry {
                    offset,
                    record: Some(record),
                    errors,
                }
            }
            Err(RecordError::Eof) => RecordEntry::failed(offset, "empty gzip member".to_string()),
            Err(RecordError::Malformed(msg)) | Err(RecordError::Truncated(msg)) => {
                RecordEntry::failed(offset, msg)
            }
            Err(RecordError::Io(e)) => RecordEntry::failed(offset, e.to_string()),
        }
    }

    fn next_plain(&mut self, offset: u64) -> RecordEntry {
        match read_record(&mut self.reader) {
            Ok(record) => RecordEntry {
                offset,
                record: Some(record),
                errors: Vec::new(),
            },
            Err(RecordError::Malformed(msg)) => {
                if let Err(e) = self.resync() {
                    self.done = true;
                    return RecordEntry {
                        offset,
                        record: None,
                        errors: vec![msg, e.to_string()],
                    };
                }
                RecordEntry::failed(offset, msg)
            }
            Err(RecordError::Eof) => {
                self.done = true;
                RecordEntry::failed(offset, "unexpected end of file".to_string())
            }
            Err(RecordError::Truncated(msg)) => {
                self.done = true;
                RecordEntry::failed(offset, msg)
            }
            Err(RecordError::Io(e)) => {
                self.done = true;
                RecordEntry::failed(offset, e.to_string())
            }
        }
    }

    /// Advance to the next line that starts a record: a `WARC/` version
    /// line or a gzip member.
    ///
    /// Called right after a whole line was consumed.
    fn resync(&mut self) -> io::Result<()> {
        let mut at_line_start = true;
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                self.done = true;
                return Ok(());
            }
            if at_line_start
                && (buf.starts_with(VERSION_PREFIX.as_bytes()) || buf.starts_with(&GZIP_MAGIC))
            {
                return Ok(());
            }
            let (used, found_newline) = match buf.iter().position(|b| *b == b'\n') {
                Some(i) => (i + 1, true),
                None => (buf.len(), false),
            };
            self.reader.consume(used);
            at_line_start = found_newline;
        }
    }
}

impl<R: BufRead> Iterator for WarcReader<R> {
    type Item = RecordEntry;

    fn next(&mut self) -> Option<RecordEntry> {
        self.next_entry()
    }
}

/// Open `path` for a sequential scan of all its records.
pub fn open_archive(path: &Path) -> io::Result<WarcReader<BufReader<File>>> {
    WarcReader::open(path)
}

/// Decode the single record that starts at `offset`.
pub fn read_entry_at(path: &Path, offset: u64) -> io::Result<RecordEntry> {
    let mut reader = WarcReader::open_at(path, offset)?;
    Ok(reader
        .next_entry()
        .unwrap_or_else(|| RecordEntry::failed(offset, "no record at offset".to_string())))
}

fn read_line<B: BufRead>(r: &mut B) -> io::Result<Option<String>> {
    let mut raw = Vec::new();
    if r.read_until(b'\n', &mut raw)? == 0 {
        return Ok(None);
    }
    while matches!(raw.last(), Some(b'\n') | Some(b'\r')) {
        raw.pop();
    }
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

fn read_record<B: BufRead>(r: &mut B) -> Result<WarcRecord, RecordError> {
    let version = read_line(r)?.ok_or(RecordError::Eof)?;
    if !version.starts_with(VERSION_PREFIX) {
        let shown: String = version.chars().take(40).collect();
        return Err(RecordError::Malformed(format!(
            "expected WARC version line, found {:?}",
            shown
        )));
    }

    let mut headers: Vec<(String, String)> = Vec::new();
    let mut bad_line = None;
    loop {
        let line = read_line(r)?
            .ok_or_else(|| RecordError::Truncated("end of file inside WARC headers".to_string()))?;
        if line.is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }
        }
        match line.split_once(':') {
            Some((name, value)) => headers.push((name.trim().to_string(), value.trim().to_string())),
            None => bad_line = bad_line.or(Some(line)),
        }
    }
    if let Some(line) = bad_line {
        return Err(RecordError::Malformed(format!("malformed WARC header line: {:?}", line)));
    }

    let length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("Content-Length"))
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| RecordError::Malformed("WARC record has no Content-Length".to_string()))?;
    let length: u64 = length
        .parse()
        .map_err(|_| RecordError::Malformed(format!("invalid WARC Content-Length {:?}", length)))?;

    let mut block = Vec::with_capacity((length as usize).min(MAX_PREALLOC));
    r.by_ref().take(length).read_to_end(&mut block)?;
    if (block.len() as u64) < length {
        return Err(RecordError::Truncated(format!(
            "record block truncated: expected {} bytes, found {}",
            length,
            block.len()
        )));
    }

    Ok(WarcRecord {
        version,
        headers,
        block,
    })
}
