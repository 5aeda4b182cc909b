//! Archived HTTP response decoding.
//!
//! # Responsibilities
//! - Split a response record block into status line, headers and body
//! - Undo chunked transfer coding so the body length is known
//! - Optionally inflate a gzip-encoded body for extraction
//!
//! # Design Decisions
//! - Inflation failure is an explicit `Inflated::Passthrough`, not an error
//! - Header values are decoded lossily; archives contain arbitrary bytes

use std::io::Read;

use flate2::read::GzDecoder;
use thiserror::Error;

use crate::archive::record::ArchivedRecord;

const MAX_HEADERS: usize = 256;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// The record block could not be read as an HTTP response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("record block is not an HTTP response: {0}")]
    Malformed(String),

    #[error("record block ends inside the HTTP response head")]
    Incomplete,
}

/// An HTTP response message recovered from an archive record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMessage {
    pub version: String,
    pub code: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    /// Body with transfer coding removed; content coding is left alone.
    pub body: Vec<u8>,
}

impl ResponseMessage {
    /// Parse a response record block.
    ///
    /// Blocks httparse rejects (`HTTP/2` status lines, odd header names) go
    /// through a line-based fallback that keeps the version as archived.
    pub fn parse(block: &[u8]) -> Result<Self, PayloadError> {
        let (mut message, head_len) = match Self::parse_head(block) {
            Err(PayloadError::Malformed(reason)) => Self::parse_head_lenient(block, reason)?,
            other => other?,
        };
        message.body = message.decode_body(&block[head_len..]);
        Ok(message)
    }

    fn parse_head(block: &[u8]) -> Result<(Self, usize), PayloadError> {
        let mut storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut response = httparse::Response::new(&mut storage);
        let head_len = match httparse::ParserConfig::default()
            .allow_spaces_after_header_name_in_responses(true)
            .allow_obsolete_multiline_headers_in_responses(true)
            .parse_response(&mut response, block)
        {
            Ok(httparse::Status::Complete(n)) => n,
            Ok(httparse::Status::Partial) => return Err(PayloadError::Incomplete),
            Err(e) => return Err(PayloadError::Malformed(e.to_string())),
        };

        let code = response
            .code
            .ok_or_else(|| PayloadError::Malformed("missing status code".to_string()))?;
        let headers = response
            .headers
            .iter()
            .map(|h| {
                let value = String::from_utf8_lossy(h.value).replace(['\r', '\n'], " ");
                (h.name.to_string(), value)
            })
            .collect();

        let message = Self {
            version: format!("HTTP/1.{}", response.version.unwrap_or(1)),
            code,
            reason: response.reason.unwrap_or("").to_string(),
            headers,
            body: Vec::new(),
        };
        Ok((message, head_len))
    }

    /// Line-based head parsing; `reason` is reported if the status line is
    /// not HTTP either.
    fn parse_head_lenient(block: &[u8], reason: String) -> Result<(Self, usize), PayloadError> {
        let status_end = block.iter().position(|b| *b == b'\n').unwrap_or(block.len());
        let status_line = String::from_utf8_lossy(&block[..status_end]);
        let mut parts = status_line.trim_end_matches('\r').splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        let code = parts
            .next()
            .filter(|c| c.len() == 3)
            .and_then(|c| c.parse::<u16>().ok());
        let code = match code {
            Some(code) if version.starts_with("HTTP/") => code,
            _ => return Err(PayloadError::Malformed(reason)),
        };
        let reason_phrase = parts.next().unwrap_or("").trim().to_string();

        let head_len = head_end(block).ok_or(PayloadError::Incomplete)?;
        let head = String::from_utf8_lossy(&block[..head_len]);
        let mut headers: Vec<(String, String)> = Vec::new();
        for line in head.lines().skip(1).map(|l| l.trim_end_matches('\r')) {
            if line.is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        let message = Self {
            version: version.to_string(),
            code,
            reason: reason_phrase,
            headers,
            body: Vec::new(),
        };
        Ok((message, head_len))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn decode_body(&self, raw: &[u8]) -> Vec<u8> {
        let chunked = self
            .header("transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);
        if chunked {
            if let Some(body) = dechunk(raw) {
                return body;
            }
        }

        match self
            .header("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            Some(len) if len < raw.len() => raw[..len].to_vec(),
            _ => raw.to_vec(),
        }
    }
}

/// Length of the head including its blank line, for CRLF or bare LF endings.
fn head_end(block: &[u8]) -> Option<usize> {
    let crlf = block.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
    let lf = block.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Join the chunks of a chunked body.
///
/// Returns `None` when the first size line is not a chunk size. A damaged
/// stream later on keeps whatever was decoded up to that point.
fn dechunk(raw: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len());
    let mut rest = raw;
    let mut first = true;

    loop {
        let Some(newline) = rest.iter().position(|b| *b == b'\n') else {
            break;
        };
        let line = String::from_utf8_lossy(&rest[..newline]);
        let size_field = line.split(';').next().unwrap_or("").trim();
        let size = match usize::from_str_radix(size_field, 16) {
            Ok(size) => size,
            Err(_) if first => return None,
            Err(_) => break,
        };
        first = false;
        rest = &rest[newline + 1..];
        if size == 0 {
            break;
        }

        let take = size.min(rest.len());
        out.extend_from_slice(&rest[..take]);
        rest = &rest[take..];
        if take < size {
            break;
        }
        rest = rest
            .strip_prefix(b"\r\n")
            .or_else(|| rest.strip_prefix(b"\n"))
            .unwrap_or(rest);
    }

    if first {
        None
    } else {
        Some(out)
    }
}

/// Outcome of a gzip inflation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inflated<'a> {
    Decompressed(Vec<u8>),
    /// Not gzip (or corrupt); the input is handed back unchanged.
    Passthrough(&'a [u8]),
}

impl Inflated<'_> {
    pub fn was_decompressed(&self) -> bool {
        matches!(self, Inflated::Decompressed(_))
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Inflated::Decompressed(bytes) => bytes,
            Inflated::Passthrough(bytes) => bytes.to_vec(),
        }
    }
}

/// Inflate `body` if it is a gzip stream.
pub fn try_inflate(body: &[u8]) -> Inflated<'_> {
    if !body.starts_with(&GZIP_MAGIC) {
        return Inflated::Passthrough(body);
    }
    let mut out = Vec::new();
    match GzDecoder::new(body).read_to_end(&mut out) {
        Ok(_) => Inflated::Decompressed(out),
        Err(e) => {
            tracing::debug!(error = %e, "Body looked like gzip but did not inflate");
            Inflated::Passthrough(body)
        }
    }
}

/// The response body of a record, inflated when it was gzip-encoded.
pub fn extract_payload(record: &ArchivedRecord) -> Result<Vec<u8>, PayloadError> {
    let message = ResponseMessage::parse(&record.body)?;
    Ok(try_inflate(&message.body).into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::{gzip, http_response};

    #[test]
    fn parses_status_headers_and_body() {
        let block = http_response(
            "HTTP/1.1 200 OK",
            &[("Content-Type", "text/html"), ("X-Dup", "1"), ("X-Dup", "2")],
            b"<html>hi</html>",
        );
        let message = ResponseMessage::parse(&block).unwrap();
        assert_eq!(message.version, "HTTP/1.1");
        assert_eq!(message.code, 200);
        assert_eq!(message.reason, "OK");
        assert_eq!(message.headers.len(), 3);
        assert_eq!(message.header("content-type"), Some("text/html"));
        assert_eq!(message.body, b"<html>hi</html>");
    }

    #[test]
    fn chunked_body_is_joined() {
        let block = http_response(
            "HTTP/1.1 200 OK",
            &[("Transfer-Encoding", "chunked")],
            b"5\r\nhello\r\n6;ext=1\r\n world\r\n0\r\n\r\n",
        );
        let message = ResponseMessage::parse(&block).unwrap();
        assert_eq!(message.body, b"hello world");
    }

    #[test]
    fn bogus_chunking_falls_back_to_raw_body() {
        let block = http_response(
            "HTTP/1.1 200 OK",
            &[("Transfer-Encoding", "chunked")],
            b"not chunked at all\r\n",
        );
        let message = ResponseMessage::parse(&block).unwrap();
        assert_eq!(message.body, b"not chunked at all\r\n");
    }

    #[test]
    fn content_length_truncates_trailing_bytes() {
        let block = http_response("HTTP/1.0 200 OK", &[("Content-Length", "3")], b"abcdef");
        assert_eq!(ResponseMessage::parse(&block).unwrap().body, b"abc");
    }

    #[test]
    fn http2_status_line_is_kept_as_archived() {
        let block = http_response(
            "HTTP/2 200 OK",
            &[("content-type", "text/plain"), ("content-length", "2")],
            b"okextra",
        );
        let message = ResponseMessage::parse(&block).unwrap();
        assert_eq!(message.version, "HTTP/2");
        assert_eq!(message.code, 200);
        assert_eq!(message.reason, "OK");
        assert_eq!(message.header("Content-Type"), Some("text/plain"));
        assert_eq!(message.body, b"ok");

        let bare = ResponseMessage::parse(b"HTTP/2.0 304\r\n\r\n").unwrap();
        assert_eq!(bare.version, "HTTP/2.0");
        assert_eq!(bare.code, 304);
        assert_eq!(bare.reason, "");
    }

    #[test]
    fn odd_header_names_are_tolerated() {
        let block = http_response(
            "HTTP/1.1 200 OK",
            &[("X(Bad)", "1"), ("Content-Type", "text/html")],
            b"<p>",
        );
        let message = ResponseMessage::parse(&block).unwrap();
        assert_eq!(message.version, "HTTP/1.1");
        assert_eq!(message.header("x(bad)"), Some("1"));
        assert_eq!(message.header("content-type"), Some("text/html"));
        assert_eq!(message.body, b"<p>");
    }

    #[test]
    fn non_http_block_is_an_error() {
        assert!(matches!(
            ResponseMessage::parse(b"software: warcio\r\n"),
            Err(PayloadError::Malformed(_))
        ));
        assert_eq!(
            ResponseMessage::parse(b"HTTP/1.1 200 OK\r\nHost: x"),
            Err(PayloadError::Incomplete)
        );
    }

    #[test]
    fn inflate_or_passthrough() {
        let packed = gzip(b"compressed text");
        let inflated = try_inflate(&packed);
        assert!(inflated.was_decompressed());
        assert_eq!(inflated.into_bytes(), b"compressed text");

        let plain = try_inflate(b"plain text");
        assert_eq!(plain, Inflated::Passthrough(b"plain text"));

        let mut corrupt = packed.clone();
        corrupt.truncate(12);
        assert!(!try_inflate(&corrupt).was_decompressed());
    }

    #[test]
    fn extract_payload_inflates_gzip_bodies() {
        let block = http_response(
            "HTTP/1.1 200 OK",
            &[("Content-Encoding", "gzip")],
            &gzip(b"<p>zipped</p>"),
        );
        let record = ArchivedRecord {
            body: block,
            ..ArchivedRecord::default()
        };
        assert_eq!(extract_payload(&record).unwrap(), b"<p>zipped</p>");
    }
}
