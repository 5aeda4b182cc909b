//! Builders for archive fixtures used by unit tests.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

/// A single uncompressed WARC/1.0 record.
pub fn warc_record(kind: &str, url: &str, block: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"WARC/1.0\r\n");
    out.extend_from_slice(format!("WARC-Type: {}\r\n", kind).as_bytes());
    if !url.is_empty() {
        out.extend_from_slice(format!("WARC-Target-URI: {}\r\n", url).as_bytes());
    }
    out.extend_from_slice(b"Content-Type: application/http; msgtype=response\r\n");
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", block.len()).as_bytes());
    out.extend_from_slice(block);
    out.extend_from_slice(b"\r\n\r\n");
    out
}

/// An HTTP response message as it would appear in a record block.
pub fn http_response(status_line: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("{}\r\n", status_line).into_bytes();
    for (name, value) in headers {
        out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

/// One complete gzip member.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
