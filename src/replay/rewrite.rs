//! Outbound response synthesis.

use crate::archive::ResponseMessage;

/// Archived headers that are stale or conflict with the rewritten message.
pub const STRIPPED_HEADERS: [&str; 7] = [
    "connection",
    "content-length",
    "cache-control",
    "accept-ranges",
    "etag",
    "last-modified",
    "transfer-encoding",
];

/// Prefix for the verbatim copy of every archived header.
pub const ORIGINAL_HEADER_PREFIX: &str = "X-Archive-Orig-";

const NOT_FOUND_MESSAGE: &str = "URL not found in archives.";
const BAD_GATEWAY_MESSAGE: &str = "Archived response could not be decoded.";

fn is_stripped(name: &str) -> bool {
    STRIPPED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Serialize an archived response for the client.
///
/// The status line is reused as archived. The body is sent without transfer
/// coding and with a fresh `Content-Length`.
pub fn rewrite_response(message: &ResponseMessage) -> Vec<u8> {
    let mut head = format!("{} {} {}\r\n", message.version, message.code, message.reason);
    for (name, value) in message.headers.iter().filter(|(n, _)| !is_stripped(n)) {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str(&format!("Content-Length: {}\r\n", message.body.len()));
    head.push_str("Connection: keep-alive\r\n");
    for (name, value) in &message.headers {
        head.push_str(&format!("{}{}: {}\r\n", ORIGINAL_HEADER_PREFIX, name, value));
    }
    head.push_str("\r\n");

    let mut out = head.into_bytes();
    out.extend_from_slice(&message.body);
    out
}

fn plain_text(status: &str, message: &str) -> Vec<u8> {
    let body = format!("{}\r\n", message);
    format!(
        "HTTP/1.0 {}\r\nConnection: keep-alive\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
        status,
        body.len(),
        body
    )
    .into_bytes()
}

/// Response for a URL with no archived record.
pub fn not_found() -> Vec<u8> {
    plain_text("404 Not Found", NOT_FOUND_MESSAGE)
}

/// Response for a record that exists but cannot be replayed.
pub fn bad_gateway() -> Vec<u8> {
    plain_text("502 Bad Gateway", BAD_GATEWAY_MESSAGE)
}
