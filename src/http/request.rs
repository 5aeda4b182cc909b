//! Parsed request representation.
//!
//! # Responsibilities
//! - Hold the request line, ordered headers and derived framing facts
//! - Case-insensitive header access that keeps duplicates and order
//! - Convert absolute-form request targets to origin-form

use url::{Position, Url};

use crate::http::parser::ParseError;

/// Ordered header multimap.
///
/// Names keep their original spelling; lookups ignore ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Mutable access to the most recently appended value (header folding).
    pub(crate) fn last_value_mut(&mut self) -> Option<&mut String> {
        self.entries.last_mut().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The three parts of a request line: `METHOD target VERSION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

impl RequestLine {
    /// Split a request line on single spaces into exactly three parts.
    ///
    /// The version part keeps anything after the second space.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut parts = line.splitn(3, ' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(target), Some(version)) => Ok(Self {
                method: method.to_string(),
                target: target.to_string(),
                version: version.to_string(),
            }),
            _ => Err(ParseError::MalformedRequestLine(line.to_string())),
        }
    }
}

/// A fully parsed request head plus framing information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: Headers,
    /// Declared body length. Always 0 for `GET`.
    pub content_length: u64,
    /// False when a `Connection`/`Proxy-Connection` header says `close`,
    /// or when the request carries a body.
    pub persistent: bool,
}

impl ParsedRequest {
    pub(crate) fn new(line: RequestLine, headers: Headers, content_length: u64) -> Self {
        let persistent = !wants_close(&headers) && content_length == 0;
        Self {
            method: line.method,
            uri: line.target,
            version: line.version,
            headers,
            content_length,
            persistent,
        }
    }

    /// Replace an absolute-form URI with its origin form.
    pub fn relativize(&mut self) {
        self.uri = relative_uri(&self.uri);
    }
}

fn wants_close(headers: &Headers) -> bool {
    ["connection", "proxy-connection"].iter().any(|name| {
        headers
            .get_all(name)
            .any(|v| v.trim().eq_ignore_ascii_case("close"))
    })
}

/// Strip scheme and authority from an absolute URI.
///
/// Targets that are already relative (or `*`) are returned untouched.
pub fn relative_uri(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(url) if url.has_host() => {
            let rest = &url[Position::BeforePath..];
            if rest.starts_with('/') {
                rest.to_string()
            } else {
                format!("/{}", rest)
            }
        }
        _ => uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        let mut h = Headers::new();
        for (n, v) in pairs {
            h.append(*n, *v);
        }
        h
    }

    #[test]
    fn header_value_outlives_lookup_key() {
        let h = headers(&[("Content-Type", "text/html")]);
        let value = {
            let key = String::from("content-type");
            h.get(&key)
        };
        assert_eq!(value, Some("text/html"));
    }

    #[test]
    fn header_lookup_is_case_insensitive_and_ordered() {
        let h = headers(&[("Accept", "a"), ("ACCEPT", "b"), ("Host", "x")]);
        assert_eq!(h.get("accept"), Some("a"));
        assert_eq!(h.get_all("Accept").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(h.get("missing"), None);
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn request_line_needs_three_parts() {
        let line = RequestLine::parse("GET / HTTP/1.1").unwrap();
        assert_eq!(line.method, "GET");
        assert_eq!(line.target, "/");
        assert_eq!(line.version, "HTTP/1.1");

        assert!(RequestLine::parse("GET /").is_err());
        assert!(RequestLine::parse("GET").is_err());
        // Extra spaces end up in the version part.
        let line = RequestLine::parse("GET / HTTP/1.1 junk").unwrap();
        assert_eq!(line.version, "HTTP/1.1 junk");
    }

    #[test]
    fn close_header_disables_persistence() {
        let line = RequestLine::parse("GET / HTTP/1.1").unwrap();
        let req = ParsedRequest::new(line.clone(), headers(&[("Proxy-Connection", "CLOSE")]), 0);
        assert!(!req.persistent);

        let req = ParsedRequest::new(line.clone(), headers(&[("Connection", "keep-alive")]), 0);
        assert!(req.persistent);

        let req = ParsedRequest::new(line, headers(&[]), 12);
        assert!(!req.persistent);
    }

    #[test]
    fn relative_uri_strips_scheme_and_host() {
        assert_eq!(relative_uri("http://example.com/a/b?x=1"), "/a/b?x=1");
        assert_eq!(relative_uri("https://example.com:8443"), "/");
        assert_eq!(relative_uri("/already?relative"), "/already?relative");
        assert_eq!(relative_uri("*"), "*");
    }
}
