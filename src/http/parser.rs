//! Incremental HTTP request parsing.
//!
//! # Responsibilities
//! - Accumulate bytes until a complete request line + header block arrives
//! - Apply the content-length rules (GET has no body, otherwise exactly one
//!   `Content-Length` header)
//! - Forward body bytes verbatim to the sink, then report completion with any
//!   bytes that arrived past the declared body
//!
//! # Design Decisions
//! - Chunk boundaries never matter: feeding one buffer or many is equivalent
//! - The sink is owned by the parser and handed in at construction
//! - Head size is bounded; oversized heads fail instead of buffering forever

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use crate::http::request::{Headers, ParsedRequest, RequestLine};

/// Default upper bound for a request line plus headers.
pub const DEFAULT_MAX_HEAD_BYTES: usize = 64 * 1024;

/// Errors that make a request stream unusable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("request with a body has no Content-Length header")]
    MissingContentLength,

    #[error("request has {count} Content-Length headers")]
    AmbiguousContentLength { count: usize },

    #[error("invalid Content-Length value: {0:?}")]
    InvalidContentLength(String),

    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("data received after the message was complete")]
    MessageComplete,

    #[error("{len} unexpected bytes after the end of the message")]
    TrailingData { len: usize },
}

/// Receiver of parser events.
pub trait RequestSink {
    /// Called once the request line and headers are known.
    fn on_request_parsed(&mut self, request: ParsedRequest);

    /// Called with body bytes, exactly as received.
    fn on_raw_data(&mut self, data: &[u8]);

    /// Called after the last body byte with whatever followed it.
    fn on_message_complete(&mut self, rest: Bytes);
}

/// Raw request line and header block, before any framing rules apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub status: String,
    pub headers: Headers,
}

/// Line-oriented reader for a request head.
#[derive(Debug)]
pub struct HeadParser {
    buf: BytesMut,
    status: Option<String>,
    headers: Headers,
    consumed: usize,
    max_head_bytes: usize,
}

impl HeadParser {
    pub fn new(max_head_bytes: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            status: None,
            headers: Headers::new(),
            consumed: 0,
            max_head_bytes,
        }
    }

    /// Feed bytes. Returns the head and the bytes after the blank line once
    /// the head is complete.
    pub fn push(&mut self, data: &[u8]) -> Result<Option<(RequestHead, Bytes)>, ParseError> {
        self.buf.extend_from_slice(data);

        loop {
            let Some(newline) = self.buf.iter().position(|b| *b == b'\n') else {
                if self.consumed + self.buf.len() > self.max_head_bytes {
                    return Err(ParseError::HeadTooLarge { limit: self.max_head_bytes });
                }
                return Ok(None);
            };

            let mut line = self.buf.split_to(newline + 1);
            self.consumed += line.len();
            if self.consumed > self.max_head_bytes {
                return Err(ParseError::HeadTooLarge { limit: self.max_head_bytes });
            }
            line.truncate(newline);
            if line.last() == Some(&b'\r') {
                line.truncate(newline - 1);
            }
            let line = String::from_utf8_lossy(&line).into_owned();

            let Some(status) = self.status.take() else {
                // Stray CRLFs before a request line are ignored.
                if !line.is_empty() {
                    self.status = Some(line);
                }
                continue;
            };

            if line.is_empty() {
                let head = RequestHead {
                    status,
                    headers: std::mem::take(&mut self.headers),
                };
                let rest = self.buf.split().freeze();
                self.consumed = 0;
                return Ok(Some((head, rest)));
            }

            self.status = Some(status);
            self.header_line(&line)?;
        }
    }

    fn header_line(&mut self, line: &str) -> Result<(), ParseError> {
        if line.starts_with(' ') || line.starts_with('\t') {
            let value = self
                .headers
                .last_value_mut()
                .ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;
            value.push(' ');
            value.push_str(line.trim());
            return Ok(());
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseError::MalformedHeader(line.to_string()));
        }
        self.headers.append(name, value.trim());
        Ok(())
    }
}

#[derive(Debug)]
enum State {
    Head(HeadParser),
    Body { remaining: u64 },
    Done,
}

/// Single-use parser for one request message.
///
/// Create a fresh parser for every message on a connection.
#[derive(Debug)]
pub struct RequestParser<S> {
    state: State,
    sink: S,
}

impl<S: RequestSink> RequestParser<S> {
    pub fn new(sink: S, max_head_bytes: usize) -> Self {
        Self {
            state: State::Head(HeadParser::new(max_head_bytes)),
            sink,
        }
    }

    /// Start from a head that was already parsed elsewhere.
    ///
    /// Used for plain proxy requests, where the outer request *is* the
    /// request to replay. Events for the head are delivered immediately.
    pub fn from_head(sink: S, head: RequestHead) -> Result<Self, ParseError> {
        let mut parser = Self {
            state: State::Done,
            sink,
        };
        parser.headers_complete(head, Bytes::new())?;
        Ok(parser)
    }

    /// Feed the next bytes of the stream.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), ParseError> {
        match &mut self.state {
            State::Head(head) => {
                if let Some((head, rest)) = head.push(data)? {
                    self.headers_complete(head, rest)?;
                }
                Ok(())
            }
            State::Body { .. } => {
                self.body_data(Bytes::copy_from_slice(data));
                Ok(())
            }
            State::Done if data.is_empty() => Ok(()),
            State::Done => Err(ParseError::MessageComplete),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Done)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn headers_complete(&mut self, head: RequestHead, rest: Bytes) -> Result<(), ParseError> {
        let line = RequestLine::parse(&head.status)?;
        let content_length = if line.method == "GET" {
            0
        } else {
            parse_content_length(&head.headers)?
        };

        self.sink
            .on_request_parsed(ParsedRequest::new(line, head.headers, content_length));

        if content_length == 0 {
            self.finish(rest);
        } else {
            self.state = State::Body {
                remaining: content_length,
            };
            if !rest.is_empty() {
                self.body_data(rest);
            }
        }
        Ok(())
    }

    fn body_data(&mut self, mut data: Bytes) {
        let State::Body { remaining } = self.state else {
            return;
        };

        let take = remaining.min(data.len() as u64) as usize;
        let chunk = data.split_to(take);
        let remaining = remaining - take as u64;
        if !chunk.is_empty() {
            self.sink.on_raw_data(&chunk);
        }

        if remaining == 0 {
            self.finish(data);
        } else {
            self.state = State::Body { remaining };
        }
    }

    fn finish(&mut self, rest: Bytes) {
        self.state = State::Done;
        self.sink.on_message_complete(rest);
    }
}

/// Exactly one `Content-Length` header is accepted.
fn parse_content_length(headers: &Headers) -> Result<u64, ParseError> {
    let values: Vec<&str> = headers.get_all("content-length").collect();
    match values.as_slice() {
        [] => Err(ParseError::MissingContentLength),
        [value] => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidContentLength(value.to_string())),
        many => Err(ParseError::AmbiguousContentLength { count: many.len() }),
    }
}
