//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! raw client bytes (plain or decrypted)
//!     → parser.rs (HeadParser: request line + header block)
//!     → parser.rs (RequestParser: content-length rules, body passthrough)
//!     → request.rs (ParsedRequest handed to the RequestSink)
//!     → [proxy layer relativizes the URI and asks the replay engine]
//! ```
//!
//! # Design Decisions
//! - Push parser: bytes may arrive split at any boundary
//! - Parser events go to an explicit `RequestSink` owned by the parser
//! - One `RequestParser` per message; a finished parser rejects more input
//! - No chunked requests, no pipelining

pub mod parser;
pub mod request;

pub use parser::{HeadParser, ParseError, RequestHead, RequestParser, RequestSink};
pub use request::{relative_uri, Headers, ParsedRequest, RequestLine};
