//! Connection-level errors. Each one ends a single client connection.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::http::ParseError;
use crate::proxy::state::Phase;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("client I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("malformed request: {0}")]
    Parse(#[from] ParseError),

    #[error("request target {0:?} is not an absolute http(s) URI")]
    NotAbsoluteUri(String),

    #[error("invalid request target {target:?}: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("TLS handshake failed: {0}")]
    Tls(#[source] io::Error),

    #[error("no client traffic for {0:?}")]
    IdleTimeout(Duration),

    #[error("TLS handshake did not finish within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("invalid connection transition from {from:?} to {to:?}")]
    InvalidTransition { from: Phase, to: Phase },
}

impl ProxyError {
    /// Routine ways for a client connection to end.
    pub fn is_benign(&self) -> bool {
        match self {
            ProxyError::IdleTimeout(_) => true,
            ProxyError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
