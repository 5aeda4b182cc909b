//! Per-connection state machine.
//!
//! ```text
//! AwaitingOuterRequest → AwaitingTunnelDecision → TunnelEstablished ─┐
//!                                              → RelayEstablished  ─┤
//!                                                                   ↓
//!                 ┌──────────────── AwaitingInnerRequest ←──────────┘
//!                 ↓                         ↑
//!             Replaying ── persistent ──────┘
//!                 └── otherwise → Closed      (any phase may close)
//! ```

use bytes::{Bytes, BytesMut};
use url::Url;

use crate::http::{RequestHead, RequestLine};
use crate::proxy::error::ProxyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingOuterRequest,
    AwaitingTunnelDecision,
    TunnelEstablished,
    RelayEstablished,
    AwaitingInnerRequest,
    Replaying,
    Closed,
}

impl Phase {
    fn can_enter(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (AwaitingOuterRequest, AwaitingTunnelDecision)
                | (AwaitingTunnelDecision, TunnelEstablished)
                | (AwaitingTunnelDecision, RelayEstablished)
                | (TunnelEstablished, AwaitingInnerRequest)
                | (RelayEstablished, AwaitingInnerRequest)
                | (AwaitingInnerRequest, Replaying)
                | (Replaying, AwaitingInnerRequest)
                | (_, Closed)
        )
    }
}

/// How the outer request is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelDecision {
    /// `CONNECT host:port`: intercept TLS, then parse requests inside it.
    Tunnel,
    /// Absolute-URI request to a plain HTTP proxy.
    Relay,
}

/// State owned by one client connection.
#[derive(Debug)]
pub struct ProxyConnection {
    phase: Phase,
    is_tunnel: bool,
    target_uri: String,
    pending: BytesMut,
}

impl ProxyConnection {
    pub fn new() -> Self {
        Self {
            phase: Phase::AwaitingOuterRequest,
            is_tunnel: false,
            target_uri: String::new(),
            pending: BytesMut::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_tunnel(&self) -> bool {
        self.is_tunnel
    }

    /// `https://host:port` for tunnels, the absolute URI for relays.
    pub fn target_uri(&self) -> &str {
        &self.target_uri
    }

    fn enter(&mut self, next: Phase) -> Result<(), ProxyError> {
        if !self.phase.can_enter(next) {
            return Err(ProxyError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::trace!(from = ?self.phase, to = ?next, "Connection phase change");
        self.phase = next;
        Ok(())
    }

    /// Bytes that arrived before the inner parser existed.
    pub fn buffer(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Hand the buffered bytes over, oldest first.
    pub fn take_pending(&mut self) -> Bytes {
        self.pending.split().freeze()
    }

    /// The outer request head is complete; pick tunnel or relay.
    pub fn decide(&mut self, head: &RequestHead) -> Result<TunnelDecision, ProxyError> {
        self.enter(Phase::AwaitingTunnelDecision)?;
        let line = RequestLine::parse(&head.status)?;

        let (target, decision) = if line.method.eq_ignore_ascii_case("CONNECT") {
            (format!("https://{}", line.target), TunnelDecision::Tunnel)
        } else if has_http_scheme(&line.target) {
            (line.target, TunnelDecision::Relay)
        } else {
            return Err(ProxyError::NotAbsoluteUri(line.target));
        };

        Url::parse(&target).map_err(|source| ProxyError::InvalidTarget {
            target: target.clone(),
            source,
        })?;

        self.is_tunnel = decision == TunnelDecision::Tunnel;
        self.target_uri = target;
        Ok(decision)
    }

    pub fn tunnel_established(&mut self) -> Result<(), ProxyError> {
        self.enter(Phase::TunnelEstablished)
    }

    pub fn relay_established(&mut self) -> Result<(), ProxyError> {
        self.enter(Phase::RelayEstablished)
    }

    pub fn inner_parser_ready(&mut self) -> Result<(), ProxyError> {
        self.enter(Phase::AwaitingInnerRequest)
    }

    pub fn request_parsed(&mut self) -> Result<(), ProxyError> {
        self.enter(Phase::Replaying)
    }

    /// One request/response exchange finished.
    pub fn exchange_complete(&mut self, persistent: bool) -> Result<(), ProxyError> {
        if persistent {
            self.enter(Phase::AwaitingInnerRequest)
        } else {
            self.close();
            Ok(())
        }
    }

    pub fn close(&mut self) {
        self.phase = Phase::Closed;
        self.pending.clear();
    }
}

impl Default for ProxyConnection {
    fn default() -> Self {
        Self::new()
    }
}

fn has_http_scheme(target: &str) -> bool {
    let lower = target.get(..8).unwrap_or(target).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Headers;

    fn head(status: &str) -> RequestHead {
        RequestHead {
            status: status.to_string(),
            headers: Headers::new(),
        }
    }

    #[test]
    fn connect_becomes_https_tunnel() {
        let mut conn = ProxyConnection::new();
        let decision = conn.decide(&head("CONNECT example.com:443 HTTP/1.1")).unwrap();
        assert_eq!(decision, TunnelDecision::Tunnel);
        assert!(conn.is_tunnel());
        assert_eq!(conn.target_uri(), "https://example.com:443");
        assert_eq!(conn.phase(), Phase::AwaitingTunnelDecision);

        conn.tunnel_established().unwrap();
        conn.inner_parser_ready().unwrap();
        assert_eq!(conn.phase(), Phase::AwaitingInnerRequest);
    }

    #[test]
    fn absolute_uri_becomes_relay() {
        let mut conn = ProxyConnection::new();
        let decision = conn.decide(&head("GET HTTP://example.com/a HTTP/1.1")).unwrap();
        assert_eq!(decision, TunnelDecision::Relay);
        assert!(!conn.is_tunnel());
        assert_eq!(conn.target_uri(), "HTTP://example.com/a");
    }

    #[test]
    fn relative_target_is_rejected() {
        let mut conn = ProxyConnection::new();
        let err = conn.decide(&head("GET /index.html HTTP/1.1")).unwrap_err();
        assert!(matches!(err, ProxyError::NotAbsoluteUri(t) if t == "/index.html"));

        let mut conn = ProxyConnection::new();
        let err = conn.decide(&head("GET ftp://example.com/ HTTP/1.1")).unwrap_err();
        assert!(matches!(err, ProxyError::NotAbsoluteUri(_)));
    }

    #[test]
    fn broken_targets_are_rejected() {
        let mut conn = ProxyConnection::new();
        assert!(matches!(
            conn.decide(&head("CONNECT :443 HTTP/1.1")),
            Err(ProxyError::InvalidTarget { .. })
        ));

        let mut conn = ProxyConnection::new();
        assert!(matches!(conn.decide(&head("CONNECT")), Err(ProxyError::Parse(_))));
    }

    #[test]
    fn keep_alive_cycle_and_close() {
        let mut conn = ProxyConnection::new();
        conn.decide(&head("GET http://a.test/ HTTP/1.1")).unwrap();
        conn.relay_established().unwrap();
        conn.inner_parser_ready().unwrap();

        conn.request_parsed().unwrap();
        conn.exchange_complete(true).unwrap();
        assert_eq!(conn.phase(), Phase::AwaitingInnerRequest);

        conn.request_parsed().unwrap();
        conn.exchange_complete(false).unwrap();
        assert_eq!(conn.phase(), Phase::Closed);
    }

    #[test]
    fn illegal_transitions_are_errors() {
        let mut conn = ProxyConnection::new();
        let err = conn.request_parsed().unwrap_err();
        assert!(matches!(
            err,
            ProxyError::InvalidTransition {
                from: Phase::AwaitingOuterRequest,
                to: Phase::Replaying
            }
        ));

        conn.decide(&head("CONNECT a.test:443 HTTP/1.1")).unwrap();
        assert!(conn.decide(&head("CONNECT a.test:443 HTTP/1.1")).is_err());
    }

    #[test]
    fn pending_bytes_keep_order() {
        let mut conn = ProxyConnection::new();
        conn.buffer(b"abc");
        conn.buffer(b"def");
        assert!(conn.has_pending());
        assert_eq!(conn.take_pending(), Bytes::from_static(b"abcdef"));
        assert!(!conn.has_pending());

        conn.buffer(b"x");
        conn.close();
        assert!(!conn.has_pending());
        assert_eq!(conn.phase(), Phase::Closed);
    }
}
