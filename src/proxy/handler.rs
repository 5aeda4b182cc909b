//! Drives one client connection from the first byte to close.
//!
//! # Data Flow
//! ```text
//! client bytes → HeadParser (outer request)
//!     → ProxyConnection::decide
//!         CONNECT: "200 Connection established" → TLS accept (Rewind replays
//!                  read-ahead bytes) → fresh RequestParser per message
//!         relay:   RequestParser::from_head(outer head) → buffered body bytes
//!     → Exchange events → canonicalize → ReplayEngine::replay_to
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_rustls::TlsAcceptor;
use url::Url;
use uuid::Uuid;

use crate::config::ReplayConfig;
use crate::http::{HeadParser, ParseError, ParsedRequest, RequestParser, RequestSink};
use crate::net::Rewind;
use crate::proxy::error::ProxyError;
use crate::proxy::state::{ProxyConnection, TunnelDecision};
use crate::replay::{canonicalize, ReplayEngine};

const READ_CHUNK: usize = 8 * 1024;
const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.0 200 Connection established\r\n\r\n";

/// Everything a connection handler needs, shared read-only by all connections.
pub struct ConnectionContext {
    pub engine: ReplayEngine,
    pub tls: TlsAcceptor,
    pub idle_timeout: Duration,
    pub handshake_timeout: Duration,
    pub max_head_bytes: usize,
}

impl ConnectionContext {
    pub fn new(config: &ReplayConfig, engine: ReplayEngine, tls: TlsAcceptor) -> Self {
        Self {
            engine,
            tls,
            idle_timeout: Duration::from_secs(config.timeouts.idle_secs),
            handshake_timeout: Duration::from_secs(config.timeouts.handshake_secs),
            max_head_bytes: config.limits.max_head_bytes,
        }
    }
}

#[derive(Debug)]
enum ExchangeEvent {
    Request(ParsedRequest),
    Complete(Bytes),
}

/// Parser sink that queues events for the connection loop.
///
/// Request bodies are counted and dropped; replay is keyed by URL only.
#[derive(Debug, Default)]
struct Exchange {
    events: VecDeque<ExchangeEvent>,
    body_bytes: u64,
}

impl RequestSink for Exchange {
    fn on_request_parsed(&mut self, request: ParsedRequest) {
        self.events.push_back(ExchangeEvent::Request(request));
    }

    fn on_raw_data(&mut self, data: &[u8]) {
        self.body_bytes += data.len() as u64;
    }

    fn on_message_complete(&mut self, rest: Bytes) {
        self.events.push_back(ExchangeEvent::Complete(rest));
    }
}

async fn read_idle<S>(stream: &mut S, buf: &mut [u8], idle: Duration) -> Result<usize, ProxyError>
where
    S: AsyncRead + Unpin,
{
    match tokio::time::timeout(idle, stream.read(buf)).await {
        Ok(read) => Ok(read?),
        Err(_) => Err(ProxyError::IdleTimeout(idle)),
    }
}

/// Serve one client connection until it closes or fails.
pub async fn handle_connection<S>(mut stream: S, ctx: &ConnectionContext) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut conn = ProxyConnection::new();
    let mut outer = HeadParser::new(ctx.max_head_bytes);
    let mut buf = vec![0u8; READ_CHUNK];

    let (head, rest) = loop {
        let n = read_idle(&mut stream, &mut buf, ctx.idle_timeout).await?;
        if n == 0 {
            conn.close();
            return Ok(());
        }
        if let Some(done) = outer.push(&buf[..n])? {
            break done;
        }
    };
    conn.buffer(&rest);

    match conn.decide(&head)? {
        TunnelDecision::Tunnel => {
            tracing::debug!(target_uri = %conn.target_uri(), "Intercepting CONNECT tunnel");
            stream.write_all(CONNECTION_ESTABLISHED).await?;
            stream.flush().await?;

            let read_ahead = conn.take_pending();
            let handshake = ctx.tls.accept(Rewind::new(stream, read_ahead));
            let tls = tokio::time::timeout(ctx.handshake_timeout, handshake)
                .await
                .map_err(|_| ProxyError::HandshakeTimeout(ctx.handshake_timeout))?
                .map_err(ProxyError::Tls)?;

            conn.tunnel_established()?;
            let parser = RequestParser::new(Exchange::default(), ctx.max_head_bytes);
            serve(tls, conn, parser, ctx).await
        }
        TunnelDecision::Relay => {
            tracing::debug!(target_uri = %conn.target_uri(), "Relaying plain proxy request");
            conn.relay_established()?;
            let parser = RequestParser::from_head(Exchange::default(), head)?;
            serve(stream, conn, parser, ctx).await
        }
    }
}

/// Inner request loop, shared by tunnels and relays.
async fn serve<S>(
    mut stream: S,
    mut conn: ProxyConnection,
    mut parser: RequestParser<Exchange>,
    ctx: &ConnectionContext,
) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    conn.inner_parser_ready()?;
    let mut buf = vec![0u8; READ_CHUNK];
    let mut persistent = false;

    loop {
        while let Some(event) = parser.sink_mut().events.pop_front() {
            match event {
                ExchangeEvent::Request(request) => {
                    conn.request_parsed()?;
                    persistent = request.persistent;
                    replay(&mut stream, &conn, request, ctx).await?;
                }
                ExchangeEvent::Complete(rest) => {
                    if !rest.is_empty() || conn.has_pending() {
                        let len = rest.len() + conn.take_pending().len();
                        return Err(ParseError::TrailingData { len }.into());
                    }
                    tracing::trace!(body_bytes = parser.sink().body_bytes, "Request message complete");
                    conn.exchange_complete(persistent)?;
                    if !persistent {
                        let _ = stream.shutdown().await;
                        return Ok(());
                    }
                    parser = RequestParser::new(Exchange::default(), ctx.max_head_bytes);
                }
            }
        }

        if conn.has_pending() {
            let pending = conn.take_pending();
            parser.feed(&pending)?;
            continue;
        }

        let n = read_idle(&mut stream, &mut buf, ctx.idle_timeout).await?;
        if n == 0 {
            tracing::trace!(phase = ?conn.phase(), "Client closed connection");
            conn.close();
            return Ok(());
        }
        parser.feed(&buf[..n])?;
    }
}

/// Where a request is looked up: its own absolute URI if it has one,
/// otherwise the connection target.
fn replay_base<'a>(request: &'a ParsedRequest, conn: &'a ProxyConnection) -> &'a str {
    match Url::parse(&request.uri) {
        Ok(url) if url.has_host() => &request.uri,
        _ => conn.target_uri(),
    }
}

async fn replay<S>(
    stream: &mut S,
    conn: &ProxyConnection,
    mut request: ParsedRequest,
    ctx: &ConnectionContext,
) -> Result<(), ProxyError>
where
    S: AsyncWrite + Unpin + Send,
{
    let base = replay_base(&request, conn).to_string();
    request.relativize();
    let canonical = canonicalize(&request.uri, &base).map_err(|source| ProxyError::InvalidTarget {
        target: base.clone(),
        source,
    })?;

    let request_id = Uuid::new_v4();
    let outcome = ctx.engine.replay_to(&canonical, stream).await?;
    tracing::info!(
        request_id = %request_id,
        method = %request.method,
        url = %canonical,
        outcome = outcome.as_str(),
        tunnel = conn.is_tunnel(),
        "Request replayed"
    );
    Ok(())
}
