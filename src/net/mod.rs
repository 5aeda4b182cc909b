//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (connection id, live-connection tracking)
//!     → proxy handler
//!         → tls.rs acceptor over rewind.rs (CONNECT tunnels only)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Bytes read ahead of a TLS handshake are replayed, never dropped

pub mod connection;
pub mod listener;
pub mod rewind;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use rewind::Rewind;
pub use tls::{load_tls_acceptor, TlsError};
