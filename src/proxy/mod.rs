//! Proxy subsystem: client connections from accept to close.
//!
//! # Data Flow
//! ```text
//! server.rs (accept, permit, tracking, span per connection)
//!     → handler.rs (read outer request, tunnel or relay, inner request loop)
//!         → state.rs (ProxyConnection phases, read-ahead buffer)
//!         → replay engine (response written straight to the client)
//! ```
//!
//! # Design Decisions
//! - Errors end one connection and never reach the accept loop
//! - Malformed requests close the connection without a response
//! - Handlers get an immutable shared `ConnectionContext`; no globals

pub mod error;
pub mod handler;
pub mod server;
pub mod state;

pub use error::ProxyError;
pub use handler::{handle_connection, ConnectionContext};
pub use server::ReplayServer;
pub use state::{Phase, ProxyConnection, TunnelDecision};
