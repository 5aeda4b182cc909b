//! Replay subsystem.
//!
//! # Data Flow
//! ```text
//! proxy handler (relative URI + connection target)
//!     → canonical.rs (absolute URL, default port dropped)
//!     → engine.rs (lookup, read, decode on the blocking pool)
//!     → rewrite.rs (filtered headers, fresh Content-Length, provenance copies)
//!     → client transport
//! ```

pub mod canonical;
pub mod engine;
pub mod rewrite;

pub use canonical::canonicalize;
pub use engine::{ReplayEngine, ReplayOutcome};
pub use rewrite::{bad_gateway, not_found, rewrite_response};
