//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load archives → Load TLS identity → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Archive reload
//! ```

use std::path::PathBuf;

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{prepare, run, Prepared, StartupError};

/// Why the archive index is being rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadTrigger {
    Signal,
    FileChanged(PathBuf),
}
