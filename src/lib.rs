//! WARC replay proxy library.

pub mod archive;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod replay;

pub use archive::{ArchiveReader, ArchiveStore};
pub use config::ReplayConfig;
pub use lifecycle::Shutdown;
pub use proxy::ReplayServer;
pub use replay::ReplayEngine;
