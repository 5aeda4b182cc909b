//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → command-line overrides (binary)
//!     → ReplayConfig frozen into Arc, handed to the server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no global settings
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ArchiveConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, ReplayConfig, TimeoutConfig,
    TlsConfig,
};
pub use validation::{validate_config, ValidationError};
