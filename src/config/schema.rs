//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty file is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::archive::LookupPolicy;

/// Root configuration for the replay proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    pub listener: ListenerConfig,
    pub archive: ArchiveConfig,
    pub tls: TlsConfig,
    pub timeouts: TimeoutConfig,
    pub limits: LimitsConfig,
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind.
    pub host: String,

    /// Proxy port clients are configured with.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1080,
            max_connections: 1024,
        }
    }
}

/// Archives to serve from.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ArchiveConfig {
    /// WARC files, loaded in order.
    pub files: Vec<PathBuf>,

    /// Which record wins when a URL was captured more than once.
    pub lookup_policy: LookupPolicy,

    /// Reload the index when an archive file changes.
    pub watch: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            files: vec![PathBuf::from("out.warc.gz")],
            lookup_policy: LookupPolicy::First,
            watch: false,
        }
    }
}

/// Certificate and key presented to intercepted TLS clients (PEM).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("ca.crt"),
            key_path: PathBuf::from("ca.key"),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Close a client connection after this long without traffic.
    pub idle_secs: u64,

    /// Limit on the intercepted TLS handshake.
    pub handshake_secs: u64,

    /// How long open connections may drain on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_secs: 60,
            handshake_secs: 10,
            shutdown_grace_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted request line plus headers, in bytes.
    pub max_head_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: crate::http::parser::DEFAULT_MAX_HEAD_BYTES,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it.
    pub log_level: String,

    /// Serve Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
