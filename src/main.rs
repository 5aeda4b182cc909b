//! WARC replay proxy.
//!
//! An HTTP/HTTPS forward proxy that answers every request from web archives
//! instead of the live network.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                    REPLAY PROXY                      │
//!   Client        │  ┌─────────┐   ┌──────────────┐   ┌──────────────┐   │
//!   ──────────────┼─▶│   net   │──▶│    proxy     │──▶│    http      │   │
//!   (HTTP proxy   │  │listener │   │ state machine│   │   parser     │   │
//!    or CONNECT)  │  └─────────┘   │  + TLS MITM  │   └──────┬───────┘   │
//!                 │                └──────────────┘          │           │
//!                 │                                          ▼           │
//!   Archived or   │                ┌──────────────┐   ┌──────────────┐   │
//!   404 response  │◀───────────────│    replay    │◀──│   archive    │◀──┼── WARC files
//!   ◀─────────────┼────────────────│    engine    │   │ index+reader │   │
//!                 │                └──────────────┘   └──────────────┘   │
//!                 │  ┌──────────────────────────────────────────────┐    │
//!                 │  │ config · lifecycle · observability           │    │
//!                 │  └──────────────────────────────────────────────┘    │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use warc_replay_proxy::config::{load_config, validate_config, ConfigError, ReplayConfig};
use warc_replay_proxy::lifecycle;
use warc_replay_proxy::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "replay-proxy")]
#[command(about = "Serve archived web content through an HTTP/HTTPS proxy", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Archive file to serve; repeat for several.
    #[arg(short, long = "warc")]
    warc: Vec<PathBuf>,

    /// PEM certificate presented to intercepted TLS clients.
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// PEM private key for the certificate.
    #[arg(long)]
    ca_key: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<ReplayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ReplayConfig::default(),
        };
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if !self.warc.is_empty() {
            config.archive.files = self.warc;
        }
        if let Some(cert) = self.ca_cert {
            config.tls.cert_path = cert;
        }
        if let Some(key) = self.ca_key {
            config.tls.key_path = key;
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    init_logging(&config.observability.log_level)?;

    tracing::info!("replay-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        port = config.listener.port,
        archives = config.archive.files.len(),
        lookup_policy = ?config.archive.lookup_policy,
        idle_timeout_secs = config.timeouts.idle_secs,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;
    Ok(())
}
