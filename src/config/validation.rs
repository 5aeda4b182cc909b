//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits sane)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ReplayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ReplayConfig;

/// Smallest head limit that still fits a realistic request.
pub const MIN_HEAD_BYTES: usize = 1024;

/// A single semantic problem, tied to the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ReplayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be at least 1"));
    }
    if config.archive.files.is_empty() {
        errors.push(ValidationError::new("archive.files", "at least one archive is required"));
    }
    if config.timeouts.idle_secs == 0 {
        errors.push(ValidationError::new("timeouts.idle_secs", "must be greater than 0"));
    }
    if config.timeouts.handshake_secs == 0 {
        errors.push(ValidationError::new("timeouts.handshake_secs", "must be greater than 0"));
    }
    if config.timeouts.shutdown_grace_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.shutdown_grace_secs",
            "must be greater than 0",
        ));
    }
    if config.limits.max_head_bytes < MIN_HEAD_BYTES {
        errors.push(ValidationError::new(
            "limits.max_head_bytes",
            format!("must be at least {}", MIN_HEAD_BYTES),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ReplayConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ReplayConfig::default();
        config.listener.max_connections = 0;
        config.archive.files.clear();
        config.timeouts.idle_secs = 0;
        config.limits.max_head_bytes = 10;
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "not-an-address".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.max_connections",
                "archive.files",
                "timeouts.idle_secs",
                "limits.max_head_bytes",
                "observability.metrics_address",
            ]
        );
    }

    #[test]
    fn metrics_address_only_checked_when_enabled() {
        let mut config = ReplayConfig::default();
        config.observability.metrics_address = "bogus".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
