//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0}: must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("observability.vars_path: must start with '/', got {0:?}")]
    InvalidPath(String),
}

/// Check a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if let Some(addr) = &config.observability.prometheus_address {
        check_addr(&mut errors, "observability.prometheus_address", addr);
    }

    let timeouts = [
        ("lifecycle.shutdown_timeout_secs", config.lifecycle.shutdown_timeout_secs),
        ("lifecycle.drain_timeout_secs", config.lifecycle.drain_timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, secs) in timeouts {
        if secs == 0 {
            errors.push(ValidationError::ZeroTimeout(field));
        }
    }
    if config.lifecycle.cleanup_timeout_secs == Some(0) {
        errors.push(ValidationError::ZeroTimeout("lifecycle.cleanup_timeout_secs"));
    }

    if !config.observability.vars_path.starts_with('/') {
        errors.push(ValidationError::InvalidPath(config.observability.vars_path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
