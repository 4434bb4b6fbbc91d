//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{GuardConfig, MockBehavior};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
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

/// Check value ranges and addresses.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {}", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be positive"));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme: {}", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("upstream.base_url", e.to_string())),
    }

    if config.breaker.threshold == 0 {
        errors.push(ValidationError::new("breaker.threshold", "must be at least 1"));
    }
    if config.breaker.cooldown_ms == 0 {
        errors.push(ValidationError::new("breaker.cooldown_ms", "must be positive"));
    }
    if config.breaker.timeout_ms == 0 {
        errors.push(ValidationError::new("breaker.timeout_ms", "must be positive"));
    }

    // The HTTP layer's deadline must outlast the breaker's, or the guarded
    // route answers 408 before the breaker can record the timeout.
    if config.listener.request_timeout_secs > 0
        && config.breaker.timeout_ms >= config.listener.request_timeout_secs.saturating_mul(1000)
    {
        errors.push(ValidationError::new(
            "breaker.timeout_ms",
            format!(
                "must be below listener.request_timeout_secs ({}s)",
                config.listener.request_timeout_secs
            ),
        ));
    }

    if let MockBehavior::Random { failure_rate } = config.mock_upstream.behavior {
        if !(0.0..=1.0).contains(&failure_rate) {
            errors.push(ValidationError::new(
                "mock_upstream.behavior.failure_rate",
                "must be between 0 and 1",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
