//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file (or defaults when `path` is `None`), apply environment
/// overrides and validate.
pub fn load_config(path: Option<&Path>) -> Result<GuardConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GuardConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `PORT`, `API_URL`, `CIRCUIT_BREAKER_THRESHOLD`,
/// `CIRCUIT_BREAKER_COOLDOWN` and `CIRCUIT_BREAKER_TIMEOUT`.
///
/// `lookup` abstracts the environment so tests do not touch process state.
pub fn apply_env_overrides<F>(config: &mut GuardConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    if let Some(port) = parse_var(&lookup, "PORT")? {
        config.listener.set_port(port);
    }
    if let Some(url) = lookup("API_URL") {
        config.upstream.base_url = url;
    }
    if let Some(threshold) = parse_var(&lookup, "CIRCUIT_BREAKER_THRESHOLD")? {
        config.breaker.threshold = threshold;
    }
    if let Some(cooldown) = parse_var(&lookup, "CIRCUIT_BREAKER_COOLDOWN")? {
        config.breaker.cooldown_ms = cooldown;
    }
    if let Some(timeout) = parse_var(&lookup, "CIRCUIT_BREAKER_TIMEOUT")? {
        config.breaker.timeout_ms = timeout;
    }
    Ok(())
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
    }
}
