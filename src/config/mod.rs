//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → breaker and server built from it at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the breaker's thresholds never change
//!   for the lifetime of the process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BreakerConfig, GuardConfig, ListenerConfig, MockBehavior, MockUpstreamConfig,
    ObservabilityConfig, UpstreamConfig,
};
