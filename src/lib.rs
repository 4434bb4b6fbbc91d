//! Upstream guard: a circuit breaker protecting calls to a failing
//! dependency, with the HTTP routes that exercise it.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use config::GuardConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{BreakerError, BreakerStats, CircuitBreaker, CircuitState};
