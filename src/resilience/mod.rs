//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to upstream:
//!     → circuit_breaker.rs (admit? fallback while open)
//!     → timeouts.rs (race the action against its deadline)
//!     → circuit_breaker.rs (count outcome, transition state)
//!     → stats.rs (read-only snapshot for the status route)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every guarded call has a deadline
//! - The breaker never retries; retry policy belongs to the caller
//! - An open circuit answers with the fallback, not an error

pub mod circuit_breaker;
pub mod stats;
pub mod timeouts;

pub use circuit_breaker::{
    BreakerError, CircuitBreaker, CircuitBreakerBuilder, CircuitState, InvalidConfiguration,
    SUCCESS_THRESHOLD,
};
pub use stats::BreakerStats;
