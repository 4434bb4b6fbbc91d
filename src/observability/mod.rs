//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breaker and HTTP layer produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Every state transition is logged with the breaker name as a field
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
