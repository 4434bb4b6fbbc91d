//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race a guarded action against a deadline
//! - Report which side won without side effects
//!
//! # Design Decisions
//! - Built on `tokio::time::timeout`: the losing future is dropped at the
//!   decision point, so a late completion can never be observed
//! - Timeout errors carry the configured duration
//! - No retries at this layer

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The action did not settle within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Timeout after {}ms", .0.as_millis())]
pub struct Elapsed(pub Duration);

/// Run `action` with an upper bound of `limit` on its wall-clock duration.
///
/// Returns the action's own output when it finishes first, or [`Elapsed`]
/// when the deadline fires first.
pub async fn run_with_timeout<F, T>(limit: Duration, action: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, action)
        .await
        .map_err(|_| Elapsed(limit))
}
