//! Read-only breaker statistics for the status route and dashboards.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::resilience::circuit_breaker::{saturating_millis, CircuitState, Core};

/// Snapshot of a breaker's counters at one instant.
///
/// Serializes to the status route's JSON shape; the probe counters used for
/// diagnostics are not part of that shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub threshold: u32,
    /// Epoch milliseconds at which an open circuit starts probing.
    pub next_attempt: u64,
    /// Cooldown in milliseconds.
    pub cooldown: u64,
    /// Milliseconds until `next_attempt`, floored at zero.
    pub remaining_time: u64,
    pub success_rate: String,
    pub total_calls: u64,
    pub last_error: Option<String>,
    #[serde(skip)]
    pub success_count: u32,
    #[serde(skip)]
    pub successful_calls: u64,
}

impl BreakerStats {
    pub(crate) fn capture(
        name: &str,
        threshold: u32,
        cooldown: Duration,
        core: &Core,
        now: Instant,
    ) -> Self {
        Self {
            name: name.to_string(),
            state: core.state,
            failure_count: core.failure_count,
            threshold,
            next_attempt: core.next_attempt_epoch_ms,
            cooldown: saturating_millis(cooldown),
            remaining_time: saturating_millis(core.next_attempt.saturating_duration_since(now)),
            success_rate: success_rate(core.successful_calls, core.total_calls),
            total_calls: core.total_calls,
            last_error: core.last_error.clone(),
            success_count: core.success_count,
            successful_calls: core.successful_calls,
        }
    }
}

/// `successful / total` as a two-decimal percentage, `N/A` before any call.
pub fn success_rate(successful: u64, total: u64) -> String {
    if total == 0 {
        return "N/A".to_string();
    }
    format!("{:.2}%", successful as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitBreaker;

    fn healthy() -> CircuitBreaker<&'static str, String> {
        CircuitBreaker::builder("fallback")
            .name("api-service")
            .threshold(3)
            .cooldown(Duration::from_secs(10))
            .timeout(Duration::from_secs(5))
            .action(|| async { Ok("Success") })
            .build()
            .unwrap()
    }

    #[test]
    fn test_success_rate_formatting() {
        assert_eq!(success_rate(0, 0), "N/A");
        assert_eq!(success_rate(1, 1), "100.00%");
        assert_eq!(success_rate(2, 3), "66.67%");
        assert_eq!(success_rate(0, 4), "0.00%");
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(serde_json::to_value(CircuitState::Closed).unwrap(), "CLOSED");
        assert_eq!(serde_json::to_value(CircuitState::Open).unwrap(), "OPEN");
        assert_eq!(serde_json::to_value(CircuitState::HalfOpen).unwrap(), "HALF-OPEN");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_breaker_snapshot() {
        let stats = healthy().stats();
        assert_eq!(stats.name, "api-service");
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.threshold, 3);
        assert_eq!(stats.cooldown, 10_000);
        assert_eq!(stats.remaining_time, 0);
        assert_eq!(stats.success_rate, "N/A");
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_json_shape() {
        let cb = healthy();
        cb.fire().await.unwrap();

        let json = serde_json::to_value(cb.stats()).unwrap();
        let obj = json.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "cooldown",
                "failureCount",
                "lastError",
                "name",
                "nextAttempt",
                "remainingTime",
                "state",
                "successRate",
                "threshold",
                "totalCalls",
            ]
        );
        assert_eq!(json["state"], "CLOSED");
        assert_eq!(json["successRate"], "100.00%");
        assert!(json["lastError"].is_null());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_snapshots_only_count_down() {
        let cb: CircuitBreaker<&'static str, String> = CircuitBreaker::builder("fallback")
            .threshold(1)
            .cooldown(Duration::from_secs(10))
            .action(|| async { Err("down".to_string()) })
            .build()
            .unwrap();
        cb.fire().await.unwrap_err();

        let first = cb.stats();
        assert_eq!(first.state, CircuitState::Open);
        assert_eq!(serde_json::to_value(&first).unwrap()["state"], "OPEN");

        tokio::time::advance(Duration::from_millis(2_500)).await;
        let second = cb.stats();
        tokio::time::advance(Duration::from_millis(2_500)).await;
        let third = cb.stats();

        assert_eq!(first.remaining_time, 10_000);
        assert_eq!(second.remaining_time, 7_500);
        assert_eq!(third.remaining_time, 5_000);

        let strip = |s: &BreakerStats| BreakerStats {
            remaining_time: 0,
            ..s.clone()
        };
        assert_eq!(strip(&first), strip(&second));
        assert_eq!(strip(&second), strip(&third));
    }
}
