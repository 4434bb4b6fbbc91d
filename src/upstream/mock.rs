//! Mock upstream serving `GET /api`.
//!
//! The request counter lives in the [`MockUpstream`] value handed to the
//! router, so each server (and each test) gets its own sequence.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use rand::Rng;
use serde_json::{json, Value};

use crate::config::{MockBehavior, MockUpstreamConfig};

/// Failures at the start of each pattern cycle.
const PATTERN_LEADING_FAILURES: u32 = 3;
/// Last successful request of each pattern cycle.
const PATTERN_LAST_SUCCESS: u32 = 8;
/// Closing failure of each pattern cycle; the counter restarts at 0 after it.
const PATTERN_LENGTH: u32 = 9;

/// Stateful stand-in for the real upstream.
#[derive(Debug)]
pub struct MockUpstream {
    behavior: MockBehavior,
    latency: Duration,
    counter: AtomicU32,
}

impl MockUpstream {
    pub fn new(behavior: MockBehavior, latency: Duration) -> Self {
        Self {
            behavior,
            latency,
            counter: AtomicU32::new(0),
        }
    }

    pub fn from_config(config: &MockUpstreamConfig) -> Self {
        Self::new(config.behavior, Duration::from_millis(config.latency_ms))
    }

    /// Decide whether the next request succeeds.
    pub fn next_outcome(&self) -> bool {
        match self.behavior {
            MockBehavior::Pattern => {
                let previous = self
                    .counter
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                        Some(if c + 1 >= PATTERN_LENGTH { 0 } else { c + 1 })
                    })
                    .unwrap_or_else(|c| c);
                let n = previous + 1;
                n > PATTERN_LEADING_FAILURES && n <= PATTERN_LAST_SUCCESS
            }
            MockBehavior::Random { failure_rate } => {
                self.counter.fetch_add(1, Ordering::Relaxed);
                !rand::thread_rng().gen_bool(failure_rate)
            }
        }
    }

    /// Position in the current pattern cycle, back to 0 once a cycle
    /// completes. In random mode, every request served.
    pub fn request_count(&self) -> u32 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Router exposing `GET /api`.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().route("/api", get(mock_api)).with_state(self)
    }
}

async fn mock_api(State(mock): State<Arc<MockUpstream>>) -> (StatusCode, Json<Value>) {
    if !mock.latency.is_zero() {
        tokio::time::sleep(mock.latency).await;
    }
    if mock.next_outcome() {
        (StatusCode::OK, Json(json!({ "data": "Success" })))
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Error with API" })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn test_pattern_cycle() {
        let mock = MockUpstream::new(MockBehavior::Pattern, Duration::ZERO);
        let outcomes: Vec<bool> = (0..18).map(|_| mock.next_outcome()).collect();
        let cycle = [false, false, false, true, true, true, true, true, false];
        assert_eq!(&outcomes[..9], &cycle);
        assert_eq!(&outcomes[9..], &cycle);
    }

    #[test]
    fn test_pattern_counter_restarts_after_cycle() {
        let mock = MockUpstream::new(MockBehavior::Pattern, Duration::ZERO);
        for _ in 0..8 {
            mock.next_outcome();
        }
        assert_eq!(mock.request_count(), 8);
        assert!(!mock.next_outcome());
        assert_eq!(mock.request_count(), 0);
        assert!(!mock.next_outcome());
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn test_random_extremes() {
        let always = MockUpstream::new(MockBehavior::Random { failure_rate: 1.0 }, Duration::ZERO);
        assert!((0..20).all(|_| !always.next_outcome()));
        let never = MockUpstream::new(MockBehavior::Random { failure_rate: 0.0 }, Duration::ZERO);
        assert!((0..20).all(|_| never.next_outcome()));
        assert_eq!(never.request_count(), 20);
    }

    #[tokio::test]
    async fn test_api_route_follows_pattern() {
        let app = Arc::new(MockUpstream::new(MockBehavior::Pattern, Duration::ZERO)).router();
        let mut statuses = Vec::new();
        for _ in 0..4 {
            let res = app
                .clone()
                .oneshot(Request::get("/api").body(Body::empty()).unwrap())
                .await
                .unwrap();
            statuses.push(res.status().as_u16());
        }
        assert_eq!(statuses, [500, 500, 500, 200]);
    }
}
