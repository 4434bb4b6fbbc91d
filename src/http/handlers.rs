//! Route handlers.

use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Html,
    Json,
};
use serde_json::Value;

use crate::http::request::request_id;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::BreakerStats;

const DASHBOARD: &str = include_str!("../../public/index.html");

/// `GET /no-circuit-breaker`: call the upstream directly.
pub async fn no_circuit_breaker(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let start = Instant::now();
    match state.upstream.fetch().await {
        Ok(payload) => {
            metrics::record_request("no-circuit-breaker", 200, start);
            Ok(Json(payload))
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id(&headers), error = %e, "Direct upstream call failed");
            metrics::record_request("no-circuit-breaker", 500, start);
            Err(ApiError::internal("Error without circuit breaker"))
        }
    }
}

/// `GET /with-circuit-breaker`: call the upstream through the breaker.
///
/// The fallback served while the circuit is open is a normal 200.
pub async fn with_circuit_breaker(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let start = Instant::now();
    match state.breaker.fire().await {
        Ok(payload) => {
            metrics::record_request("with-circuit-breaker", 200, start);
            Ok(Json(payload))
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id(&headers),
                breaker = %state.breaker.name(),
                error = %e,
                "Guarded upstream call failed"
            );
            metrics::record_request("with-circuit-breaker", 500, start);
            Err(ApiError::internal(e.to_string()))
        }
    }
}

/// `GET /circuit-breaker-status/custom`: breaker statistics.
pub async fn breaker_status(State(state): State<AppState>) -> Json<BreakerStats> {
    Json(state.breaker.stats())
}

/// `GET /`: the status dashboard.
pub async fn dashboard() -> (StatusCode, Html<&'static str>) {
    (StatusCode::OK, Html(DASHBOARD))
}
