//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the upstream client and the circuit breaker guarding it
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Mount the mock upstream when enabled
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GuardConfig;
use crate::http::handlers;
use crate::http::request::UuidRequestId;
use crate::resilience::{CircuitBreaker, InvalidConfiguration};
use crate::upstream::{MockUpstream, UpstreamClient, UpstreamError};

/// Breaker type guarding the upstream `/api` call.
pub type ApiBreaker = CircuitBreaker<Value, UpstreamError>;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub breaker: ApiBreaker,
    pub upstream: UpstreamClient,
}

/// HTTP server exposing the guarded and unguarded routes.
pub struct HttpServer {
    router: Router,
    config: GuardConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Fails when the breaker settings are invalid.
    pub fn new(config: GuardConfig) -> Result<Self, InvalidConfiguration> {
        let upstream = UpstreamClient::new(&config.upstream.base_url);

        let action_client = upstream.clone();
        let breaker = CircuitBreaker::builder(json!({ "data": config.breaker.fallback_message }))
            .name(config.breaker.name.clone())
            .threshold(config.breaker.threshold)
            .cooldown(config.breaker.cooldown())
            .timeout(config.breaker.timeout())
            .action(move || {
                let client = action_client.clone();
                async move { client.fetch().await }
            })
            .build()?;

        let state = AppState { breaker, upstream };
        let router = Self::build_router(&config, state.clone());

        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/", get(handlers::dashboard))
            .route("/no-circuit-breaker", get(handlers::no_circuit_breaker))
            .route("/with-circuit-breaker", get(handlers::with_circuit_breaker))
            .route("/circuit-breaker-status/custom", get(handlers::breaker_status))
            .with_state(state);

        if config.mock_upstream.enabled {
            let mock = Arc::new(MockUpstream::from_config(&config.mock_upstream));
            router = router.merge(mock.router());
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.state.upstream.endpoint(),
            breaker = %self.state.breaker.name(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Router with state applied, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn unreachable_upstream() -> GuardConfig {
        let mut config = GuardConfig::default();
        // Nothing listens on the discard port.
        config.upstream.base_url = "http://127.0.0.1:9".into();
        config.breaker.threshold = 2;
        config.breaker.timeout_ms = 2_000;
        config
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
        let res = router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[test]
    fn test_invalid_breaker_config_fails_fast() {
        let mut config = GuardConfig::default();
        config.breaker.threshold = 0;
        assert!(HttpServer::new(config).is_err());
    }

    #[tokio::test]
    async fn test_guarded_route_falls_back_when_open() {
        let server = HttpServer::new(unreachable_upstream()).unwrap();
        let router = server.router();

        for _ in 0..2 {
            let (status, body) = get(&router, "/with-circuit-breaker").await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(body["error"].is_string());
        }

        let (status, body) = get(&router, "/with-circuit-breaker").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "data": "Service not available. Using alternative content" })
        );

        let (status, stats) = get(&router, "/circuit-breaker-status/custom").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["state"], "OPEN");
        assert_eq!(stats["failureCount"], 2);
        assert_eq!(stats["totalCalls"], 3);
        assert_eq!(stats["successRate"], "0.00%");
    }

    #[tokio::test]
    async fn test_direct_route_reports_failure() {
        let server = HttpServer::new(unreachable_upstream()).unwrap();
        let (status, body) = get(&server.router(), "/no-circuit-breaker").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Error without circuit breaker" }));
    }

    #[tokio::test]
    async fn test_dashboard_and_request_id() {
        let server = HttpServer::new(GuardConfig::default()).unwrap();
        let res = server
            .router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("x-request-id"));
    }
}
