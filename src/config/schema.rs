//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the guard service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The upstream dependency being guarded.
    pub upstream: UpstreamConfig,

    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Built-in mock upstream.
    pub mock_upstream: MockUpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Whole-request deadline for the HTTP layer, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ListenerConfig {
    /// Replace the port of the bind address, keeping the host.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("0.0.0.0");
        self.bind_address = format!("{}:{}", host, port);
    }
}

/// Upstream dependency configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL; the guarded call is `GET {base_url}/api`.
    pub base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Breaker identifier for logs and metrics.
    pub name: String,

    /// Consecutive failures that open the circuit.
    pub threshold: u32,

    /// How long the circuit stays open before probing, in milliseconds.
    pub cooldown_ms: u64,

    /// Per-call deadline in milliseconds.
    pub timeout_ms: u64,

    /// Message returned in the `data` field while the circuit is open.
    pub fallback_message: String,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "api-service".to_string(),
            threshold: 3,
            cooldown_ms: 10_000,
            timeout_ms: 5_000,
            fallback_message: "Service not available. Using alternative content".to_string(),
        }
    }
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// How the mock upstream decides to fail.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum MockBehavior {
    /// Fixed cycle: 3 failures, 5 successes, 1 failure, repeat.
    Pattern,
    /// Fail each request with the given probability.
    Random { failure_rate: f64 },
}

/// Mock upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MockUpstreamConfig {
    /// Mount `GET /api` on this server.
    pub enabled: bool,

    /// Failure behavior.
    pub behavior: MockBehavior,

    /// Artificial latency added to every mock response, in milliseconds.
    pub latency_ms: u64,
}

impl Default for MockUpstreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            behavior: MockBehavior::Pattern,
            latency_ms: 0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_demo_setup() {
        let config = GuardConfig::default();
        assert_eq!(config.breaker.threshold, 3);
        assert_eq!(config.breaker.cooldown(), Duration::from_secs(10));
        assert_eq!(config.breaker.timeout(), Duration::from_secs(5));
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
        assert_eq!(config.mock_upstream.behavior, MockBehavior::Pattern);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: GuardConfig = toml::from_str(
            r#"
            [breaker]
            threshold = 5

            [mock_upstream.behavior]
            mode = "random"
            failure_rate = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(config.breaker.threshold, 5);
        assert_eq!(config.breaker.cooldown_ms, 10_000);
        assert_eq!(
            config.mock_upstream.behavior,
            MockBehavior::Random { failure_rate: 0.25 }
        );
        assert!(config.mock_upstream.enabled);
    }

    #[test]
    fn test_set_port_keeps_host() {
        let mut listener = ListenerConfig::default();
        listener.set_port(8088);
        assert_eq!(listener.bind_address, "0.0.0.0:8088");

        listener.bind_address = "127.0.0.1:1".into();
        listener.set_port(4000);
        assert_eq!(listener.bind_address, "127.0.0.1:4000");
    }
}
