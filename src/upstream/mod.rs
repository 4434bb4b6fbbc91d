//! The guarded upstream dependency.
//!
//! # Data Flow
//! ```text
//! /with-circuit-breaker → breaker → client.rs → GET {base_url}/api
//! /no-circuit-breaker   ─────────→ client.rs → GET {base_url}/api
//!
//! mock.rs serves GET /api with a scripted failure pattern when enabled
//! ```

pub mod client;
pub mod mock;

pub use client::{UpstreamClient, UpstreamError};
pub use mock::MockUpstream;
