//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the interceptor chain.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for an interceptor chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Base URL every request path is resolved against.
    pub base_url: String,

    /// Credential lifecycle settings.
    pub auth: AuthConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Headers applied to every outgoing request after authentication headers.
    pub default_headers: BTreeMap<String, String>,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            auth: AuthConfig::default(),
            retries: RetryConfig::default(),
            observability: ObservabilityConfig::default(),
            default_headers: BTreeMap::new(),
        }
    }
}

/// Credential lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Attach credentials to requests at all.
    pub enabled: bool,

    /// Lead time before expiry at which a credential is refreshed, in seconds.
    pub skew_secs: u64,

    /// Token refresh endpoint. Without it refresh always fails.
    pub refresh_url: Option<String>,

    /// Secondary header carrying the refresh token, if any.
    pub refresh_token_header: Option<String>,

    /// Path of the JSON file holding the persisted credential.
    pub credential_path: Option<String>,
}

impl AuthConfig {
    pub fn skew(&self) -> Duration {
        Duration::from_secs(self.skew_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            skew_secs: 300,
            refresh_url: None,
            refresh_token_header: Some("refresh-token".to_string()),
            credential_path: None,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable generic (non-auth) retries. Auth retries are always on.
    pub enabled: bool,

    /// Maximum retries per logical call, auth and generic combined.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Retry 429, 502, 503 and 504 responses, not only connection errors.
    pub retry_on_server_error: bool,

    /// Percentage of requests that can be retries (retry budget).
    /// e.g., 0.1 for 10% budget.
    pub budget_ratio: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: 2,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            retry_on_server_error: true,
            budget_ratio: 0.1,
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

    /// Include request and response bodies in the request log.
    pub log_bodies: bool,

    /// Mask token-bearing headers in the request log.
    pub redact_secrets: bool,

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
            log_bodies: true,
            redact_secrets: true,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
