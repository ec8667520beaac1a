//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Static credentials for the built-in token verifier.
    pub auth: AuthConfig,

    /// Logical service name to address mappings.
    pub services: Vec<ServiceConfig>,

    /// Routing table, in declaration order.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Credentials accepted by the static token verifier.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenConfig>,
}

/// A single static bearer token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// The literal token value.
    pub token: String,

    /// Subject reported for this token.
    pub subject: String,

    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Optional hard expiry (RFC 3339).
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Logical backend service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service name referenced by routes.
    pub name: String,

    /// Address, either "host:port" or "http://host:port".
    pub address: String,
}

/// Route configuration mapping requests to a backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// HTTP method, matched exactly (e.g. "POST").
    pub method: String,

    /// Path pattern: literal segments, `{param}`, trailing `{*rest}`.
    pub path: String,

    /// Top-level body fields that must be present with these values.
    #[serde(default)]
    pub body: BTreeMap<String, serde_json::Value>,

    /// Logical service name (resolved through the registry).
    #[serde(default)]
    pub service: Option<String>,

    /// Direct backend address, used instead of `service`.
    #[serde(default)]
    pub address: Option<String>,

    /// Scope the caller must hold.
    #[serde(default)]
    pub required_scope: Option<String>,

    /// Per-attempt timeout override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall deadline for one client request, in milliseconds.
    pub request_ms: u64,

    /// Default per-attempt budget for backend calls, in milliseconds.
    pub backend_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn backend(&self) -> Duration {
        Duration::from_millis(self.backend_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            backend_ms: 10_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable the single retry for idempotent methods.
    pub enabled: bool,

    /// Fixed delay before the retry, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 50,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum client request body size in bytes.
    pub max_body_bytes: usize,

    /// Maximum backend response body size in bytes.
    pub max_response_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            max_response_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
