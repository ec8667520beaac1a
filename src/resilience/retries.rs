//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a request method may be retried
//! - Bound the number of attempts
//! - Provide the fixed delay between attempts
//!
//! # Design Decisions
//! - Never retry POST/PUT/DELETE/PATCH (non-idempotent)
//! - At most one retry; no exponential backoff
//! - Which failures are retryable is decided by the forwarder

use std::time::Duration;

use axum::http::Method;

use crate::config::RetryConfig;

/// Only GET and HEAD are retried.
pub fn is_retryable_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Single-retry policy for idempotent requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    enabled: bool,
    delay: Duration,
}

impl RetryPolicy {
    /// Attempts allowed for a retryable request (first try plus one retry).
    pub const IDEMPOTENT_ATTEMPTS: u32 = 2;

    pub fn new(enabled: bool, delay: Duration) -> Self {
        Self { enabled, delay }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.enabled, Duration::from_millis(config.delay_ms))
    }

    pub fn disabled() -> Self {
        Self::new(false, Duration::ZERO)
    }

    pub fn max_attempts(&self, method: &Method) -> u32 {
        if self.enabled && is_retryable_method(method) {
            Self::IDEMPOTENT_ATTEMPTS
        } else {
            1
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
