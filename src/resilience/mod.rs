//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (per-attempt budget capped by the request deadline)
//!     → On connection failure or timeout: retries.rs (idempotent? one more try)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only for GET and HEAD, at most once, after a fixed delay
//! - No retry layer above the forwarder

pub mod retries;
pub mod timeouts;

pub use retries::{is_retryable_method, RetryPolicy};
pub use timeouts::{attempt_deadline, sleep_before};
