//! Timeout enforcement.
//!
//! # Responsibilities
//! - Derive per-attempt deadlines from the route budget and request deadline
//! - Wait between attempts without overrunning the request deadline
//!
//! # Design Decisions
//! - Uses Tokio's timer facilities
//! - An attempt never outlives the client's request deadline

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Deadline for one attempt: `budget` from now, capped by `request_deadline`.
pub fn attempt_deadline(budget: Duration, request_deadline: Instant) -> Instant {
    (Instant::now() + budget).min(request_deadline)
}

/// Sleep for `delay` unless that would pass `deadline`.
///
/// Returns false without sleeping when there is not enough time left.
pub async fn sleep_before(delay: Duration, deadline: Instant) -> bool {
    let wake = Instant::now() + delay;
    if wake >= deadline {
        return false;
    }
    sleep_until(wake).await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_deadline_is_capped() {
        let request_deadline = Instant::now() + Duration::from_millis(100);
        assert_eq!(attempt_deadline(Duration::from_secs(10), request_deadline), request_deadline);
        assert!(attempt_deadline(Duration::from_millis(10), request_deadline) < request_deadline);
    }

    #[tokio::test]
    async fn sleep_refuses_to_overrun() {
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(!sleep_before(Duration::from_millis(50), deadline).await);
        assert!(sleep_before(Duration::from_millis(1), deadline).await);
    }
}
