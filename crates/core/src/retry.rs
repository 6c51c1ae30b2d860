//! Retry backoff policy for failed deliveries.
//!
//! The schedule is an explicit `attempt -> delay` function so eligibility can
//! be tested without a running loop. `attempt` is the row's current
//! `retry_count`, i.e. how many retries have already been consumed.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

pub fn retry_policy(attempt: u32) -> Duration {
    match attempt {
        0 => Duration::from_secs(300),
        1 => Duration::from_secs(1800),
        2 => Duration::from_secs(7200),
        _ => Duration::from_secs(21600),
    }
}

/// Earliest instant at which a failure recorded at `failed_at` with the given
/// `retry_count` becomes eligible for another attempt.
pub fn next_retry_at(failed_at: DateTime<Utc>, retry_count: i32) -> DateTime<Utc> {
    let delay = retry_policy(retry_count.max(0) as u32);
    failed_at + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(21600))
}

pub fn is_retry_due(failed_at: DateTime<Utc>, retry_count: i32, now: DateTime<Utc>) -> bool {
    next_retry_at(failed_at, retry_count) <= now
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_increases_per_attempt() {
        assert_eq!(retry_policy(0), Duration::from_secs(300)); // 5 min
        assert_eq!(retry_policy(1), Duration::from_secs(1800)); // 30 min
        assert_eq!(retry_policy(2), Duration::from_secs(7200)); // 2 hours
    }

    #[test]
    fn test_backoff_caps_at_six_hours() {
        assert_eq!(retry_policy(3), Duration::from_secs(21600));
        assert_eq!(retry_policy(100), Duration::from_secs(21600));
    }

    #[test]
    fn test_retry_due_after_delay_elapsed() {
        let failed_at = Utc::now() - ChronoDuration::seconds(301);
        assert!(is_retry_due(failed_at, 0, Utc::now()));
    }

    #[test]
    fn test_retry_not_due_before_delay() {
        let failed_at = Utc::now() - ChronoDuration::seconds(60);
        assert!(!is_retry_due(failed_at, 0, Utc::now()));
    }

    #[test]
    fn test_higher_retry_count_waits_longer() {
        let failed_at = Utc::now() - ChronoDuration::seconds(600);
        let now = Utc::now();
        assert!(is_retry_due(failed_at, 0, now));
        assert!(!is_retry_due(failed_at, 1, now));
    }

    #[test]
    fn test_negative_retry_count_treated_as_zero() {
        let failed_at = Utc::now() - ChronoDuration::seconds(301);
        assert!(is_retry_due(failed_at, -1, Utc::now()));
    }
}
