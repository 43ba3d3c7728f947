//! Retry backoff for failed sends.

use chrono::Duration;

const BASE_SECONDS: i64 = 30;
const CAP_SECONDS: i64 = 15 * 60;

/// `min(30s * 2^(attempts-1), 15min)`. `attempts` is the count *after* the
/// failing send, so the first failure (`attempts == 1`) backs off 30s.
pub fn backoff(attempts: i32) -> Duration {
    let exponent = (attempts - 1).max(0) as u32;
    let multiplier = 2i64.checked_pow(exponent).unwrap_or(i64::MAX);
    let secs = BASE_SECONDS.saturating_mul(multiplier).min(CAP_SECONDS);
    Duration::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_backs_off_30_seconds() {
        assert_eq!(backoff(1), Duration::seconds(30));
    }

    #[test]
    fn doubles_each_attempt() {
        assert_eq!(backoff(2), Duration::seconds(60));
        assert_eq!(backoff(3), Duration::seconds(120));
        assert_eq!(backoff(4), Duration::seconds(240));
    }

    #[test]
    fn caps_at_15_minutes() {
        assert_eq!(backoff(10), Duration::seconds(900));
        assert_eq!(backoff(30), Duration::seconds(900));
    }
}
