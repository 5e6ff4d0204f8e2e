//! Exponential backoff between upstream attempts.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Default delay before the second attempt.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

/// Computes inter-attempt delays.
///
/// No jitter and no ceiling are applied: attempt `n` waits
/// `initial_delay * 2^n` unless the server supplied a `Retry-After`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffScheduler {
    initial_delay: Duration,
}

impl BackoffScheduler {
    pub fn new(initial_delay: Duration) -> Self {
        Self { initial_delay }
    }

    /// Delay after the failed attempt with 0-based index `attempt`.
    ///
    /// A server-supplied override always wins over the computed curve.
    pub fn compute_delay(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        if let Some(secs) = retry_after_secs {
            return Duration::from_millis(secs.saturating_mul(1000));
        }
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor)
    }
}

impl Default for BackoffScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_INITIAL_DELAY_MS))
    }
}

/// Read the `Retry-After` header as whole seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after_value(value, Utc::now())
}

/// Parse a `Retry-After` value relative to `now`.
///
/// Accepts delta-seconds or a date; a date in the past yields 0.
pub fn parse_retry_after_value(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }

    let date = DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()?
        .with_timezone(&Utc);

    let delta_ms = (date - now).num_milliseconds();
    if delta_ms <= 0 {
        return Some(0);
    }
    Some((delta_ms as u64).div_ceil(1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_backoff_curve() {
        let backoff = BackoffScheduler::default();
        assert_eq!(backoff.compute_delay(0, None), Duration::from_millis(1000));
        assert_eq!(backoff.compute_delay(1, None), Duration::from_millis(2000));
        assert_eq!(backoff.compute_delay(2, None), Duration::from_millis(4000));
    }

    #[test]
    fn test_override_wins() {
        let backoff = BackoffScheduler::default();
        for attempt in [0, 1, 2, 7] {
            assert_eq!(backoff.compute_delay(attempt, Some(3)), Duration::from_secs(3));
        }
        assert_eq!(backoff.compute_delay(2, Some(0)), Duration::ZERO);
    }

    #[test]
    fn test_custom_initial_delay() {
        let backoff = BackoffScheduler::new(Duration::from_millis(50));
        assert_eq!(backoff.compute_delay(3, None), Duration::from_millis(400));
    }

    #[test]
    fn test_parse_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("60"));
        assert_eq!(parse_retry_after(&headers), Some(60));
    }

    #[test]
    fn test_parse_future_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        let parsed = parse_retry_after_value("Wed, 21 Oct 2015 07:28:00 GMT", now);
        assert_eq!(parsed, Some(60));

        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 59).unwrap()
            + chrono::Duration::milliseconds(500);
        assert_eq!(parse_retry_after_value("Wed, 21 Oct 2015 07:28:00 GMT", now), Some(1));
    }

    #[test]
    fn test_parse_real_clock_date() {
        let target = Utc::now() + chrono::Duration::seconds(120);
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_str(&target.to_rfc2822()).unwrap(),
        );
        let secs = parse_retry_after(&headers).unwrap();
        assert!((118..=121).contains(&secs), "got {secs}");
    }

    #[test]
    fn test_parse_past_date_is_zero() {
        let now = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_retry_after_value("Wed, 21 Oct 2015 07:28:00 GMT", now), Some(0));
    }

    #[test]
    fn test_parse_absent_or_garbled() {
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
        let now = Utc::now();
        assert_eq!(parse_retry_after_value("soon", now), None);
        assert_eq!(parse_retry_after_value("", now), None);
        assert_eq!(parse_retry_after_value("-5", now), None);
    }
}
