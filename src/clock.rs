//! Deterministic clock abstraction for testable time-dependent logic.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};

/// Clock trait for deterministic time in tests.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Get the current UTC calendar date.
    fn today(&self) -> NaiveDate {
        self.now_utc().date_naive()
    }
}

/// System clock using actual wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Adjustable clock for deterministic tests: validity windows, rotation
/// intervals, and rate-limit windows without real wall-clock sleeps.
#[derive(Debug)]
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    /// Create a mock clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Create a mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        Self::new(
            DateTime::parse_from_rfc3339(s)
                .expect("valid RFC 3339")
                .with_timezone(&Utc),
        )
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += duration;
    }

    /// Move the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = instant;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_system_clock_returns_time() {
        let clock = SystemClock;
        assert!(clock.now_utc().year() >= 2024);
    }

    #[test]
    fn test_mock_clock_is_deterministic() {
        let clock = MockClock::from_rfc3339("2026-01-15T12:00:00Z");
        assert_eq!(clock.now_utc().to_rfc3339(), "2026-01-15T12:00:00+00:00");
        assert_eq!(clock.now_utc().to_rfc3339(), "2026-01-15T12:00:00+00:00");
    }

    #[test]
    fn test_mock_clock_advances() {
        let clock = MockClock::from_rfc3339("2026-01-15T12:00:00Z");
        clock.advance(chrono::Duration::hours(1));
        assert_eq!(clock.now_utc().to_rfc3339(), "2026-01-15T13:00:00+00:00");
    }

    #[test]
    fn test_today_follows_the_clock() {
        let clock = MockClock::from_rfc3339("2026-01-15T23:30:00Z");
        assert_eq!(clock.today().to_string(), "2026-01-15");
        clock.advance(chrono::Duration::hours(1));
        assert_eq!(clock.today().to_string(), "2026-01-16");
    }
}
