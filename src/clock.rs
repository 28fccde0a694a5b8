//! Deterministic clock abstraction for testable time-dependent logic.
//!
//! Key expiries are wall-clock minutes in the deployment's local time and log
//! entries are bucketed by local calendar day, so the clock exposes its UTC
//! offset alongside the current instant.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Utc};

/// Clock trait for deterministic time in tests.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// UTC offset of the deployment's local time.
    fn offset(&self) -> FixedOffset;

    /// Current local wall-clock time.
    fn now_local(&self) -> NaiveDateTime {
        self.now_utc().with_timezone(&self.offset()).naive_local()
    }

    /// Current local calendar day.
    fn today(&self) -> NaiveDate {
        self.now_local().date()
    }

    /// Local calendar day of an arbitrary instant.
    fn local_date(&self, instant: &DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }
}

/// System clock using actual wall time and the host time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        *Local::now().offset()
    }
}

/// Mock clock for deterministic testing.
///
/// Interior mutability lets a test advance time while the clock is shared
/// behind an `Arc<dyn Clock>`.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug)]
pub struct MockClock {
    now: std::sync::Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock frozen at the given time, with a UTC local zone.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_offset(now, FixedOffset::east_opt(0).expect("zero offset"))
    }

    /// Create a mock clock with an explicit local offset.
    pub fn with_offset(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
            offset,
        }
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
        let mut now = self.now.lock().expect("mock clock lock");
        *now = *now + duration;
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().expect("mock clock lock") = instant;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("mock clock lock")
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}
