//! Minute-precision `YYYY-MM-DD-HH-mm` timestamps used by the key store.

use crate::KeywardenError;
use chrono::{Duration, NaiveDateTime, Timelike};

/// chrono layout of persisted key timestamps.
pub const MINUTE_LAYOUT: &str = "%Y-%m-%d-%H-%M";

const LAYOUT_LEN: usize = 16;
const SEPARATORS: [usize; 4] = [4, 7, 10, 13];

/// Parse a strict `YYYY-MM-DD-HH-mm` timestamp.
///
/// Every field must be zero-padded; `2024/01/01` or `2024-1-1-0-0` are rejected.
pub fn parse_minute(s: &str) -> Result<NaiveDateTime, KeywardenError> {
    let bytes = s.as_bytes();
    let well_shaped = bytes.len() == LAYOUT_LEN
        && bytes.iter().enumerate().all(|(i, b)| {
            if SEPARATORS.contains(&i) {
                *b == b'-'
            } else {
                b.is_ascii_digit()
            }
        });

    if !well_shaped {
        return Err(KeywardenError::InvalidFormat(format!(
            "timestamp must be YYYY-MM-DD-HH-mm, got {:?}",
            s
        )));
    }

    NaiveDateTime::parse_from_str(s, MINUTE_LAYOUT).map_err(|e| {
        KeywardenError::InvalidFormat(format!("timestamp {:?} out of range: {}", s, e))
    })
}

/// Format a timestamp as `YYYY-MM-DD-HH-mm`, dropping seconds.
pub fn format_minute(dt: &NaiveDateTime) -> String {
    dt.format(MINUTE_LAYOUT).to_string()
}

/// Round up to the next whole minute unless already on one.
pub fn ceil_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    let floored = dt
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt);
    if floored == dt {
        dt
    } else {
        floored + Duration::minutes(1)
    }
}

/// Whole days from `now` until `target`, floored (negative once `target` has passed).
pub fn days_until(now: &NaiveDateTime, target: &NaiveDateTime) -> i64 {
    (*target - *now).num_seconds().div_euclid(86_400)
}
