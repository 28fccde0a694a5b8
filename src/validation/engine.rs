//! Validation of a submitted key against a registry snapshot.
//!
//! Validation is pure: it reads a [`KeyTable`] snapshot and the current time,
//! and never creates, extends or deletes a key. Recording the attempt in the
//! ledger is the caller's job.

use crate::protocol::models::ValidationResponse;
use crate::protocol::timestamp::{days_until, format_minute};
use crate::registry::KeyTable;
use chrono::NaiveDateTime;

/// Why a key was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// The request carried no key.
    NoKeyProvided,
    /// Unknown key, or its expiry has been reached.
    InvalidOrExpired,
}

impl InvalidReason {
    /// Human-readable reason returned to the caller.
    pub fn message(&self) -> &'static str {
        match self {
            InvalidReason::NoKeyProvided => "no key provided",
            InvalidReason::InvalidOrExpired => "key invalid or expired",
        }
    }
}

/// Outcome of validating one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The key currently grants access.
    Valid {
        /// Message stored with the key.
        message: String,
        /// Expiry of the key.
        expiry: NaiveDateTime,
        /// Floored whole days until expiry.
        remaining_days: i64,
    },
    /// The key does not grant access.
    Invalid(InvalidReason),
}

impl Validation {
    /// Whether access is granted.
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }

    /// Reply body for the public endpoint.
    pub fn to_response(&self) -> ValidationResponse {
        match self {
            Validation::Valid {
                message,
                expiry,
                remaining_days,
            } => ValidationResponse::granted(message.clone(), format_minute(expiry), *remaining_days),
            Validation::Invalid(reason) => ValidationResponse::denied(reason.message()),
        }
    }

    /// Short detail for the ledger entry.
    pub fn ledger_detail(&self) -> &'static str {
        match self {
            Validation::Valid { .. } => "validation succeeded",
            Validation::Invalid(reason) => reason.message(),
        }
    }
}

/// Decide whether `key` grants access at `now`.
///
/// A key is valid strictly before its expiry; at the expiry instant it is expired.
pub fn validate(table: &KeyTable, key: Option<&str>, now: &NaiveDateTime) -> Validation {
    let key = match key.filter(|k| !k.is_empty()) {
        Some(key) => key,
        None => return Validation::Invalid(InvalidReason::NoKeyProvided),
    };

    match table.find(key) {
        Some(record) if record.is_active_at(now) => Validation::Valid {
            message: record.message.clone(),
            expiry: record.expiry,
            remaining_days: days_until(now, &record.expiry),
        },
        _ => Validation::Invalid(InvalidReason::InvalidOrExpired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::KeyRecord;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn table(expiry: NaiveDateTime) -> KeyTable {
        [KeyRecord {
            key: "ABC123".to_string(),
            message: "trial".to_string(),
            expiry,
            created: None,
        }]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_missing_key() {
        let t = table(now() + Duration::days(1));
        assert_eq!(validate(&t, None, &now()), Validation::Invalid(InvalidReason::NoKeyProvided));
        assert_eq!(validate(&t, Some(""), &now()), Validation::Invalid(InvalidReason::NoKeyProvided));
    }

    #[test]
    fn test_unknown_key() {
        let t = table(now() + Duration::days(1));
        assert_eq!(
            validate(&t, Some("NOSUCH"), &now()),
            Validation::Invalid(InvalidReason::InvalidOrExpired)
        );
    }

    #[test]
    fn test_future_expiry_is_valid() {
        let t = table(now() + Duration::days(3) + Duration::hours(2));
        match validate(&t, Some("ABC123"), &now()) {
            Validation::Valid {
                message,
                remaining_days,
                ..
            } => {
                assert_eq!(message, "trial");
                assert_eq!(remaining_days, 3);
            }
            other => panic!("expected valid, got {:?}", other),
        }
    }

    #[test]
    fn test_expiry_instant_is_expired() {
        let t = table(now());
        assert!(!validate(&t, Some("ABC123"), &now()).is_valid());
    }

    #[test]
    fn test_one_minute_before_expiry_is_valid() {
        let t = table(now() + Duration::minutes(1));
        let result = validate(&t, Some("ABC123"), &now());
        assert!(result.is_valid());
        assert_eq!(result.to_response().remaining_days, Some(0));
    }

    #[test]
    fn test_past_expiry_is_invalid() {
        let t = table(now() - Duration::minutes(1));
        let result = validate(&t, Some("ABC123"), &now());
        assert_eq!(result, Validation::Invalid(InvalidReason::InvalidOrExpired));
        assert_eq!(result.to_response().msg, "key invalid or expired");
        assert_eq!(result.to_response().code, "false");
    }

    #[test]
    fn test_response_shape() {
        let t = table(now() + Duration::days(1));
        let body = serde_json::to_value(validate(&t, Some("ABC123"), &now()).to_response()).unwrap();
        assert_eq!(body["code"], "true");
        assert_eq!(body["msg"], "trial");
        assert_eq!(body["expiry"], "2025-01-16-12-00");
        assert_eq!(body["remainingDays"], 1);
    }

    #[test]
    fn test_validation_is_lookup_case_sensitive() {
        let t = table(now() + Duration::days(1));
        assert!(!validate(&t, Some("abc123"), &now()).is_valid());
    }
}
