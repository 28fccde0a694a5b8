//! Persisted key-store shape and the reply bodies returned to callers.

use serde::{Deserialize, Serialize};

/// Per-key object of the legacy key-store layout.
///
/// The store file is a list of single-entry maps: `[{ "<key>": StoredKey }, ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKey {
    /// Expiry as `YYYY-MM-DD-HH-mm`.
    pub code: String,
    /// Message shown to the caller on successful validation.
    pub msg: String,
    /// Creation time as `YYYY-MM-DD-HH-mm`; absent in older stores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

/// Body of a public validation reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    /// `"true"` when the key grants access, `"false"` otherwise.
    pub code: String,
    /// Key message on success, reason on failure.
    pub msg: String,
    /// Expiry of a valid key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    /// Whole days left on a valid key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_days: Option<i64>,
}

impl ValidationResponse {
    /// Successful validation reply.
    pub fn granted(msg: impl Into<String>, expiry: impl Into<String>, remaining_days: i64) -> Self {
        Self {
            code: "true".to_string(),
            msg: msg.into(),
            expiry: Some(expiry.into()),
            remaining_days: Some(remaining_days),
        }
    }

    /// Failure reply carrying only a reason.
    pub fn denied(msg: impl Into<String>) -> Self {
        Self {
            code: "false".to_string(),
            msg: msg.into(),
            expiry: None,
            remaining_days: None,
        }
    }

    /// Whether this reply grants access.
    pub fn is_granted(&self) -> bool {
        self.code == "true"
    }
}

/// A key record enriched with expiry-derived fields for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyView {
    /// The key string.
    pub key: String,
    /// Message shown on success.
    pub msg: String,
    /// Expiry as `YYYY-MM-DD-HH-mm`.
    pub expiry: String,
    /// `now > expiry`.
    pub is_expired: bool,
    /// Floored whole days until expiry; negative once expired.
    pub remaining_days: i64,
    /// Creation time as `YYYY-MM-DD-HH-mm`, if known.
    pub created: Option<String>,
}

/// Result of a successful extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedKey {
    /// The extended key.
    pub key: String,
    /// New expiry as `YYYY-MM-DD-HH-mm`.
    pub new_expiry: String,
}

/// One calendar day of request counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Day as `YYYY-MM-DD`.
    pub date: String,
    /// All requests on that day.
    pub total: u64,
    /// Successful requests.
    pub success: u64,
    /// Failed requests.
    pub failed: u64,
    /// Rate-limited requests.
    pub blocked: u64,
}

/// Ledger entries grouped by inferred route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCount {
    /// Route label, `"<METHOD> <last message token>"`.
    pub route: String,
    /// Number of entries.
    pub count: u64,
}

/// Aggregate route statistics without a per-path breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTotals {
    /// All recorded requests.
    pub total: u64,
    /// Successful requests.
    pub success: u64,
    /// Failed requests.
    pub failed: u64,
    /// Rate-limited requests.
    pub blocked: u64,
}

/// Dashboard summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    /// Requests recorded today.
    pub today_requests: u64,
    /// Percentage change from yesterday, one decimal; zero when yesterday had none.
    pub request_trend: f64,
    /// Unexpired keys.
    pub active_keys: u64,
    /// Keys created this calendar month.
    pub new_keys: u64,
    /// Expired keys.
    pub expired_keys: u64,
    /// Unexpired keys with at most 7 whole days remaining.
    pub expiring_keys: u64,
}
