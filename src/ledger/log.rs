//! Append-only request log with a fixed retention bound.
//!
//! Entries are stored newest first. Each append runs as one read-modify-write
//! under the log store's writer lock and truncates the log to the newest
//! `retention` entries.

use crate::clock::Clock;
use crate::ledger::stats::{daily_trend, route_summary, TrendRange};
use crate::protocol::models::{RouteCount, TrendPoint};
use crate::store::JsonStore;
use crate::KeywardenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Result of a recorded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The attempt succeeded.
    Success,
    /// The attempt was refused or invalid.
    Failure,
    /// The attempt was rejected by the rate limiter.
    Blocked,
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonically increasing id derived from the creation time in milliseconds.
    pub id: i64,
    /// When the attempt was recorded.
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    /// Key involved, if the request resolved to one.
    pub key: Option<String>,
    /// Client address of the request.
    #[serde(rename = "ip")]
    pub client_address: String,
    /// Result of the attempt.
    pub outcome: Outcome,
    /// Detail such as `[GET] validation succeeded`.
    pub message: String,
}

/// The persisted, retention-bounded request log.
pub struct RequestLedger {
    store: JsonStore<Vec<LogEntry>>,
    clock: Arc<dyn Clock>,
    retention: usize,
}

impl RequestLedger {
    /// Open the ledger backed by the log store at `path`.
    pub fn open(
        path: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
        retention: usize,
    ) -> Result<Self, KeywardenError> {
        Ok(Self {
            store: JsonStore::open(path)?,
            clock,
            retention,
        })
    }

    /// Append an entry, evicting the oldest entries beyond the retention bound.
    pub fn record(
        &self,
        key: Option<&str>,
        outcome: Outcome,
        message: &str,
        client_address: &str,
    ) -> Result<LogEntry, KeywardenError> {
        let timestamp = self.clock.now_utc();
        let retention = self.retention;

        self.store.update(Vec::new, |logs| {
            let mut id = timestamp.timestamp_millis();
            if let Some(latest) = logs.first() {
                id = id.max(latest.id + 1);
            }

            let entry = LogEntry {
                id,
                timestamp,
                key: key.map(str::to_string),
                client_address: client_address.to_string(),
                outcome,
                message: message.to_string(),
            };
            logs.insert(0, entry.clone());
            logs.truncate(retention);
            Ok(entry)
        })
    }

    /// All retained entries, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        let mut logs = self.store.read_or_else(Vec::new);
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs
    }

    /// Drop every entry.
    pub fn clear(&self) -> Result<(), KeywardenError> {
        self.store.write(&Vec::new())?;
        tracing::info!("ledger: log cleared");
        Ok(())
    }

    /// Per-day counts for every day of `range`, ending today.
    pub fn trends(&self, range: TrendRange) -> Vec<TrendPoint> {
        daily_trend(&self.entries(), range, self.clock.as_ref())
    }

    /// Entry counts by inferred route, most frequent first.
    pub fn route_summary(&self) -> Vec<RouteCount> {
        route_summary(&self.entries())
    }
}
