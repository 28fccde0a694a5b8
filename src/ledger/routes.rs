//! In-memory per-route request accounting for the lifetime of the process.

use crate::clock::Clock;
use crate::ledger::log::Outcome;
use crate::protocol::models::RouteTotals;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Counters for one route path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStat {
    /// All requests.
    pub total: u64,
    /// Successful requests.
    pub success: u64,
    /// Failed requests.
    pub failed: u64,
    /// Rate-limited requests.
    pub blocked: u64,
    /// Time of the most recent request, cleared on reset.
    pub last_access: Option<DateTime<Utc>>,
}

/// Route statistics cache, owned by the service instance.
pub struct RouteStats {
    routes: DashMap<String, RouteStat>,
    clock: Arc<dyn Clock>,
}

impl RouteStats {
    /// Create an empty cache.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            routes: DashMap::new(),
            clock,
        }
    }

    /// Count one request against `path`.
    pub fn record(&self, path: &str, outcome: Outcome) {
        let now = self.clock.now_utc();
        let mut stat = self.routes.entry(path.to_string()).or_default();
        stat.total += 1;
        match outcome {
            Outcome::Success => stat.success += 1,
            Outcome::Failure => stat.failed += 1,
            Outcome::Blocked => stat.blocked += 1,
        }
        stat.last_access = Some(now);
    }

    /// Sum over all paths.
    pub fn totals(&self) -> RouteTotals {
        self.routes
            .iter()
            .fold(RouteTotals::default(), |mut acc, stat| {
                acc.total += stat.total;
                acc.success += stat.success;
                acc.failed += stat.failed;
                acc.blocked += stat.blocked;
                acc
            })
    }

    /// Per-path counters, ordered by path.
    pub fn snapshot(&self) -> BTreeMap<String, RouteStat> {
        self.routes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Zero every counter, keeping the known paths.
    pub fn reset(&self) {
        self.routes
            .iter_mut()
            .for_each(|mut stat| *stat = RouteStat::default());
    }
}
