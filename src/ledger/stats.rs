//! Statistics derived from the ledger on read.

use crate::clock::Clock;
use crate::ledger::log::{LogEntry, Outcome};
use crate::protocol::models::{RouteCount, StatsSummary, TrendPoint};
use crate::protocol::timestamp::days_until;
use crate::registry::KeyTable;
use crate::KeywardenError;
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::HashMap;
use std::str::FromStr;

/// Keys with at most this many whole days left count as expiring.
pub const EXPIRING_WITHIN_DAYS: i64 = 7;

/// Span of a trend query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrendRange {
    /// Today and the preceding 6 days.
    #[default]
    Week,
    /// Today and the preceding 29 days.
    Month,
}

impl TrendRange {
    /// Number of day buckets in the range.
    pub fn days(&self) -> i64 {
        match self {
            TrendRange::Week => 7,
            TrendRange::Month => 30,
        }
    }
}

impl FromStr for TrendRange {
    type Err = KeywardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(TrendRange::Week),
            "month" => Ok(TrendRange::Month),
            other => Err(KeywardenError::InvalidArgument(format!(
                "range must be week or month, got {:?}",
                other
            ))),
        }
    }
}

/// Bucket entries by local calendar day over `range`, ending today.
///
/// Every day in the range gets a bucket, including days without traffic.
pub fn daily_trend(entries: &[LogEntry], range: TrendRange, clock: &dyn Clock) -> Vec<TrendPoint> {
    let today = clock.today();
    let start = today - Duration::days(range.days() - 1);

    let mut buckets: Vec<TrendPoint> = (0..range.days())
        .map(|offset| TrendPoint {
            date: (start + Duration::days(offset)).format("%Y-%m-%d").to_string(),
            total: 0,
            success: 0,
            failed: 0,
            blocked: 0,
        })
        .collect();

    for entry in entries {
        let day = clock.local_date(&entry.timestamp);
        if day < start || day > today {
            continue;
        }
        let bucket = &mut buckets[(day - start).num_days() as usize];
        bucket.total += 1;
        match entry.outcome {
            Outcome::Success => bucket.success += 1,
            Outcome::Failure => bucket.failed += 1,
            Outcome::Blocked => bucket.blocked += 1,
        }
    }

    buckets
}

/// Route label of an entry: the `[METHOD]` tag of its message (default `GET`)
/// followed by the message's last token.
pub fn route_label(message: &str) -> String {
    let method = message
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .map(|(method, _)| method)
        .filter(|method| !method.is_empty())
        .unwrap_or("GET");
    let last = message.split_whitespace().last().unwrap_or("");
    format!("{} {}", method, last)
}

/// Entry counts per route label, most frequent first, ties by label.
pub fn route_summary(entries: &[LogEntry]) -> Vec<RouteCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for entry in entries {
        *counts.entry(route_label(&entry.message)).or_default() += 1;
    }

    let mut summary: Vec<RouteCount> = counts
        .into_iter()
        .map(|(route, count)| RouteCount { route, count })
        .collect();
    summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.route.cmp(&b.route)));
    summary
}

/// Dashboard summary: today's traffic against yesterday's and key counts.
pub fn summarize(entries: &[LogEntry], keys: &KeyTable, clock: &dyn Clock) -> StatsSummary {
    let today = clock.today();
    let yesterday = today.pred_opt().unwrap_or(today);

    let mut today_requests = 0u64;
    let mut yesterday_requests = 0u64;
    for entry in entries {
        let day = clock.local_date(&entry.timestamp);
        if day == today {
            today_requests += 1;
        } else if day == yesterday {
            yesterday_requests += 1;
        }
    }

    let request_trend = if yesterday_requests == 0 {
        0.0
    } else {
        let change = (today_requests as f64 - yesterday_requests as f64)
            / yesterday_requests as f64
            * 100.0;
        (change * 10.0).round() / 10.0
    };

    let now = clock.now_local();
    let month_start = first_of_month(today).and_hms_opt(0, 0, 0).unwrap_or(now);

    let mut summary = StatsSummary {
        today_requests,
        request_trend,
        active_keys: 0,
        new_keys: 0,
        expired_keys: 0,
        expiring_keys: 0,
    };
    for record in keys.iter() {
        if record.is_active_at(&now) {
            summary.active_keys += 1;
            if days_until(&now, &record.expiry) <= EXPIRING_WITHIN_DAYS {
                summary.expiring_keys += 1;
            }
        } else {
            summary.expired_keys += 1;
        }
        if record.created.map_or(false, |created| created >= month_start) {
            summary.new_keys += 1;
        }
    }
    summary
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}
