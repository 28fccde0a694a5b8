//! Fixed-window request counter keyed by client address.
//!
//! The first request from an identifier opens a window. Requests inside the
//! window are counted and admitted while the count stays within the limit;
//! the first request after the window has elapsed opens a fresh one.
//!
//! Window state lives only in memory. Stale windows are evicted by
//! [`RateLimiter::sweep`], which runs lazily (at most once per window) once
//! `max_tracked` identifiers are held, and optionally on a background
//! interval. While the table is still full, requests from new identifiers
//! are judged as the first request of a fresh window and are not tracked.

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::KeywardenError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Window state for one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Requests observed in the current window.
    pub count: u32,
    /// When the current window opened.
    pub window_start: DateTime<Utc>,
}

/// In-memory fixed-window rate limiter.
pub struct RateLimiter {
    limit: u32,
    window: chrono::Duration,
    max_tracked: usize,
    windows: DashMap<String, WindowState>,
    /// Millisecond timestamp of the last lazy sweep.
    last_sweep: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter from configuration.
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self, KeywardenError> {
        let window = chrono::Duration::from_std(config.window).map_err(|e| {
            KeywardenError::ConfigError(format!("rate window out of range: {}", e))
        })?;

        Ok(Self {
            limit: config.limit,
            window,
            max_tracked: config.max_tracked,
            windows: DashMap::new(),
            last_sweep: AtomicI64::new(i64::MIN),
            clock,
        })
    }

    /// Count a request from `identifier` and report whether it is admitted.
    pub fn check(&self, identifier: &str) -> bool {
        let now = self.clock.now_utc();

        if self.windows.len() >= self.max_tracked {
            self.lazy_sweep(now);

            if self.windows.len() >= self.max_tracked && !self.windows.contains_key(identifier) {
                return 1 <= self.limit;
            }
        }

        let mut state = self
            .windows
            .entry(identifier.to_string())
            .or_insert(WindowState {
                count: 0,
                window_start: now,
            });

        if now - state.window_start > self.window {
            state.count = 0;
            state.window_start = now;
        }

        state.count = state.count.saturating_add(1);
        state.count <= self.limit
    }

    /// Like [`check`](Self::check), but refusals become `RateLimited`.
    pub fn admit(&self, identifier: &str) -> Result<(), KeywardenError> {
        if self.check(identifier) {
            Ok(())
        } else {
            Err(KeywardenError::RateLimited)
        }
    }

    /// Current window of `identifier`, if tracked.
    pub fn window_of(&self, identifier: &str) -> Option<WindowState> {
        self.windows.get(identifier).map(|state| *state)
    }

    /// Number of identifiers currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Evict every identifier whose window has elapsed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(self.clock.now_utc())
    }

    fn lazy_sweep(&self, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        let last = self.last_sweep.load(Ordering::Relaxed);
        if last != i64::MIN && now_ms.saturating_sub(last) < self.window.num_milliseconds() {
            return;
        }
        // One caller per window claims the sweep.
        if self
            .last_sweep
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let evicted = self.sweep_at(now);
        let tracked = self.windows.len();
        if tracked >= self.max_tracked {
            tracing::warn!(evicted, tracked, "limiter: table full, new identifiers untracked");
        } else {
            tracing::debug!(evicted, tracked, "limiter: lazy sweep");
        }
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, state| now - state.window_start <= self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Run [`sweep`](Self::sweep) every `every` on the current tokio runtime.
    ///
    /// The task holds only a weak handle and ends once the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let evicted = limiter.sweep();
                if evicted > 0 {
                    tracing::debug!(evicted, tracked = limiter.tracked(), "limiter: periodic sweep");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;

    fn setup(limit: u32, max_tracked: usize) -> (Arc<MockClock>, RateLimiter) {
        let clock = Arc::new(MockClock::new(
            Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
        ));
        let config = RateLimitConfig {
            limit,
            window: StdDuration::from_secs(60),
            max_tracked,
        };
        let limiter = RateLimiter::new(&config, clock.clone()).unwrap();
        (clock, limiter)
    }

    #[test]
    fn test_first_request_opens_window() {
        let (clock, limiter) = setup(10, 100);

        assert!(limiter.check("10.0.0.1"));
        let state = limiter.window_of("10.0.0.1").unwrap();
        assert_eq!(state.count, 1);
        assert_eq!(state.window_start, clock.now_utc());
    }

    #[test]
    fn test_eleventh_request_is_refused() {
        let (_clock, limiter) = setup(10, 100);

        for i in 0..10 {
            assert!(limiter.check("10.0.0.1"), "request {} should pass", i + 1);
        }
        assert!(!limiter.check("10.0.0.1"));
        assert!(matches!(limiter.admit("10.0.0.1"), Err(KeywardenError::RateLimited)));
    }

    #[test]
    fn test_window_resets_after_elapsing() {
        let (clock, limiter) = setup(10, 100);
        for _ in 0..11 {
            limiter.check("10.0.0.1");
        }

        clock.advance(Duration::seconds(61));

        assert!(limiter.check("10.0.0.1"));
        assert_eq!(limiter.window_of("10.0.0.1").unwrap().count, 1);
    }

    #[test]
    fn test_window_boundary_is_still_current() {
        let (clock, limiter) = setup(1, 100);
        assert!(limiter.check("10.0.0.1"));

        clock.advance(Duration::seconds(60));
        assert!(!limiter.check("10.0.0.1"));

        clock.advance(Duration::milliseconds(1));
        assert!(limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_identifiers_are_independent() {
        let (_clock, limiter) = setup(1, 100);

        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"));
    }

    #[test]
    fn test_sweep_evicts_stale_windows() {
        let (clock, limiter) = setup(10, 100);
        limiter.check("10.0.0.1");
        clock.advance(Duration::seconds(30));
        limiter.check("10.0.0.2");
        clock.advance(Duration::seconds(31));

        assert_eq!(limiter.sweep(), 1);
        assert!(limiter.window_of("10.0.0.1").is_none());
        assert!(limiter.window_of("10.0.0.2").is_some());
    }

    #[test]
    fn test_lazy_sweep_bounds_tracked_identifiers() {
        let (clock, limiter) = setup(10, 5);
        for i in 0..6 {
            limiter.check(&format!("10.0.0.{}", i));
        }
        assert_eq!(limiter.tracked(), 5);

        clock.advance(Duration::seconds(61));
        limiter.check("10.0.1.1");

        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_fresh_identifier_churn_stays_capped() {
        let (clock, limiter) = setup(2, 100);
        for i in 0..1000 {
            assert!(limiter.check(&format!("10.1.{}.{}", i / 256, i % 256)));
        }
        assert_eq!(limiter.tracked(), 100);

        // The table stays full inside the window; no further sweep runs.
        clock.advance(Duration::seconds(30));
        for i in 0..1000 {
            limiter.check(&format!("10.2.{}.{}", i / 256, i % 256));
        }
        assert_eq!(limiter.tracked(), 100);
        assert_eq!(
            limiter.last_sweep.load(Ordering::Relaxed),
            Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap().timestamp_millis()
        );

        // Tracked identifiers are still limited while the table is full.
        assert!(limiter.check("10.1.0.0"));
        assert!(!limiter.check("10.1.0.0"));

        clock.advance(Duration::seconds(31));
        assert!(limiter.check("10.3.0.1"));
        assert_eq!(limiter.tracked(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sweeper() {
        let (clock, limiter) = setup(10, 100);
        let limiter = Arc::new(limiter);
        limiter.check("10.0.0.1");
        clock.advance(Duration::seconds(61));

        let handle = limiter.spawn_sweeper(StdDuration::from_secs(10));
        tokio::time::sleep(StdDuration::from_secs(11)).await;

        assert_eq!(limiter.tracked(), 0);
        handle.abort();
    }
}
