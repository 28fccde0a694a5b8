//! Key Service - the main public API for Keywarden.
//!
//! A `KeyService` owns every piece of process state (registry, ledger, rate
//! windows, route statistics, operator profile) and is shared by reference
//! between request handlers. It exposes:
//! - The public, rate-limited validation endpoint
//! - Session-authenticated operator reads (stats, trends, logs, keys, profile)
//! - Key administration, which additionally requires the admin key
//!
//! Every validation attempt and every administrative mutation is recorded in
//! the request ledger. A ledger write failure is logged and never turns a
//! reply into an error.

use crate::auth::session::require_session;
use crate::auth::{Operator, SessionVerifier, SharedSecret};
use crate::clock::{Clock, SystemClock};
use crate::config::KeywardenConfig;
use crate::ledger::stats::summarize;
use crate::ledger::{LogEntry, Outcome, RequestLedger, RouteStats, TrendRange};
use crate::limiter::RateLimiter;
use crate::profile::{ProfileStore, ProfileUpdate, UserConfig};
use crate::protocol::models::{
    ExtendedKey, KeyView, RouteCount, RouteTotals, StatsSummary, TrendPoint, ValidationResponse,
};
use crate::registry::{is_valid_key_format, KeyRecord, KeyRegistry};
use crate::validation::validate;
use crate::KeywardenError;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

/// Route path of the public validation endpoint.
pub const VALIDATION_PATH: &str = "/api/v1/app/key";

/// Route-statistics bucket shared by every unmatched path.
pub const UNMATCHED_ROUTE: &str = "(unmatched)";

/// Longest unmatched path echoed into a ledger message, in characters.
const MAX_LOGGED_PATH: usize = 256;

/// Ledger tag of successful administrative mutations.
const ADMIN_TAG: &str = "[ADMIN]";

/// An inbound request to the public validation endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ValidationRequest<'a> {
    /// HTTP method as sent by the client.
    pub method: &'a str,
    /// The `mode` query parameter carrying the key.
    pub key: Option<&'a str>,
    /// Client address used for rate limiting and auditing.
    pub client_address: &'a str,
}

/// Transport status of a validation reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// The request reached validation (valid or not).
    Ok,
    /// The method is neither GET nor POST.
    MethodNotAllowed,
    /// The client exhausted its rate window.
    TooManyRequests,
}

impl ReplyStatus {
    /// HTTP status code.
    pub fn as_u16(&self) -> u16 {
        match self {
            ReplyStatus::Ok => 200,
            ReplyStatus::MethodNotAllowed => 405,
            ReplyStatus::TooManyRequests => 429,
        }
    }
}

/// Reply to a validation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReply {
    /// Transport status.
    pub status: ReplyStatus,
    /// JSON body.
    pub body: ValidationResponse,
    /// Outcome recorded in the ledger.
    pub outcome: Outcome,
}

/// Credentials for key administration.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminCredentials<'a> {
    /// Operator session bearer token.
    pub bearer: Option<&'a str>,
    /// Elevated admin key, distinct from the session.
    pub admin_key: Option<&'a str>,
}

/// Shape of a log listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogView {
    /// Counts per inferred route.
    Simplified,
    /// Every retained entry, newest first.
    #[default]
    Detailed,
}

impl FromStr for LogView {
    type Err = KeywardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simplified" => Ok(LogView::Simplified),
            "detailed" => Ok(LogView::Detailed),
            other => Err(KeywardenError::InvalidArgument(format!(
                "view must be simplified or detailed, got {:?}",
                other
            ))),
        }
    }
}

/// A log listing in the requested view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LogsReport {
    /// Route counts.
    Simplified(Vec<RouteCount>),
    /// Full entries.
    Detailed(Vec<LogEntry>),
}

/// Main service instance.
///
/// Create one per process at startup and share it (e.g. in an `Arc`) with
/// every request handler.
pub struct KeyService {
    registry: KeyRegistry,
    ledger: RequestLedger,
    limiter: Arc<RateLimiter>,
    routes: RouteStats,
    profiles: ProfileStore,
    sessions: Arc<dyn SessionVerifier>,
    admin_key: SharedSecret,
    clear_logs_key: SharedSecret,
    clock: Arc<dyn Clock>,
}

impl KeyService {
    /// Create a service with the given configuration and session collaborator.
    ///
    /// Uses the system clock for time operations.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The data directory cannot be created
    pub fn new(
        config: KeywardenConfig,
        sessions: Arc<dyn SessionVerifier>,
    ) -> Result<Self, KeywardenError> {
        Self::with_clock(config, sessions, Arc::new(SystemClock))
    }

    /// Create a service with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: KeywardenConfig,
        sessions: Arc<dyn SessionVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, KeywardenError> {
        Self::with_clock(config, sessions, clock)
    }

    fn with_clock(
        config: KeywardenConfig,
        sessions: Arc<dyn SessionVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, KeywardenError> {
        config.validate()?;

        let registry = KeyRegistry::open(config.key_store_path(), clock.clone())?;
        let ledger = RequestLedger::open(config.log_store_path(), clock.clone(), config.log_retention)?;
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit, clock.clone())?);
        let profiles = ProfileStore::open(
            config.profile_path(),
            UserConfig {
                avatar: config.default_avatar.clone(),
                theme: Default::default(),
                username: config.default_username.clone(),
            },
        )?;
        let admin_key = SharedSecret::new(&config.admin_key);
        let clear_logs_key = SharedSecret::new(&config.clear_logs_key);

        tracing::info!(
            data_dir = %config.data_dir.display(),
            rate_limit = config.rate_limit.limit,
            rate_window_secs = config.rate_limit.window.as_secs(),
            admin_key = %admin_key.fingerprint(),
            clear_logs_key = %clear_logs_key.fingerprint(),
            "keywarden service ready"
        );

        Ok(Self {
            registry,
            ledger,
            limiter,
            routes: RouteStats::new(clock.clone()),
            profiles,
            sessions,
            admin_key,
            clear_logs_key,
            clock,
        })
    }

    /// Handle a request to the public validation endpoint.
    ///
    /// Only GET and POST are accepted. Admitted requests are rate limited per
    /// client address before the key is checked. Every outcome is ledgered;
    /// a submitted key that is not well-formed is ledgered as absent.
    pub fn validate(&self, request: ValidationRequest<'_>) -> ValidationReply {
        let method = request.method.to_ascii_uppercase();
        let ledger_key = request.key.filter(|k| is_valid_key_format(k));

        if method != "GET" && method != "POST" {
            self.audit_route(
                ledger_key,
                Outcome::Failure,
                &format!("[{}] unsupported method: {}", method, method),
                request.client_address,
            );
            return ValidationReply {
                status: ReplyStatus::MethodNotAllowed,
                body: ValidationResponse::denied("unsupported request method"),
                outcome: Outcome::Failure,
            };
        }

        if !self.limiter.check(request.client_address) {
            self.audit_route(
                ledger_key,
                Outcome::Blocked,
                &format!("[{}] too many requests", method),
                request.client_address,
            );
            return ValidationReply {
                status: ReplyStatus::TooManyRequests,
                body: ValidationResponse::denied(KeywardenError::RateLimited.to_string()),
                outcome: Outcome::Blocked,
            };
        }

        let now = self.clock.now_local();
        let result = validate(&self.registry.snapshot(), request.key, &now);
        let outcome = if result.is_valid() {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        self.audit_route(
            ledger_key,
            outcome,
            &format!("[{}] {}", method, result.ledger_detail()),
            request.client_address,
        );

        ValidationReply {
            status: ReplyStatus::Ok,
            body: result.to_response(),
            outcome,
        }
    }

    /// Record a request for a path no route matched.
    ///
    /// All unmatched paths share one route-statistics bucket, and the path is
    /// truncated in the ledger message.
    pub fn record_not_found(&self, method: &str, path: &str, client_address: &str) {
        self.routes.record(UNMATCHED_ROUTE, Outcome::Failure);
        let path: String = path.chars().take(MAX_LOGGED_PATH).collect();
        self.audit(
            None,
            Outcome::Failure,
            &format!("[{}] 404 - path not found: {}", method.to_ascii_uppercase(), path),
            client_address,
        );
    }

    /// Resolve the operator behind a session token.
    pub fn verify_session(&self, bearer: Option<&str>) -> Result<Operator, KeywardenError> {
        require_session(self.sessions.as_ref(), bearer)
    }

    /// Aggregate route statistics (no per-path breakdown).
    pub fn route_stats(&self, bearer: Option<&str>) -> Result<RouteTotals, KeywardenError> {
        self.verify_session(bearer)?;
        Ok(self.routes.totals())
    }

    /// Daily request counts over `range`.
    pub fn trends(
        &self,
        bearer: Option<&str>,
        range: TrendRange,
    ) -> Result<Vec<TrendPoint>, KeywardenError> {
        self.verify_session(bearer)?;
        Ok(self.ledger.trends(range))
    }

    /// Ledger listing in the requested view.
    pub fn logs(&self, bearer: Option<&str>, view: LogView) -> Result<LogsReport, KeywardenError> {
        self.verify_session(bearer)?;
        Ok(match view {
            LogView::Simplified => LogsReport::Simplified(self.ledger.route_summary()),
            LogView::Detailed => LogsReport::Detailed(self.ledger.entries()),
        })
    }

    /// Dashboard summary.
    pub fn stats(&self, bearer: Option<&str>) -> Result<StatsSummary, KeywardenError> {
        self.verify_session(bearer)?;
        Ok(summarize(
            &self.ledger.entries(),
            &self.registry.snapshot(),
            self.clock.as_ref(),
        ))
    }

    /// All keys with derived expiry fields.
    pub fn list_keys(&self, bearer: Option<&str>) -> Result<Vec<KeyView>, KeywardenError> {
        self.verify_session(bearer)?;
        Ok(self.registry.list())
    }

    /// One raw key record.
    pub fn key(&self, bearer: Option<&str>, key: &str) -> Result<KeyRecord, KeywardenError> {
        self.verify_session(bearer)?;
        self.registry.get(key)
    }

    /// Create a key. Requires a session and the admin key.
    pub fn add_key(
        &self,
        credentials: AdminCredentials<'_>,
        client_address: &str,
        key: &str,
        message: &str,
        expiry: &str,
    ) -> Result<KeyRecord, KeywardenError> {
        self.authorize_admin(credentials, "POST", client_address)?;
        let result = self.registry.add(key, message, expiry);
        self.audit_admin(key, client_address, &result, "key created", "key creation");
        result
    }

    /// Delete a key. Requires a session and the admin key.
    pub fn delete_key(
        &self,
        credentials: AdminCredentials<'_>,
        client_address: &str,
        key: &str,
    ) -> Result<KeyRecord, KeywardenError> {
        self.authorize_admin(credentials, "DELETE", client_address)?;
        let result = self.registry.delete(key);
        self.audit_admin(key, client_address, &result, "key deleted", "key deletion");
        result
    }

    /// Extend a key by `days`. Requires a session and the admin key.
    pub fn extend_key(
        &self,
        credentials: AdminCredentials<'_>,
        client_address: &str,
        key: &str,
        days: i64,
    ) -> Result<ExtendedKey, KeywardenError> {
        self.authorize_admin(credentials, "POST", client_address)?;
        let result = self.registry.extend(key, days);
        self.audit_admin(
            key,
            client_address,
            &result,
            &format!("key extended by {} days", days),
            "key extension",
        );
        result.map(|record| ExtendedKey {
            new_expiry: record.expiry_string(),
            key: record.key,
        })
    }

    /// Current operator profile.
    pub fn user_config(&self, bearer: Option<&str>) -> Result<UserConfig, KeywardenError> {
        self.verify_session(bearer)?;
        Ok(self.profiles.read())
    }

    /// Apply a partial profile update.
    pub fn update_user_config(
        &self,
        bearer: Option<&str>,
        patch: &ProfileUpdate,
    ) -> Result<UserConfig, KeywardenError> {
        self.verify_session(bearer)?;
        self.profiles.update(patch)
    }

    /// Empty the ledger and zero the route statistics.
    ///
    /// Requires a session and the clear-logs secret.
    pub fn clear_logs(
        &self,
        bearer: Option<&str>,
        clear_key: Option<&str>,
    ) -> Result<(), KeywardenError> {
        let operator = self.verify_session(bearer)?;
        self.clear_logs_key.verify(clear_key, "clear-logs key")?;

        self.ledger.clear()?;
        self.routes.reset();
        tracing::info!(operator = %operator.username, "request logs cleared");
        Ok(())
    }

    /// The rate limiter, e.g. to start its periodic sweeper.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The key registry.
    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// The request ledger.
    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    fn authorize_admin(
        &self,
        credentials: AdminCredentials<'_>,
        method: &str,
        client_address: &str,
    ) -> Result<Operator, KeywardenError> {
        let checked = self
            .verify_session(credentials.bearer)
            .and_then(|operator| {
                self.admin_key
                    .verify(credentials.admin_key, "admin key")
                    .map(|_| operator)
            });

        if let Err(e) = &checked {
            tracing::warn!(client = %client_address, error = %e, "rejected admin operation");
            self.audit(
                None,
                Outcome::Failure,
                &format!("[{}] unauthorized admin operation attempt", method),
                client_address,
            );
        }
        checked
    }

    fn audit_admin<T>(
        &self,
        key: &str,
        client_address: &str,
        result: &Result<T, KeywardenError>,
        done: &str,
        attempt: &str,
    ) {
        let (outcome, message) = match result {
            Ok(_) => (Outcome::Success, format!("{} {}", ADMIN_TAG, done)),
            Err(e) => (
                Outcome::Failure,
                format!("{} {} failed: {}", ADMIN_TAG, attempt, e),
            ),
        };
        self.audit(Some(key), outcome, &message, client_address);
    }

    fn audit_route(&self, key: Option<&str>, outcome: Outcome, message: &str, client_address: &str) {
        self.routes.record(VALIDATION_PATH, outcome);
        self.audit(key, outcome, message, client_address);
    }

    fn audit(&self, key: Option<&str>, outcome: Outcome, message: &str, client_address: &str) {
        if let Err(e) = self.ledger.record(key, outcome, message, client_address) {
            tracing::warn!(error = %e, message = %message, "ledger: failed to record entry");
        }
    }
}
