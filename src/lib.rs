//! # Keywarden
//!
//! **Time-limited license key issuance, validation and request accounting.**
//!
//! Keywarden is the core of a license key server: it administers opaque
//! bearer keys with minute-precision expiries, validates submitted keys
//! behind a per-client rate limiter, and records every attempt in a
//! retention-bounded request ledger that feeds dashboard statistics.
//!
//! ## Features
//!
//! - **Key registry** — add, delete and extend keys; extensions never start in the past
//! - **Pure validation** — a key is valid strictly before its expiry instant
//! - **Fixed-window rate limiting** — per client address, with stale-window eviction
//! - **Request ledger** — newest-first audit log capped at 1000 entries
//! - **Derived statistics** — daily trends, route summaries, dashboard summary
//! - **Crash-safe storage** — JSON documents written via temp file + rename,
//!   with one writer at a time per store
//!
//! ## Quickstart
//!
//! ```no_run
//! use keywarden::{KeyService, KeywardenConfig, Operator, ValidationRequest};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), keywarden::KeywardenError> {
//!     let config = KeywardenConfig::from_env()?;
//!
//!     // Session tokens are issued elsewhere; plug in their verifier.
//!     let sessions = Arc::new(|bearer: &str| {
//!         if bearer == "operator-session" {
//!             Ok(Operator { username: "admin".into() })
//!         } else {
//!             Err(keywarden::KeywardenError::Unauthorized("bad session".into()))
//!         }
//!     });
//!
//!     let service = KeyService::new(config, sessions)?;
//!     let reply = service.validate(ValidationRequest {
//!         method: "GET",
//!         key: Some("ABC123"),
//!         client_address: "203.0.113.7",
//!     });
//!
//!     println!("{} {}", reply.status.as_u16(), reply.body.msg);
//!     Ok(())
//! }
//! ```
//!
//! ## Persisted state
//!
//! - `app_key.json` — `[{ "<key>": { "code": expiry, "msg": message, "created": created } }]`
//! - `request_logs.json` — ledger entries, newest first
//! - `user_config.json` — `{ "avatar", "theme", "username" }`
//!
//! See [`KeywardenConfig`] for configuration.

#![warn(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Wire formats
pub mod protocol;

// Storage layer
pub mod store;

// Admission control
pub mod limiter;

// Key layer
pub mod registry;
pub mod validation;

// Ledger layer
pub mod ledger;

// Operator layer
pub mod auth;
pub mod profile;

// Service (main public API)
pub mod service;

// Re-exports for public API
pub use auth::{Operator, SessionVerifier};
pub use clock::{Clock, SystemClock};
pub use config::KeywardenConfig;
pub use errors::KeywardenError;
pub use ledger::{LogEntry, Outcome, TrendRange};
pub use registry::KeyRecord;
pub use service::{
    AdminCredentials, KeyService, LogView, LogsReport, ReplyStatus, ValidationReply,
    ValidationRequest,
};
pub use validation::Validation;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
