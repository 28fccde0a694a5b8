//! Request ledger: the retention-bounded audit log of validation and
//! administrative attempts, plus the statistics derived from it.

pub mod log;
pub mod routes;
pub mod stats;

pub use log::{LogEntry, Outcome, RequestLedger};
pub use routes::{RouteStat, RouteStats};
pub use stats::TrendRange;
