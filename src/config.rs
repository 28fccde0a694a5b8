//! Keywarden configuration.

use crate::KeywardenError;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of validation requests allowed per window.
pub const DEFAULT_RATE_LIMIT: u32 = 10;

/// Default rate window length.
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Default number of tracked client identifiers before a lazy sweep runs.
pub const DEFAULT_MAX_TRACKED: usize = 10_000;

/// Default number of ledger entries retained.
pub const DEFAULT_LOG_RETENTION: usize = 1000;

/// Key store file name inside the data directory.
pub const KEY_STORE_FILE: &str = "app_key.json";

/// Request log file name inside the data directory.
pub const LOG_STORE_FILE: &str = "request_logs.json";

/// Operator profile file name inside the data directory.
pub const PROFILE_FILE: &str = "user_config.json";

/// Rate limiter settings for the public validation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests admitted per window and identifier.
    pub limit: u32,

    /// Window length.
    pub window: Duration,

    /// Tracked identifiers above which stale windows are swept on access.
    pub max_tracked: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RATE_LIMIT,
            window: DEFAULT_RATE_WINDOW,
            max_tracked: DEFAULT_MAX_TRACKED,
        }
    }
}

/// Configuration for a Keywarden service instance.
#[derive(Debug, Clone)]
pub struct KeywardenConfig {
    /// Directory holding the key store, request log and operator profile.
    pub data_dir: PathBuf,

    /// Admission control for the validation endpoint.
    pub rate_limit: RateLimitConfig,

    /// Number of most recent ledger entries kept on disk.
    pub log_retention: usize,

    /// Elevated credential required for key administration.
    /// SECURITY: distinct from the operator's session token.
    pub admin_key: String,

    /// Shared secret required to clear the request log.
    pub clear_logs_key: String,

    /// Avatar seeded into a fresh operator profile.
    pub default_avatar: String,

    /// Username seeded into a fresh operator profile.
    pub default_username: String,
}

impl Default for KeywardenConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            rate_limit: RateLimitConfig::default(),
            log_retention: DEFAULT_LOG_RETENTION,
            admin_key: String::new(),
            clear_logs_key: String::new(),
            default_avatar: String::new(),
            default_username: "admin".to_string(),
        }
    }
}

impl KeywardenConfig {
    /// Build a configuration from `KEYWARDEN_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, KeywardenError> {
        let mut config = Self::default();

        if let Some(dir) = env("KEYWARDEN_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(key) = env("KEYWARDEN_ADMIN_KEY") {
            config.admin_key = key;
        }
        if let Some(key) = env("KEYWARDEN_CLEAR_LOGS_KEY") {
            config.clear_logs_key = key;
        }
        if let Some(avatar) = env("KEYWARDEN_DEFAULT_AVATAR") {
            config.default_avatar = avatar;
        }
        if let Some(username) = env("KEYWARDEN_ADMIN_USERNAME") {
            config.default_username = username;
        }
        if let Some(limit) = env("KEYWARDEN_RATE_LIMIT") {
            config.rate_limit.limit = limit.parse().map_err(|e| {
                KeywardenError::ConfigError(format!("KEYWARDEN_RATE_LIMIT: {}", e))
            })?;
        }
        if let Some(secs) = env("KEYWARDEN_RATE_WINDOW_SECS") {
            let secs: u64 = secs.parse().map_err(|e| {
                KeywardenError::ConfigError(format!("KEYWARDEN_RATE_WINDOW_SECS: {}", e))
            })?;
            config.rate_limit.window = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), KeywardenError> {
        if self.admin_key.is_empty() {
            return Err(KeywardenError::ConfigError(
                "admin_key cannot be empty".to_string(),
            ));
        }
        if self.clear_logs_key.is_empty() {
            return Err(KeywardenError::ConfigError(
                "clear_logs_key cannot be empty".to_string(),
            ));
        }
        if self.admin_key == self.clear_logs_key {
            return Err(KeywardenError::ConfigError(
                "clear_logs_key must differ from admin_key".to_string(),
            ));
        }
        if self.rate_limit.limit == 0 {
            return Err(KeywardenError::ConfigError(
                "rate_limit.limit must be positive".to_string(),
            ));
        }
        if self.rate_limit.window.is_zero() {
            return Err(KeywardenError::ConfigError(
                "rate_limit.window must be positive".to_string(),
            ));
        }
        if self.rate_limit.max_tracked == 0 {
            return Err(KeywardenError::ConfigError(
                "rate_limit.max_tracked must be positive".to_string(),
            ));
        }
        if self.log_retention == 0 {
            return Err(KeywardenError::ConfigError(
                "log_retention must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the key store.
    pub fn key_store_path(&self) -> PathBuf {
        self.data_dir.join(KEY_STORE_FILE)
    }

    /// Path of the request log.
    pub fn log_store_path(&self) -> PathBuf {
        self.data_dir.join(LOG_STORE_FILE)
    }

    /// Path of the operator profile.
    pub fn profile_path(&self) -> PathBuf {
        self.data_dir.join(PROFILE_FILE)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|base| base.join("keywarden"))
        .unwrap_or_else(|| PathBuf::from("db"))
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
