//! Keywarden error types.

use thiserror::Error;

/// Errors produced by key administration, validation and the request ledger.
#[derive(Debug, Error)]
pub enum KeywardenError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Malformed key or timestamp.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A record with this key already exists.
    #[error("Key already exists: {key}")]
    DuplicateKey {
        /// The key that was already present.
        key: String,
    },

    /// No record exists for this key.
    #[error("Key not found: {key}")]
    NotFound {
        /// The key that was looked up.
        key: String,
    },

    /// An argument was out of range (e.g. non-positive extension days).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The client exhausted its request window.
    #[error("Too many requests, try again later")]
    RateLimited,

    /// Missing or invalid session or administrative credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Reading or writing persisted state failed.
    #[error("Storage failure: {0}")]
    StorageFailure(String),
}

impl KeywardenError {
    /// Whether this error is caused by the caller's request rather than the service.
    ///
    /// Client errors are request-local: they never leave store state modified.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            KeywardenError::StorageFailure(_) | KeywardenError::ConfigError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_are_not_client_errors() {
        assert!(!KeywardenError::StorageFailure("disk full".into()).is_client_error());
        assert!(KeywardenError::DuplicateKey { key: "ABC123".into() }.is_client_error());
        assert!(KeywardenError::RateLimited.is_client_error());
    }

    #[test]
    fn messages_name_the_key() {
        let err = KeywardenError::NotFound { key: "ABC123".into() };
        assert_eq!(err.to_string(), "Key not found: ABC123");
    }
}
