//! Key registry: creation, extension, deletion and listing of key records.
//!
//! Every mutation runs as one read-modify-write under the key store's writer
//! lock, so concurrent administrative calls never lose an update.

use crate::clock::Clock;
use crate::protocol::models::KeyView;
use crate::protocol::timestamp::{ceil_to_minute, days_until, parse_minute};
use crate::registry::record::{is_valid_key_format, KeyRecord, KeyTable};
use crate::store::JsonStore;
use crate::KeywardenError;
use chrono::Duration;
use std::path::PathBuf;
use std::sync::Arc;

/// CRUD and expiry logic over the persisted key table.
pub struct KeyRegistry {
    store: JsonStore<KeyTable>,
    clock: Arc<dyn Clock>,
}

impl KeyRegistry {
    /// Open the registry backed by the key store at `path`.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self, KeywardenError> {
        Ok(Self {
            store: JsonStore::open(path)?,
            clock,
        })
    }

    /// Create a key.
    ///
    /// # Errors
    /// - `InvalidFormat` - key is not 6-32 chars of `[A-Za-z0-9_-]`, or `expiry`
    ///   is not `YYYY-MM-DD-HH-mm`
    /// - `InvalidArgument` - empty message
    /// - `DuplicateKey` - key already present
    /// - `StorageFailure` - the store could not be written
    pub fn add(&self, key: &str, message: &str, expiry: &str) -> Result<KeyRecord, KeywardenError> {
        if !is_valid_key_format(key) {
            return Err(KeywardenError::InvalidFormat(
                "key must be 6-32 letters, digits, underscores or hyphens".to_string(),
            ));
        }
        if message.is_empty() {
            return Err(KeywardenError::InvalidArgument(
                "message cannot be empty".to_string(),
            ));
        }
        let expiry = parse_minute(expiry)?;

        let record = KeyRecord {
            key: key.to_string(),
            message: message.to_string(),
            expiry,
            created: Some(self.clock.now_local()),
        };

        let created = self.store.update(KeyTable::default, |table| {
            if table.contains(key) {
                return Err(KeywardenError::DuplicateKey {
                    key: key.to_string(),
                });
            }
            table.push(record.clone());
            Ok(record)
        })?;

        tracing::info!(key = %key, expiry = %created.expiry_string(), "registry: key created");
        Ok(created)
    }

    /// Remove a key.
    pub fn delete(&self, key: &str) -> Result<KeyRecord, KeywardenError> {
        let removed = self.store.update(KeyTable::default, |table| {
            table.remove(key).ok_or_else(|| KeywardenError::NotFound {
                key: key.to_string(),
            })
        })?;

        tracing::info!(key = %key, "registry: key deleted");
        Ok(removed)
    }

    /// Push a key's expiry `days` days past the later of now and its current expiry.
    ///
    /// An expired key is extended from the present, never from its stale expiry.
    pub fn extend(&self, key: &str, days: i64) -> Result<KeyRecord, KeywardenError> {
        if days <= 0 {
            return Err(KeywardenError::InvalidArgument(format!(
                "days must be a positive integer, got {}",
                days
            )));
        }
        let span = Duration::try_days(days).ok_or_else(|| {
            KeywardenError::InvalidArgument(format!("days out of range: {}", days))
        })?;
        let now = ceil_to_minute(self.clock.now_local());

        let updated = self.store.update(KeyTable::default, |table| {
            let record = table.find_mut(key).ok_or_else(|| KeywardenError::NotFound {
                key: key.to_string(),
            })?;
            let base = record.expiry.max(now);
            record.expiry = base.checked_add_signed(span).ok_or_else(|| {
                KeywardenError::InvalidArgument(format!("days out of range: {}", days))
            })?;
            Ok(record.clone())
        })?;

        tracing::info!(key = %key, days, expiry = %updated.expiry_string(), "registry: key extended");
        Ok(updated)
    }

    /// All records with `isExpired` and `remainingDays` computed against now.
    pub fn list(&self) -> Vec<KeyView> {
        let now = self.clock.now_local();
        self.snapshot()
            .iter()
            .map(|record| KeyView {
                key: record.key.clone(),
                msg: record.message.clone(),
                expiry: record.expiry_string(),
                is_expired: now > record.expiry,
                remaining_days: days_until(&now, &record.expiry),
                created: record.created_string(),
            })
            .collect()
    }

    /// The raw record for `key`.
    pub fn get(&self, key: &str) -> Result<KeyRecord, KeywardenError> {
        self.snapshot()
            .find(key)
            .cloned()
            .ok_or_else(|| KeywardenError::NotFound {
                key: key.to_string(),
            })
    }

    /// Current contents of the key store; empty if it is missing or unreadable.
    pub fn snapshot(&self) -> KeyTable {
        self.store.read_or_else(KeyTable::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<MockClock>, KeyRegistry) {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(MockClock::new(
            Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
        ));
        let registry = KeyRegistry::open(dir.path().join("app_key.json"), clock.clone()).unwrap();
        (dir, clock, registry)
    }

    #[test]
    fn test_add_then_get() {
        let (_dir, _clock, registry) = setup();

        registry.add("ABC123", "trial", "2025-02-01-00-00").unwrap();

        let record = registry.get("ABC123").unwrap();
        assert_eq!(record.message, "trial");
        assert_eq!(record.expiry_string(), "2025-02-01-00-00");
        assert_eq!(record.created_string().as_deref(), Some("2025-01-15-12-00"));
    }

    #[test]
    fn test_add_rejects_duplicate() {
        let (_dir, _clock, registry) = setup();

        registry.add("ABC123", "trial", "2025-02-01-00-00").unwrap();
        let result = registry.add("ABC123", "other", "2026-02-01-00-00");

        assert!(matches!(result, Err(KeywardenError::DuplicateKey { key }) if key == "ABC123"));
        assert_eq!(registry.get("ABC123").unwrap().message, "trial");
    }

    #[test]
    fn test_add_rejects_bad_format() {
        let (_dir, _clock, registry) = setup();

        assert!(matches!(
            registry.add("ab", "m", "2025-02-01-00-00"),
            Err(KeywardenError::InvalidFormat(_))
        ));
        assert!(matches!(
            registry.add("key!", "m", "2025-02-01-00-00"),
            Err(KeywardenError::InvalidFormat(_))
        ));
        assert!(matches!(
            registry.add("ABC123", "m", "2024/01/01"),
            Err(KeywardenError::InvalidFormat(_))
        ));
        assert!(matches!(
            registry.add("ABC123", "", "2025-02-01-00-00"),
            Err(KeywardenError::InvalidArgument(_))
        ));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_add_then_delete() {
        let (_dir, _clock, registry) = setup();

        registry.add("ABC123", "trial", "2025-02-01-00-00").unwrap();
        registry.delete("ABC123").unwrap();

        assert!(matches!(registry.get("ABC123"), Err(KeywardenError::NotFound { .. })));
        assert!(matches!(registry.delete("ABC123"), Err(KeywardenError::NotFound { .. })));
    }

    #[test]
    fn test_extend_unexpired_key_from_expiry() {
        let (_dir, _clock, registry) = setup();
        registry.add("ABC123", "trial", "2025-02-01-00-00").unwrap();

        let record = registry.extend("ABC123", 10).unwrap();

        assert_eq!(record.expiry_string(), "2025-02-11-00-00");
    }

    #[test]
    fn test_extend_expired_key_from_now() {
        let (_dir, _clock, registry) = setup();
        registry.add("OLDKEY", "trial", "2024-06-01-00-00").unwrap();

        let record = registry.extend("OLDKEY", 3).unwrap();

        assert_eq!(record.expiry_string(), "2025-01-18-12-00");
    }

    #[test]
    fn test_extend_rounds_partial_minute_up() {
        let (_dir, clock, registry) = setup();
        registry.add("OLDKEY", "trial", "2024-06-01-00-00").unwrap();
        clock.advance(chrono::Duration::seconds(30));

        let record = registry.extend("OLDKEY", 1).unwrap();

        assert_eq!(record.expiry_string(), "2025-01-16-12-01");
        assert!(record.expiry >= clock.now_local() + Duration::days(1));
    }

    #[test]
    fn test_extend_rejects_bad_days() {
        let (_dir, _clock, registry) = setup();
        registry.add("ABC123", "trial", "2025-02-01-00-00").unwrap();

        assert!(matches!(registry.extend("ABC123", 0), Err(KeywardenError::InvalidArgument(_))));
        assert!(matches!(registry.extend("ABC123", -5), Err(KeywardenError::InvalidArgument(_))));
        assert!(matches!(registry.extend("NOSUCH", 5), Err(KeywardenError::NotFound { .. })));
        assert_eq!(registry.get("ABC123").unwrap().expiry_string(), "2025-02-01-00-00");
    }

    #[test]
    fn test_list_enriches_records() {
        let (_dir, _clock, registry) = setup();
        registry.add("ACTIVE1", "a", "2025-01-20-13-00").unwrap();
        registry.add("EXPIRED1", "b", "2025-01-10-12-00").unwrap();

        let views = registry.list();

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].key, "ACTIVE1");
        assert!(!views[0].is_expired);
        assert_eq!(views[0].remaining_days, 5);
        assert!(views[1].is_expired);
        assert_eq!(views[1].remaining_days, -5);
    }

    #[test]
    fn test_list_is_idempotent() {
        let (_dir, _clock, registry) = setup();
        registry.add("ABC123", "trial", "2025-02-01-00-00").unwrap();

        assert_eq!(registry.list(), registry.list());
    }

    #[test]
    fn test_state_survives_reopen() {
        let (dir, clock, registry) = setup();
        registry.add("ABC123", "trial", "2025-02-01-00-00").unwrap();
        drop(registry);

        let reopened = KeyRegistry::open(dir.path().join("app_key.json"), clock).unwrap();
        assert_eq!(reopened.get("ABC123").unwrap().message, "trial");
    }

    #[test]
    fn test_concurrent_adds_all_persist() {
        let (_dir, _clock, registry) = setup();
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .add(&format!("KEY{:04}", i), "bulk", "2025-02-01-00-00")
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().len(), 10);
    }
}
