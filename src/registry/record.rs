//! Key record type and its translation to the legacy store layout.
//!
//! In memory a key is a uniform [`KeyRecord`]. On disk the store keeps the
//! legacy shape where each record is an object keyed by its own identifier:
//!
//! ```text
//! [
//!     { "ABC123": { "code": "2025-06-01-00-00", "msg": "trial", "created": "2025-05-01-09-30" } }
//! ]
//! ```

use crate::protocol::models::StoredKey;
use crate::protocol::timestamp::{format_minute, parse_minute};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum key length.
pub const KEY_MIN_LEN: usize = 6;

/// Maximum key length.
pub const KEY_MAX_LEN: usize = 32;

/// Whether `key` is 6-32 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_key_format(key: &str) -> bool {
    (KEY_MIN_LEN..=KEY_MAX_LEN).contains(&key.len())
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// A stored license key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// Opaque key string, unique across the registry.
    pub key: String,
    /// Message returned to the caller on successful validation.
    pub message: String,
    /// Local wall-clock expiry, minute precision.
    pub expiry: NaiveDateTime,
    /// Local wall-clock creation time; never changes after creation.
    pub created: Option<NaiveDateTime>,
}

impl KeyRecord {
    /// Whether the key still grants access at `now`.
    pub fn is_active_at(&self, now: &NaiveDateTime) -> bool {
        *now < self.expiry
    }

    /// Expiry formatted as `YYYY-MM-DD-HH-mm`.
    pub fn expiry_string(&self) -> String {
        format_minute(&self.expiry)
    }

    /// Creation time formatted as `YYYY-MM-DD-HH-mm`.
    pub fn created_string(&self) -> Option<String> {
        self.created.as_ref().map(format_minute)
    }
}

type LegacyEntry = BTreeMap<String, StoredKey>;

/// The full key collection, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<LegacyEntry>", into = "Vec<LegacyEntry>")]
pub struct KeyTable {
    records: Vec<KeyRecord>,
}

impl KeyTable {
    /// Look up a record.
    pub fn find(&self, key: &str) -> Option<&KeyRecord> {
        self.records.iter().find(|r| r.key == key)
    }

    /// Look up a record for mutation.
    pub fn find_mut(&mut self, key: &str) -> Option<&mut KeyRecord> {
        self.records.iter_mut().find(|r| r.key == key)
    }

    /// Whether a record exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Append a record. The caller guarantees `key` is not yet present.
    pub(crate) fn push(&mut self, record: KeyRecord) {
        self.records.push(record);
    }

    /// Remove and return the record for `key`.
    pub fn remove(&mut self, key: &str) -> Option<KeyRecord> {
        let idx = self.records.iter().position(|r| r.key == key)?;
        Some(self.records.remove(idx))
    }

    /// Iterate over records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyRecord> {
        self.records.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<KeyRecord> for KeyTable {
    fn from_iter<I: IntoIterator<Item = KeyRecord>>(iter: I) -> Self {
        let mut table = KeyTable::default();
        for record in iter {
            if !table.contains(&record.key) {
                table.push(record);
            }
        }
        table
    }
}

impl From<Vec<LegacyEntry>> for KeyTable {
    fn from(entries: Vec<LegacyEntry>) -> Self {
        let mut table = KeyTable::default();
        for (key, stored) in entries.into_iter().flatten() {
            let expiry = match parse_minute(&stored.code) {
                Ok(expiry) => expiry,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "key store: skipping record with bad expiry");
                    continue;
                }
            };
            if table.contains(&key) {
                tracing::warn!(key = %key, "key store: skipping duplicate record");
                continue;
            }
            let created = stored.created.as_deref().and_then(|c| parse_minute(c).ok());
            table.push(KeyRecord {
                key,
                message: stored.msg,
                expiry,
                created,
            });
        }
        table
    }
}

impl From<KeyTable> for Vec<LegacyEntry> {
    fn from(table: KeyTable) -> Self {
        table
            .records
            .into_iter()
            .map(|record| {
                let code = record.expiry_string();
                let created = record.created_string();
                let stored = StoredKey {
                    code,
                    msg: record.message,
                    created,
                };
                BTreeMap::from([(record.key, stored)])
            })
            .collect()
    }
}
