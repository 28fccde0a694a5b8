//! File-backed JSON document store with atomic writes.
//!
//! Each store holds one JSON document that is always read and written as a
//! whole. Writes go to a temp sibling, are synced, then renamed over the
//! target, so a reader never observes a truncated document.
//!
//! Mutations go through [`JsonStore::update`], which holds the store's writer
//! lock across the read-modify-write sequence. Reads take no lock.

use crate::KeywardenError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A single JSON document persisted at a fixed path.
pub struct JsonStore<T> {
    /// Target document path.
    path: PathBuf,
    /// Serializes writers; readers rely on rename atomicity instead.
    writer: Mutex<()>,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open a store at `path`, creating the parent directory if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, KeywardenError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                KeywardenError::StorageFailure(format!("Failed to create store dir: {}", e))
            })?;
        }

        Ok(Self {
            path,
            writer: Mutex::new(()),
            _doc: PhantomData,
        })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, or `None` when it does not exist yet.
    ///
    /// Parse failures are reported as `StorageFailure`.
    pub fn load(&self) -> Result<Option<T>, KeywardenError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path).map_err(|e| {
            KeywardenError::StorageFailure(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        if json.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&json).map(Some).map_err(|e| {
            KeywardenError::StorageFailure(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    /// Load the document, falling back to `fallback()` when it is missing or unreadable.
    ///
    /// Unreadable documents are logged, never propagated.
    pub fn read_or_else(&self, fallback: impl FnOnce() -> T) -> T {
        match self.load() {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "store: no document, using fallback");
                fallback()
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "store: unreadable document, using fallback");
                fallback()
            }
        }
    }

    /// Replace the whole document atomically.
    pub fn write(&self, doc: &T) -> Result<(), KeywardenError> {
        let _guard = self.lock_writer();
        self.write_unlocked(doc)
    }

    /// Read-modify-write under the writer lock.
    ///
    /// `mutate` receives the current document (or the fallback). The document is
    /// persisted only when `mutate` succeeds; its error is returned untouched.
    pub fn update<R>(
        &self,
        fallback: impl FnOnce() -> T,
        mutate: impl FnOnce(&mut T) -> Result<R, KeywardenError>,
    ) -> Result<R, KeywardenError> {
        let _guard = self.lock_writer();
        let mut doc = self.read_or_else(fallback);
        let out = mutate(&mut doc)?;
        self.write_unlocked(&doc)?;
        Ok(out)
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state.
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_unlocked(&self, doc: &T) -> Result<(), KeywardenError> {
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| KeywardenError::StorageFailure(format!("Failed to serialize: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = File::create(&temp_path)
            .map_err(|e| KeywardenError::StorageFailure(format!("Failed to create temp file: {}", e)))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| KeywardenError::StorageFailure(format!("Failed to write temp file: {}", e)))?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .map_err(|e| KeywardenError::StorageFailure(format!("Failed to rename store file: {}", e)))?;

        tracing::debug!(path = %self.path.display(), bytes = json.len(), "store: document saved");
        Ok(())
    }
}
