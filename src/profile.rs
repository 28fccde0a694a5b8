//! Operator profile: a singleton document read and written as a whole.

use crate::store::JsonStore;
use crate::KeywardenError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Dashboard color theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    Light,
    /// Dark theme.
    Dark,
    /// Follow the client's preference.
    #[default]
    Auto,
}

/// The operator's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Avatar path or URL.
    pub avatar: String,
    /// Preferred theme.
    #[serde(default)]
    pub theme: Theme,
    /// Display username.
    pub username: String,
}

/// Partial profile update; `None` and empty strings leave a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// New avatar path or URL.
    #[serde(default)]
    pub avatar: Option<String>,
    /// New theme.
    #[serde(default)]
    pub theme: Option<Theme>,
    /// New username.
    #[serde(default)]
    pub username: Option<String>,
}

/// Persisted operator profile.
pub struct ProfileStore {
    store: JsonStore<UserConfig>,
    defaults: UserConfig,
}

impl ProfileStore {
    /// Open the profile at `path`; `defaults` seeds a missing document.
    pub fn open(path: impl Into<PathBuf>, defaults: UserConfig) -> Result<Self, KeywardenError> {
        Ok(Self {
            store: JsonStore::open(path)?,
            defaults,
        })
    }

    /// Current profile. A missing profile is seeded with the defaults and saved.
    pub fn read(&self) -> UserConfig {
        match self.store.load() {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                // Seed under the writer lock so a concurrent first update wins.
                let defaults = self.defaults.clone();
                self.store
                    .update(|| defaults, |profile| Ok(profile.clone()))
                    .unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "profile: failed to seed default profile");
                        self.defaults.clone()
                    })
            }
            Err(e) => {
                tracing::warn!(error = %e, "profile: unreadable profile, using defaults");
                self.defaults.clone()
            }
        }
    }

    /// Apply the non-empty fields of `patch` and persist the result.
    pub fn update(&self, patch: &ProfileUpdate) -> Result<UserConfig, KeywardenError> {
        let defaults = self.defaults.clone();
        let updated = self.store.update(
            || defaults,
            |profile| {
                if let Some(avatar) = patch.avatar.as_deref().filter(|a| !a.is_empty()) {
                    profile.avatar = avatar.to_string();
                }
                if let Some(theme) = patch.theme {
                    profile.theme = theme;
                }
                if let Some(username) = patch.username.as_deref().filter(|u| !u.is_empty()) {
                    profile.username = username.to_string();
                }
                Ok(profile.clone())
            },
        )?;

        tracing::info!(username = %updated.username, "profile: updated");
        Ok(updated)
    }
}
