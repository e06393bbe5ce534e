//! Registry of persisted keys owned by the authenticated session.
//!
//! Components that persist session-scoped data register their keys here, so
//! the logout purge list can't drift from what is actually written. The
//! remembered-credential keys are tracked separately and are never purged.

use std::collections::BTreeSet;
use std::sync::RwLock;

use crate::error::{Error, Result};

/// Persisted timestamp of the most recent backgrounding.
pub const BACKGROUND_MARKER_KEY: &str = "app_background_time";

// Authentication
pub const AUTH_TOKEN: &str = "auth_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const USER_ID: &str = "user_id";
pub const MOBILE_NUMBER: &str = "mobile_number";

// Policy / member selection
pub const SELECTED_POLICY_ID: &str = "selected_policy_id";
pub const SELECTED_POLICY_NUMBER: &str = "selected_policy_number";
pub const SELECTED_MEMBER_ID: &str = "selected_member_id";
pub const SELECTED_MEMBER_NAME: &str = "selected_member_name";

// Navigation / refresh flags
pub const CLAIMS_REFRESH_FLAG: &str = "claims_refresh_required";
pub const POLICY_REFRESH_FLAG: &str = "policy_refresh_required";
pub const PENDING_CLAIM_DRAFT: &str = "pending_claim_draft";

// Remembered credentials (survive logout)
pub const REMEMBERED_MOBILE_NUMBER: &str = "remembered_mobile_number";
pub const REMEMBER_ME: &str = "remember_me";

/// Session-scoped keys purged on logout, besides the background marker.
pub const DEFAULT_SESSION_KEYS: &[&str] = &[
    AUTH_TOKEN,
    REFRESH_TOKEN,
    USER_ID,
    MOBILE_NUMBER,
    SELECTED_POLICY_ID,
    SELECTED_POLICY_NUMBER,
    SELECTED_MEMBER_ID,
    SELECTED_MEMBER_NAME,
    CLAIMS_REFRESH_FLAG,
    POLICY_REFRESH_FLAG,
    PENDING_CLAIM_DRAFT,
];

/// Keys kept across logout to pre-fill the next login.
pub const DEFAULT_REMEMBERED_KEYS: &[&str] = &[REMEMBERED_MOBILE_NUMBER, REMEMBER_ME];

#[derive(Debug, Default)]
struct KeySets {
    session: BTreeSet<String>,
    remembered: BTreeSet<String>,
}

/// Central owner of the session purge list.
#[derive(Debug)]
pub struct SessionKeyRegistry {
    sets: RwLock<KeySets>,
}

impl Default for SessionKeyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SessionKeyRegistry {
    /// Registry with only the background marker as a session key.
    pub fn empty() -> Self {
        let mut sets = KeySets::default();
        sets.session.insert(BACKGROUND_MARKER_KEY.to_string());
        Self {
            sets: RwLock::new(sets),
        }
    }

    /// Registry seeded with the client's known session and remembered keys.
    pub fn with_defaults() -> Self {
        let mut sets = KeySets::default();
        sets.session.insert(BACKGROUND_MARKER_KEY.to_string());
        sets.session.extend(DEFAULT_SESSION_KEYS.iter().map(|k| k.to_string()));
        sets.remembered.extend(DEFAULT_REMEMBERED_KEYS.iter().map(|k| k.to_string()));
        Self {
            sets: RwLock::new(sets),
        }
    }

    /// Register a key to be purged on logout.
    ///
    /// Returns `Ok(false)` if it was already registered.
    pub fn register_session_key(&self, key: impl Into<String>) -> Result<bool> {
        let key = key.into();
        let mut sets = self.sets.write().map_err(|_| Error::LockPoisoned)?;
        if sets.remembered.contains(&key) {
            return Err(Error::KeyConflict(key));
        }
        Ok(sets.session.insert(key))
    }

    /// Register a key that must survive logout.
    pub fn register_remembered_key(&self, key: impl Into<String>) -> Result<bool> {
        let key = key.into();
        let mut sets = self.sets.write().map_err(|_| Error::LockPoisoned)?;
        if sets.session.contains(&key) {
            return Err(Error::KeyConflict(key));
        }
        Ok(sets.remembered.insert(key))
    }

    /// Snapshot of the purge list, sorted.
    pub fn session_keys(&self) -> Result<Vec<String>> {
        let sets = self.sets.read().map_err(|_| Error::LockPoisoned)?;
        Ok(sets.session.iter().cloned().collect())
    }

    pub fn remembered_keys(&self) -> Result<Vec<String>> {
        let sets = self.sets.read().map_err(|_| Error::LockPoisoned)?;
        Ok(sets.remembered.iter().cloned().collect())
    }

    pub fn is_session_key(&self, key: &str) -> bool {
        self.sets
            .read()
            .map(|sets| sets.session.contains(key))
            .unwrap_or(false)
    }
}
