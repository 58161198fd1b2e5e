//! Cached verification verdict and its persistence.
//!
//! Only a pass/fail flag and two timestamps are stored. The record is JSON so
//! platform preference stores can hold it as a plain string:
//! `{"passed":true,"timestamp":1700000000,"expiryDate":1702592000}`.

use std::sync::Arc;

use agegate_store::{KeyValueStore, StoreError};
use agegate_types::{SubjectId, Timestamp};
use serde::{Deserialize, Serialize};

/// Prefix of the per-subject storage key.
pub const VERDICT_KEY_PREFIX: &str = "agegate.verdict.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedVerdict {
    pub passed: bool,
    #[serde(rename = "timestamp")]
    pub verified_at: Timestamp,
    #[serde(rename = "expiryDate")]
    pub expires_at: Timestamp,
}

impl CachedVerdict {
    /// A passed verdict issued at `now`, valid for `ttl_days`.
    pub fn issue(now: Timestamp, ttl_days: u32) -> Self {
        Self {
            passed: true,
            verified_at: now,
            expires_at: now.plus_days(ttl_days),
        }
    }

    /// Passed and not yet expired (`now < expires_at`).
    pub fn is_valid(&self, now: Timestamp) -> bool {
        self.passed && now < self.expires_at
    }

    /// Whole days until expiry, rounded up; zero once expired.
    pub fn days_remaining(&self, now: Timestamp) -> u64 {
        self.expires_at.days_until(now)
    }
}

/// Reads and writes one subject's verdict in a key-value store.
pub struct VerdictCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl VerdictCache {
    pub fn new(store: Arc<dyn KeyValueStore>, subject: &SubjectId) -> Self {
        Self {
            store,
            key: format!("{VERDICT_KEY_PREFIX}{subject}"),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the stored verdict.
    ///
    /// A record that does not parse is logged and treated as absent, which
    /// forces a fresh verification rather than trusting damaged data.
    pub fn load(&self) -> Result<Option<CachedVerdict>, StoreError> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<CachedVerdict>(&raw) {
            Ok(verdict) => Ok(Some(verdict)),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "discarding unreadable verdict record");
                Ok(None)
            }
        }
    }

    pub fn save(&self, verdict: &CachedVerdict) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(verdict).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.set(&self.key, &json)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.delete(&self.key)
    }
}
