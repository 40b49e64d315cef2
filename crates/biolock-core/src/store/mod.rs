//! Durable key-value storage for the lock setting
//!
//! The guard only ever reads and writes a single key holding `"true"` or
//! `"false"`. Missing, unreadable or malformed values mean disabled.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;

/// Default key for the persisted enabled flag
pub const BIOMETRIC_ENABLED_KEY: &str = "biometric_enabled";

/// Result type alias for store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Key-value storage that survives process restarts
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key was never written
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value durably
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// Persisted lock policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock-on-launch requested by the user
    pub enabled: bool,
}

impl LockConfig {
    /// Read the policy from the store
    pub async fn load(store: &dyn KeyValueStore, key: &str) -> Self {
        let enabled = match store.get(key).await {
            Ok(Some(value)) => parse_flag(&value),
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to load biometric setting, treating as disabled: {}", e);
                false
            }
        };
        Self { enabled }
    }

    /// Write the policy to the store
    pub async fn save(&self, store: &dyn KeyValueStore, key: &str) -> StoreResult<()> {
        store.set(key, encode_flag(self.enabled)).await
    }
}

fn parse_flag(value: &str) -> bool {
    if value == "true" {
        return true;
    }
    if value != "false" {
        warn!("Unrecognised biometric setting value {:?}, treating as disabled", value);
    }
    false
}

fn encode_flag(enabled: bool) -> &'static str {
    if enabled {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_disabled() {
        let store = MemoryStore::new();
        let config = LockConfig::load(&store, BIOMETRIC_ENABLED_KEY).await;
        assert!(!config.enabled);
    }

    #[tokio::test]
    async fn test_roundtrip_through_store() {
        let store = MemoryStore::new();
        LockConfig { enabled: true }
            .save(&store, BIOMETRIC_ENABLED_KEY)
            .await
            .unwrap();

        assert_eq!(
            store.get(BIOMETRIC_ENABLED_KEY).await.unwrap().as_deref(),
            Some("true")
        );
        assert!(LockConfig::load(&store, BIOMETRIC_ENABLED_KEY).await.enabled);
    }

    #[tokio::test]
    async fn test_garbage_value_is_disabled() {
        let store = MemoryStore::new();
        store.set(BIOMETRIC_ENABLED_KEY, "yes").await.unwrap();
        assert!(!LockConfig::load(&store, BIOMETRIC_ENABLED_KEY).await.enabled);
    }

    #[tokio::test]
    async fn test_read_failure_is_disabled() {
        let store = MemoryStore::new();
        store.set(BIOMETRIC_ENABLED_KEY, "true").await.unwrap();
        store.fail_reads(true);
        assert!(!LockConfig::load(&store, BIOMETRIC_ENABLED_KEY).await.enabled);
    }
}
