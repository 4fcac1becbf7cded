//! Record store and per-server configuration collaborators.
//!
//! Handlers persist their own data (macros, custom settings) through a
//! [`RecordStore`]: named record sets holding JSON records addressed by key.
//! The engine itself only reads a handful of per-server string values
//! through [`ServerConfig`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StoreResult;

/// Record set used by [`RecordServerConfig`].
pub const SERVER_CONFIG_SET: &str = "server_config";

/// Key/record storage over named record sets.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Fetches a record.
    async fn get(&self, set: &str, key: &str) -> StoreResult<Option<Value>>;

    /// Creates or replaces a record. Returns `true` when the record was created.
    async fn put(&self, set: &str, key: &str, value: Value) -> StoreResult<bool>;

    /// Removes a record. Returns `true` when a record existed.
    async fn delete(&self, set: &str, key: &str) -> StoreResult<bool>;

    /// Lists all records of a set, ordered by key.
    async fn list(&self, set: &str) -> StoreResult<Vec<(String, Value)>>;
}

/// A shared record store trait object.
pub type BoxedStore = Arc<dyn RecordStore>;

/// In-process [`RecordStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    sets: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, set: &str, key: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .sets
            .read()
            .get(set)
            .and_then(|records| records.get(key))
            .cloned())
    }

    async fn put(&self, set: &str, key: &str, value: Value) -> StoreResult<bool> {
        let mut sets = self.sets.write();
        let previous = sets
            .entry(set.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(previous.is_none())
    }

    async fn delete(&self, set: &str, key: &str) -> StoreResult<bool> {
        Ok(self
            .sets
            .write()
            .get_mut(set)
            .and_then(|records| records.remove(key))
            .is_some())
    }

    async fn list(&self, set: &str) -> StoreResult<Vec<(String, Value)>> {
        Ok(self
            .sets
            .read()
            .get(set)
            .map(|records| {
                records
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Per-server named string settings.
#[async_trait]
pub trait ServerConfig: Send + Sync + 'static {
    /// Reads a value for a server.
    async fn get(&self, server_id: &str, key: &str) -> Option<String>;

    /// Writes a value for a server.
    async fn set(&self, server_id: &str, key: &str, value: &str) -> StoreResult<()>;

    /// Reads a value, falling back to `default` when unset.
    async fn get_or(&self, server_id: &str, key: &str, default: &str) -> String {
        self.get(server_id, key)
            .await
            .unwrap_or_else(|| default.to_string())
    }
}

/// A shared server config trait object.
pub type BoxedServerConfig = Arc<dyn ServerConfig>;

/// [`ServerConfig`] persisted in a [`RecordStore`] under
/// [`SERVER_CONFIG_SET`], one record per `server_id/key`.
pub struct RecordServerConfig {
    store: BoxedStore,
}

impl RecordServerConfig {
    pub fn new(store: BoxedStore) -> Self {
        Self { store }
    }

    fn record_key(server_id: &str, key: &str) -> String {
        format!("{server_id}/{key}")
    }
}

#[async_trait]
impl ServerConfig for RecordServerConfig {
    async fn get(&self, server_id: &str, key: &str) -> Option<String> {
        match self
            .store
            .get(SERVER_CONFIG_SET, &Self::record_key(server_id, key))
            .await
        {
            Ok(Some(Value::String(value))) => Some(value),
            Ok(Some(other)) => Some(other.to_string()),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(server_id, key, error = %e, "Failed to read server config");
                None
            }
        }
    }

    async fn set(&self, server_id: &str, key: &str, value: &str) -> StoreResult<()> {
        self.store
            .put(
                SERVER_CONFIG_SET,
                &Self::record_key(server_id, key),
                Value::String(value.to_string()),
            )
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_crud() {
        let store = MemoryStore::new();

        assert!(store.put("macros", "hi", json!({"content": "hello"})).await.unwrap());
        assert!(!store.put("macros", "hi", json!({"content": "hey"})).await.unwrap());
        assert_eq!(
            store.get("macros", "hi").await.unwrap(),
            Some(json!({"content": "hey"}))
        );

        store.put("macros", "a", json!(1)).await.unwrap();
        let keys: Vec<String> = store
            .list("macros")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["a", "hi"]);

        assert!(store.delete("macros", "hi").await.unwrap());
        assert!(!store.delete("macros", "hi").await.unwrap());
        assert!(store.list("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_server_config() {
        let config = RecordServerConfig::new(Arc::new(MemoryStore::new()));

        assert_eq!(config.get("s1", "command_prefix").await, None);
        assert_eq!(config.get_or("s1", "command_prefix", "!").await, "!");

        config.set("s1", "command_prefix", "?").await.unwrap();
        assert_eq!(config.get_or("s1", "command_prefix", "!").await, "?");
        assert_eq!(config.get("s2", "command_prefix").await, None);
    }
}
