pub mod keys;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared cache collaborator: string key to serialized JSON value.
///
/// Entries live until explicitly removed; filter and membership entries are
/// evicted on write (see `filter::row::invalidate_user_filters`), never by
/// TTL. Handles are cheap clones over the same underlying map.
#[derive(Clone, Default)]
pub struct CacheStore {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let map = self.inner.read().await;
        let value = map.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };
        let mut map = self.inner.write().await;
        map.insert(key.to_string(), value);
    }

    pub async fn remove(&self, key: &str) -> bool {
        let mut map = self.inner.write().await;
        map.remove(key).is_some()
    }

    pub async fn contains(&self, key: &str) -> bool {
        let map = self.inner.read().await;
        map.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        let map = self.inner.read().await;
        map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
