use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use super::{StateStore, StateStoreError};

/// Volatile in-memory state store for development and tests.
///
/// Records live in a two-level map keyed by namespace, then key. Suitable
/// as the default backend since durability is out of scope for the store
/// contract.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: Mutex<FxHashMap<String, FxHashMap<String, Value>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.records
            .lock()
            .get(namespace)
            .map(|ns| ns.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    /// Keys currently present in `namespace`, in arbitrary order.
    pub fn keys(&self, namespace: &str) -> Vec<String> {
        self.records
            .lock()
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StateStoreError> {
        self.records
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StateStoreError> {
        Ok(self
            .records
            .lock()
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_replaces_whole_record() {
        let store = MemoryStateStore::new();
        store
            .set("pipelines", "p-1", json!({"status": "fetching", "source": "s1"}))
            .await
            .unwrap();
        store
            .set("pipelines", "p-1", json!({"status": "transforming"}))
            .await
            .unwrap();

        let record = store.get("pipelines", "p-1").await.unwrap().unwrap();
        assert_eq!(record, json!({"status": "transforming"}));
        assert!(record.get("source").is_none(), "no field-level merge");
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let store = MemoryStateStore::new();
        store.set("pipelines", "k", json!(1)).await.unwrap();
        store.set("campaigns", "k", json!(2)).await.unwrap();

        assert_eq!(store.get("pipelines", "k").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get("campaigns", "k").await.unwrap(), Some(json!(2)));
        assert_eq!(store.get("reports", "k").await.unwrap(), None);
    }
}
