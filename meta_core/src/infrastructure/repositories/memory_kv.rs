//! In-memory [`KvStore`] adapter used by unit and integration tests.

use std::collections::HashMap;

use async_trait::async_trait;
use meta_core_domain::repositories::KvStore;
use meta_core_domain::value_objects::HashId;
use meta_core_domain::CoreError;
use parking_lot::RwLock;

#[derive(Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn put_fields(&self, hash_id: &HashId, fields: HashMap<String, String>) -> Result<(), CoreError> {
        self.entries.write().entry(hash_id.to_string()).or_default().extend(fields);
        Ok(())
    }

    async fn get_fields(&self, hash_id: &HashId) -> Result<HashMap<String, String>, CoreError> {
        Ok(self.entries.read().get(hash_id.as_str()).cloned().unwrap_or_default())
    }

    async fn remove(&self, hash_id: &HashId) -> Result<(), CoreError> {
        self.entries.write().remove(hash_id.as_str());
        Ok(())
    }

    async fn list_hash_ids(&self) -> Result<Vec<HashId>, CoreError> {
        self.entries.read().keys().map(|k| HashId::from_hex(k.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_merges_fields() {
        let store = InMemoryKvStore::new();
        let hash_id = HashId::from_hex("b".repeat(64)).unwrap();
        store.put_fields(&hash_id, HashMap::from([("tag".to_string(), "x".to_string())])).await.unwrap();
        store.put_fields(&hash_id, HashMap::from([("tag2".to_string(), "y".to_string())])).await.unwrap();
        let fields = store.get_fields(&hash_id).await.unwrap();
        assert_eq!(fields.get("tag"), Some(&"x".to_string()));
        assert_eq!(fields.get("tag2"), Some(&"y".to_string()));
    }

    #[tokio::test]
    async fn remove_clears_entry() {
        let store = InMemoryKvStore::new();
        let hash_id = HashId::from_hex("c".repeat(64)).unwrap();
        store.put_fields(&hash_id, HashMap::from([("a".to_string(), "1".to_string())])).await.unwrap();
        store.remove(&hash_id).await.unwrap();
        assert!(store.get_fields(&hash_id).await.unwrap().is_empty());
    }
}
