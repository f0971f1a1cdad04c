//! Persistence adapter (component I). Normalises the accumulated per-plugin
//! outputs for a completed file into the KV store's flat `key -> string`
//! schema.

use std::collections::HashMap;

use meta_core_domain::repositories::KvStore;
use meta_core_domain::value_objects::{HashId, PluginId};
use meta_core_domain::CoreError;
use serde_json::Value;
use std::sync::Arc;

/// Keys no plugin output may clobber: transient processing-status fields
/// that belong to the registry, not the persisted metadata.
const RESERVED_KEYS: &[&str] = &["status", "taskId", "__internal"];

pub struct PersistenceAdapter {
    kv: Arc<dyn KvStore>,
}

impl PersistenceAdapter {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Flattens every plugin's reported metadata at its bare top-level key
    /// (`tag`, not `tagger/tag`) and writes the merged map under the file's
    /// `hashId`. A key is only namespaced under its contributing plugin's id
    /// when two or more plugins report that same key -- the common case of
    /// a single plugin owning a field stays unprefixed.
    pub async fn persist(&self, hash_id: &HashId, outputs: &[(PluginId, Value)]) -> Result<(), CoreError> {
        let mut per_plugin = Vec::with_capacity(outputs.len());
        for (plugin_id, value) in outputs {
            let mut fields = HashMap::new();
            flatten("", value, &mut fields);
            per_plugin.push((plugin_id.as_str().to_string(), fields));
        }

        let mut key_counts: HashMap<String, usize> = HashMap::new();
        for (_, fields) in &per_plugin {
            for key in fields.keys() {
                *key_counts.entry(key.clone()).or_insert(0) += 1;
            }
        }

        let mut merged = HashMap::new();
        for (plugin_id, fields) in per_plugin {
            for (key, value) in fields {
                let qualified = if key_counts.get(&key).copied().unwrap_or(0) > 1 {
                    format!("{plugin_id}/{key}")
                } else {
                    key
                };
                merged.insert(qualified, value);
            }
        }
        self.kv.put_fields(hash_id, merged).await
    }

    pub async fn clear(&self, hash_id: &HashId) -> Result<(), CoreError> {
        self.kv.remove(hash_id).await
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if RESERVED_KEYS.contains(&key.as_str()) {
                    continue;
                }
                let joined = if prefix.is_empty() { key.clone() } else { format!("{prefix}/{key}") };
                flatten(&joined, child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let joined = if prefix.is_empty() { index.to_string() } else { format!("{prefix}/{index}") };
                flatten(&joined, child, out);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct MemoryKv {
        data: Mutex<HashMap<String, HashMap<String, String>>>,
    }

    #[async_trait]
    impl KvStore for MemoryKv {
        async fn put_fields(&self, hash_id: &HashId, fields: HashMap<String, String>) -> Result<(), CoreError> {
            self.data.lock().unwrap().entry(hash_id.to_string()).or_default().extend(fields);
            Ok(())
        }
        async fn get_fields(&self, hash_id: &HashId) -> Result<HashMap<String, String>, CoreError> {
            Ok(self.data.lock().unwrap().get(hash_id.as_str()).cloned().unwrap_or_default())
        }
        async fn remove(&self, hash_id: &HashId) -> Result<(), CoreError> {
            self.data.lock().unwrap().remove(hash_id.as_str());
            Ok(())
        }
        async fn list_hash_ids(&self) -> Result<Vec<HashId>, CoreError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn flattens_nested_metadata_at_bare_keys() {
        let kv = Arc::new(MemoryKv { data: Mutex::new(HashMap::new()) });
        let adapter = PersistenceAdapter::new(kv.clone());
        let hash_id = HashId::from_hex("a".repeat(64)).unwrap();
        let plugin_id = PluginId::new("tagger").unwrap();
        let output = json!({"tag": "x", "status": "ok", "nested": {"a": 1}, "list": ["p", "q"]});
        adapter.persist(&hash_id, &[(plugin_id, output)]).await.unwrap();

        let fields = kv.get_fields(&hash_id).await.unwrap();
        assert_eq!(fields.get("tag"), Some(&"x".to_string()));
        assert_eq!(fields.get("nested/a"), Some(&"1".to_string()));
        assert_eq!(fields.get("list/0"), Some(&"p".to_string()));
        assert!(!fields.contains_key("status"));
    }

    #[tokio::test]
    async fn namespaces_only_keys_that_collide_across_plugins() {
        let kv = Arc::new(MemoryKv { data: Mutex::new(HashMap::new()) });
        let adapter = PersistenceAdapter::new(kv.clone());
        let hash_id = HashId::from_hex("b".repeat(64)).unwrap();
        let tagger = PluginId::new("tagger").unwrap();
        let hasher = PluginId::new("hasher").unwrap();
        let outputs = [
            (tagger, json!({"tag": "x", "confidence": 0.9})),
            (hasher, json!({"confidence": 0.5, "digest": "abc"})),
        ];
        adapter.persist(&hash_id, &outputs).await.unwrap();

        let fields = kv.get_fields(&hash_id).await.unwrap();
        assert_eq!(fields.get("tag"), Some(&"x".to_string()));
        assert_eq!(fields.get("digest"), Some(&"abc".to_string()));
        assert!(!fields.contains_key("confidence"), "colliding key must not survive unprefixed");
        assert_eq!(fields.get("tagger/confidence"), Some(&"0.9".to_string()));
        assert_eq!(fields.get("hasher/confidence"), Some(&"0.5".to_string()));
    }
}
