//! Persisted description of one plugin and the fleet it should run as.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::value_objects::PluginId;

/// Classification hint used to route a plugin's tasks to the `fast` or
/// `background` pipeline pool. Advisory: when a descriptor omits it, the
/// scheduler infers it from the plugin's observed average execution time
/// against a 1-second threshold.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueClass {
    Fast,
    Background,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimits {
    pub memory_bytes: u64,
    pub cpu_millis: u32,
}

/// Declared metadata/config schema and descriptive fields fetched from a
/// running instance's `GET /manifest`. Absent until at least one instance
/// has reported healthy and been queried.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub plugin_id: String,
    pub version: String,
    pub description: String,
    pub default_queue: Option<QueueClass>,
    pub config_schema: Value,
    pub metadata_schema: Value,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub plugin_id: PluginId,
    pub image: String,
    pub instance_count: u32,
    pub resources: ResourceLimits,
    pub default_queue: Option<QueueClass>,
    pub active: bool,
    pub manifest: Option<PluginManifest>,
    pub config: HashMap<String, Value>,
}

impl PluginDescriptor {
    pub fn new(plugin_id: PluginId, image: impl Into<String>) -> Self {
        Self {
            plugin_id,
            image: image.into(),
            instance_count: 1,
            resources: ResourceLimits {
                memory_bytes: 512 * 1024 * 1024,
                cpu_millis: 1000,
            },
            default_queue: None,
            active: true,
            manifest: None,
            config: HashMap::new(),
        }
    }

    /// Resolves the effective queue class, falling back to the manifest's
    /// declared default, and finally to the average-duration inference the
    /// scheduler performs when both are absent.
    pub fn declared_queue_class(&self) -> Option<QueueClass> {
        self.default_queue
            .or_else(|| self.manifest.as_ref().and_then(|m| m.default_queue))
    }

    pub fn is_dispatchable(&self) -> bool {
        self.active && self.instance_count > 0
    }
}

/// Wrapper persisted as the plugin descriptor document: `{version, plugins:
/// {[id]: descriptor}}`, written via write-temp-then-rename.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptorDocument {
    pub version: u32,
    pub plugins: HashMap<String, PluginDescriptor>,
}

/// Average-execution-time threshold (seconds) used to infer a queue class
/// when a descriptor declares none.
pub const QUEUE_CLASS_INFERENCE_THRESHOLD_SECS: f64 = 1.0;

pub fn infer_queue_class(average_duration_secs: f64) -> QueueClass {
    if average_duration_secs < QUEUE_CLASS_INFERENCE_THRESHOLD_SECS {
        QueueClass::Fast
    } else {
        QueueClass::Background
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_threshold_is_one_second() {
        assert_eq!(infer_queue_class(0.5), QueueClass::Fast);
        assert_eq!(infer_queue_class(1.0), QueueClass::Background);
        assert_eq!(infer_queue_class(2.0), QueueClass::Background);
    }

    #[test]
    fn not_dispatchable_with_zero_instances() {
        let mut d = PluginDescriptor::new(PluginId::new("hasher").unwrap(), "img:1");
        d.instance_count = 0;
        assert!(!d.is_dispatchable());
    }
}
