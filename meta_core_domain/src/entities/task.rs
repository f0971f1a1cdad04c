//! Ephemeral, in-memory dispatch record. A `Task` exists only for the
//! lifetime of one plugin invocation: created on dispatch, destroyed on
//! callback arrival or timeout. Never persisted.

use chrono::{DateTime, Utc};

use crate::entities::plugin_descriptor::QueueClass;
use crate::value_objects::{HashId, PluginId, PluginInstanceId, TaskId};

#[derive(Debug, Clone)]
pub struct Task {
    pub task_id: TaskId,
    pub plugin_id: PluginId,
    pub file_path: std::path::PathBuf,
    pub hash_id: Option<HashId>,
    pub queue_class: QueueClass,
    pub force_recompute: bool,
    pub start_time: DateTime<Utc>,
    pub chosen_instance: Option<PluginInstanceId>,
}

impl Task {
    pub fn new(
        plugin_id: PluginId,
        file_path: std::path::PathBuf,
        hash_id: Option<HashId>,
        queue_class: QueueClass,
        force_recompute: bool,
    ) -> Self {
        Self {
            task_id: TaskId::new(),
            plugin_id,
            file_path,
            hash_id,
            queue_class,
            force_recompute,
            start_time: Utc::now(),
            chosen_instance: None,
        }
    }

    /// Key used to deduplicate concurrent tasks for the same plugin against
    /// the same file: at most one may be in-flight at once.
    pub fn dedup_key(&self) -> (PluginId, std::path::PathBuf) {
        (self.plugin_id.clone(), self.file_path.clone())
    }
}
