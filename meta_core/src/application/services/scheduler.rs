//! Task scheduler (component E). Bridges the pipeline and the container
//! fleet: turns "run plugin P on file F" into a dispatched, tracked task,
//! and exposes recompute-all.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use meta_core_domain::entities::{GateState, PluginDescriptor, QueueClass, Task};
use meta_core_domain::repositories::KvStore;
use meta_core_domain::services::{PluginClient, RunRequest};
use meta_core_domain::value_objects::{HashId, PluginId, PluginInstanceId, TaskId};
use meta_core_domain::CoreError;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

use crate::infrastructure::container::ContainerManager;
use crate::infrastructure::runtime::{join_supervised, spawn_supervised};
use crate::infrastructure::CoreMetrics;

use super::gate::DrainObservable;

/// Bounded backoff applied when no healthy instance is available for a
/// plugin: capped at 5 attempts, roughly 8 seconds total (Open Question
/// resolution, see DESIGN.md).
const NO_HEALTHY_INSTANCE_MAX_ATTEMPTS: u32 = 5;
const NO_HEALTHY_INSTANCE_BACKOFFS: [Duration; 5] = [
    Duration::from_millis(250),
    Duration::from_millis(500),
    Duration::from_millis(1_000),
    Duration::from_millis(2_000),
    Duration::from_millis(4_000),
];

#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub status: CallbackStatus,
    pub metadata: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CallbackStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone)]
pub struct RunningTaskView {
    pub task_id: TaskId,
    pub plugin_id: PluginId,
    pub path: PathBuf,
    pub queue_class: QueueClass,
    pub start_time: DateTime<Utc>,
}

struct PendingEntry {
    task: Task,
    instance_index: u32,
    sender: broadcast::Sender<CallbackOutcome>,
}

pub struct TaskScheduler {
    gate: Arc<GateState>,
    containers: Arc<ContainerManager>,
    plugin_client: Arc<dyn PluginClient>,
    kv_store: Arc<dyn KvStore>,
    pending: RwLock<HashMap<TaskId, PendingEntry>>,
    dedup: RwLock<HashMap<(PluginId, PathBuf), TaskId>>,
    task_deadline: Duration,
    metrics: Arc<CoreMetrics>,
}

impl TaskScheduler {
    pub fn new(
        gate: Arc<GateState>,
        containers: Arc<ContainerManager>,
        plugin_client: Arc<dyn PluginClient>,
        kv_store: Arc<dyn KvStore>,
        task_deadline: Duration,
        metrics: Arc<CoreMetrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            gate,
            containers,
            plugin_client,
            kv_store,
            pending: RwLock::new(HashMap::new()),
            dedup: RwLock::new(HashMap::new()),
            task_deadline,
            metrics,
        })
    }

    pub fn create_tasks_for_plugin_on_files(
        &self,
        descriptor: &PluginDescriptor,
        files: &[(PathBuf, Option<HashId>)],
        force_recompute: bool,
        queue_class: QueueClass,
    ) -> Vec<Task> {
        files
            .iter()
            .map(|(path, hash_id)| {
                Task::new(descriptor.plugin_id.clone(), path.clone(), hash_id.clone(), queue_class, force_recompute)
            })
            .collect()
    }

    /// Dispatches every task concurrently and waits for all of them to
    /// settle (success or failure). Used by the pipeline so that a file's
    /// fast-class tasks all complete before it enters the background
    /// stage.
    pub async fn enqueue_and_wait(self: &Arc<Self>, tasks: Vec<Task>) -> Vec<Result<Value, CoreError>> {
        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| {
                let scheduler = self.clone();
                spawn_supervised("plugin-dispatch", async move { scheduler.dispatch_one(task).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(join_supervised(handle).await);
        }
        results
    }

    async fn dispatch_one(self: &Arc<Self>, task: Task) -> Result<Value, CoreError> {
        let dedup_key = task.dedup_key();

        // If a task for this (plugin, path) pair is already in flight, join
        // its waiter instead of dispatching a second one.
        let existing_receiver = {
            let dedup = self.dedup.read();
            dedup.get(&dedup_key).and_then(|task_id| {
                let pending = self.pending.read();
                pending.get(task_id).map(|entry| entry.sender.subscribe())
            })
        };
        if let Some(mut receiver) = existing_receiver {
            return match receiver.recv().await {
                Ok(outcome) => outcome_to_result(outcome),
                Err(_) => Err(CoreError::dispatch_failed("joined task's waiter was dropped")),
            };
        }

        while !self.gate.is_open() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let instance = self.select_with_backoff(task.plugin_id.as_str()).await?;

        let (sender, mut receiver) = broadcast::channel(1);
        let task_id = task.task_id.clone();
        {
            self.dedup.write().insert(dedup_key.clone(), task_id.clone());
            self.pending.write().insert(
                task_id.clone(),
                PendingEntry {
                    task: task.clone(),
                    instance_index: instance.instance_index,
                    sender,
                },
            );
        }

        let kv_snapshot = match &task.hash_id {
            Some(hash_id) => self.kv_store.get_fields(hash_id).await.unwrap_or_default(),
            None => Default::default(),
        };
        let request = RunRequest {
            task_id: task_id.clone(),
            path: task.file_path.clone(),
            hash_id: task.hash_id.as_ref().map(|h| h.to_string()),
            force_recompute: task.force_recompute,
            kv_snapshot: serde_json::to_value(kv_snapshot).unwrap_or_default(),
        };

        if let Err(err) = self.plugin_client.run(&instance.base_url, &request).await {
            self.metrics.record_task_failure(task.plugin_id.as_str());
            self.remove_pending(&task_id, &dedup_key);
            return Err(err);
        }
        self.metrics.record_dispatch(task.plugin_id.as_str());

        let outcome = tokio::time::timeout(self.task_deadline, receiver.recv()).await;
        self.remove_pending(&task_id, &dedup_key);

        match outcome {
            Ok(Ok(outcome)) => {
                self.containers
                    .record_task_result(task.plugin_id.as_str(), instance.instance_index, outcome.status == CallbackStatus::Ok);
                if outcome.status == CallbackStatus::Error {
                    self.metrics.record_task_failure(task.plugin_id.as_str());
                }
                outcome_to_result(outcome)
            }
            Ok(Err(_)) => {
                self.metrics.record_task_failure(task.plugin_id.as_str());
                Err(CoreError::internal("callback waiter dropped before resolution"))
            }
            Err(_) => {
                self.containers.record_task_result(task.plugin_id.as_str(), instance.instance_index, false);
                self.metrics.record_task_failure(task.plugin_id.as_str());
                Err(CoreError::TimeoutError(format!(
                    "task {task_id} for plugin {} timed out waiting for callback",
                    task.plugin_id
                )))
            }
        }
    }

    async fn select_with_backoff(&self, plugin_id: &str) -> Result<meta_core_domain::entities::PluginInstance, CoreError> {
        for attempt in 0..NO_HEALTHY_INSTANCE_MAX_ATTEMPTS {
            if let Some(instance) = self.containers.select_healthy(plugin_id) {
                return Ok(instance);
            }
            warn!(plugin_id, attempt, "no healthy instance, backing off");
            tokio::time::sleep(NO_HEALTHY_INSTANCE_BACKOFFS[attempt as usize]).await;
        }
        Err(CoreError::dispatch_failed(format!(
            "no healthy instance for plugin {plugin_id} after {NO_HEALTHY_INSTANCE_MAX_ATTEMPTS} attempts"
        )))
    }

    fn remove_pending(&self, task_id: &TaskId, dedup_key: &(PluginId, PathBuf)) {
        self.pending.write().remove(task_id);
        let mut dedup = self.dedup.write();
        if dedup.get(dedup_key) == Some(task_id) {
            dedup.remove(dedup_key);
        }
    }

    /// Delivers a callback to its waiting task, if any. Returns `false` for
    /// an unknown `taskId`. Idempotent: a second delivery for the same
    /// `taskId` after the first has already been removed is a no-op.
    pub fn handle_callback(&self, task_id: &TaskId, outcome: CallbackOutcome) -> bool {
        let pending = self.pending.read();
        match pending.get(task_id) {
            Some(entry) => {
                self.metrics.record_callback(match outcome.status {
                    CallbackStatus::Ok => "ok",
                    CallbackStatus::Error => "error",
                });
                let _ = entry.sender.send(outcome);
                true
            }
            None => {
                self.metrics.record_callback("unknown_task");
                false
            }
        }
    }

    pub fn running_tasks(&self) -> Vec<RunningTaskView> {
        self.pending
            .read()
            .values()
            .map(|entry| RunningTaskView {
                task_id: entry.task.task_id.clone(),
                plugin_id: entry.task.plugin_id.clone(),
                path: entry.task.file_path.clone(),
                queue_class: entry.task.queue_class,
                start_time: entry.task.start_time,
            })
            .collect()
    }

    pub fn pending_count_for_queue(&self, queue_class: QueueClass) -> usize {
        self.pending.read().values().filter(|e| e.task.queue_class == queue_class).count()
    }
}

fn outcome_to_result(outcome: CallbackOutcome) -> Result<Value, CoreError> {
    match outcome.status {
        CallbackStatus::Ok => Ok(outcome.metadata.unwrap_or(Value::Null)),
        CallbackStatus::Error => Err(CoreError::plugin_error(outcome.error.unwrap_or_else(|| "plugin reported error".into()))),
    }
}

impl DrainObservable for TaskScheduler {
    fn running(&self) -> usize {
        self.pending.read().len()
    }
    fn pending(&self) -> usize {
        0
    }
    fn label(&self) -> &str {
        "scheduler-pending-tasks"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meta_core_domain::entities::{PluginDescriptorDocument, ResourceLimits};
    use meta_core_domain::repositories::PluginDescriptorStore;
    use meta_core_domain::services::{HealthResponse, ManifestResponse};
    use meta_core_domain::services::ContainerRuntime;
    use meta_core_domain::services::container_runtime::SpawnSpec;

    fn test_metrics() -> Arc<CoreMetrics> {
        Arc::new(CoreMetrics::new().unwrap())
    }
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct NoopRuntime;
    #[async_trait]
    impl ContainerRuntime for NoopRuntime {
        async fn ensure_network(&self, _name: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn remove_if_exists(&self, _n: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn remove_labelled(&self, _k: &str, _v: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn spawn(&self, _spec: &SpawnSpec) -> Result<PluginInstanceId, CoreError> {
            PluginInstanceId::new("c0")
        }
        async fn stop_and_remove(&self, _id: &PluginInstanceId, _g: u32) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct RecordingClient {
        run_calls: AtomicUsize,
        healthy: AtomicBool,
    }
    #[async_trait]
    impl PluginClient for RecordingClient {
        async fn health(&self, _base_url: &str) -> Result<HealthResponse, CoreError> {
            Ok(HealthResponse { status: "healthy".into(), ready: true })
        }
        async fn manifest(&self, _base_url: &str) -> Result<ManifestResponse, CoreError> {
            Ok(ManifestResponse {
                plugin_id: "tagger".into(),
                version: "1".into(),
                description: "d".into(),
                default_queue: Some("fast".into()),
                config_schema: serde_json::json!({}),
                metadata_schema: serde_json::json!({}),
                dependencies: vec![],
            })
        }
        async fn configure(&self, _base_url: &str, _config: &Value) -> Result<(), CoreError> {
            Ok(())
        }
        async fn run(&self, _base_url: &str, _request: &RunRequest) -> Result<(), CoreError> {
            self.run_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MemoryKv;
    #[async_trait]
    impl KvStore for MemoryKv {
        async fn put_fields(&self, _hash_id: &HashId, _fields: HashMap<String, String>) -> Result<(), CoreError> {
            Ok(())
        }
        async fn get_fields(&self, _hash_id: &HashId) -> Result<HashMap<String, String>, CoreError> {
            Ok(HashMap::new())
        }
        async fn remove(&self, _hash_id: &HashId) -> Result<(), CoreError> {
            Ok(())
        }
        async fn list_hash_ids(&self) -> Result<Vec<HashId>, CoreError> {
            Ok(vec![])
        }
    }

    struct MemoryStore;
    #[async_trait]
    impl PluginDescriptorStore for MemoryStore {
        async fn load(&self) -> Result<PluginDescriptorDocument, CoreError> {
            Ok(PluginDescriptorDocument::default())
        }
        async fn save(&self, _d: &PluginDescriptorDocument) -> Result<(), CoreError> {
            Ok(())
        }
    }

    async fn sample_scheduler() -> (Arc<TaskScheduler>, Arc<ContainerManager>, Arc<GateState>) {
        let containers = ContainerManager::new(
            Arc::new(NoopRuntime),
            Arc::new(RecordingClient { run_calls: AtomicUsize::new(0), healthy: AtomicBool::new(true) }),
            Arc::new(MemoryStore),
            crate::infrastructure::container::WorkerEnvironment {
                callback_url: "http://core/callback".into(),
                meta_core_url: "http://core".into(),
                webdav_url: "http://webdav".into(),
                network: "net".into(),
                cache_base_dir: None,
            },
        );
        let plugin_id = PluginId::new("tagger").unwrap();
        containers.add_plugin(plugin_id.clone(), "img:1".into()).await.unwrap();
        containers.spawn_instance(plugin_id.as_str(), 0).await.unwrap();

        let gate = Arc::new(GateState::new());
        let client: Arc<dyn PluginClient> = Arc::new(RecordingClient { run_calls: AtomicUsize::new(0), healthy: AtomicBool::new(true) });
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv);
        let scheduler = TaskScheduler::new(gate.clone(), containers.clone(), client, kv, Duration::from_millis(200), test_metrics());
        (scheduler, containers, gate)
    }

    #[tokio::test]
    async fn dispatch_fails_without_healthy_instance() {
        let (scheduler, _containers, _gate) = sample_scheduler().await;
        // No instance has been transitioned to Healthy yet.
        let task = Task::new(PluginId::new("tagger").unwrap(), "/watch/a.mkv".into(), None, QueueClass::Fast, false);
        let results = scheduler.enqueue_and_wait(vec![task]).await;
        assert!(results[0].is_err());
    }

    #[tokio::test]
    async fn gate_closed_blocks_dispatch_until_reopened() {
        let (scheduler, _containers, gate) = sample_scheduler().await;
        gate.close();
        let task = Task::new(PluginId::new("tagger").unwrap(), "/watch/a.mkv".into(), None, QueueClass::Fast, false);
        let scheduler2 = scheduler.clone();
        let handle = tokio::spawn(async move { scheduler2.enqueue_and_wait(vec![task]).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());
        gate.reopen();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[test]
    fn callback_for_unknown_task_returns_false() {
        let gate = Arc::new(GateState::new());
        let containers = ContainerManager::new(
            Arc::new(NoopRuntime),
            Arc::new(RecordingClient { run_calls: AtomicUsize::new(0), healthy: AtomicBool::new(true) }),
            Arc::new(MemoryStore),
            crate::infrastructure::container::WorkerEnvironment {
                callback_url: "http://core/callback".into(),
                meta_core_url: "http://core".into(),
                webdav_url: "http://webdav".into(),
                network: "net".into(),
                cache_base_dir: None,
            },
        );
        let client: Arc<dyn PluginClient> = Arc::new(RecordingClient { run_calls: AtomicUsize::new(0), healthy: AtomicBool::new(true) });
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv);
        let scheduler = TaskScheduler::new(gate, containers, client, kv, Duration::from_secs(1), test_metrics());
        let unknown = TaskId::new();
        assert!(!scheduler.handle_callback(&unknown, CallbackOutcome { status: CallbackStatus::Ok, metadata: None, error: None }));
    }
}
