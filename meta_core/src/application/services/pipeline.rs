//! Streaming pipeline (component C). Three pools from [`super::work_queue`]
//! wired into the validation -> fast -> background flow described in
//! spec §4.C, backed by the processing-state registry, the task scheduler,
//! and the persistence adapter.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use meta_core_domain::entities::QueueClass;
use meta_core_domain::services::{compute_full_hash, compute_midhash};
use tracing::{error, info, instrument, warn};

use crate::infrastructure::container::ContainerManager;
use crate::infrastructure::CoreMetrics;

use super::persistence::PersistenceAdapter;
use super::scheduler::TaskScheduler;
use super::state_registry::StateRegistry;
use super::work_queue::WorkQueue;

#[derive(Debug, Clone, Copy)]
pub struct PipelineConcurrency {
    pub validation: usize,
    pub fast: usize,
    pub background: usize,
}

impl PipelineConcurrency {
    /// Defaults from spec §4.C: `2*cpu`, `cpu`, `cpu/2`.
    pub fn from_available_parallelism() -> Self {
        let cpu = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self {
            validation: (cpu * 2).max(1),
            fast: cpu.max(1),
            background: (cpu / 2).max(1),
        }
    }
}

pub struct Pipeline {
    validation: Arc<WorkQueue>,
    fast: Arc<WorkQueue>,
    background: Arc<WorkQueue>,
    allowed_extensions: HashSet<String>,
    state: Arc<StateRegistry>,
    scheduler: Arc<TaskScheduler>,
    containers: Arc<ContainerManager>,
    persistence: Arc<PersistenceAdapter>,
}

impl Pipeline {
    pub fn new(
        concurrency: PipelineConcurrency,
        allowed_extensions: HashSet<String>,
        state: Arc<StateRegistry>,
        scheduler: Arc<TaskScheduler>,
        containers: Arc<ContainerManager>,
        persistence: Arc<PersistenceAdapter>,
        metrics: Arc<CoreMetrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            validation: Arc::new(WorkQueue::new("validation", concurrency.validation, metrics.clone())),
            fast: Arc::new(WorkQueue::new("fast", concurrency.fast, metrics.clone())),
            background: Arc::new(WorkQueue::new("background", concurrency.background, metrics)),
            allowed_extensions,
            state,
            scheduler,
            containers,
            persistence,
        })
    }

    /// Validates `path`'s extension against the allow-list and its
    /// non-directory status; on success enqueues the fast stage. A rejected
    /// path leaves no entry in the registry.
    #[instrument(skip(self))]
    pub fn admit(self: &Arc<Self>, path: PathBuf) {
        let pipeline = self.clone();
        self.validation.submit(async move {
            if !pipeline.is_admissible(&path).await {
                warn!(?path, "rejected at validation: extension or type not admissible");
                return;
            }
            pipeline.state.add_discovered(&path);
            pipeline.enqueue_fast(path);
        });
    }

    async fn is_admissible(&self, path: &Path) -> bool {
        let extension_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.allowed_extensions.contains(&e.to_ascii_lowercase()))
            .unwrap_or(false);
        if !extension_ok {
            return false;
        }
        match tokio::fs::metadata(path).await {
            Ok(meta) => !meta.is_dir(),
            Err(_) => false,
        }
    }

    fn enqueue_fast(self: &Arc<Self>, path: PathBuf) {
        let pipeline = self.clone();
        self.fast.submit(async move {
            if let Err(err) = pipeline.run_fast_stage(&path).await {
                error!(?path, %err, "fast stage failed");
                pipeline.state.mark_failed(&path, format!("fast stage: {err}"));
            }
        });
    }

    /// Runs the fast-class plugins and carries their reported metadata
    /// forward so the background stage can fold it into a single persisted
    /// record alongside the background-class outputs (component I persists
    /// once, at the end of the pipeline, over the full accumulated set).
    #[instrument(skip(self))]
    async fn run_fast_stage(self: &Arc<Self>, path: &Path) -> Result<(), meta_core_domain::CoreError> {
        self.state.begin_light(path)?;
        let hash_id = compute_midhash(path).await?;

        let descriptors = self
            .containers
            .active_descriptors_for_queue(QueueClass::Fast, infer_queue_class_from_descriptor);
        let files = vec![(path.to_path_buf(), Some(hash_id.clone()))];
        let mut fast_outputs = Vec::new();
        for descriptor in &descriptors {
            let tasks = self.scheduler.create_tasks_for_plugin_on_files(descriptor, &files, false, QueueClass::Fast);
            let results = self.scheduler.enqueue_and_wait(tasks).await;
            for result in results {
                fast_outputs.push((descriptor.plugin_id.clone(), result?));
            }
        }

        self.state.complete_light(path, hash_id)?;
        self.enqueue_background(path.to_path_buf(), fast_outputs);
        Ok(())
    }

    fn enqueue_background(self: &Arc<Self>, path: PathBuf, fast_outputs: Vec<(meta_core_domain::value_objects::PluginId, serde_json::Value)>) {
        let pipeline = self.clone();
        self.background.submit(async move {
            if let Err(err) = pipeline.run_background_stage(&path, fast_outputs).await {
                error!(?path, %err, "background stage failed");
                pipeline.state.mark_failed(&path, format!("background stage: {err}"));
            }
        });
    }

    #[instrument(skip(self, fast_outputs))]
    async fn run_background_stage(
        self: &Arc<Self>,
        path: &Path,
        mut fast_outputs: Vec<(meta_core_domain::value_objects::PluginId, serde_json::Value)>,
    ) -> Result<(), meta_core_domain::CoreError> {
        self.state.begin_hash(path)?;
        let hash_id = compute_full_hash(path).await?;

        let descriptors = self
            .containers
            .active_descriptors_for_queue(QueueClass::Background, infer_queue_class_from_descriptor);
        let files = vec![(path.to_path_buf(), Some(hash_id.clone()))];
        for descriptor in &descriptors {
            let tasks = self.scheduler.create_tasks_for_plugin_on_files(descriptor, &files, false, QueueClass::Background);
            let results = self.scheduler.enqueue_and_wait(tasks).await;
            for result in results {
                fast_outputs.push((descriptor.plugin_id.clone(), result?));
            }
        }

        self.persistence.persist(&hash_id, &fast_outputs).await?;
        self.state.complete_hash(path)?;
        info!(?path, %hash_id, "file done");
        Ok(())
    }

    /// Pauses all three pools in order (validation, fast, background); does
    /// not cancel work already in flight.
    pub fn pause(&self) {
        self.validation.pause();
        self.fast.pause();
        self.background.pause();
    }

    /// Resumes all three pools in the reverse order.
    pub fn resume(&self) {
        self.background.resume();
        self.fast.resume();
        self.validation.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.validation.is_paused() || self.fast.is_paused() || self.background.is_paused()
    }

    pub fn validation_queue(&self) -> Arc<WorkQueue> {
        self.validation.clone()
    }

    pub fn fast_queue(&self) -> Arc<WorkQueue> {
        self.fast.clone()
    }

    pub fn background_queue(&self) -> Arc<WorkQueue> {
        self.background.clone()
    }
}

/// Fallback classification for a plugin descriptor with no declared
/// `defaultQueue`: a stub until average execution time is tracked
/// per-plugin. Defaults new, unobserved plugins into the fast queue.
fn infer_queue_class_from_descriptor(_descriptor: &meta_core_domain::entities::PluginDescriptor) -> QueueClass {
    QueueClass::Fast
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meta_core_domain::entities::{GateState, PluginDescriptorDocument};
    use meta_core_domain::repositories::{KvStore, PluginDescriptorStore};
    use meta_core_domain::services::{ContainerRuntime, HealthResponse, ManifestResponse, PluginClient, RunRequest, SpawnSpec};
    use meta_core_domain::value_objects::{HashId, PluginId, PluginInstanceId};
    use meta_core_domain::CoreError;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    fn test_metrics() -> Arc<CoreMetrics> {
        Arc::new(CoreMetrics::new().unwrap())
    }

    struct NoopRuntime;
    #[async_trait]
    impl ContainerRuntime for NoopRuntime {
        async fn ensure_network(&self, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn remove_if_exists(&self, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn remove_labelled(&self, _: &str, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn spawn(&self, _: &SpawnSpec) -> Result<PluginInstanceId, CoreError> {
            PluginInstanceId::new("c0")
        }
        async fn stop_and_remove(&self, _: &PluginInstanceId, _: u32) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct TaggingClient;
    #[async_trait]
    impl PluginClient for TaggingClient {
        async fn health(&self, _: &str) -> Result<HealthResponse, CoreError> {
            Ok(HealthResponse { status: "healthy".into(), ready: true })
        }
        async fn manifest(&self, _: &str) -> Result<ManifestResponse, CoreError> {
            Ok(ManifestResponse {
                plugin_id: "tagger".into(),
                version: "1".into(),
                description: "d".into(),
                default_queue: Some("fast".into()),
                config_schema: json!({}),
                metadata_schema: json!({}),
                dependencies: vec![],
            })
        }
        async fn configure(&self, _: &str, _: &Value) -> Result<(), CoreError> {
            Ok(())
        }
        async fn run(&self, _: &str, _: &RunRequest) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct MemoryKv(Mutex<HashMap<String, HashMap<String, String>>>);
    #[async_trait]
    impl KvStore for MemoryKv {
        async fn put_fields(&self, hash_id: &HashId, fields: HashMap<String, String>) -> Result<(), CoreError> {
            self.0.lock().unwrap().entry(hash_id.to_string()).or_default().extend(fields);
            Ok(())
        }
        async fn get_fields(&self, hash_id: &HashId) -> Result<HashMap<String, String>, CoreError> {
            Ok(self.0.lock().unwrap().get(hash_id.as_str()).cloned().unwrap_or_default())
        }
        async fn remove(&self, hash_id: &HashId) -> Result<(), CoreError> {
            self.0.lock().unwrap().remove(hash_id.as_str());
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
        async fn save(&self, _: &PluginDescriptorDocument) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn admits_then_rejects_bad_extension() {
        let tmp = tempfile::Builder::new().suffix(".mkv").tempfile().unwrap();
        tokio::fs::write(tmp.path(), b"hello world").await.unwrap();

        let containers = ContainerManager::new(
            Arc::new(NoopRuntime),
            Arc::new(TaggingClient),
            Arc::new(MemoryStore),
            crate::infrastructure::container::WorkerEnvironment {
                callback_url: "http://core/callback".into(),
                meta_core_url: "http://core".into(),
                webdav_url: "http://webdav".into(),
                network: "net".into(),
                cache_base_dir: None,
            },
        );
        let gate = Arc::new(GateState::new());
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv(Mutex::new(HashMap::new())));
        let scheduler =
            TaskScheduler::new(gate, containers.clone(), Arc::new(TaggingClient), kv.clone(), Duration::from_secs(5), test_metrics());
        let state = StateRegistry::new();
        let persistence = Arc::new(PersistenceAdapter::new(kv));

        let mut allowed = HashSet::new();
        allowed.insert("mkv".to_string());
        let pipeline = Pipeline::new(
            PipelineConcurrency { validation: 1, fast: 1, background: 1 },
            allowed,
            state.clone(),
            scheduler,
            containers,
            persistence,
            test_metrics(),
        );

        pipeline.admit(tmp.path().to_path_buf());
        pipeline.admit(PathBuf::from("/nowhere/file.exe"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(pipeline.validation.drain(Duration::from_secs(1)).await);
        assert!(pipeline.fast.drain(Duration::from_secs(1)).await);
        assert!(pipeline.background.drain(Duration::from_secs(1)).await);

        assert!(state.get(&PathBuf::from("/nowhere/file.exe")).is_none());
        let record = state.get(tmp.path()).expect("admitted file should have a record");
        assert_eq!(record.state, meta_core_domain::entities::ProcessingState::Done);
    }

    #[test]
    fn pause_resume_reverse_order_is_consistent() {
        let containers = ContainerManager::new(
            Arc::new(NoopRuntime),
            Arc::new(TaggingClient),
            Arc::new(MemoryStore),
            crate::infrastructure::container::WorkerEnvironment {
                callback_url: "http://core/callback".into(),
                meta_core_url: "http://core".into(),
                webdav_url: "http://webdav".into(),
                network: "net".into(),
                cache_base_dir: None,
            },
        );
        let gate = Arc::new(GateState::new());
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv(Mutex::new(HashMap::new())));
        let scheduler =
            TaskScheduler::new(gate, containers.clone(), Arc::new(TaggingClient), kv.clone(), Duration::from_secs(5), test_metrics());
        let persistence = Arc::new(PersistenceAdapter::new(kv));
        let pipeline = Pipeline::new(
            PipelineConcurrency { validation: 1, fast: 1, background: 1 },
            HashSet::new(),
            StateRegistry::new(),
            scheduler,
            containers,
            persistence,
            test_metrics(),
        );
        assert!(!pipeline.is_paused());
        pipeline.pause();
        assert!(pipeline.is_paused());
        pipeline.resume();
        assert!(!pipeline.is_paused());
    }
}
