//! Container lifecycle manager (component D). Owns the fleet of plugin
//! worker containers: spawn, health-check, round-robin selection, and
//! serialised descriptor mutation with atomic persistence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use meta_core_domain::entities::{
    container_name, InstanceStatus, PluginDescriptor, PluginDescriptorDocument, PluginInstance, QueueClass,
    ResourceLimits,
};
use meta_core_domain::repositories::PluginDescriptorStore;
use meta_core_domain::services::{ContainerRuntime, HealthResponse, PluginClient, SpawnSpec};
use meta_core_domain::value_objects::PluginId;
use meta_core_domain::CoreError;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const INITIAL_HEALTHY_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_GRACE_PERIOD_SECS: u32 = 10;
pub const PLUGIN_LABEL_KEY: &str = "plugin";
pub const PLUGIN_LABEL_VALUE: &str = "true";

/// Environment shared by every plugin container, per the plugin worker
/// contract (§6).
#[derive(Debug, Clone)]
pub struct WorkerEnvironment {
    pub callback_url: String,
    pub meta_core_url: String,
    pub webdav_url: String,
    pub network: String,
    pub cache_base_dir: Option<String>,
}

struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
        }
    }

    /// Walks the cursor forward over the full `len`-element instance list,
    /// skipping entries `eligible` rejects, and returns the first accepted
    /// index. The cursor always advances over the full list rather than a
    /// freshly filtered healthy subset, so an instance's index keeps its
    /// position in the rotation across health transitions instead of the
    /// modulus being renormalized underneath it. `None` if no element in a
    /// full pass of `len` is eligible.
    fn next_eligible(&self, len: usize, eligible: impl Fn(usize) -> bool) -> Option<usize> {
        if len == 0 {
            return None;
        }
        for _ in 0..len {
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
            if eligible(idx) {
                return Some(idx);
            }
        }
        None
    }
}

pub struct ContainerManager {
    runtime: Arc<dyn ContainerRuntime>,
    client: Arc<dyn PluginClient>,
    store: Arc<dyn PluginDescriptorStore>,
    env: WorkerEnvironment,
    descriptors: RwLock<HashMap<String, PluginDescriptor>>,
    instances: RwLock<HashMap<String, Vec<PluginInstance>>>,
    round_robin: RwLock<HashMap<String, RoundRobin>>,
    health_loops: AsyncMutex<HashMap<String, JoinHandle<()>>>,
    mutation_lock: AsyncMutex<()>,
}

impl ContainerManager {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        client: Arc<dyn PluginClient>,
        store: Arc<dyn PluginDescriptorStore>,
        env: WorkerEnvironment,
    ) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            client,
            store,
            env,
            descriptors: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            round_robin: RwLock::new(HashMap::new()),
            health_loops: AsyncMutex::new(HashMap::new()),
            mutation_lock: AsyncMutex::new(()),
        })
    }

    /// Loads descriptors from the configuration document, clears any stale
    /// fleet left over from a previous run, and spawns every active
    /// plugin's instances.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), CoreError> {
        let document = self.store.load().await?;
        {
            let mut descriptors = self.descriptors.write();
            *descriptors = document.plugins;
        }

        self.runtime.ensure_network(&self.env.network).await?;
        self.runtime
            .remove_labelled(PLUGIN_LABEL_KEY, PLUGIN_LABEL_VALUE)
            .await?;

        let plugin_ids: Vec<String> = self.descriptors.read().keys().cloned().collect();
        for plugin_id in plugin_ids {
            self.spawn_plugin_fleet(&plugin_id).await?;
        }
        Ok(())
    }

    async fn spawn_plugin_fleet(self: &Arc<Self>, plugin_id: &str) -> Result<(), CoreError> {
        let (active, instance_count) = {
            let descriptors = self.descriptors.read();
            let descriptor = descriptors
                .get(plugin_id)
                .ok_or_else(|| CoreError::NotFound(format!("unknown plugin {plugin_id}")))?;
            (descriptor.active, descriptor.instance_count)
        };
        if !active {
            return Ok(());
        }
        for index in 0..instance_count {
            self.spawn_instance(plugin_id, index).await?;
        }
        self.start_health_loop(plugin_id).await;
        self.wait_for_first_healthy(plugin_id, INITIAL_HEALTHY_TIMEOUT).await;
        self.refresh_manifest_and_config(plugin_id).await?;
        Ok(())
    }

    /// Removes any pre-existing container of the target name, creates and
    /// starts a new one, and records it as `starting`.
    pub async fn spawn_instance(&self, plugin_id: &str, index: u32) -> Result<(), CoreError> {
        let descriptor = self
            .descriptors
            .read()
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("unknown plugin {plugin_id}")))?;

        let name = container_name(plugin_id, index);
        self.runtime.remove_if_exists(&name).await?;

        let mut labels = HashMap::new();
        labels.insert(PLUGIN_LABEL_KEY.to_string(), PLUGIN_LABEL_VALUE.to_string());
        labels.insert("plugin.id".to_string(), plugin_id.to_string());
        labels.insert("plugin.instance".to_string(), index.to_string());

        let mut env = HashMap::new();
        env.insert("PLUGIN_ID".to_string(), plugin_id.to_string());
        env.insert("CALLBACK_URL".to_string(), self.env.callback_url.clone());
        env.insert("META_CORE_URL".to_string(), self.env.meta_core_url.clone());
        env.insert("WEBDAV_URL".to_string(), self.env.webdav_url.clone());
        env.insert("FILES_PATH".to_string(), "/files".to_string());

        let cache_mount = self
            .env
            .cache_base_dir
            .as_ref()
            .map(|base| (format!("{base}/{plugin_id}"), "/cache".to_string()));

        let spec = SpawnSpec {
            container_name: name.clone(),
            image: descriptor.image.clone(),
            network: self.env.network.clone(),
            resources: descriptor.resources.clone(),
            labels,
            env,
            cache_mount,
            extra_mounts: Vec::new(),
        };

        let container_id = self.runtime.spawn(&spec).await?;
        let base_url = format!("http://{name}:8080");
        let instance = PluginInstance::starting(container_id, name, base_url, index);

        let mut instances = self.instances.write();
        let list = instances.entry(plugin_id.to_string()).or_default();
        list.retain(|i| i.instance_index != index);
        list.push(instance);
        Ok(())
    }

    async fn start_health_loop(self: &Arc<Self>, plugin_id: &str) {
        let mut loops = self.health_loops.lock().await;
        if loops.contains_key(plugin_id) {
            return;
        }
        let manager = self.clone();
        let plugin_id = plugin_id.to_string();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(HEALTH_CHECK_INTERVAL).await;
                manager.check_plugin_health(&plugin_id).await;
            }
        });
        loops.insert(plugin_id, handle);
    }

    async fn check_plugin_health(&self, plugin_id: &str) {
        let urls: Vec<(u32, String)> = {
            let instances = self.instances.read();
            instances
                .get(plugin_id)
                .map(|list| list.iter().map(|i| (i.instance_index, i.base_url.clone())).collect())
                .unwrap_or_default()
        };
        for (index, base_url) in urls {
            let outcome = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, self.client.health(&base_url)).await;
            let target = match outcome {
                Ok(Ok(response)) if response.is_healthy() => InstanceStatus::Healthy,
                Ok(Ok(_)) => InstanceStatus::Unhealthy,
                Ok(Err(_)) | Err(_) => InstanceStatus::Unhealthy,
            };
            self.transition_instance(plugin_id, index, target);
        }
    }

    fn transition_instance(&self, plugin_id: &str, index: u32, target: InstanceStatus) {
        let mut instances = self.instances.write();
        if let Some(list) = instances.get_mut(plugin_id) {
            if let Some(instance) = list.iter_mut().find(|i| i.instance_index == index) {
                if instance.status != target {
                    let prior = instance.status;
                    if instance.transition(target).is_ok() {
                        info!(plugin_id, index, ?prior, ?target, "instance health transition");
                    }
                }
            }
        }
    }

    async fn wait_for_first_healthy(&self, plugin_id: &str, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            self.check_plugin_health(plugin_id).await;
            if self.select_healthy(plugin_id).is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        warn!(plugin_id, "no instance became healthy within startup timeout");
    }

    async fn refresh_manifest_and_config(&self, plugin_id: &str) -> Result<(), CoreError> {
        let Some(instance) = self.select_healthy(plugin_id) else {
            return Ok(());
        };
        let manifest = self.client.manifest(&instance.base_url).await?;
        let config = {
            let descriptors = self.descriptors.read();
            descriptors.get(plugin_id).map(|d| d.config.clone()).unwrap_or_default()
        };
        self.client
            .configure(&instance.base_url, &serde_json::to_value(&config).unwrap_or_default())
            .await?;

        let mut descriptors = self.descriptors.write();
        if let Some(descriptor) = descriptors.get_mut(plugin_id) {
            descriptor.manifest = Some(meta_core_domain::entities::PluginManifest {
                plugin_id: manifest.plugin_id,
                version: manifest.version,
                description: manifest.description,
                default_queue: manifest.default_queue.and_then(|q| match q.as_str() {
                    "fast" => Some(QueueClass::Fast),
                    "background" => Some(QueueClass::Background),
                    _ => None,
                }),
                config_schema: manifest.config_schema,
                metadata_schema: manifest.metadata_schema,
                dependencies: manifest.dependencies,
            });
        }
        Ok(())
    }

    /// Returns the next healthy instance by round-robin over a per-plugin
    /// counter. The rotation is kept over the full instance list (skipping
    /// unhealthy entries as it goes) rather than over whichever subset is
    /// healthy right now, so a recovering instance resumes its place in the
    /// sequence instead of the counter being renormalized around it.
    /// `None` if no instance is currently healthy.
    pub fn select_healthy(&self, plugin_id: &str) -> Option<PluginInstance> {
        let instances = self.instances.read();
        let list = instances.get(plugin_id)?;
        if list.is_empty() {
            return None;
        }
        let mut counters = self.round_robin.write();
        let counter = counters.entry(plugin_id.to_string()).or_insert_with(RoundRobin::new);
        let idx = counter.next_eligible(list.len(), |i| list[i].is_eligible_for_dispatch())?;
        Some(list[idx].clone())
    }

    pub fn record_task_result(&self, plugin_id: &str, instance_index: u32, succeeded: bool) {
        let mut instances = self.instances.write();
        if let Some(list) = instances.get_mut(plugin_id) {
            if let Some(instance) = list.iter_mut().find(|i| i.instance_index == instance_index) {
                instance.record_task_result(succeeded);
            }
        }
    }

    pub fn descriptor(&self, plugin_id: &str) -> Option<PluginDescriptor> {
        self.descriptors.read().get(plugin_id).cloned()
    }

    pub fn active_descriptors_for_queue(&self, queue_class: QueueClass, inferred: impl Fn(&PluginDescriptor) -> QueueClass) -> Vec<PluginDescriptor> {
        self.descriptors
            .read()
            .values()
            .filter(|d| d.is_dispatchable())
            .filter(|d| d.declared_queue_class().unwrap_or_else(|| inferred(d)) == queue_class)
            .cloned()
            .collect()
    }

    pub fn all_descriptors(&self) -> Vec<PluginDescriptor> {
        self.descriptors.read().values().cloned().collect()
    }

    async fn persist(&self) -> Result<(), CoreError> {
        let descriptors = self.descriptors.read().clone();
        let document = PluginDescriptorDocument {
            version: 1,
            plugins: descriptors,
        };
        self.store.save(&document).await
    }

    pub async fn add_plugin(self: &Arc<Self>, plugin_id: PluginId, image: String) -> Result<(), CoreError> {
        let _guard = self.mutation_lock.lock().await;
        {
            let mut descriptors = self.descriptors.write();
            descriptors
                .entry(plugin_id.as_str().to_string())
                .or_insert_with(|| PluginDescriptor::new(plugin_id.clone(), image));
        }
        self.persist().await?;
        self.spawn_plugin_fleet(plugin_id.as_str()).await
    }

    pub async fn remove_plugin(&self, plugin_id: &str) -> Result<(), CoreError> {
        let _guard = self.mutation_lock.lock().await;
        let removed_instances = self.instances.write().remove(plugin_id).unwrap_or_default();
        for instance in removed_instances {
            self.runtime
                .stop_and_remove(&instance.container_id, STOP_GRACE_PERIOD_SECS)
                .await?;
        }
        if let Some(handle) = self.health_loops.lock().await.remove(plugin_id) {
            handle.abort();
        }
        self.descriptors.write().remove(plugin_id);
        self.persist().await
    }

    pub async fn update_plugin_config(
        &self,
        plugin_id: &str,
        resources: Option<ResourceLimits>,
        active: Option<bool>,
        config: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<(), CoreError> {
        let _guard = self.mutation_lock.lock().await;
        {
            let mut descriptors = self.descriptors.write();
            let descriptor = descriptors
                .get_mut(plugin_id)
                .ok_or_else(|| CoreError::NotFound(format!("unknown plugin {plugin_id}")))?;
            if let Some(resources) = resources {
                descriptor.resources = resources;
            }
            if let Some(active) = active {
                descriptor.active = active;
            }
            if let Some(config) = config.clone() {
                descriptor.config = config;
            }
        }
        self.persist().await?;
        if let Some(config) = config {
            if let Some(instance) = self.select_healthy(plugin_id) {
                self.client
                    .configure(&instance.base_url, &serde_json::to_value(&config).unwrap_or_default())
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn restart_plugin(self: &Arc<Self>, plugin_id: &str) -> Result<(), CoreError> {
        let _guard = self.mutation_lock.lock().await;
        let existing = self.instances.write().remove(plugin_id).unwrap_or_default();
        for instance in existing {
            self.runtime
                .stop_and_remove(&instance.container_id, STOP_GRACE_PERIOD_SECS)
                .await?;
        }
        drop(_guard);
        self.spawn_plugin_fleet(plugin_id).await
    }

    pub async fn restart_all(self: &Arc<Self>) -> Result<(), CoreError> {
        let plugin_ids: Vec<String> = self.descriptors.read().keys().cloned().collect();
        for plugin_id in plugin_ids {
            self.restart_plugin(&plugin_id).await?;
        }
        Ok(())
    }

    /// Stops all health-check timers and every instance, ignoring
    /// not-found errors.
    pub async fn shutdown(&self) {
        let mut loops = self.health_loops.lock().await;
        for (_, handle) in loops.drain() {
            handle.abort();
        }
        let all_instances: Vec<PluginInstance> = self.instances.write().drain().flat_map(|(_, v)| v).collect();
        for instance in all_instances {
            if let Err(err) = self
                .runtime
                .stop_and_remove(&instance.container_id, STOP_GRACE_PERIOD_SECS)
                .await
            {
                warn!(container = %instance.container_name, error = %err, "error stopping instance during shutdown");
            }
        }
    }
}
