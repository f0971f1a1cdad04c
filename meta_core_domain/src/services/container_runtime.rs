//! Port over a container engine (Docker Engine API in production, via
//! `bollard`). The container lifecycle manager (component D) depends only
//! on this trait, never on a concrete client.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::entities::ResourceLimits;
use crate::error::CoreError;
use crate::value_objects::PluginInstanceId;

#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub container_name: String,
    pub image: String,
    pub network: String,
    pub resources: ResourceLimits,
    pub labels: HashMap<String, String>,
    pub env: HashMap<String, String>,
    pub cache_mount: Option<(String, String)>,
    pub extra_mounts: Vec<(String, String)>,
}

/// Abstraction over container spawn/stop/remove and network bookkeeping.
/// One call maps closely to one Docker Engine API request in the
/// production adapter.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ensure_network(&self, name: &str) -> Result<(), CoreError>;

    /// Removes any container already using the target name, ignoring
    /// not-found errors.
    async fn remove_if_exists(&self, container_name: &str) -> Result<(), CoreError>;

    /// Removes every container carrying the given label key/value,
    /// ignoring not-found errors. Used at startup to clear a stale fleet.
    async fn remove_labelled(&self, label_key: &str, label_value: &str) -> Result<(), CoreError>;

    /// Creates and starts a container, returning its runtime-assigned id.
    async fn spawn(&self, spec: &SpawnSpec) -> Result<PluginInstanceId, CoreError>;

    /// Stops a container, waiting up to `grace_period_secs` before killing
    /// it, then removes it. Ignores not-found errors.
    async fn stop_and_remove(&self, container_id: &PluginInstanceId, grace_period_secs: u32) -> Result<(), CoreError>;
}
