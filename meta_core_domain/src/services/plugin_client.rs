//! HTTP client port for talking to a single plugin worker instance. The
//! production adapter issues these over the container network via
//! `reqwest`; tests substitute an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::value_objects::TaskId;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub ready: bool,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" && self.ready
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestResponse {
    pub plugin_id: String,
    pub version: String,
    pub description: String,
    pub default_queue: Option<String>,
    pub config_schema: Value,
    pub metadata_schema: Value,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRequest {
    pub task_id: TaskId,
    pub path: std::path::PathBuf,
    pub hash_id: Option<String>,
    pub force_recompute: bool,
    pub kv_snapshot: Value,
}

/// One instance's HTTP surface, per the plugin worker contract (§6).
#[async_trait]
pub trait PluginClient: Send + Sync {
    async fn health(&self, base_url: &str) -> Result<HealthResponse, CoreError>;
    async fn manifest(&self, base_url: &str) -> Result<ManifestResponse, CoreError>;
    async fn configure(&self, base_url: &str, config: &Value) -> Result<(), CoreError>;
    /// Posts the run request; the response is a bare acknowledgement, not
    /// the task outcome, which arrives later via callback.
    async fn run(&self, base_url: &str, request: &RunRequest) -> Result<(), CoreError>;
}
