//! Production [`PluginClient`] adapter over `reqwest`.

use async_trait::async_trait;
use meta_core_domain::services::{HealthResponse, ManifestResponse, PluginClient, RunRequest};
use meta_core_domain::CoreError;
use serde_json::Value;
use std::time::Duration;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const MANIFEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONFIGURE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpPluginClient {
    client: reqwest::Client,
}

impl Default for HttpPluginClient {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PluginClient for HttpPluginClient {
    async fn health(&self, base_url: &str) -> Result<HealthResponse, CoreError> {
        self.client
            .get(format!("{base_url}/health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| CoreError::plugin_error(format!("health check failed: {e}")))?
            .json::<HealthResponse>()
            .await
            .map_err(|e| CoreError::plugin_error(format!("invalid health response: {e}")))
    }

    async fn manifest(&self, base_url: &str) -> Result<ManifestResponse, CoreError> {
        self.client
            .get(format!("{base_url}/manifest"))
            .timeout(MANIFEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| CoreError::plugin_error(format!("manifest fetch failed: {e}")))?
            .json::<ManifestResponse>()
            .await
            .map_err(|e| CoreError::plugin_error(format!("invalid manifest response: {e}")))
    }

    async fn configure(&self, base_url: &str, config: &Value) -> Result<(), CoreError> {
        let response = self
            .client
            .post(format!("{base_url}/configure"))
            .timeout(CONFIGURE_TIMEOUT)
            .json(&serde_json::json!({ "config": config }))
            .send()
            .await
            .map_err(|e| CoreError::plugin_error(format!("configure failed: {e}")))?;
        if !response.status().is_success() {
            return Err(CoreError::plugin_error(format!(
                "configure returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn run(&self, base_url: &str, request: &RunRequest) -> Result<(), CoreError> {
        // No retry here: the scheduler's per-task deadline is the safety
        // net for a run request that never gets acknowledged.
        let response = self
            .client
            .post(format!("{base_url}/run"))
            .json(request)
            .send()
            .await
            .map_err(|e| CoreError::dispatch_failed(format!("run request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(CoreError::dispatch_failed(format!(
                "run request returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
