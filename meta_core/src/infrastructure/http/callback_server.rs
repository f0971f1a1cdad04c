//! Inbound HTTP surface for component F: the `POST /callback` endpoint a
//! plugin worker calls when a `/run` request finishes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{debug, info};

use crate::application::services::callback_router::{CallbackOutcomeKind, CallbackPayload, CallbackRouter};

#[derive(Clone)]
struct ServerState {
    router: Arc<CallbackRouter>,
}

#[derive(Serialize)]
struct CallbackAck {
    accepted: bool,
}

pub fn router(callback_router: Arc<CallbackRouter>) -> Router {
    let state = ServerState {
        router: callback_router,
    };
    Router::new()
        .route("/callback", post(handle_callback))
        .with_state(state)
}

pub async fn serve(callback_router: Arc<CallbackRouter>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(callback_router);
    info!(%addr, "callback server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn handle_callback(State(state): State<ServerState>, Json(payload): Json<CallbackPayload>) -> Response {
    let task_id = payload.task_id.clone();
    match state.router.handle(payload) {
        CallbackOutcomeKind::Delivered => (StatusCode::OK, Json(CallbackAck { accepted: true })).into_response(),
        CallbackOutcomeKind::UnknownTask => {
            // Expected under at-least-once delivery: a worker may retry a
            // callback the scheduler already resolved.
            debug!(%task_id, "callback for unknown or already-resolved task");
            (StatusCode::NOT_FOUND, Json(CallbackAck { accepted: false })).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use meta_core_domain::entities::PluginDescriptorDocument;
    use meta_core_domain::repositories::PluginDescriptorStore;
    use meta_core_domain::services::{ContainerRuntime, HealthResponse, ManifestResponse, PluginClient, RunRequest, SpawnSpec};
    use meta_core_domain::value_objects::{HashId, PluginInstanceId};
    use meta_core_domain::repositories::KvStore;
    use meta_core_domain::CoreError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::RwLock;
    use tower::ServiceExt;

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
            PluginInstanceId::new("c".to_string())
        }
        async fn stop_and_remove(&self, _: &PluginInstanceId, _: u32) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct NoopClient;
    #[async_trait]
    impl PluginClient for NoopClient {
        async fn health(&self, _: &str) -> Result<HealthResponse, CoreError> {
            Ok(HealthResponse { status: "ok".into(), ready: true })
        }
        async fn manifest(&self, _: &str) -> Result<ManifestResponse, CoreError> {
            Err(CoreError::plugin_error("unused"))
        }
        async fn configure(&self, _: &str, _: &serde_json::Value) -> Result<(), CoreError> {
            Ok(())
        }
        async fn run(&self, _: &str, _: &RunRequest) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct NoopKv(RwLock<HashMap<String, HashMap<String, String>>>);
    #[async_trait]
    impl KvStore for NoopKv {
        async fn put_fields(&self, hash_id: &HashId, fields: HashMap<String, String>) -> Result<(), CoreError> {
            self.0.write().unwrap().entry(hash_id.to_string()).or_default().extend(fields);
            Ok(())
        }
        async fn get_fields(&self, hash_id: &HashId) -> Result<HashMap<String, String>, CoreError> {
            Ok(self.0.read().unwrap().get(hash_id.as_str()).cloned().unwrap_or_default())
        }
        async fn remove(&self, hash_id: &HashId) -> Result<(), CoreError> {
            self.0.write().unwrap().remove(hash_id.as_str());
            Ok(())
        }
        async fn list_hash_ids(&self) -> Result<Vec<HashId>, CoreError> {
            Ok(vec![])
        }
    }

    struct NoopStore;
    #[async_trait]
    impl PluginDescriptorStore for NoopStore {
        async fn load(&self) -> Result<PluginDescriptorDocument, CoreError> {
            Ok(PluginDescriptorDocument { version: 1, plugins: HashMap::new() })
        }
        async fn save(&self, _: &PluginDescriptorDocument) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn sample_router() -> Arc<CallbackRouter> {
        use crate::application::services::scheduler::TaskScheduler;
        use crate::infrastructure::container::ContainerManager;
        use meta_core_domain::entities::GateState;
        use std::time::Duration;

        let containers = ContainerManager::new(
            Arc::new(NoopRuntime),
            Arc::new(NoopClient),
            Arc::new(NoopStore),
            crate::infrastructure::container::WorkerEnvironment {
                callback_url: "http://core/callback".into(),
                meta_core_url: "http://core".into(),
                webdav_url: "http://webdav".into(),
                network: "net".into(),
                cache_base_dir: None,
            },
        );
        let scheduler = Arc::new(TaskScheduler::new(
            Arc::new(GateState::new()),
            containers,
            Arc::new(NoopClient),
            Arc::new(NoopKv(RwLock::new(HashMap::new()))),
            Duration::from_secs(30),
            Arc::new(crate::infrastructure::CoreMetrics::new().unwrap()),
        ));
        Arc::new(CallbackRouter::new(scheduler))
    }

    #[tokio::test]
    async fn unknown_task_returns_404() {
        let app = router(sample_router());
        let body = serde_json::json!({
            "taskId": meta_core_domain::value_objects::TaskId::new().to_string(),
            "status": "ok"
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/callback")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
