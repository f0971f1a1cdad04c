//! Metrics/health HTTP surface: exposes the Prometheus registry at
//! `/metrics` and a liveness check at `/health`, the same two endpoints
//! the reference architecture's metrics endpoint serves.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{error, info};

use crate::infrastructure::metrics::CoreMetrics;

pub fn router(metrics: Arc<CoreMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(metrics)
}

pub async fn serve(metrics: Arc<CoreMetrics>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(metrics);
    info!(%addr, "metrics server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn handle_metrics(State(metrics): State<Arc<CoreMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], body).into_response(),
        Err(err) => {
            error!(%err, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn handle_health() -> Response {
    (StatusCode::OK, "OK").into_response()
}
