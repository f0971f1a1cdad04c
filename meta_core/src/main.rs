// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Composition root: wires domain ports to their concrete adapters and runs
//! the ingestion service until a shutdown signal arrives (`serve`) or the
//! current backlog drains (`once`).

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use meta_core::application::services::{
    CallbackRouter, DrainObservable, EventConsumer, GateController, PersistenceAdapter, Pipeline, PipelineConcurrency, StateRegistry,
    TaskScheduler,
};
use meta_core::infrastructure::container::{BollardRuntime, ContainerManager, WorkerEnvironment};
use meta_core::infrastructure::events::DirWatchEventSource;
use meta_core::infrastructure::http::HttpPluginClient;
use meta_core::infrastructure::repositories::{FilePluginDescriptorStore, InMemoryKvStore, SqliteKvStore};
use meta_core::infrastructure::{logging, CoreConfig, CoreMetrics};
use meta_core_bootstrap::logger::{BootstrapLogger, ConsoleLogger};
use meta_core_bootstrap::{result_to_exit_code, wait_for_shutdown_signal, RunMode};
use meta_core_domain::entities::GateState;
use meta_core_domain::repositories::KvStore;
use meta_core_domain::services::{EventSource, PluginClient};
use meta_core_domain::CoreError;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let bootstrap_logger = ConsoleLogger::new();
    let cli = match meta_core_bootstrap::bootstrap_cli() {
        Ok(cli) => cli,
        Err(err) => {
            bootstrap_logger.error(&format!("CLI error: {err}"));
            return std::process::ExitCode::from(78);
        }
    };

    result_to_exit_code(run(cli).await)
}

async fn run(cli: meta_core_bootstrap::ValidatedCli) -> Result<(), CoreError> {
    let config = CoreConfig::load(cli.config.as_deref())?;

    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let log_format: logging::LogFormat = cli
        .log_format
        .as_deref()
        .unwrap_or(&config.log_format)
        .parse()
        .unwrap_or(logging::LogFormat::Pretty);
    logging::init_logging(log_level, log_format);

    tracing::info!(mode = ?cli.mode, "starting meta-core");

    let metrics = Arc::new(CoreMetrics::new()?);

    let plugin_client: Arc<dyn PluginClient> = Arc::new(HttpPluginClient::default());
    let runtime = Arc::new(BollardRuntime::connect()?);
    let descriptor_store = Arc::new(FilePluginDescriptorStore::new(config.plugin_descriptor_path.clone()));

    let kv_store: Arc<dyn KvStore> = match &config.sqlite_path {
        Some(path) => Arc::new(SqliteKvStore::from_file(&path.to_string_lossy()).await?),
        None => Arc::new(InMemoryKvStore::new()),
    };

    let worker_env = WorkerEnvironment {
        callback_url: config.callback_url.clone(),
        meta_core_url: config.meta_core_url.clone(),
        webdav_url: config.webdav_url.clone(),
        network: config.docker_network.clone(),
        cache_base_dir: None,
    };

    let containers = ContainerManager::new(runtime, plugin_client.clone(), descriptor_store, worker_env);
    containers.initialize().await?;

    let gate = Arc::new(GateState::new());
    let scheduler = TaskScheduler::new(gate.clone(), containers.clone(), plugin_client, kv_store.clone(), config.task_dispatch_deadline, metrics.clone());

    let state = StateRegistry::new();
    let persistence = Arc::new(PersistenceAdapter::new(kv_store));

    let concurrency = PipelineConcurrency {
        validation: config.validation_concurrency,
        fast: config.fast_concurrency,
        background: config.background_concurrency,
    };
    let allowed_extensions: HashSet<String> = config.allowed_extensions.iter().cloned().collect();
    let pipeline = Pipeline::new(
        concurrency,
        allowed_extensions,
        state.clone(),
        scheduler.clone(),
        containers.clone(),
        persistence.clone(),
        metrics.clone(),
    );

    // The gate controller shares `gate` with the scheduler above, so closing
    // it here is immediately visible to every in-flight dispatch check; its
    // drain sources are the three pipeline pools plus the scheduler's own
    // pending-tasks table.
    let gate_controller = Arc::new(GateController::new(
        gate,
        metrics.clone(),
        vec![
            pipeline.validation_queue() as Arc<dyn DrainObservable>,
            pipeline.fast_queue() as Arc<dyn DrainObservable>,
            pipeline.background_queue() as Arc<dyn DrainObservable>,
            scheduler.clone() as Arc<dyn DrainObservable>,
        ],
    ));

    let callback_router = Arc::new(CallbackRouter::new(scheduler));

    let callback_addr: SocketAddr = config
        .callback_bind_addr
        .parse()
        .map_err(|e| CoreError::invalid_config(format!("invalid callback_bind_addr: {e}")))?;
    let metrics_addr: SocketAddr = config
        .metrics_bind_addr
        .parse()
        .map_err(|e| CoreError::invalid_config(format!("invalid metrics_bind_addr: {e}")))?;

    let callback_server = tokio::spawn(async move {
        if let Err(err) = meta_core::infrastructure::http::serve_callback_server(callback_router, callback_addr).await {
            tracing::error!(%err, "callback server exited");
        }
    });
    let metrics_server = tokio::spawn(async move {
        if let Err(err) = meta_core::infrastructure::http::serve_metrics_server(metrics, metrics_addr).await {
            tracing::error!(%err, "metrics server exited");
        }
    });

    let event_source: Arc<dyn EventSource> = Arc::new(DirWatchEventSource::watch(&config.watch_roots[0])?);
    let consumer = EventConsumer::new(event_source, pipeline.clone(), state, persistence);

    match cli.mode {
        RunMode::Serve => {
            tokio::select! {
                result = consumer.run() => {
                    result?;
                }
                _ = wait_for_shutdown_signal() => {
                    tracing::info!("shutdown signal received, closing gate and draining pipeline");
                    pipeline.pause();
                    gate_controller.set(false);
                    let (drained, counts) = gate_controller.wait_for_empty(Duration::from_secs(5)).await;
                    if !drained {
                        tracing::warn!(?counts, "shutdown drain timed out with work still outstanding");
                    }
                }
            }
        }
        RunMode::Once => {
            let _ = tokio::time::timeout(Duration::from_secs(5), consumer.run()).await;
        }
    }

    callback_server.abort();
    metrics_server.abort();
    containers.shutdown().await;

    Ok(())
}
