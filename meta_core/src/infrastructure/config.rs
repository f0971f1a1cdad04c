// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Layered runtime configuration: defaults → TOML file → `META_CORE_*`
//! environment overrides, validated into a [`CoreConfig`].

use std::path::PathBuf;
use std::time::Duration;

use meta_core_domain::CoreError;
use serde::Deserialize;

/// Raw, pre-validation configuration document as loaded from TOML/env.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub watch_roots: Vec<PathBuf>,
    pub allowed_extensions: Vec<String>,
    pub validation_concurrency: Option<usize>,
    pub fast_concurrency: Option<usize>,
    pub background_concurrency: Option<usize>,
    pub task_dispatch_deadline_secs: u64,
    pub health_check_interval_secs: u64,
    pub health_check_timeout_secs: u64,
    pub plugin_descriptor_path: PathBuf,
    pub sqlite_path: Option<PathBuf>,
    pub callback_bind_addr: String,
    pub metrics_bind_addr: String,
    pub docker_network: String,
    pub callback_url: String,
    pub meta_core_url: String,
    pub webdav_url: String,
    pub log_level: String,
    pub log_format: String,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            watch_roots: vec![PathBuf::from("/data/incoming")],
            allowed_extensions: vec![
                "mkv".into(),
                "mp4".into(),
                "mov".into(),
                "avi".into(),
                "mp3".into(),
                "flac".into(),
                "wav".into(),
                "jpg".into(),
                "jpeg".into(),
                "png".into(),
            ],
            validation_concurrency: None,
            fast_concurrency: None,
            background_concurrency: None,
            task_dispatch_deadline_secs: 30,
            health_check_interval_secs: 30,
            health_check_timeout_secs: 5,
            plugin_descriptor_path: PathBuf::from("plugins.json"),
            sqlite_path: None,
            callback_bind_addr: "0.0.0.0:8080".into(),
            metrics_bind_addr: "0.0.0.0:9090".into(),
            docker_network: "meta-core-plugins".into(),
            callback_url: "http://meta-core:8080/callback".into(),
            meta_core_url: "http://meta-core:8080".into(),
            webdav_url: "http://webdav:80".into(),
            log_level: "info".into(),
            log_format: "pretty".into(),
        }
    }
}

/// Validated runtime configuration, read-only once constructed and shared
/// as `Arc<CoreConfig>` across every component.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub watch_roots: Vec<PathBuf>,
    pub allowed_extensions: Vec<String>,
    pub validation_concurrency: usize,
    pub fast_concurrency: usize,
    pub background_concurrency: usize,
    pub task_dispatch_deadline: Duration,
    pub health_check_interval: Duration,
    pub health_check_timeout: Duration,
    pub plugin_descriptor_path: PathBuf,
    pub sqlite_path: Option<PathBuf>,
    pub callback_bind_addr: String,
    pub metrics_bind_addr: String,
    pub docker_network: String,
    pub callback_url: String,
    pub meta_core_url: String,
    pub webdav_url: String,
    pub log_level: String,
    pub log_format: String,
}

impl CoreConfig {
    /// Loads defaults, then an optional TOML file at `path` if it exists,
    /// then `META_CORE_*` environment overrides (double-underscore
    /// separated, e.g. `META_CORE_TASK_DISPATCH_DEADLINE_SECS`).
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, CoreError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&RawConfig::default()).map_err(|e| {
            CoreError::invalid_config(format!("failed to seed default configuration: {e}"))
        })?);

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            }
        }

        builder = builder.add_source(config::Environment::with_prefix("META_CORE").separator("__"));

        let raw: RawConfig = builder
            .build()
            .map_err(|e| CoreError::invalid_config(format!("failed to build configuration: {e}")))?
            .try_deserialize()
            .map_err(|e| CoreError::invalid_config(format!("failed to deserialize configuration: {e}")))?;

        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawConfig) -> Result<Self, CoreError> {
        if raw.watch_roots.is_empty() {
            return Err(CoreError::invalid_config("watch_roots must not be empty"));
        }
        if raw.allowed_extensions.is_empty() {
            return Err(CoreError::invalid_config("allowed_extensions must not be empty"));
        }

        let available = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let validation_concurrency = raw.validation_concurrency.unwrap_or(2 * available).max(1);
        let fast_concurrency = raw.fast_concurrency.unwrap_or(available).max(1);
        let background_concurrency = raw.background_concurrency.unwrap_or((available / 2).max(1)).max(1);

        Ok(Self {
            watch_roots: raw.watch_roots,
            allowed_extensions: raw.allowed_extensions.into_iter().map(|e| e.to_ascii_lowercase()).collect(),
            validation_concurrency,
            fast_concurrency,
            background_concurrency,
            task_dispatch_deadline: Duration::from_secs(raw.task_dispatch_deadline_secs),
            health_check_interval: Duration::from_secs(raw.health_check_interval_secs),
            health_check_timeout: Duration::from_secs(raw.health_check_timeout_secs),
            plugin_descriptor_path: raw.plugin_descriptor_path,
            sqlite_path: raw.sqlite_path,
            callback_bind_addr: raw.callback_bind_addr,
            metrics_bind_addr: raw.metrics_bind_addr,
            docker_network: raw.docker_network,
            callback_url: raw.callback_url,
            meta_core_url: raw.meta_core_url,
            webdav_url: raw.webdav_url,
            log_level: raw.log_level,
            log_format: raw.log_format,
        })
    }
}
