// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Prometheus metrics for the ingestion pipeline and plugin scheduler.
//!
//! One [`CoreMetrics`] is constructed at startup and shared (via `Arc`)
//! across the pipeline, scheduler, and gate controller so they can each
//! report their own counters/gauges without knowing about each other.

use meta_core_domain::CoreError;
use prometheus::{Encoder, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

pub struct CoreMetrics {
    registry: Registry,
    gate_open: IntGauge,
    pool_size: IntGaugeVec,
    pool_running: IntGaugeVec,
    pool_pending: IntGaugeVec,
    tasks_dispatched_total: IntCounterVec,
    tasks_failed_total: IntCounterVec,
    callbacks_total: IntCounterVec,
}

impl CoreMetrics {
    pub fn new() -> Result<Self, CoreError> {
        let registry = Registry::new();

        let gate_open = IntGauge::new("meta_core_gate_open", "1 if the admission gate is open, 0 if closed")
            .map_err(|e| CoreError::internal(format!("failed to create gate_open gauge: {e}")))?;
        let pool_size = IntGaugeVec::new(Opts::new("meta_core_pool_size", "Configured concurrency of a work pool"), &["pool"])
            .map_err(|e| CoreError::internal(format!("failed to create pool_size gauge: {e}")))?;
        let pool_running = IntGaugeVec::new(Opts::new("meta_core_pool_running", "In-flight futures in a work pool"), &["pool"])
            .map_err(|e| CoreError::internal(format!("failed to create pool_running gauge: {e}")))?;
        let pool_pending = IntGaugeVec::new(Opts::new("meta_core_pool_pending", "Queued-but-not-started futures in a work pool"), &["pool"])
            .map_err(|e| CoreError::internal(format!("failed to create pool_pending gauge: {e}")))?;
        let tasks_dispatched_total = IntCounterVec::new(
            Opts::new("meta_core_tasks_dispatched_total", "Plugin invocations dispatched, by plugin id"),
            &["plugin_id"],
        )
        .map_err(|e| CoreError::internal(format!("failed to create tasks_dispatched_total counter: {e}")))?;
        let tasks_failed_total = IntCounterVec::new(
            Opts::new("meta_core_tasks_failed_total", "Plugin invocations that errored, by plugin id"),
            &["plugin_id"],
        )
        .map_err(|e| CoreError::internal(format!("failed to create tasks_failed_total counter: {e}")))?;
        let callbacks_total = IntCounterVec::new(
            Opts::new("meta_core_callbacks_total", "Plugin callbacks received, by outcome"),
            &["outcome"],
        )
        .map_err(|e| CoreError::internal(format!("failed to create callbacks_total counter: {e}")))?;

        registry
            .register(Box::new(gate_open.clone()))
            .map_err(|e| CoreError::internal(format!("failed to register gate_open: {e}")))?;
        registry
            .register(Box::new(pool_size.clone()))
            .map_err(|e| CoreError::internal(format!("failed to register pool_size: {e}")))?;
        registry
            .register(Box::new(pool_running.clone()))
            .map_err(|e| CoreError::internal(format!("failed to register pool_running: {e}")))?;
        registry
            .register(Box::new(pool_pending.clone()))
            .map_err(|e| CoreError::internal(format!("failed to register pool_pending: {e}")))?;
        registry
            .register(Box::new(tasks_dispatched_total.clone()))
            .map_err(|e| CoreError::internal(format!("failed to register tasks_dispatched_total: {e}")))?;
        registry
            .register(Box::new(tasks_failed_total.clone()))
            .map_err(|e| CoreError::internal(format!("failed to register tasks_failed_total: {e}")))?;
        registry
            .register(Box::new(callbacks_total.clone()))
            .map_err(|e| CoreError::internal(format!("failed to register callbacks_total: {e}")))?;

        Ok(Self {
            registry,
            gate_open,
            pool_size,
            pool_running,
            pool_pending,
            tasks_dispatched_total,
            tasks_failed_total,
            callbacks_total,
        })
    }

    pub fn set_gate_open(&self, open: bool) {
        self.gate_open.set(if open { 1 } else { 0 });
    }

    pub fn record_pool(&self, pool: &str, size: usize, running: usize, pending: usize) {
        self.pool_size.with_label_values(&[pool]).set(size as i64);
        self.pool_running.with_label_values(&[pool]).set(running as i64);
        self.pool_pending.with_label_values(&[pool]).set(pending as i64);
    }

    pub fn record_dispatch(&self, plugin_id: &str) {
        self.tasks_dispatched_total.with_label_values(&[plugin_id]).inc();
    }

    pub fn record_task_failure(&self, plugin_id: &str) {
        self.tasks_failed_total.with_label_values(&[plugin_id]).inc();
    }

    pub fn record_callback(&self, outcome: &str) {
        self.callbacks_total.with_label_values(&[outcome]).inc();
    }

    /// Renders the registry in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, CoreError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| CoreError::internal(format!("failed to encode metrics: {e}")))?;
        String::from_utf8(buffer).map_err(|e| CoreError::internal(format!("metrics output not utf8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_registered_metric_names() {
        let metrics = CoreMetrics::new().unwrap();
        metrics.set_gate_open(true);
        metrics.record_pool("fast", 8, 2, 1);
        metrics.record_dispatch("tagger");
        metrics.record_callback("delivered");

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("meta_core_gate_open 1"));
        assert!(rendered.contains("meta_core_pool_running"));
        assert!(rendered.contains("meta_core_tasks_dispatched_total"));
        assert!(rendered.contains("meta_core_callbacks_total"));
    }
}
