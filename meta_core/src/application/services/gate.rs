//! Gate & drain controller (component G): a single mutable boolean with
//! observers, plus a barrier used by safe-unmount to wait until every
//! observed source has gone quiet.

use std::sync::Arc;
use std::time::{Duration, Instant};

use meta_core_domain::entities::GateState;

use crate::infrastructure::CoreMetrics;

/// Anything the drain barrier can poll for outstanding work. Implemented by
/// [`super::work_queue::WorkQueue`] and by the scheduler's pending-tasks
/// table.
pub trait DrainObservable: Send + Sync {
    fn running(&self) -> usize;
    fn pending(&self) -> usize;
    fn label(&self) -> &str;
}

#[derive(Debug, Clone, Copy)]
pub struct DrainCount {
    pub running: usize,
    pub pending: usize,
}

pub struct GateController {
    state: Arc<GateState>,
    metrics: Arc<CoreMetrics>,
    sources: Vec<Arc<dyn DrainObservable>>,
}

impl GateController {
    /// `state` is shared with whatever dispatches against it (the task
    /// scheduler holds the same `Arc<GateState>`), so closing the gate here
    /// is immediately visible to in-flight dispatch checks rather than
    /// operating on a disconnected copy.
    pub fn new(state: Arc<GateState>, metrics: Arc<CoreMetrics>, sources: Vec<Arc<dyn DrainObservable>>) -> Self {
        metrics.set_gate_open(state.is_open());
        Self { state, metrics, sources }
    }

    pub fn state(&self) -> Arc<GateState> {
        self.state.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Used by `wait-empty`/safe-unmount callers: close the gate, drain,
    /// perform the storage transition, reopen.
    pub fn set(&self, open: bool) {
        if open {
            self.state.reopen();
        } else {
            self.state.close();
        }
        self.metrics.set_gate_open(open);
    }

    /// Polls aggregate `running + pending` across every registered source
    /// until all reach zero or `timeout` elapses. Never blocks
    /// indefinitely.
    pub async fn wait_for_empty(&self, timeout: Duration) -> (bool, Vec<(String, DrainCount)>) {
        let deadline = Instant::now() + timeout;
        loop {
            let counts: Vec<(String, DrainCount)> = self
                .sources
                .iter()
                .map(|s| {
                    (
                        s.label().to_string(),
                        DrainCount {
                            running: s.running(),
                            pending: s.pending(),
                        },
                    )
                })
                .collect();
            let empty = counts.iter().all(|(_, c)| c.running == 0 && c.pending == 0);
            if empty {
                return (true, counts);
            }
            if Instant::now() >= deadline {
                return (false, counts);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
