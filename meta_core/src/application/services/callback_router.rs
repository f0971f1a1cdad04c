//! Callback router (component F): the single entry point used by the HTTP
//! callback server to resolve a plugin's asynchronous completion against
//! an in-flight task.

use std::sync::Arc;

use meta_core_domain::value_objects::TaskId;
use serde::Deserialize;
use serde_json::Value;

use super::scheduler::{CallbackOutcome, CallbackStatus, TaskScheduler};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub task_id: TaskId,
    pub status: String,
    pub metadata: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CallbackOutcomeKind {
    Delivered,
    UnknownTask,
}

pub struct CallbackRouter {
    scheduler: Arc<TaskScheduler>,
}

impl CallbackRouter {
    pub fn new(scheduler: Arc<TaskScheduler>) -> Self {
        Self { scheduler }
    }

    /// Looks up `taskId` and resolves its waiter. Idempotent: a duplicate
    /// delivery for a `taskId` already removed from the pending table is a
    /// no-op reported as `UnknownTask`, matching the "second delivery is a
    /// no-op" contract.
    pub fn handle(&self, payload: CallbackPayload) -> CallbackOutcomeKind {
        let status = match payload.status.as_str() {
            "ok" => CallbackStatus::Ok,
            _ => CallbackStatus::Error,
        };
        let outcome = CallbackOutcome {
            status,
            metadata: payload.metadata,
            error: payload.error,
        };
        if self.scheduler.handle_callback(&payload.task_id, outcome) {
            CallbackOutcomeKind::Delivered
        } else {
            CallbackOutcomeKind::UnknownTask
        }
    }
}
