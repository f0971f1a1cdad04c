// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Supervised task spawning: wraps `tokio::spawn` so no background task's
//! error or panic is ever silently dropped.

use meta_core_domain::CoreResult;
use meta_core_domain::CoreError;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Spawns a supervised task: logs start/completion/failure and returns a
/// handle the caller must join via [`join_supervised`].
pub fn spawn_supervised<F, T>(name: &'static str, fut: F) -> JoinHandle<CoreResult<T>>
where
    F: std::future::Future<Output = CoreResult<T>> + Send + 'static,
    T: Send + 'static,
{
    debug!(task = name, "task starting");

    tokio::spawn(async move {
        let result = fut.await;

        match &result {
            Ok(_) => debug!(task = name, "task completed successfully"),
            Err(e) => error!(task = name, error = ?e, "task failed"),
        }

        result
    })
}

/// Joins a supervised task handle, converting panics and cancellation into
/// `CoreError::Internal`/`CoreError::Cancelled`.
pub async fn join_supervised<T>(handle: JoinHandle<CoreResult<T>>) -> CoreResult<T> {
    match handle.await {
        Ok(task_result) => task_result,
        Err(e) => {
            if e.is_panic() {
                Err(CoreError::internal(format!("task panicked: {e}")))
            } else if e.is_cancelled() {
                Err(CoreError::Cancelled(format!("task cancelled: {e}")))
            } else {
                Err(CoreError::internal(format!("task join failed: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_supervised_success() {
        let handle = spawn_supervised("test-success", async { Ok::<i32, CoreError>(42) });
        let result = join_supervised(handle).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn spawn_supervised_error() {
        let handle = spawn_supervised("test-error", async { Err::<(), _>(CoreError::validation_error("bad")) });
        assert!(join_supervised(handle).await.is_err());
    }

    #[tokio::test]
    async fn join_supervised_panic() {
        let handle = tokio::spawn(async {
            panic!("test panic");
            #[allow(unreachable_code)]
            Ok::<(), CoreError>(())
        });
        let result = join_supervised(handle).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("panicked"));
    }
}
