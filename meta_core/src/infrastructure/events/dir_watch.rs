//! Development/test [`EventSource`] adapter: watches a local directory tree
//! with `notify` so the crate is runnable standalone without a real
//! upstream stream coordinator. Not a production requirement (spec §1's
//! event-source Non-goal stands) -- this exists purely so the pipeline has
//! something to consume events from in dev and in integration tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use meta_core_domain::services::{EventSource, FileEvent, FileEventKind};
use meta_core_domain::CoreError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

pub struct DirWatchEventSource {
    receiver: Mutex<mpsc::UnboundedReceiver<FileEvent>>,
    // Held only to keep the OS watch alive for the adapter's lifetime.
    _watcher: RecommendedWatcher,
}

impl DirWatchEventSource {
    pub fn watch(root: &Path) -> Result<Self, CoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let Ok(event) = event else { return };
            let Some(kind) = classify(&event.kind) else { return };
            for path in event.paths {
                let delivery_token = format!("{}:{}", path.display(), fastrand_token());
                let _ = sender.send(FileEvent { kind: kind.clone(), path, delivery_token });
            }
        })
        .map_err(|e| CoreError::internal(format!("failed to start directory watcher: {e}")))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| CoreError::internal(format!("failed to watch {root:?}: {e}")))?;

        Ok(Self {
            receiver: Mutex::new(receiver),
            _watcher: watcher,
        })
    }
}

fn classify(kind: &EventKind) -> Option<FileEventKind> {
    match kind {
        EventKind::Create(_) => Some(FileEventKind::Create),
        EventKind::Modify(_) => Some(FileEventKind::Update),
        EventKind::Remove(_) => Some(FileEventKind::Delete),
        _ => None,
    }
}

fn fastrand_token() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

#[async_trait]
impl EventSource for DirWatchEventSource {
    async fn next_event(&self) -> Result<Option<FileEvent>, CoreError> {
        let mut receiver = self.receiver.lock().expect("dir watch receiver mutex poisoned");
        Ok(receiver.recv().await)
    }

    /// The directory watcher has no redelivery concept; acknowledgement is
    /// a no-op.
    async fn ack(&self, _delivery_token: &str) -> Result<(), CoreError> {
        Ok(())
    }
}

pub fn default_allowed_extensions() -> Vec<String> {
    vec!["mkv", "mp4", "mov", "avi", "mp3", "flac", "wav", "jpg", "jpeg", "png"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn reports_create_event_for_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirWatchEventSource::watch(dir.path()).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let file_path: PathBuf = dir.path().join("a.mkv");
        tokio::fs::write(&file_path, b"hello").await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), source.next_event())
            .await
            .expect("timed out waiting for fs event")
            .unwrap()
            .expect("channel should not be closed");
        assert_eq!(event.kind, FileEventKind::Create);
    }
}
