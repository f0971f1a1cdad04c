//! Port consumed by the event consumer (component H). The concrete stream
//! client lives outside the core; this trait is the only thing the core
//! depends on.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::CoreError;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FileEventKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
    /// Opaque token the source uses to track delivery; passed back to
    /// `ack` once the event has been admitted (not once processing
    /// completes).
    pub delivery_token: String,
}

/// An append-only stream of file events, consumed under a named consumer
/// group so that redelivery after a restart resumes where it left off.
/// Implementations must tolerate at-least-once delivery: the registry's
/// `addDiscovered` absorbs duplicate `create`/`update` events silently.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Blocks until the next event is available, or returns `Ok(None)` if
    /// the source has been closed (e.g. on shutdown).
    async fn next_event(&self) -> Result<Option<FileEvent>, CoreError>;

    /// Acknowledges an event by its delivery token. Called immediately
    /// after the pipeline has admitted (not processed) the corresponding
    /// path.
    async fn ack(&self, delivery_token: &str) -> Result<(), CoreError>;
}
