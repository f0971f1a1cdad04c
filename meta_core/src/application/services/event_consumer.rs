//! Event consumer (component H). Reads file events from the upstream
//! stream and feeds the pipeline; acknowledges on admission, not on
//! completion.

use std::sync::Arc;

use meta_core_domain::services::{EventSource, FileEventKind};
use meta_core_domain::CoreError;
use tracing::{debug, warn};

use super::persistence::PersistenceAdapter;
use super::pipeline::Pipeline;
use super::state_registry::StateRegistry;

pub struct EventConsumer {
    source: Arc<dyn EventSource>,
    pipeline: Arc<Pipeline>,
    state: Arc<StateRegistry>,
    persistence: Arc<PersistenceAdapter>,
}

impl EventConsumer {
    pub fn new(source: Arc<dyn EventSource>, pipeline: Arc<Pipeline>, state: Arc<StateRegistry>, persistence: Arc<PersistenceAdapter>) -> Self {
        Self { source, pipeline, state, persistence }
    }

    /// Runs until the source reports closure (`Ok(None)`), e.g. on
    /// shutdown.
    pub async fn run(&self) -> Result<(), CoreError> {
        while let Some(event) = self.source.next_event().await? {
            if let Err(err) = self.handle(&event).await {
                warn!(path = ?event.path, %err, "failed to handle file event");
                continue;
            }
            if let Err(err) = self.source.ack(&event.delivery_token).await {
                warn!(token = %event.delivery_token, %err, "failed to ack file event");
            }
        }
        Ok(())
    }

    async fn handle(&self, event: &meta_core_domain::services::FileEvent) -> Result<(), CoreError> {
        match event.kind {
            FileEventKind::Create | FileEventKind::Update => {
                debug!(path = ?event.path, "admitting file event");
                self.pipeline.admit(event.path.clone());
                Ok(())
            }
            FileEventKind::Delete => {
                if let Some(record) = self.state.remove(&event.path) {
                    if let Some(hash_id) = record.hash_id {
                        self.persistence.clear(&hash_id).await?;
                    }
                }
                Ok(())
            }
        }
    }
}
