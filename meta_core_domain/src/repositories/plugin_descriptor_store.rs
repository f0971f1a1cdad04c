//! Persistence contract for the plugin descriptor document (§4.D, §6).
//! The concrete adapter writes to a temp file and renames over the target,
//! so a reader never observes a partially written document; this trait
//! only specifies the read/write operations, not the atomicity mechanism.

use async_trait::async_trait;

use crate::entities::PluginDescriptorDocument;
use crate::error::CoreError;

#[async_trait]
pub trait PluginDescriptorStore: Send + Sync {
    async fn load(&self) -> Result<PluginDescriptorDocument, CoreError>;

    /// Persists the full document, replacing whatever was there before.
    /// Callers serialize calls to this method themselves; the store does
    /// not provide its own locking beyond atomic replacement of the file
    /// contents.
    async fn save(&self, document: &PluginDescriptorDocument) -> Result<(), CoreError>;
}
