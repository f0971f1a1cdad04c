//! File-backed [`PluginDescriptorStore`]: the plugin descriptor document is
//! a JSON file on disk, persisted via write-temp-then-rename so a reader
//! never observes a partially written document (spec §4.D/§6).

use std::path::PathBuf;

use async_trait::async_trait;
use meta_core_domain::entities::PluginDescriptorDocument;
use meta_core_domain::repositories::PluginDescriptorStore;
use meta_core_domain::CoreError;
use tokio::io::AsyncWriteExt;

pub struct FilePluginDescriptorStore {
    path: PathBuf,
}

impl FilePluginDescriptorStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PluginDescriptorStore for FilePluginDescriptorStore {
    async fn load(&self) -> Result<PluginDescriptorDocument, CoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(PluginDescriptorDocument::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, document: &PluginDescriptorDocument) -> Result<(), CoreError> {
        let serialized = serde_json::to_vec_pretty(document)?;
        let dir = self.path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let temp_path = dir.join(format!(
            ".{}.tmp",
            self.path.file_name().and_then(|n| n.to_str()).unwrap_or("descriptors")
        ));

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&serialized).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}
