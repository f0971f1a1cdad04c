//! Identifier for one running plugin worker container.
//!
//! Wraps the container runtime's own container ID; the container manager
//! also derives a human-readable `containerName` (`meta-plugin-{pluginId}-
//! {index}`) which is carried on the `PluginInstance` entity itself, not
//! here.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::error::CoreError;

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginInstanceId(String);

impl PluginInstanceId {
    pub fn new(container_id: impl Into<String>) -> Result<Self, CoreError> {
        let container_id = container_id.into();
        if container_id.trim().is_empty() {
            return Err(CoreError::invalid_config("plugin instance id cannot be empty"));
        }
        Ok(Self(container_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PluginInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
