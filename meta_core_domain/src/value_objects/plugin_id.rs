//! Stable, human-assigned identifier for a plugin, as declared in the
//! plugin descriptor document. Distinct from `PluginInstanceId`, which
//! identifies one running container of that plugin.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

static PLUGIN_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new("^[a-z][a-z0-9-]*$").unwrap());

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(String);

impl PluginId {
    pub fn new(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        if !PLUGIN_ID_PATTERN.is_match(&raw) {
            return Err(CoreError::invalid_config(format!(
                "plugin id {raw:?} must match [a-z][a-z0-9-]*"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PluginId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_lowercase_kebab() {
        assert!(PluginId::new("hasher").is_ok());
        assert!(PluginId::new("tag-ger2").is_ok());
    }

    #[test]
    fn rejects_uppercase_and_leading_digit() {
        assert!(PluginId::new("Tagger").is_err());
        assert!(PluginId::new("2tagger").is_err());
    }
}
