//! Domain services: pure computations (checksum) and ports (traits) that
//! infrastructure adapters implement.

pub mod checksum;
pub mod container_runtime;
pub mod event_source;
pub mod plugin_client;

pub use checksum::{compute_full_hash, compute_midhash};
pub use container_runtime::{ContainerRuntime, SpawnSpec};
pub use event_source::{EventSource, FileEvent, FileEventKind};
pub use plugin_client::{HealthResponse, ManifestResponse, PluginClient, RunRequest};
