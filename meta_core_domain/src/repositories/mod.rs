//! Repository ports consumed by the application layer.

pub mod kv_store;
pub mod plugin_descriptor_store;

pub use kv_store::KvStore;
pub use plugin_descriptor_store::PluginDescriptorStore;
