pub mod file_plugin_descriptor_store;
pub mod memory_kv;
pub mod sqlite_kv;

pub use file_plugin_descriptor_store::FilePluginDescriptorStore;
pub use memory_kv::InMemoryKvStore;
pub use sqlite_kv::SqliteKvStore;
