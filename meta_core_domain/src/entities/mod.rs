//! Entities for the pipeline and plugin scheduler domain.

pub mod file_record;
pub mod gate_state;
pub mod plugin_descriptor;
pub mod plugin_instance;
pub mod task;

pub use file_record::{FileRecord, ProcessingState};
pub use gate_state::GateState;
pub use plugin_descriptor::{
    infer_queue_class, PluginDescriptor, PluginDescriptorDocument, PluginManifest, QueueClass, ResourceLimits,
    QUEUE_CLASS_INFERENCE_THRESHOLD_SECS,
};
pub use plugin_instance::{container_name, InstanceStatus, PluginInstance};
pub use task::Task;
