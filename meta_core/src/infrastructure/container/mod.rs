pub mod bollard_runtime;
pub mod docker_manager;

pub use bollard_runtime::BollardRuntime;
pub use docker_manager::{ContainerManager, WorkerEnvironment};
