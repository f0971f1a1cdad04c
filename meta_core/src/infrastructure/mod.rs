pub mod config;
pub mod container;
pub mod events;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod repositories;
pub mod runtime;

pub use config::CoreConfig;
pub use metrics::CoreMetrics;
