pub mod callback_server;
pub mod metrics_endpoint;
pub mod plugin_client;

pub use callback_server::{router as callback_router_app, serve as serve_callback_server};
pub use metrics_endpoint::{router as metrics_router_app, serve as serve_metrics_server};
pub use plugin_client::HttpPluginClient;
