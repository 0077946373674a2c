//! Server lifecycle toolkit: bind, serve, observe, shut down cleanly.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{Lifecycle, LifecycleError, Serveable, ServerHandle};
pub use observability::RequestMetrics;
