//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum serve loop, graceful shutdown on stop signal)
//!     → TraceLayer → TimeoutLayer → middleware/metrics.rs (count, in-flight, latency)
//!     → caller's handlers, or the metrics snapshot endpoint
//!     → Send to client
//! ```

pub mod middleware;
pub mod server;

pub use server::HttpServer;
