//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the caller's Axum Router with the standard middleware stack
//! - Mount the JSON metrics snapshot endpoint
//! - Bind the listener and expose the result as a [`Serveable`]
//! - Serve with graceful shutdown driven by the lifecycle stop signal

use axum::{
    extract::State,
    middleware,
    routing::get,
    Json, Router,
};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::middleware::track_requests;
use crate::lifecycle::{Serveable, ServerHandle, Signal};
use crate::net::{self, BindError};
use crate::observability::metrics::{MetricsSnapshot, RequestMetrics};

/// A bound HTTP server, ready to be handed to a [`ServerHandle`].
pub struct HttpServer {
    listener: TcpListener,
    addr: SocketAddr,
    router: Router,
}

impl HttpServer {
    /// Bind the configured address and prepare `app` with the standard stack.
    pub async fn bind(
        config: &ServerConfig,
        app: Router,
        metrics: Arc<RequestMetrics>,
    ) -> Result<Self, BindError> {
        let (listener, addr) = net::bind(&config.listener).await?;
        let router = Self::build_router(config, app, metrics);
        Ok(Self {
            listener,
            addr,
            router,
        })
    }

    /// Use an already bound listener and a fully built router as is.
    pub fn from_listener(listener: TcpListener, router: Router) -> io::Result<Self> {
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            router,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Request tracking wraps the timeout, so timed-out requests are still
    /// counted.
    ///
    /// # Panics
    ///
    /// Panics if `app` already routes `observability.vars_path`.
    #[allow(deprecated)]
    pub fn build_router(config: &ServerConfig, app: Router, metrics: Arc<RequestMetrics>) -> Router {
        let vars = Router::new()
            .route(&config.observability.vars_path, get(vars_handler))
            .with_state(Arc::clone(&metrics));

        app.merge(vars).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(metrics, track_requests))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Bind and wrap in a [`ServerHandle`] configured from `config`.
    pub async fn bind_handle(
        config: &ServerConfig,
        app: Router,
        metrics: Arc<RequestMetrics>,
    ) -> Result<ServerHandle<Self>, BindError> {
        let server = Self::bind(config, app, metrics).await?;
        Ok(ServerHandle::new(server)
            .with_shutdown_timeout(Duration::from_secs(config.lifecycle.drain_timeout_secs)))
    }
}

impl Serveable for HttpServer {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    fn serve(self, stop: Signal) -> impl Future<Output = io::Result<()>> + Send + 'static {
        let Self {
            listener,
            addr,
            router,
        } = self;

        async move {
            tracing::info!(address = %addr, "HTTP server starting");
            axum::serve(listener, router)
                .with_graceful_shutdown(stop.fired())
                .await?;
            tracing::info!(address = %addr, "HTTP server stopped");
            Ok(())
        }
    }
}

/// Expvar-style JSON view of the request metrics.
async fn vars_handler(State(metrics): State<Arc<RequestMetrics>>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}
