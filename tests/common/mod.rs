//! Shared utilities for integration tests.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{routing::get, Router};
use serverkit::lifecycle::{Serveable, Signal};
use tokio::sync::oneshot;

/// Serveable without a socket. Stops cleanly when asked, or fails with
/// whatever error is sent through the returned fault channel.
#[allow(dead_code)]
pub struct ScriptedServeable {
    fault: oneshot::Receiver<io::Error>,
}

impl ScriptedServeable {
    #[allow(dead_code)]
    pub fn new() -> (Self, oneshot::Sender<io::Error>) {
        let (tx, rx) = oneshot::channel();
        (Self { fault: rx }, tx)
    }
}

impl Serveable for ScriptedServeable {
    fn local_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    fn serve(self, mut stop: Signal) -> impl Future<Output = io::Result<()>> + Send + 'static {
        let fault = self.fault;
        async move {
            tokio::select! {
                _ = stop.wait() => Ok(()),
                Ok(err) = fault => Err(err),
            }
        }
    }
}

/// Router answering `GET /ping` with `pong`.
#[allow(dead_code)]
pub fn ping_app() -> Router {
    Router::new().route("/ping", get(|| async { "pong" }))
}

/// Shared call log for cleanup ordering assertions.
#[allow(dead_code)]
pub fn call_log() -> Arc<Mutex<Vec<&'static str>>> {
    Arc::new(Mutex::new(Vec::new()))
}

/// HTTP client that never reuses pooled connections.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
