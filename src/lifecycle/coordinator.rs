//! Lifecycle coordinator.
//!
//! # State Transitions
//! ```text
//! Created ─start()─▶ Started ─wait()─▶ (signal | serve loop exit)
//!         ─shutdown()─▶ Draining ─▶ Terminated
//! ```
//!
//! # Design Decisions
//! - `start` is single-use; a second call is rejected without side effects
//! - Shutdown errors from the handle are logged, never returned;
//!   only cleanup failures propagate out of `shutdown`
//! - `run` always drains and cleans up, even when the serve loop failed

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::cleanup::{Cleanup, CleanupStack};
use super::error::{BoxError, LifecycleError};
use super::handle::{Serveable, ServerHandle};
use super::signals;
use crate::config::LifecycleConfig;

/// Shutdown deadline used when none is configured or supplied.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Created = 0,
    Started = 1,
    Draining = 2,
    Terminated = 3,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Created,
            1 => LifecycleState::Started,
            2 => LifecycleState::Draining,
            _ => LifecycleState::Terminated,
        }
    }
}

/// Drives one [`ServerHandle`] from start to ordered cleanup.
pub struct Lifecycle<S> {
    handle: ServerHandle<S>,
    cleanups: Mutex<CleanupStack>,
    shutdown_timeout: Duration,
    cleanup_timeout: Option<Duration>,
    state: AtomicU8,
}

impl<S: Serveable> Lifecycle<S> {
    pub fn new(handle: ServerHandle<S>) -> Self {
        Self {
            handle,
            cleanups: Mutex::new(CleanupStack::new()),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            cleanup_timeout: None,
            state: AtomicU8::new(LifecycleState::Created as u8),
        }
    }

    /// Build from the `[lifecycle]` config section.
    pub fn from_config(handle: ServerHandle<S>, config: &LifecycleConfig) -> Self {
        let mut lifecycle = Self::new(handle)
            .with_shutdown_timeout(Duration::from_secs(config.shutdown_timeout_secs));
        lifecycle.cleanup_timeout = config.cleanup_timeout_secs.map(Duration::from_secs);
        lifecycle
    }

    /// Default shutdown deadline. Zero means unset and keeps 30s.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = if timeout.is_zero() {
            DEFAULT_SHUTDOWN_TIMEOUT
        } else {
            timeout
        };
        self
    }

    /// Bound each cleanup action individually.
    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = Some(timeout);
        self
    }

    /// Register a cleanup action. Actions run in reverse registration order.
    pub fn register_cleanup(&mut self, cleanup: Cleanup) {
        self.cleanups
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cleanup);
    }

    /// Register a synchronous cleanup action.
    pub fn on_cleanup<F, E>(&mut self, name: impl Into<String>, action: F)
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        self.register_cleanup(Cleanup::new(name, action));
    }

    /// Register an async cleanup action.
    pub fn on_cleanup_async<F, Fut, E>(&mut self, name: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.register_cleanup(Cleanup::new_async(name, action));
    }

    /// Start the server. Non-blocking.
    pub fn start(&self) -> Result<(), LifecycleError> {
        self.state
            .compare_exchange(
                LifecycleState::Created as u8,
                LifecycleState::Started as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| LifecycleError::AlreadyStarted)?;

        if let Err(err) = self.handle.start() {
            // Nothing was launched; allow a retry.
            self.state
                .store(LifecycleState::Created as u8, Ordering::Release);
            return Err(err);
        }
        tracing::info!(address = %self.handle.addr(), "Server started");
        Ok(())
    }

    /// Block until SIGINT/SIGTERM arrives or the serve loop exits on its own.
    ///
    /// Returns the serve loop's error if it failed; `Ok` otherwise.
    pub async fn wait(&self) -> Result<(), LifecycleError> {
        let signal = signals::termination().map_err(LifecycleError::Signal)?;
        self.wait_until(async move {
            let received = signal.await;
            tracing::info!(signal = %received, "Termination signal received");
        })
        .await
    }

    /// Like [`wait`](Self::wait), with a caller-supplied termination request.
    pub async fn wait_until<F>(&self, external: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()>,
    {
        let mut terminated = self.handle.terminated();

        tokio::select! {
            () = external => Ok(()),
            () = terminated.wait() => match self.handle.last_error() {
                Some(err) => Err(LifecycleError::ServeLoop(err)),
                None => {
                    tracing::info!("Serve loop exited");
                    Ok(())
                }
            },
        }
    }

    /// Stop the server within `deadline` (default: the configured shutdown
    /// timeout), then run every cleanup action in reverse order.
    ///
    /// Returns the first cleanup failure. A server that fails to drain in
    /// time is logged, not returned.
    pub async fn shutdown(&self, deadline: Option<Duration>) -> Result<(), LifecycleError> {
        let deadline = self.effective_deadline(deadline);
        self.state
            .store(LifecycleState::Draining as u8, Ordering::Release);
        tracing::info!(address = %self.handle.addr(), deadline = ?deadline, "Shutting down");

        if let Err(err) = self.handle.request_shutdown(Some(deadline)).await {
            tracing::warn!(error = %err, "Server did not shut down cleanly");
        }

        let cleanups = std::mem::take(&mut *self.cleanups.lock().unwrap_or_else(PoisonError::into_inner));
        let count = cleanups.len();
        let result = cleanups.run_all(self.cleanup_timeout).await;

        self.state
            .store(LifecycleState::Terminated as u8, Ordering::Release);
        match &result {
            Ok(()) => tracing::info!(cleanups = count, "Shutdown complete"),
            Err(err) => tracing::warn!(cleanups = count, error = %err, "Shutdown complete with cleanup failures"),
        }
        result.map_err(LifecycleError::from)
    }

    /// `start`, wait for SIGINT/SIGTERM or serve loop exit, then `shutdown`.
    pub async fn run(&self) -> Result<(), LifecycleError> {
        self.start()?;
        let waited = self.wait().await;
        self.finish(waited).await
    }

    /// Like [`run`](Self::run), with a caller-supplied termination request.
    pub async fn run_until<F>(&self, external: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()>,
    {
        self.start()?;
        let waited = self.wait_until(external).await;
        self.finish(waited).await
    }

    // A failed serve loop still gets its cleanups; its error takes precedence.
    async fn finish(&self, waited: Result<(), LifecycleError>) -> Result<(), LifecycleError> {
        let shut_down = self.shutdown(None).await;
        match (waited, shut_down) {
            (Err(err), Err(cleanup)) => {
                tracing::error!(error = %cleanup, "Cleanup failed after serve loop error");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(()), result) => result,
        }
    }

    /// Deadline `shutdown` applies for the given argument.
    pub fn effective_deadline(&self, deadline: Option<Duration>) -> Duration {
        deadline.unwrap_or(self.shutdown_timeout)
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.addr()
    }

    pub fn handle(&self) -> &ServerHandle<S> {
        &self.handle
    }
}

impl<S> std::fmt::Debug for Lifecycle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("handle", &self.handle)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("cleanup_timeout", &self.cleanup_timeout)
            .finish_non_exhaustive()
    }
}
