//! Server handle: run-once start, bounded stop, terminal error.
//!
//! # Data Flow
//! ```text
//! start():   Once ─▶ start hooks (in order) ─▶ spawn serve loop
//! serve loop: serve(stop) ─┬─ Ok / Err ─▶ record error ─▶ fire terminated
//!                          └─ force fired ─▶ drop serve future ─▶ fire terminated
//! request_shutdown(): fire stop ─▶ await terminated (deadline) ─▶ force on expiry
//! ```
//!
//! # Design Decisions
//! - Terminal state is permanent; a handle never restarts
//! - `terminated` fires only after the serve future has returned or been dropped
//! - A clean stop-induced exit is not an error

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once, PoisonError};
use std::time::Duration;

use super::error::{LifecycleError, ServeError, ShutdownError};
use super::trigger::{Signal, Trigger};

/// Drain deadline applied when `request_shutdown` is called without one.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A transport that can accept connections and be asked to stop.
///
/// The future returned by [`serve`](Serveable::serve) is the serve loop. It
/// must resolve to `Ok(())` once `stop` fires and in-flight work has drained.
/// Any `Err` it returns is treated as the terminal error of the server.
pub trait Serveable: Send + 'static {
    /// Address the transport is bound to.
    fn local_addr(&self) -> SocketAddr;

    /// Run the serve loop until `stop` fires or the transport fails.
    fn serve(self, stop: Signal) -> impl Future<Output = io::Result<()>> + Send + 'static;
}

/// Passed to start hooks.
#[derive(Debug, Clone)]
pub struct StartContext {
    /// Address the server is bound to.
    pub addr: SocketAddr,
    /// Fires when shutdown has been requested.
    pub stop: Signal,
}

type StartHook = Box<dyn Fn(&StartContext) + Send + Sync>;

/// Owns one [`Serveable`] and tracks its run/terminated state.
pub struct ServerHandle<S> {
    addr: SocketAddr,
    serveable: Mutex<Option<S>>,
    on_start: Vec<StartHook>,
    start_once: Once,
    stop: Trigger,
    force: Trigger,
    terminated: Trigger,
    error: Arc<Mutex<Option<ServeError>>>,
    drain_timeout: Duration,
}

impl<S: Serveable> ServerHandle<S> {
    /// Wrap an already bound transport.
    pub fn new(serveable: S) -> Self {
        Self {
            addr: serveable.local_addr(),
            serveable: Mutex::new(Some(serveable)),
            on_start: Vec::new(),
            start_once: Once::new(),
            stop: Trigger::new(),
            force: Trigger::new(),
            terminated: Trigger::new(),
            error: Arc::new(Mutex::new(None)),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Add a hook run synchronously by `start`, before the serve loop launches.
    pub fn with_on_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StartContext) + Send + Sync + 'static,
    {
        self.on_start.push(Box::new(hook));
        self
    }

    /// Deadline used by `request_shutdown` when none is given.
    /// A zero duration keeps the default.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.drain_timeout = timeout;
        }
        self
    }

    /// Run start hooks, then launch the serve loop in the background.
    ///
    /// Only the first call has any effect, including under concurrent calls.
    /// Every call returns once that first call's hooks have run. If a hook
    /// panics, the serveable is dropped and the handle settles as terminated.
    pub fn start(&self) -> Result<(), LifecycleError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LifecycleError::NoRuntime)?;

        // A panicking hook poisons the Once; later calls find no serveable.
        self.start_once.call_once_force(|_| {
            // Shut down before it was ever started: nothing to launch.
            let Some(serveable) = self.take_serveable() else {
                return;
            };
            // Armed before the hooks so a panicking hook still settles termination.
            let terminated = self.terminated.fire_on_drop();

            let ctx = StartContext {
                addr: self.addr,
                stop: self.stop.subscribe(),
            };
            for hook in &self.on_start {
                hook(&ctx);
            }

            let stop = self.stop.subscribe();
            let mut force = self.force.subscribe();
            let slot = Arc::clone(&self.error);
            let addr = self.addr;

            runtime.spawn(async move {
                let _terminated = terminated;
                tracing::debug!(address = %addr, "Serve loop running");

                let result = tokio::select! {
                    result = serveable.serve(stop) => result,
                    _ = force.wait() => {
                        tracing::warn!(address = %addr, "Serve loop force-closed after drain deadline");
                        Ok(())
                    }
                };

                match result {
                    Ok(()) => tracing::debug!(address = %addr, "Serve loop exited"),
                    Err(err) => {
                        tracing::error!(address = %addr, error = %err, "Serve loop failed");
                        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.into());
                    }
                }
            });
        });

        Ok(())
    }

    /// Ask the serve loop to stop and drain within `deadline`
    /// (default [`DEFAULT_DRAIN_TIMEOUT`]).
    ///
    /// Returns once the serve loop has terminated. If the deadline passes
    /// first, the serve loop is force-closed and
    /// [`ShutdownError::DeadlineExceeded`] is returned.
    pub async fn request_shutdown(&self, deadline: Option<Duration>) -> Result<(), ShutdownError> {
        let deadline = deadline.unwrap_or(self.drain_timeout);

        if self.stop.fire() {
            tracing::info!(address = %self.addr, deadline = ?deadline, "Stop requested");
        }

        // Never started: release the socket and settle as terminated.
        if let Some(serveable) = self.take_serveable() {
            drop(serveable);
            self.terminated.fire();
            return Ok(());
        }

        let mut terminated = self.terminated.subscribe();
        if tokio::time::timeout(deadline, terminated.wait()).await.is_ok() {
            return Ok(());
        }

        tracing::warn!(address = %self.addr, deadline = ?deadline, "Drain deadline exceeded, forcing close");
        self.force.fire();
        terminated.wait().await;
        Err(ShutdownError::DeadlineExceeded(deadline))
    }

    /// One-shot signal that fires after the serve loop has fully exited.
    pub fn terminated(&self) -> Signal {
        self.terminated.subscribe()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.is_fired()
    }

    /// The error that ended the serve loop, if it did not stop cleanly.
    pub fn last_error(&self) -> Option<ServeError> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Address the server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    fn take_serveable(&self) -> Option<S> {
        self.serveable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<S> std::fmt::Debug for ServerHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("addr", &self.addr)
            .field("stop_requested", &self.stop.is_fired())
            .field("terminated", &self.terminated.is_fired())
            .finish()
    }
}
