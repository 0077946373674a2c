//! Cleanup actions run during shutdown.
//!
//! # Design Decisions
//! - Strict LIFO: later resources may depend on earlier ones during teardown
//! - Sequential, never concurrent
//! - A failing, panicking or timed-out action never prevents the rest from running
//! - Only the first failure (in execution order) is returned; all are logged

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::error::{BoxError, CleanupError, CleanupFailure};

type Action = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// A named teardown action.
pub struct Cleanup {
    name: String,
    action: Action,
}

impl Cleanup {
    /// A synchronous cleanup. Should return quickly.
    pub fn new<F, E>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            name: name.into(),
            action: Box::new(move || async move { action().map_err(Into::<BoxError>::into) }.boxed()),
        }
    }

    /// An async cleanup, e.g. closing a connection pool.
    pub fn new_async<F, Fut, E>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            name: name.into(),
            action: Box::new(move || async move { action().await.map_err(Into::<BoxError>::into) }.boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the action, converting errors, panics and timeouts into a
    /// [`CleanupError`].
    pub async fn run(self, timeout: Option<Duration>) -> Result<(), CleanupError> {
        let Self { name, action } = self;
        let guarded = AssertUnwindSafe(async move { action().await }).catch_unwind();

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(CleanupError {
                        name,
                        kind: CleanupFailure::TimedOut(limit),
                    })
                }
            },
            None => guarded.await,
        };

        let kind = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => CleanupFailure::Failed(err),
            Err(panic) => CleanupFailure::Panicked(panic_message(panic.as_ref())),
        };
        Err(CleanupError { name, kind })
    }
}

impl std::fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cleanup").field("name", &self.name).finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Append-only stack of cleanup actions.
#[derive(Debug, Default)]
pub struct CleanupStack {
    actions: Vec<Cleanup>,
}

impl CleanupStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cleanup: Cleanup) {
        self.actions.push(cleanup);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action, last registered first.
    ///
    /// Returns the first failure encountered. Later failures are logged only.
    pub async fn run_all(self, timeout: Option<Duration>) -> Result<(), CleanupError> {
        let mut first_error = None;

        for cleanup in self.actions.into_iter().rev() {
            let name = cleanup.name().to_string();
            tracing::debug!(cleanup = %name, "Running cleanup");

            match cleanup.run(timeout).await {
                Ok(()) => tracing::debug!(cleanup = %name, "Cleanup finished"),
                Err(err) => {
                    tracing::error!(cleanup = %name, error = %err.kind, "Cleanup failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording(log: &Arc<Mutex<Vec<String>>>, name: &str, fail: bool) -> Cleanup {
        let log = Arc::clone(log);
        let label = name.to_string();
        Cleanup::new(name, move || {
            log.lock().unwrap().push(label.clone());
            if fail {
                Err(format!("{label} failed"))
            } else {
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn runs_in_reverse_order() {
        for n in [0usize, 1, 5] {
            let log = Arc::new(Mutex::new(Vec::new()));
            let mut stack = CleanupStack::new();
            for i in 0..n {
                stack.push(recording(&log, &format!("c{i}"), false));
            }
            assert_eq!(stack.len(), n);

            stack.run_all(None).await.unwrap();

            let expected: Vec<String> = (0..n).rev().map(|i| format!("c{i}")).collect();
            assert_eq!(*log.lock().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn all_attempted_when_first_fails() {
        for n in [1usize, 5] {
            let log = Arc::new(Mutex::new(Vec::new()));
            let mut stack = CleanupStack::new();
            for i in 0..n {
                // The last registered runs first.
                stack.push(recording(&log, &format!("c{i}"), i == n - 1));
            }

            let err = stack.run_all(None).await.unwrap_err();
            assert_eq!(err.name, format!("c{}", n - 1));
            assert_eq!(log.lock().unwrap().len(), n);
        }
    }

    #[tokio::test]
    async fn first_failure_wins() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CleanupStack::new();
        stack.push(recording(&log, "a", true));
        stack.push(recording(&log, "b", true));

        let err = stack.run_all(None).await.unwrap_err();
        assert_eq!(err.name, "b");
        assert_eq!(err.kind.to_string(), "b failed");
        assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn panic_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CleanupStack::new();
        stack.push(recording(&log, "a", false));
        stack.push(Cleanup::new("boom", || -> Result<(), BoxError> {
            panic!("cleanup exploded")
        }));

        let err = stack.run_all(None).await.unwrap_err();
        assert_eq!(err.name, "boom");
        assert!(matches!(err.kind, CleanupFailure::Panicked(ref msg) if msg == "cleanup exploded"));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn timeout_bounds_async_cleanup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = CleanupStack::new();
        stack.push(recording(&log, "a", false));
        stack.push(Cleanup::new_async("stuck", || async {
            std::future::pending::<Result<(), BoxError>>().await
        }));

        let err = stack
            .run_all(Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert_eq!(err.name, "stuck");
        assert!(matches!(err.kind, CleanupFailure::TimedOut(_)));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }
}
