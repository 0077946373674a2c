//! Lifecycle error taxonomy.

use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by cleanup actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by [`Lifecycle`](super::Lifecycle) and
/// [`ServerHandle`](super::ServerHandle).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// `start` was called more than once on the same coordinator.
    #[error("lifecycle already started")]
    AlreadyStarted,

    /// The serve loop exited on its own with an error.
    #[error("serve loop failed: {0}")]
    ServeLoop(#[source] ServeError),

    /// The server did not stop within its deadline.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    /// A cleanup action failed.
    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    /// Termination signal listeners could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] io::Error),

    /// `start` was called outside of a tokio runtime.
    #[error("no tokio runtime available to launch the serve loop")]
    NoRuntime,
}

/// Terminal error of a serve loop. Cloneable so any number of observers
/// can read it.
#[derive(Debug, Clone, Error)]
#[error(transparent)]
pub struct ServeError(Arc<io::Error>);

impl ServeError {
    /// Kind of the underlying I/O error.
    pub fn kind(&self) -> io::ErrorKind {
        self.0.kind()
    }
}

impl From<io::Error> for ServeError {
    fn from(err: io::Error) -> Self {
        Self(Arc::new(err))
    }
}

/// Errors from asking a handle to stop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShutdownError {
    /// In-flight work did not drain in time; the serve loop was force-closed.
    #[error("graceful shutdown did not finish within {0:?}")]
    DeadlineExceeded(Duration),
}

/// Why a cleanup action failed.
#[derive(Debug, Error)]
pub enum CleanupFailure {
    #[error("{0}")]
    Failed(#[source] BoxError),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("panicked: {0}")]
    Panicked(String),
}

/// A failed cleanup action, tagged with the name it was registered under.
#[derive(Debug, Error)]
#[error("cleanup `{name}` failed: {kind}")]
pub struct CleanupError {
    pub name: String,
    #[source]
    pub kind: CleanupFailure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LifecycleError::AlreadyStarted;
        assert_eq!(err.to_string(), "lifecycle already started");

        let err = LifecycleError::from(ShutdownError::DeadlineExceeded(Duration::from_secs(2)));
        assert_eq!(err.to_string(), "graceful shutdown did not finish within 2s");

        let err = CleanupError {
            name: "db".into(),
            kind: CleanupFailure::Failed("connection reset".into()),
        };
        assert_eq!(err.to_string(), "cleanup `db` failed: connection reset");
    }

    #[test]
    fn serve_error_is_shared() {
        let err = ServeError::from(io::Error::new(io::ErrorKind::BrokenPipe, "listener died"));
        let copy = err.clone();
        assert_eq!(copy.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(copy.to_string(), "listener died");
    }
}
