//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT and SIGTERM
//! - Resolve once either arrives, reporting which one
//!
//! # Design Decisions
//! - Handlers are installed eagerly so registration errors surface before waiting
//! - Non-Unix platforms only get Ctrl+C

use std::fmt;
use std::future::Future;
use std::io;

/// Process termination request received from the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Interrupt => write!(f, "SIGINT"),
            TerminationSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Install termination handlers and return a future resolving on the first signal.
#[cfg(unix)]
pub fn termination() -> io::Result<impl Future<Output = TerminationSignal> + Send> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => TerminationSignal::Interrupt,
            _ = sigterm.recv() => TerminationSignal::Terminate,
        }
    })
}

/// Install termination handlers and return a future resolving on the first signal.
#[cfg(not(unix))]
pub fn termination() -> io::Result<impl Future<Output = TerminationSignal> + Send> {
    Ok(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Ctrl+C handler failed");
            std::future::pending::<()>().await;
        }
        TerminationSignal::Interrupt
    })
}
