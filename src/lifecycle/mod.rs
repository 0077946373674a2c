//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (handle.rs):
//!     Bound Serveable → start hooks → spawn serve loop
//!
//! Waiting (coordinator.rs, signals.rs):
//!     SIGTERM/SIGINT  ┐
//!                     ├─ first wins → Draining
//!     serve loop exit ┘
//!
//! Shutdown (coordinator.rs, cleanup.rs):
//!     Stop signal → drain until deadline → force close → cleanups (LIFO)
//! ```
//!
//! # Design Decisions
//! - Start runs exactly once per handle, even under concurrent calls
//! - Shutdown is always bounded by a deadline (explicit or default)
//! - Cleanups are sequential and fault isolated; the first failure is reported

pub mod cleanup;
pub mod coordinator;
pub mod error;
pub mod handle;
pub mod signals;
pub mod trigger;

pub use cleanup::{Cleanup, CleanupStack};
pub use coordinator::{Lifecycle, LifecycleState, DEFAULT_SHUTDOWN_TIMEOUT};
pub use error::{BoxError, CleanupError, CleanupFailure, LifecycleError, ServeError, ShutdownError};
pub use handle::{Serveable, ServerHandle, StartContext, DEFAULT_DRAIN_TIMEOUT};
pub use trigger::{Signal, Trigger};
