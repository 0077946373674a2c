//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig
//!     → listener.rs (parse, bind, resolve local address)
//!     → Hand off to the HTTP layer as a bound TcpListener
//! ```
//!
//! # Design Decisions
//! - Bind failures surface before any server handle is created
//! - No half-initialised listener is ever returned

pub mod listener;

pub use listener::{bind, bind_addr, BindError};
