//! TCP listener binding.
//!
//! # Responsibilities
//! - Parse the configured bind address
//! - Bind the socket, failing loudly before any server handle exists
//! - Report the actual bound address (resolves port 0)

use std::net::{AddrParseError, SocketAddr};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener construction. Always fatal for startup.
#[derive(Debug, Error)]
pub enum BindError {
    /// The configured address is not a socket address.
    #[error("invalid bind address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddrParseError,
    },

    /// The OS refused the bind (address in use, permission denied, ...).
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Bind to the configured address.
pub async fn bind(config: &ListenerConfig) -> Result<(TcpListener, SocketAddr), BindError> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|source| BindError::InvalidAddress {
            address: config.bind_address.clone(),
            source,
        })?;

    bind_addr(addr).await
}

/// Bind to an already parsed address.
pub async fn bind_addr(addr: SocketAddr) -> Result<(TcpListener, SocketAddr), BindError> {
    let bind_failed = |source| BindError::Bind {
        address: addr,
        source,
    };

    let listener = TcpListener::bind(addr).await.map_err(bind_failed)?;
    let local_addr = listener.local_addr().map_err(bind_failed)?;

    tracing::info!(address = %local_addr, "Listener bound");

    Ok((listener, local_addr))
}
