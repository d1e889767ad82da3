//! Transport-level error types covering bind and send failures.

use std::net::SocketAddr;

use thiserror::Error;

use super::socket::SocketError;

/// Unified error type for transport operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Socket could not be bound; the host cannot run without it.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// Cause
        #[source]
        source: SocketError,
    },

    /// Datagram could not be sent. Recoverable.
    #[error("failed to send to {addr}: {source}")]
    Send {
        /// Destination
        addr: SocketAddr,
        /// Cause
        #[source]
        source: SocketError,
    },

    /// Socket option or receive failure.
    #[error("socket error: {0}")]
    Socket(#[from] SocketError),

    /// No IPv4 address could be determined for this machine.
    #[error("no local IPv4 address available")]
    NoLocalAddress,
}
