//! Crate-level error type

use thiserror::Error;

use crate::host::CommandError;
use crate::protocol::DecodeError;
use crate::registry::RegistryError;
use crate::transport::TransportError;

/// Any error this crate reports
#[derive(Error, Debug)]
pub enum Error {
    /// Socket setup or send failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed datagram, for callers decoding with [`crate::DevicePacket::decode`]
    /// themselves. The host's own dispatcher reports these through
    /// [`crate::host::Dispatch`] instead.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Registry refused a mutation made through [`crate::SharedRegistry::lock`]
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Command could not be issued
    #[error(transparent)]
    Command(#[from] CommandError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
