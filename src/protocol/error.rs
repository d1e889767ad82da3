//! Codec error types

use thiserror::Error;

/// Reasons an inbound datagram cannot be decoded.
///
/// Every variant is recoverable: the caller drops the single packet and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Zero-length datagram
    #[error("empty datagram")]
    Empty,

    /// Datagram shorter than the fixed header of its opcode
    #[error("packet too short for opcode {opcode:#04x}: need {needed} bytes, got {got}")]
    TooShort {
        /// Opcode byte
        opcode: u8,
        /// Minimum length for this opcode
        needed: usize,
        /// Actual length
        got: usize,
    },

    /// First byte is not an opcode known for this direction
    #[error("unknown opcode: {opcode:#04x}")]
    UnknownOpcode {
        /// Offending byte
        opcode: u8,
    },
}

/// Result type alias
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
