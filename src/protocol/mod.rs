//! Wire format for the host ↔ peripheral protocol
//!
//! This module provides opcodes, the tile layout word, and the packet codec. Nothing here
//! performs I/O.

mod codec;
mod error;
mod metrics;
mod types;

pub use codec::{
    CALL_FUNCTION_LEN, DevicePacket, FunctionSetup, HostCommand, IntSetup, IntUpdate,
    SET_VARIABLE_LEN, SETUP_FUNCTION_HEADER, SETUP_INT_HEADER, UPDATE_INT_HEADER,
};
pub use error::{DecodeError, DecodeResult};
pub use metrics::{MetricsSnapshot, metrics, received_count, sent_count};
pub use types::{Opcode, TileLayout};

pub(crate) use metrics::{Metrics, PacketDirection};

/// Default UDP port used by host and peripheral.
pub const DEFAULT_PORT: u16 = 55555;

/// Receive buffer size; larger datagrams are truncated by the socket.
pub const MAX_DATAGRAM_SIZE: usize = 1500;
