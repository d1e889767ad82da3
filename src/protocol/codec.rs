//! Packet encoding and decoding
//!
//! All functions here are pure. Multi-byte integers are big-endian and names are a UTF-8
//! tail running to the end of the datagram, with no length prefix.
//!
//! ```text
//! function setup  [0x00][idx][name ...]
//! int setup       [0x04][idx][value:4][min:4][max:4][flags:4][name ...]
//! int update      [0x06][start][v0:4][v1:4] ...
//! beacon          [0x01]
//! force setup     [0x02]
//! call function   [0x03][idx]
//! set variable    [0x05][idx][value:4]
//! request update  [0x07]
//! ```

use bytes::{Buf, BufMut};

use super::error::{DecodeError, DecodeResult};
use super::types::{Opcode, TileLayout};

/// Fixed header length of a function setup packet.
pub const SETUP_FUNCTION_HEADER: usize = 2;
/// Fixed header length of an integer setup packet.
pub const SETUP_INT_HEADER: usize = 18;
/// Fixed header length of an integer update packet.
pub const UPDATE_INT_HEADER: usize = 2;
/// Length of a call-function command.
pub const CALL_FUNCTION_LEN: usize = 2;
/// Length of a set-variable command.
pub const SET_VARIABLE_LEN: usize = 6;

/// Function registration sent by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSetup {
    /// Index as transmitted by the device
    pub index: u8,
    /// Display name
    pub name: String,
}

/// Integer-variable registration sent by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntSetup {
    /// Index as transmitted by the device
    pub index: u8,
    /// Initial value
    pub value: i32,
    /// Lower bound
    pub min: i32,
    /// Upper bound
    pub max: i32,
    /// Raw layout word, see [`TileLayout`]
    pub flags: u32,
    /// Display name
    pub name: String,
}

impl IntSetup {
    /// Layout decoded from the flags word.
    #[must_use]
    pub const fn layout(&self) -> TileLayout {
        TileLayout::from_flags(self.flags)
    }
}

/// Run of consecutive variable values sent by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntUpdate {
    /// Index of the first variable
    pub start: u8,
    /// New values, in index order
    pub values: Vec<i32>,
}

/// Datagram travelling from the device to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevicePacket {
    /// 0x00
    SetupFunction(FunctionSetup),
    /// 0x04, or 0x02 from older firmware
    SetupInt(IntSetup),
    /// 0x06
    UpdateInt(IntUpdate),
}

impl DevicePacket {
    /// Opcode this packet is written with.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::SetupFunction(_) => Opcode::SetupFunction,
            Self::SetupInt(_) => Opcode::SetupInt,
            Self::UpdateInt(_) => Opcode::UpdateInt,
        }
    }

    /// Encode to bytes
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::SetupFunction(setup) => {
                let mut buf = Vec::with_capacity(SETUP_FUNCTION_HEADER + setup.name.len());
                buf.put_u8(Opcode::SetupFunction.as_u8());
                buf.put_u8(setup.index);
                buf.put_slice(setup.name.as_bytes());
                buf
            }
            Self::SetupInt(setup) => {
                let mut buf = Vec::with_capacity(SETUP_INT_HEADER + setup.name.len());
                buf.put_u8(Opcode::SetupInt.as_u8());
                buf.put_u8(setup.index);
                buf.put_i32(setup.value);
                buf.put_i32(setup.min);
                buf.put_i32(setup.max);
                buf.put_u32(setup.flags);
                buf.put_slice(setup.name.as_bytes());
                buf
            }
            Self::UpdateInt(update) => {
                let mut buf = Vec::with_capacity(UPDATE_INT_HEADER + update.values.len() * 4);
                buf.put_u8(Opcode::UpdateInt.as_u8());
                buf.put_u8(update.start);
                for value in &update.values {
                    buf.put_i32(*value);
                }
                buf
            }
        }
    }

    /// Decode a datagram received from the device.
    ///
    /// A trailing partial word in an update packet is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the datagram is empty, shorter than the fixed header for its
    /// opcode, or starts with a byte that is not a device→host opcode.
    pub fn decode(bytes: &[u8]) -> DecodeResult<Self> {
        let Some(&opcode) = bytes.first() else {
            return Err(DecodeError::Empty);
        };

        match opcode {
            0x00 => {
                check_len(bytes, SETUP_FUNCTION_HEADER)?;
                let mut buf = &bytes[1..];
                let index = buf.get_u8();
                Ok(Self::SetupFunction(FunctionSetup {
                    index,
                    name: decode_name(buf),
                }))
            }
            0x04 | Opcode::LEGACY_SETUP_INT => {
                check_len(bytes, SETUP_INT_HEADER)?;
                let mut buf = &bytes[1..];
                let index = buf.get_u8();
                let value = buf.get_i32();
                let min = buf.get_i32();
                let max = buf.get_i32();
                let flags = buf.get_u32();
                Ok(Self::SetupInt(IntSetup {
                    index,
                    value,
                    min,
                    max,
                    flags,
                    name: decode_name(buf),
                }))
            }
            0x06 => {
                check_len(bytes, UPDATE_INT_HEADER)?;
                let mut buf = &bytes[1..];
                let start = buf.get_u8();
                let count = buf.remaining() / 4;
                let values = (0..count).map(|_| buf.get_i32()).collect();
                Ok(Self::UpdateInt(IntUpdate { start, values }))
            }
            other => Err(DecodeError::UnknownOpcode { opcode: other }),
        }
    }
}

/// Datagram travelling from the host to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Discovery beacon
    Beacon,
    /// Ask the device to resend all setup packets
    ForceSetup,
    /// Invoke a function
    CallFunction {
        /// Function index
        index: u8,
    },
    /// Write a variable
    SetVariable {
        /// Variable index
        index: u8,
        /// New value
        value: i32,
    },
    /// Ask for a bulk value update
    RequestUpdate,
}

impl HostCommand {
    /// Opcode this command is written with.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Beacon => Opcode::Beacon,
            Self::ForceSetup => Opcode::ForceSetup,
            Self::CallFunction { .. } => Opcode::CallFunction,
            Self::SetVariable { .. } => Opcode::SetVariable,
            Self::RequestUpdate => Opcode::RequestUpdate,
        }
    }

    /// Encode to bytes
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SET_VARIABLE_LEN);
        buf.put_u8(self.opcode().as_u8());
        match *self {
            Self::CallFunction { index } => buf.put_u8(index),
            Self::SetVariable { index, value } => {
                buf.put_u8(index);
                buf.put_i32(value);
            }
            Self::Beacon | Self::ForceSetup | Self::RequestUpdate => {}
        }
        buf
    }

    /// Decode a datagram sent by a host. Extra trailing bytes are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the datagram is empty, truncated, or not a host command.
    pub fn decode(bytes: &[u8]) -> DecodeResult<Self> {
        let Some(&byte) = bytes.first() else {
            return Err(DecodeError::Empty);
        };
        let opcode = Opcode::from_u8(byte)
            .filter(|op| op.is_host_command())
            .ok_or(DecodeError::UnknownOpcode { opcode: byte })?;

        match opcode {
            Opcode::Beacon => Ok(Self::Beacon),
            Opcode::ForceSetup => Ok(Self::ForceSetup),
            Opcode::RequestUpdate => Ok(Self::RequestUpdate),
            Opcode::CallFunction => {
                check_len(bytes, CALL_FUNCTION_LEN)?;
                Ok(Self::CallFunction { index: bytes[1] })
            }
            Opcode::SetVariable => {
                check_len(bytes, SET_VARIABLE_LEN)?;
                let mut buf = &bytes[1..];
                let index = buf.get_u8();
                Ok(Self::SetVariable {
                    index,
                    value: buf.get_i32(),
                })
            }
            Opcode::SetupFunction | Opcode::SetupInt | Opcode::UpdateInt => {
                Err(DecodeError::UnknownOpcode { opcode: byte })
            }
        }
    }
}

fn check_len(bytes: &[u8], needed: usize) -> DecodeResult<()> {
    if bytes.len() < needed {
        return Err(DecodeError::TooShort {
            opcode: bytes.first().copied().unwrap_or_default(),
            needed,
            got: bytes.len(),
        });
    }
    Ok(())
}

fn decode_name(tail: &[u8]) -> String {
    String::from_utf8_lossy(tail).into_owned()
}
