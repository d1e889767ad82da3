//! Opcodes and the bit-packed tile layout word

use std::fmt;

/// First byte of every datagram.
///
/// 0x02 is direction dependent: hosts send it as a force-setup request, while older
/// peripheral firmware uses it for integer-variable setup. See [`crate::protocol::DevicePacket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Device registers a callable function
    SetupFunction = 0x00,
    /// Host discovery beacon
    Beacon = 0x01,
    /// Host asks the device to resend every setup packet
    ForceSetup = 0x02,
    /// Host invokes a device function
    CallFunction = 0x03,
    /// Device registers an integer variable
    SetupInt = 0x04,
    /// Host writes an integer variable
    SetVariable = 0x05,
    /// Device pushes a run of variable values
    UpdateInt = 0x06,
    /// Host asks for a bulk value update
    RequestUpdate = 0x07,
}

impl Opcode {
    /// Legacy device→host opcode for integer-variable setup.
    pub const LEGACY_SETUP_INT: u8 = 0x02;

    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::SetupFunction),
            0x01 => Some(Self::Beacon),
            0x02 => Some(Self::ForceSetup),
            0x03 => Some(Self::CallFunction),
            0x04 => Some(Self::SetupInt),
            0x05 => Some(Self::SetVariable),
            0x06 => Some(Self::UpdateInt),
            0x07 => Some(Self::RequestUpdate),
            _ => None,
        }
    }

    /// Classify the first byte of a device→host datagram. The legacy 0x02 maps to
    /// [`Opcode::SetupInt`].
    #[must_use]
    pub const fn from_device_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::SetupFunction),
            0x04 | Self::LEGACY_SETUP_INT => Some(Self::SetupInt),
            0x06 => Some(Self::UpdateInt),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this opcode is sent by the host
    #[must_use]
    pub const fn is_host_command(self) -> bool {
        matches!(
            self,
            Self::Beacon
                | Self::ForceSetup
                | Self::CallFunction
                | Self::SetVariable
                | Self::RequestUpdate
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SetupFunction => "SetupFunction",
            Self::Beacon => "Beacon",
            Self::ForceSetup => "ForceSetup",
            Self::CallFunction => "CallFunction",
            Self::SetupInt => "SetupInt",
            Self::SetVariable => "SetVariable",
            Self::UpdateInt => "UpdateInt",
            Self::RequestUpdate => "RequestUpdate",
        };
        write!(f, "{name}")
    }
}

/// Tile placement decoded from a 32-bit flags word.
///
/// ```text
///  31    28 27    24 23    20 19    16 15    12 11     8 7              0
/// +--------+--------+--------+--------+--------+--------+----------------+
/// |   x    |   y    |   w    |   h    |   c1   |   c2   |    reserved    |
/// +--------+--------+--------+--------+--------+--------+----------------+
/// ```
///
/// Position and size are in units of a 16×16 grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileLayout {
    /// Column
    pub x: u8,
    /// Row
    pub y: u8,
    /// Width
    pub w: u8,
    /// Height
    pub h: u8,
    /// Primary colour index
    pub c1: u8,
    /// Secondary colour index
    pub c2: u8,
    /// Low byte, passed through untouched
    pub reserved: u8,
}

impl TileLayout {
    /// Number of cells along each side of the layout grid.
    pub const GRID_SIZE: u8 = 16;

    /// Split a flags word into its fields.
    #[must_use]
    pub const fn from_flags(flags: u32) -> Self {
        Self {
            x: nibble(flags, 28),
            y: nibble(flags, 24),
            w: nibble(flags, 20),
            h: nibble(flags, 16),
            c1: nibble(flags, 12),
            c2: nibble(flags, 8),
            reserved: (flags & 0xFF) as u8,
        }
    }

    /// Pack the fields back into a flags word. Nibble fields are masked to 4 bits.
    #[must_use]
    pub const fn to_flags(self) -> u32 {
        ((self.x as u32 & 0xF) << 28)
            | ((self.y as u32 & 0xF) << 24)
            | ((self.w as u32 & 0xF) << 20)
            | ((self.h as u32 & 0xF) << 16)
            | ((self.c1 as u32 & 0xF) << 12)
            | ((self.c2 as u32 & 0xF) << 8)
            | self.reserved as u32
    }
}

const fn nibble(flags: u32, shift: u32) -> u8 {
    ((flags >> shift) & 0xF) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for byte in 0x00..=0x07u8 {
            let opcode = Opcode::from_u8(byte).unwrap();
            assert_eq!(opcode.as_u8(), byte);
        }
        assert!(Opcode::from_u8(0xFF).is_none());
        assert!(Opcode::from_u8(0x08).is_none());
    }

    #[test]
    fn test_host_command_direction() {
        assert!(Opcode::Beacon.is_host_command());
        assert!(Opcode::SetVariable.is_host_command());
        assert!(!Opcode::SetupInt.is_host_command());
        assert!(!Opcode::UpdateInt.is_host_command());
    }

    #[test]
    fn test_device_byte_classification() {
        assert_eq!(Opcode::from_device_byte(0x00), Some(Opcode::SetupFunction));
        assert_eq!(Opcode::from_device_byte(0x02), Some(Opcode::SetupInt));
        assert_eq!(Opcode::from_device_byte(0x04), Some(Opcode::SetupInt));
        assert_eq!(Opcode::from_device_byte(0x06), Some(Opcode::UpdateInt));
        for byte in [0x01, 0x03, 0x05, 0x07, 0xFF] {
            assert_eq!(Opcode::from_device_byte(byte), None);
        }
    }

    #[test]
    fn test_layout_bit_split() {
        let layout = TileLayout::from_flags(0xDE32_0F00);
        assert_eq!(
            layout,
            TileLayout {
                x: 13,
                y: 14,
                w: 3,
                h: 2,
                c1: 0,
                c2: 15,
                reserved: 0x00,
            }
        );
    }

    #[test]
    fn test_layout_reserved_byte() {
        let layout = TileLayout::from_flags(0x0000_00A5);
        assert_eq!(layout.reserved, 0xA5);
        assert_eq!(layout.x, 0);
        assert_eq!(layout.to_flags(), 0x0000_00A5);
    }

    #[test]
    fn test_layout_masks_wide_fields() {
        let layout = TileLayout {
            x: 0x1F,
            ..TileLayout::default()
        };
        assert_eq!(layout.to_flags(), 0xF000_0000);
    }
}
