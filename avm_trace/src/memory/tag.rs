use serde::{Deserialize, Serialize};

use crate::util::{ff_fits_in_bits, truncate_to_bits, FF};

/// Type tag attached to every memory cell.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum MemoryTag {
    #[default]
    FF = 0,
    U1 = 1,
    U8 = 2,
    U16 = 3,
    U32 = 4,
    U64 = 5,
    U128 = 6,
}

impl MemoryTag {
    pub const ALL: [MemoryTag; 7] = [
        MemoryTag::FF,
        MemoryTag::U1,
        MemoryTag::U8,
        MemoryTag::U16,
        MemoryTag::U32,
        MemoryTag::U64,
        MemoryTag::U128,
    ];

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MemoryTag::FF),
            1 => Some(MemoryTag::U1),
            2 => Some(MemoryTag::U8),
            3 => Some(MemoryTag::U16),
            4 => Some(MemoryTag::U32),
            5 => Some(MemoryTag::U64),
            6 => Some(MemoryTag::U128),
            _ => None,
        }
    }

    /// Bit-width of the values carried by the tag. Field elements report 254.
    pub const fn bits(self) -> u32 {
        match self {
            MemoryTag::FF => 254,
            MemoryTag::U1 => 1,
            MemoryTag::U8 => 8,
            MemoryTag::U16 => 16,
            MemoryTag::U32 => 32,
            MemoryTag::U64 => 64,
            MemoryTag::U128 => 128,
        }
    }

    /// Number of bytes processed by the binary gadget for this tag.
    pub const fn num_bytes(self) -> usize {
        match self {
            MemoryTag::FF => 32,
            MemoryTag::U1 | MemoryTag::U8 => 1,
            MemoryTag::U16 => 2,
            MemoryTag::U32 => 4,
            MemoryTag::U64 => 8,
            MemoryTag::U128 => 16,
        }
    }

    pub const fn is_integral(self) -> bool {
        !matches!(self, MemoryTag::FF)
    }

    /// Reduces `value` into the range of the tag.
    pub fn truncate(self, value: FF) -> FF {
        truncate_to_bits(value, self.bits())
    }

    /// Returns true if `value` is a valid value for the tag.
    pub fn contains(self, value: FF) -> bool {
        !self.is_integral() || ff_fits_in_bits(value, self.bits())
    }

    pub fn as_ff(self) -> FF {
        FF::from(self as u8 as u64)
    }
}

impl core::fmt::Display for MemoryTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            MemoryTag::FF => "ff",
            MemoryTag::U1 => "u1",
            MemoryTag::U8 => "u8",
            MemoryTag::U16 => "u16",
            MemoryTag::U32 => "u32",
            MemoryTag::U64 => "u64",
            MemoryTag::U128 => "u128",
        };
        f.write_str(name)
    }
}
