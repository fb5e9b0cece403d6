//! Machine words and byte order.
//!
//! The word width is a compile-time parameter: every machine, codec call
//! and object operation is generic over a [`Word`]. Arithmetic is carried
//! out in 64 bits and truncated back, which gives wrapping semantics at
//! the native width.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use core::fmt::{Debug, Display};

/// Byte order of words stored in machine memory and object files.
///
/// The discriminant is the value stored in object-file headers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little = 0,
    Big = 1,
}

impl Endianness {
    /// Byte order of the host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// Decode a header flag; `None` for anything other than 0 or 1.
    pub fn from_flag(flag: u64) -> Option<Self> {
        match flag {
            0 => Some(Endianness::Little),
            1 => Some(Endianness::Big),
            _ => None,
        }
    }

    /// The header flag for this byte order.
    pub fn flag(self) -> u8 {
        self as u8
    }
}

impl Default for Endianness {
    fn default() -> Self {
        Self::native()
    }
}

impl Display for Endianness {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Endianness::Little => write!(f, "little-endian"),
            Endianness::Big => write!(f, "big-endian"),
        }
    }
}

/// A fixed-width signed machine word.
pub trait Word: Debug + Display + Default + Eq + Ord + Copy + Send + Sync + 'static {
    /// Width in bits.
    const BITS: u32;
    /// Width in bytes.
    const BYTES: usize;

    /// All ones at this width, as an unsigned value.
    const MASK: u64 = if Self::BITS == 64 {
        u64::MAX
    } else {
        (1 << Self::BITS) - 1
    };

    /// Truncate a 64-bit value to this width.
    fn from_i64(value: i64) -> Self;

    /// Sign-extend to 64 bits.
    fn to_i64(self) -> i64;

    /// Read a word from the first [`Word::BYTES`] bytes of `bytes`.
    fn read(bytes: &[u8], endianness: Endianness) -> Self;

    /// Write this word into the first [`Word::BYTES`] bytes of `bytes`.
    fn write(self, bytes: &mut [u8], endianness: Endianness);

    /// Zero-extend to 64 bits, i.e. the word read as unsigned.
    fn to_u64(self) -> u64 {
        (self.to_i64() as u64) & Self::MASK
    }

    /// Truncate an unsigned 64-bit value (an address, say) to this width.
    fn from_u64(value: u64) -> Self {
        Self::from_i64(value as i64)
    }
}

impl Word for i32 {
    const BITS: u32 = 32;
    const BYTES: usize = 4;

    fn from_i64(value: i64) -> Self {
        value as i32
    }

    fn to_i64(self) -> i64 {
        self as i64
    }

    fn read(bytes: &[u8], endianness: Endianness) -> Self {
        match endianness {
            Endianness::Little => LittleEndian::read_i32(bytes),
            Endianness::Big => BigEndian::read_i32(bytes),
        }
    }

    fn write(self, bytes: &mut [u8], endianness: Endianness) {
        match endianness {
            Endianness::Little => LittleEndian::write_i32(bytes, self),
            Endianness::Big => BigEndian::write_i32(bytes, self),
        }
    }
}

impl Word for i64 {
    const BITS: u32 = 64;
    const BYTES: usize = 8;

    fn from_i64(value: i64) -> Self {
        value
    }

    fn to_i64(self) -> i64 {
        self
    }

    fn read(bytes: &[u8], endianness: Endianness) -> Self {
        match endianness {
            Endianness::Little => LittleEndian::read_i64(bytes),
            Endianness::Big => BigEndian::read_i64(bytes),
        }
    }

    fn write(self, bytes: &mut [u8], endianness: Endianness) {
        match endianness {
            Endianness::Little => LittleEndian::write_i64(bytes, self),
            Endianness::Big => BigEndian::write_i64(bytes, self),
        }
    }
}
