//! Errors from loading and saving object files.

use mite_common::Endianness;
use std::io;
use thiserror::Error;

/// Why an object file could not be loaded or saved.
///
/// Header problems are reported in the order they are checked: magic,
/// endianness, word size, then the destination range.
#[derive(Debug, Error)]
pub enum ObjectError {
    /// The underlying reader or writer failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// The file ended inside the header or payload.
    #[error("object file is truncated")]
    ShortRead,

    #[error("not a Mite object file")]
    BadMagic,

    /// The endianness field is neither 0 nor 1.
    #[error("unsupported endianness flag {0}")]
    UnsupportedEndianness(u64),

    #[error("object file is {found} but the machine is {expected}")]
    EndiannessMismatch {
        expected: Endianness,
        found: Endianness,
    },

    #[error("object file has {found}-byte words but the machine has {expected}-byte words")]
    WordSizeMismatch { expected: usize, found: u64 },

    /// A variable-length header field does not fit a word.
    #[error("malformed {0} field in object file header")]
    MalformedHeader(&'static str),

    /// The range does not lie inside one writable (for load) or readable
    /// (for save) region of memory.
    #[error("range of {length} bytes at {address:#x} is not in memory")]
    InvalidRange { address: u64, length: u64 },

    #[error("unaligned address {0:#x}")]
    UnalignedAddress(u64),
}

impl From<io::Error> for ObjectError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ObjectError::ShortRead
        } else {
            ObjectError::Io(e)
        }
    }
}
