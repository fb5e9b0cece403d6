//! Errors for instruction encoding and decoding.

use thiserror::Error;

/// Errors that occur while decoding an instruction.
///
/// `E` is the error type of the byte transport the instruction was read
/// from: an I/O error for readers, a memory fault for machine memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError<E: std::error::Error + 'static> {
    /// Continuation bytes kept coming after the word was full.
    #[error("encoded value is too wide for a {bits}-bit word")]
    TooWide { bits: u32 },

    /// The transport failed to supply a byte.
    #[error(transparent)]
    Transport(E),
}

/// A byte slice ran out before the instruction was complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unexpected end of input")]
pub struct EndOfInput;

/// An action code with no entry in the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("undefined action: {0:#x}")]
pub struct UndefinedAction(pub u64);
