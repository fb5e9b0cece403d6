//! Mite common types and instruction encoding.
//!
//! This crate provides the foundations shared by the machine and the
//! object-file loader:
//!
//! - [`Word`]: the machine word, generic over 32- and 64-bit widths
//! - [`Endianness`]: byte order of words in memory and object files
//! - [`codec`]: the variable-length instruction encoding and its byte
//!   transports
//! - [`Action`]: the action (opcode) table
//! - [`CodecError`]: errors from decoding instruction streams

pub mod action;
pub mod codec;
pub mod error;
pub mod word;

// Re-export commonly used types at the crate root.
pub use action::Action;
pub use codec::{ByteSink, ByteSource, Instruction, InstructionKind, IoTransport};
pub use error::{CodecError, EndOfInput, UndefinedAction};
pub use word::{Endianness, Word};
