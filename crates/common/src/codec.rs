//! Variable-length instruction encoding.
//!
//! An instruction is a machine word tagged as either a *number* (a literal)
//! or an *action* (an opcode). It is written low chunk first; the top two
//! bits of every byte are a tag:
//! ```text
//! 01pppppp  continuation: 6 payload bits, more bytes follow
//! 10pppppp  final byte of an action: 6 payload bits
//! 00xxxxxx  final byte of a number: 8 bits of two's complement,
//! 11xxxxxx  i.e. a remaining value in -64..=63
//! ```
//!
//! Numbers are sign-extended when decoded; actions are unsigned and never
//! are. The algorithm is written once against the [`ByteSource`] and
//! [`ByteSink`] capabilities, so the same code reads from a file, a byte
//! slice or the machine's own memory.

use crate::error::{CodecError, EndOfInput};
use crate::word::Word;
use std::convert::Infallible;
use std::io::{Read, Write};

/// Payload bits carried by a continuation byte.
pub const CHUNK_BIT: u32 = 6;

/// Mask selecting the payload of a continuation or action byte.
pub const CHUNK_MASK: u8 = (1 << CHUNK_BIT) - 1;

/// Mask selecting the tag bits of an encoded byte.
pub const TAG_MASK: u8 = !CHUNK_MASK;

/// Tag of a continuation byte.
pub const CONTINUATION_BIT: u8 = 0x40;

/// Tag of the final byte of an action.
pub const ACTION_BIT: u8 = 0x80;

/// Whether an instruction is a literal or an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Number,
    Action,
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<W: Word> {
    pub kind: InstructionKind,
    pub value: W,
}

impl<W: Word> Instruction<W> {
    pub fn number(value: W) -> Self {
        Self {
            kind: InstructionKind::Number,
            value,
        }
    }

    pub fn action(value: W) -> Self {
        Self {
            kind: InstructionKind::Action,
            value,
        }
    }
}

/// Something bytes can be read from one at a time.
pub trait ByteSource {
    type Error: std::error::Error + 'static;

    fn read_byte(&mut self) -> Result<u8, Self::Error>;
}

/// Something bytes can be written to one at a time.
pub trait ByteSink {
    type Error: std::error::Error + 'static;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;
}

/// Adapts any [`Read`] or [`Write`] to the codec.
///
/// Reads are unbuffered single bytes, so the reader is left positioned
/// just after the instruction. End of file is reported as
/// [`std::io::ErrorKind::UnexpectedEof`].
#[derive(Debug)]
pub struct IoTransport<T>(pub T);

impl<T: Read> ByteSource for IoTransport<T> {
    type Error = std::io::Error;

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut buf = [0u8; 1];
        self.0.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl<T: Write> ByteSink for IoTransport<T> {
    type Error = std::io::Error;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.0.write_all(&[byte])
    }
}

impl ByteSink for Vec<u8> {
    type Error = Infallible;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.push(byte);
        Ok(())
    }
}

impl ByteSource for &[u8] {
    type Error = EndOfInput;

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let (&first, rest) = self.split_first().ok_or(EndOfInput)?;
        *self = rest;
        Ok(first)
    }
}

/// Number of bits needed to hold `value` as two's complement, excluding
/// the sign bit.
fn significant_bits(value: i64) -> u32 {
    let magnitude = if value < 0 { !value } else { value };
    64 - magnitude.leading_zeros()
}

/// Encode an instruction, returning the number of bytes written.
///
/// On a sink error the bytes already written stay written.
pub fn encode<W: Word, S: ByteSink + ?Sized>(
    sink: &mut S,
    kind: InstructionKind,
    value: W,
) -> Result<usize, S::Error> {
    let mut len = 0;
    match kind {
        InstructionKind::Number => {
            let mut v = value.to_i64();
            let mut bits = significant_bits(v);
            while bits > CHUNK_BIT {
                sink.write_byte((v as u8 & CHUNK_MASK) | CONTINUATION_BIT)?;
                len += 1;
                v >>= CHUNK_BIT;
                bits -= CHUNK_BIT;
            }
            sink.write_byte(v as u8)?;
        }
        InstructionKind::Action => {
            let mut v = value.to_u64();
            let mut bits = 64 - v.leading_zeros();
            while bits > CHUNK_BIT {
                sink.write_byte((v as u8 & CHUNK_MASK) | CONTINUATION_BIT)?;
                len += 1;
                v >>= CHUNK_BIT;
                bits -= CHUNK_BIT;
            }
            sink.write_byte((v as u8 & CHUNK_MASK) | ACTION_BIT)?;
        }
    }
    Ok(len + 1)
}

/// Decode one instruction for a machine with words of type `W`.
pub fn decode<W: Word, S: ByteSource + ?Sized>(
    source: &mut S,
) -> Result<Instruction<W>, CodecError<S::Error>> {
    let mut bits = 0u32;
    let mut n = 0u64;

    loop {
        let byte = source.read_byte().map_err(CodecError::Transport)?;
        match byte & TAG_MASK {
            CONTINUATION_BIT => {
                if bits > W::BITS - CHUNK_BIT {
                    return Err(CodecError::TooWide { bits: W::BITS });
                }
                n |= u64::from(byte & CHUNK_MASK) << bits;
                bits += CHUNK_BIT;
            }
            ACTION_BIT => {
                let payload = byte & CHUNK_MASK;
                // Bits past the word width must be clear.
                if bits + CHUNK_BIT > W::BITS && payload >> (W::BITS - bits) != 0 {
                    return Err(CodecError::TooWide { bits: W::BITS });
                }
                n |= u64::from(payload) << bits;
                return Ok(Instruction::action(W::from_u64(n)));
            }
            _ => {
                // Bits past the word width must repeat the sign bit.
                let spare = (bits + u8::BITS).saturating_sub(W::BITS);
                if spare > 0 && !matches!((byte as i8) >> (u8::BITS - 1 - spare), 0 | -1) {
                    return Err(CodecError::TooWide { bits: W::BITS });
                }
                n |= u64::from(byte) << bits;
                bits += u8::BITS;
                if bits < u64::BITS {
                    let shift = u64::BITS - bits;
                    n = (((n << shift) as i64) >> shift) as u64;
                }
                return Ok(Instruction::number(W::from_u64(n)));
            }
        }
    }
}

/// Number of bytes [`encode`] writes for this instruction.
pub fn encoded_len<W: Word>(kind: InstructionKind, value: W) -> usize {
    let bits = match kind {
        InstructionKind::Number => significant_bits(value.to_i64()),
        InstructionKind::Action => 64 - value.to_u64().leading_zeros(),
    };
    if bits <= CHUNK_BIT {
        1
    } else {
        (bits - 1) as usize / CHUNK_BIT as usize + 1
    }
}

/// Longest encoding of any instruction with words of type `W`.
pub fn max_encoded_len<W: Word>() -> usize {
    (W::BITS as usize).div_ceil(CHUNK_BIT as usize)
}

/// Encode an instruction into a fresh byte vector.
pub fn to_bytes<W: Word>(kind: InstructionKind, value: W) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(max_encoded_len::<W>());
    match encode(&mut bytes, kind, value) {
        Ok(_) => bytes,
        Err(never) => match never {},
    }
}
