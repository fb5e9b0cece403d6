//! Object file headers.
//!
//! Two header layouts exist, told apart by their magic:
//! ```text
//! Fixed:    "MITE\0\0"  endianness:u8  word-bytes:u8  length:u32|u64
//! Variable: "#!/usr/bin/env mite\n"  "mite\0\0\0\0"  endianness  word-bytes  length
//! ```
//! In the fixed layout the length is a raw word in the file's declared
//! byte order. In the variable layout every field is an encoded number.
//! Either layout may be preceded by a `#!` line, which loading skips.

use crate::error::ObjectError;
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use mite_common::{codec, CodecError, Endianness, InstructionKind, IoTransport, Word};
use std::io::{self, Read, Write};

/// Magic of the fixed layout.
pub const FIXED_MAGIC: &[u8; 6] = b"MITE\0\0";

/// Magic of the variable layout.
pub const VARIABLE_MAGIC: &[u8; 8] = b"mite\0\0\0\0";

/// Interpreter line written before a variable-layout header.
pub const SHEBANG: &[u8] = b"#!/usr/bin/env mite\n";

/// Header layout of an object file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Single-byte fields and a raw length.
    Fixed,
    /// Encoded-number fields, behind an interpreter line.
    #[default]
    Variable,
}

/// Skip an optional `#!` line, then read the magic and return the layout
/// it names.
pub fn read_magic<R: Read>(reader: &mut R) -> Result<Format, ObjectError> {
    let mut magic = [0u8; FIXED_MAGIC.len()];
    reader.read_exact(&mut magic[..2])?;
    if &magic[..2] == b"#!" {
        while reader.read_u8()? != b'\n' {}
        reader.read_exact(&mut magic[..2])?;
    }
    reader.read_exact(&mut magic[2..])?;

    if &magic == FIXED_MAGIC {
        return Ok(Format::Fixed);
    }
    if magic[..] == VARIABLE_MAGIC[..magic.len()] {
        let mut rest = [0u8; VARIABLE_MAGIC.len() - FIXED_MAGIC.len()];
        reader.read_exact(&mut rest)?;
        if rest[..] == VARIABLE_MAGIC[magic.len()..] {
            return Ok(Format::Variable);
        }
    }
    Err(ObjectError::BadMagic)
}

fn read_number<W: Word, R: Read>(reader: &mut R, field: &'static str) -> Result<W, ObjectError> {
    let instruction = codec::decode::<W, _>(&mut IoTransport(reader)).map_err(|e| match e {
        CodecError::TooWide { .. } => ObjectError::MalformedHeader(field),
        CodecError::Transport(e) => ObjectError::from(e),
    })?;
    match instruction.kind {
        InstructionKind::Number => Ok(instruction.value),
        InstructionKind::Action => Err(ObjectError::MalformedHeader(field)),
    }
}

fn write_number<W: Word, Wr: Write>(writer: &mut Wr, value: W) -> io::Result<()> {
    codec::encode(&mut IoTransport(writer), InstructionKind::Number, value)?;
    Ok(())
}

fn read_raw<E: ByteOrder, R: Read>(reader: &mut R, word_bytes: usize) -> io::Result<u64> {
    match word_bytes {
        4 => reader.read_u32::<E>().map(u64::from),
        _ => reader.read_u64::<E>(),
    }
}

fn write_raw<E: ByteOrder, Wr: Write>(writer: &mut Wr, word_bytes: usize, value: u64) -> io::Result<()> {
    match word_bytes {
        4 => writer.write_u32::<E>(value as u32),
        _ => writer.write_u64::<E>(value),
    }
}

impl Format {
    /// Read the endianness field.
    pub fn read_endianness<R: Read>(self, reader: &mut R) -> Result<Endianness, ObjectError> {
        let flag = match self {
            Format::Fixed => u64::from(reader.read_u8()?),
            Format::Variable => read_number::<i64, _>(reader, "endianness")?.to_u64(),
        };
        Endianness::from_flag(flag).ok_or(ObjectError::UnsupportedEndianness(flag))
    }

    /// Read the word-size field, in bytes.
    pub fn read_word_bytes<R: Read>(self, reader: &mut R) -> Result<u64, ObjectError> {
        match self {
            Format::Fixed => Ok(u64::from(reader.read_u8()?)),
            Format::Variable => Ok(read_number::<i64, _>(reader, "word size")?.to_u64()),
        }
    }

    /// Read the payload length of a file whose words are `W`.
    pub fn read_length<W: Word, R: Read>(
        self,
        reader: &mut R,
        endianness: Endianness,
    ) -> Result<u64, ObjectError> {
        match self {
            Format::Fixed => Ok(match endianness {
                Endianness::Little => read_raw::<LittleEndian, _>(reader, W::BYTES)?,
                Endianness::Big => read_raw::<BigEndian, _>(reader, W::BYTES)?,
            }),
            Format::Variable => Ok(read_number::<W, _>(reader, "length")?.to_u64()),
        }
    }

    /// Write a complete header for a payload of `length` bytes.
    pub fn write_header<W: Word, Wr: Write>(
        self,
        writer: &mut Wr,
        endianness: Endianness,
        length: u64,
    ) -> io::Result<()> {
        match self {
            Format::Fixed => {
                writer.write_all(FIXED_MAGIC)?;
                writer.write_u8(endianness.flag())?;
                writer.write_u8(W::BYTES as u8)?;
                match endianness {
                    Endianness::Little => write_raw::<LittleEndian, _>(writer, W::BYTES, length),
                    Endianness::Big => write_raw::<BigEndian, _>(writer, W::BYTES, length),
                }
            }
            Format::Variable => {
                writer.write_all(SHEBANG)?;
                writer.write_all(VARIABLE_MAGIC)?;
                write_number(writer, i64::from(endianness.flag()))?;
                write_number(writer, W::BYTES as i64)?;
                write_number(writer, W::from_u64(length))
            }
        }
    }
}
