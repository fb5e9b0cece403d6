//! Loading and saving ranges of machine memory.

use crate::error::ObjectError;
use crate::format::{self, Format};
use mite_common::Word;
use mite_vm::Machine;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

fn check_aligned<W: Word>(address: u64) -> Result<(), ObjectError> {
    if address % W::BYTES as u64 != 0 {
        return Err(ObjectError::UnalignedAddress(address));
    }
    Ok(())
}

/// Load an object file into `machine` at `address`.
///
/// The header is checked against the machine before anything is copied,
/// in the order magic, endianness, word size, destination. Returns the
/// number of payload bytes loaded.
pub fn load<W: Word, R: Read>(machine: &mut Machine<W>, address: u64, mut reader: R) -> Result<u64, ObjectError> {
    let format = format::read_magic(&mut reader)?;

    let expected = machine.memory().endianness();
    let found = format.read_endianness(&mut reader)?;
    if found != expected {
        return Err(ObjectError::EndiannessMismatch { expected, found });
    }

    let word_bytes = format.read_word_bytes(&mut reader)?;
    if word_bytes != W::BYTES as u64 {
        return Err(ObjectError::WordSizeMismatch {
            expected: W::BYTES,
            found: word_bytes,
        });
    }

    let length = format.read_length::<W, _>(&mut reader, found)?;
    check_aligned::<W>(address)?;
    let dest = machine
        .memory_mut()
        .resolve_mut(address, length)
        .map_err(|_| ObjectError::InvalidRange { address, length })?;
    reader.read_exact(dest)?;

    debug!(?format, address, length, "loaded object");
    Ok(length)
}

/// Save `length` bytes of `machine` memory from `address` as an object file.
pub fn save<W: Word, Wr: Write>(
    machine: &Machine<W>,
    address: u64,
    length: u64,
    mut writer: Wr,
    format: Format,
) -> Result<(), ObjectError> {
    check_aligned::<W>(address)?;
    let invalid = ObjectError::InvalidRange { address, length };
    if length > W::MASK {
        return Err(invalid);
    }
    let memory = machine.memory();
    let bytes = memory.resolve(address, length).map_err(|_| invalid)?;

    format
        .write_header::<W, _>(&mut writer, memory.endianness(), length)
        .map_err(ObjectError::Io)?;
    writer.write_all(bytes).map_err(ObjectError::Io)?;
    writer.flush().map_err(ObjectError::Io)?;

    debug!(?format, address, length, "saved object");
    Ok(())
}

/// [`load`] from the file at `path`.
pub fn load_file<W: Word>(machine: &mut Machine<W>, address: u64, path: impl AsRef<Path>) -> Result<u64, ObjectError> {
    let file = File::open(path).map_err(ObjectError::Io)?;
    load(machine, address, BufReader::new(file))
}

/// [`save`] to the file at `path`, replacing it.
///
/// Files in [`Format::Variable`] start with an interpreter line, so on Unix
/// they are also made executable.
pub fn save_file<W: Word>(
    machine: &Machine<W>,
    address: u64,
    length: u64,
    path: impl AsRef<Path>,
    format: Format,
) -> Result<(), ObjectError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(ObjectError::Io)?;
    save(machine, address, length, BufWriter::new(file), format)?;

    #[cfg(unix)]
    if format == Format::Variable {
        use std::os::unix::fs::PermissionsExt;
        let mut permissions = std::fs::metadata(path).map_err(ObjectError::Io)?.permissions();
        permissions.set_mode(permissions.mode() | 0o111);
        std::fs::set_permissions(path, permissions).map_err(ObjectError::Io)?;
    }
    Ok(())
}
