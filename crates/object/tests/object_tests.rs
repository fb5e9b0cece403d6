//! Integration tests for object file loading and saving.

use mite_common::{Action, Endianness, Word};
use mite_object::format::{FIXED_MAGIC, SHEBANG};
use mite_object::{load, load_file, save, save_file, Format, ObjectError};
use mite_vm::{Emitter, Machine, MachineConfig};
use std::io::{self, Write};
use tempfile::TempDir;

// ============================================================
// Helper functions
// ============================================================

fn machine<W: Word>(endianness: Endianness) -> Machine<W> {
    Machine::new(MachineConfig::new(256).with_endianness(endianness)).unwrap()
}

/// A machine whose first `len` bytes count up from 1.
fn patterned<W: Word>(endianness: Endianness, len: usize) -> Machine<W> {
    let mut m = machine::<W>(endianness);
    let bytes = m.memory_mut().resolve_mut(0, len as u64).unwrap();
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = (i + 1) as u8;
    }
    m
}

fn saved<W: Word>(m: &Machine<W>, length: u64, format: Format) -> Vec<u8> {
    let mut out = Vec::new();
    save(m, 0, length, &mut out, format).unwrap();
    out
}

/// Offset of the first header byte after the magic.
fn after_magic(format: Format) -> usize {
    match format {
        Format::Fixed => FIXED_MAGIC.len(),
        Format::Variable => SHEBANG.len() + 8,
    }
}

const FORMATS: [Format; 2] = [Format::Fixed, Format::Variable];

/// Rejects every write.
struct BrokenWriter;

impl Write for BrokenWriter {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Accepts nothing but claims success.
struct FullWriter;

impl Write for FullWriter {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Ok(0)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================
// Round trips
// ============================================================

#[test]
fn round_trip_32_bit_both_formats() {
    let source = patterned::<i32>(Endianness::Little, 40);
    for format in FORMATS {
        let file = saved(&source, 40, format);
        let mut target = machine::<i32>(Endianness::Little);
        assert_eq!(load(&mut target, 64, &file[..]).unwrap(), 40);
        assert_eq!(
            target.memory().resolve(64, 40).unwrap(),
            source.memory().resolve(0, 40).unwrap(),
            "{format:?}"
        );
    }
}

#[test]
fn round_trip_64_bit_big_endian() {
    let source = patterned::<i64>(Endianness::Big, 24);
    for format in FORMATS {
        let file = saved(&source, 24, format);
        let mut target = machine::<i64>(Endianness::Big);
        assert_eq!(load(&mut target, 0, &file[..]).unwrap(), 24);
        assert_eq!(target.memory().load_word(8), source.memory().load_word(8));
    }
}

#[test]
fn empty_payload_round_trips() {
    let source = machine::<i32>(Endianness::Little);
    let file = saved(&source, 0, Format::Fixed);
    assert_eq!(file.len(), FIXED_MAGIC.len() + 2 + 4);
    let mut target = machine::<i32>(Endianness::Little);
    assert_eq!(load(&mut target, 0, &file[..]).unwrap(), 0);
}

#[test]
fn variable_files_start_with_interpreter_line() {
    let file = saved(&patterned::<i32>(Endianness::Little, 4), 4, Format::Variable);
    assert!(file.starts_with(SHEBANG));
}

#[test]
fn fixed_file_after_interpreter_line_loads() {
    let mut file = b"#!/usr/local/bin/mite\n".to_vec();
    file.extend(saved(&patterned::<i32>(Endianness::Little, 8), 8, Format::Fixed));
    let mut target = machine::<i32>(Endianness::Little);
    assert_eq!(load(&mut target, 0, &file[..]).unwrap(), 8);
    assert_eq!(target.memory().load_byte(7), Ok(8));
}

#[test]
fn loaded_program_runs() {
    let mut source = machine::<i64>(Endianness::native());
    let mut emit = Emitter::new(&mut source, 0);
    emit.number(-300).unwrap();
    emit.number(3).unwrap();
    emit.action(Action::Mul).unwrap();
    emit.action(Action::Halt).unwrap();
    let length = emit.here();

    let file = saved(&source, length, Format::Variable);
    let mut target = machine::<i64>(Endianness::native());
    load(&mut target, 0, &file[..]).unwrap();
    assert_eq!(target.run(), Ok(()));
    assert_eq!(target.data_stack().unwrap(), vec![-900]);
}

#[test]
fn load_into_writable_extra_area() {
    let file = saved(&patterned::<i32>(Endianness::Little, 8), 8, Format::Fixed);
    let mut target = machine::<i32>(Endianness::Little);
    let area = target.allot(8, true).unwrap();
    assert_eq!(load(&mut target, area, &file[..]).unwrap(), 8);
    assert_eq!(target.memory().load_byte(area), Ok(1));
}

// ============================================================
// Header errors
// ============================================================

#[test]
fn corrupted_magic_is_bad_magic() {
    let source = patterned::<i32>(Endianness::Little, 8);
    for format in FORMATS {
        let mut file = saved(&source, 8, format);
        file[after_magic(format) - 3] ^= 0xff;
        let mut target = machine::<i32>(Endianness::Little);
        let err = load(&mut target, 0, &file[..]).unwrap_err();
        assert!(matches!(err, ObjectError::BadMagic), "{format:?}: {err}");
    }
}

#[test]
fn arbitrary_text_is_bad_magic() {
    let mut target = machine::<i32>(Endianness::Little);
    let err = load(&mut target, 0, &b"hello, world"[..]).unwrap_err();
    assert!(matches!(err, ObjectError::BadMagic));
}

#[test]
fn wrong_word_size_is_rejected() {
    let source = patterned::<i64>(Endianness::Little, 16);
    for format in FORMATS {
        let file = saved(&source, 16, format);
        let mut target = machine::<i32>(Endianness::Little);
        let err = load(&mut target, 0, &file[..]).unwrap_err();
        assert!(
            matches!(err, ObjectError::WordSizeMismatch { expected: 4, found: 8 }),
            "{format:?}: {err}"
        );
        assert!(target.memory().resolve(0, 16).unwrap().iter().all(|&b| b == 0));
    }
}

#[test]
fn wrong_endianness_is_rejected() {
    let source = patterned::<i32>(Endianness::Big, 8);
    for format in FORMATS {
        let file = saved(&source, 8, format);
        let mut target = machine::<i32>(Endianness::Little);
        let err = load(&mut target, 0, &file[..]).unwrap_err();
        assert!(
            matches!(
                err,
                ObjectError::EndiannessMismatch {
                    expected: Endianness::Little,
                    found: Endianness::Big
                }
            ),
            "{format:?}: {err}"
        );
    }
}

#[test]
fn unknown_endianness_flag_is_unsupported() {
    let mut file = saved(&patterned::<i32>(Endianness::Little, 4), 4, Format::Fixed);
    file[FIXED_MAGIC.len()] = 7;
    let mut target = machine::<i32>(Endianness::Little);
    let err = load(&mut target, 0, &file[..]).unwrap_err();
    assert!(matches!(err, ObjectError::UnsupportedEndianness(7)));
}

#[test]
fn endianness_is_checked_before_word_size() {
    let file = saved(&patterned::<i64>(Endianness::Big, 8), 8, Format::Fixed);
    let mut target = machine::<i32>(Endianness::Little);
    let err = load(&mut target, 0, &file[..]).unwrap_err();
    assert!(matches!(err, ObjectError::EndiannessMismatch { .. }));
}

#[test]
fn truncated_header_is_a_short_read() {
    let source = patterned::<i32>(Endianness::Little, 8);
    for format in FORMATS {
        let file = saved(&source, 8, format);
        let cut = after_magic(format) + 2;
        let mut target = machine::<i32>(Endianness::Little);
        let err = load(&mut target, 0, &file[..cut]).unwrap_err();
        assert!(matches!(err, ObjectError::ShortRead), "{format:?}: {err}");
    }
}

#[test]
fn truncated_payload_is_a_short_read() {
    let file = saved(&patterned::<i32>(Endianness::Little, 16), 16, Format::Variable);
    let mut target = machine::<i32>(Endianness::Little);
    let err = load(&mut target, 0, &file[..file.len() - 1]).unwrap_err();
    assert!(matches!(err, ObjectError::ShortRead));
}

#[test]
fn header_error_classes_are_distinct() {
    let source = patterned::<i64>(Endianness::Little, 8);
    let good = saved(&source, 8, Format::Fixed);
    let mut bad_magic = good.clone();
    bad_magic[0] = b'X';

    let mut target = machine::<i32>(Endianness::Little);
    let errors = [
        load(&mut target, 0, &bad_magic[..]).unwrap_err(),
        load(&mut target, 0, &good[..]).unwrap_err(),
        load(&mut target, 0, &good[..4]).unwrap_err(),
    ];
    assert!(matches!(errors[0], ObjectError::BadMagic));
    assert!(matches!(errors[1], ObjectError::WordSizeMismatch { .. }));
    assert!(matches!(errors[2], ObjectError::ShortRead));
}

// ============================================================
// Destination errors
// ============================================================

#[test]
fn load_beyond_memory_is_invalid_range() {
    let file = saved(&patterned::<i32>(Endianness::Little, 64), 64, Format::Fixed);
    let mut target = machine::<i32>(Endianness::Little);
    let err = load(&mut target, 1000, &file[..]).unwrap_err();
    assert!(matches!(
        err,
        ObjectError::InvalidRange {
            address: 1000,
            length: 64
        }
    ));
}

#[test]
fn load_to_unaligned_address_is_rejected() {
    let file = saved(&patterned::<i32>(Endianness::Little, 4), 4, Format::Variable);
    let mut target = machine::<i32>(Endianness::Little);
    let err = load(&mut target, 2, &file[..]).unwrap_err();
    assert!(matches!(err, ObjectError::UnalignedAddress(2)));
}

#[test]
fn load_into_read_only_area_is_invalid_range() {
    let file = saved(&patterned::<i32>(Endianness::Little, 4), 4, Format::Fixed);
    let mut target = machine::<i32>(Endianness::Little);
    let area = target.allot(4, false).unwrap();
    let err = load(&mut target, area, &file[..]).unwrap_err();
    assert!(matches!(err, ObjectError::InvalidRange { .. }));
}

#[test]
fn save_validates_before_writing() {
    let source = machine::<i32>(Endianness::Little);
    let mut out = Vec::new();
    let err = save(&source, 2, 4, &mut out, Format::Fixed).unwrap_err();
    assert!(matches!(err, ObjectError::UnalignedAddress(2)));
    let err = save(&source, 1020, 8, &mut out, Format::Fixed).unwrap_err();
    assert!(matches!(err, ObjectError::InvalidRange { .. }));
    assert!(out.is_empty());
}

#[test]
fn write_failures_are_io_errors() {
    let source = patterned::<i32>(Endianness::Little, 8);
    let err = save(&source, 0, 8, BrokenWriter, Format::Fixed).unwrap_err();
    assert!(matches!(err, ObjectError::Io(_)));
    let err = save(&source, 0, 8, FullWriter, Format::Variable).unwrap_err();
    assert!(matches!(err, ObjectError::Io(ref e) if e.kind() == io::ErrorKind::WriteZero));
}

// ============================================================
// Files on disk
// ============================================================

#[test]
fn file_round_trip() {
    let dir = TempDir::new().unwrap();
    let source = patterned::<i32>(Endianness::Little, 32);
    for (name, format) in [("fixed.mite", Format::Fixed), ("variable.mite", Format::Variable)] {
        let path = dir.path().join(name);
        save_file(&source, 0, 32, &path, format).unwrap();
        let mut target = machine::<i32>(Endianness::Little);
        assert_eq!(load_file(&mut target, 0, &path).unwrap(), 32);
        assert_eq!(target.memory().resolve(0, 32), source.memory().resolve(0, 32));
    }
}

#[cfg(unix)]
#[test]
fn variable_files_are_executable() {
    use std::os::unix::fs::PermissionsExt;
    let dir = TempDir::new().unwrap();
    let source = patterned::<i32>(Endianness::Little, 4);

    let variable = dir.path().join("prog");
    save_file(&source, 0, 4, &variable, Format::Variable).unwrap();
    let mode = std::fs::metadata(&variable).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);

    let fixed = dir.path().join("prog.obj");
    save_file(&source, 0, 4, &fixed, Format::Fixed).unwrap();
    let mode = std::fs::metadata(&fixed).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let mut target = machine::<i32>(Endianness::Little);
    let err = load_file(&mut target, 0, dir.path().join("absent")).unwrap_err();
    assert!(matches!(err, ObjectError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
}
