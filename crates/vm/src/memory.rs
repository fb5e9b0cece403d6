//! Virtual memory: one primary region plus extra areas.
//!
//! The primary region starts at address 0. Extra areas are host buffers
//! mapped one after another above it, each at the next free virtual
//! address. Every access from the engine, the stacks and the object loader
//! goes through [`Memory::resolve`] or [`Memory::resolve_mut`], which only
//! hand out ranges that lie wholly inside one region.

use crate::error::{Fault, MachineError};
use mite_common::{ByteSink, ByteSource, Endianness, Word};
use std::marker::PhantomData;
use tracing::debug;

/// A host buffer mapped into the virtual address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraArea {
    pub base: u64,
    data: Box<[u8]>,
    pub writable: bool,
}

impl ExtraArea {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One past the last address of the area.
    pub fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn contains(&self, address: u64, end: u64) -> bool {
        address >= self.base && end <= self.end()
    }

    fn slice(&self, address: u64, end: u64) -> &[u8] {
        &self.data[(address - self.base) as usize..(end - self.base) as usize]
    }

    fn slice_mut(&mut self, address: u64, end: u64) -> &mut [u8] {
        let base = self.base;
        &mut self.data[(address - base) as usize..(end - base) as usize]
    }
}

/// The address space of a machine with words of type `W`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory<W: Word> {
    primary: Vec<u8>,
    extras: Vec<ExtraArea>,
    next_extra: u64,
    endianness: Endianness,
    _word: PhantomData<W>,
}

impl<W: Word> Memory<W> {
    /// Zeroed primary memory of `words` words.
    pub fn new(words: usize, endianness: Endianness) -> Result<Self, MachineError> {
        let invalid = MachineError::InvalidMemorySize {
            words,
            bits: W::BITS,
        };
        let bytes = words.checked_mul(W::BYTES).ok_or(invalid.clone())?;
        if bytes == 0 || (bytes - 1) as u64 > W::MASK {
            return Err(invalid);
        }
        Ok(Self {
            primary: vec![0; bytes],
            extras: Vec::new(),
            next_extra: bytes as u64,
            endianness,
            _word: PhantomData,
        })
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Size of the primary region in bytes.
    pub fn primary_len(&self) -> u64 {
        self.primary.len() as u64
    }

    pub fn primary(&self) -> &[u8] {
        &self.primary
    }

    pub fn extras(&self) -> &[ExtraArea] {
        &self.extras
    }

    /// Address the next extra area will be given.
    pub fn next_extra(&self) -> u64 {
        self.next_extra
    }

    /// Address for a new area of `length` bytes, if one fits below the
    /// highest word address.
    fn reserve(&self, length: usize) -> Result<u64, MachineError> {
        let base = self.next_extra;
        base.checked_add(length as u64)
            .filter(|end| base <= W::MASK && end.saturating_sub(1) <= W::MASK)
            .map(|_| base)
            .ok_or(MachineError::AddressSpaceExhausted { length })
    }

    /// Map `contents` as a new extra area at the next free address.
    pub fn allot_from(&mut self, contents: Box<[u8]>, writable: bool) -> Result<u64, MachineError> {
        let length = contents.len();
        let base = self.reserve(length)?;

        debug!(base, length, writable, "allot extra area");
        self.extras.push(ExtraArea {
            base,
            data: contents,
            writable,
        });
        self.next_extra = base + length as u64;
        Ok(base)
    }

    /// Map `length` zeroed bytes as a new extra area.
    pub fn allot(&mut self, length: usize, writable: bool) -> Result<u64, MachineError> {
        self.reserve(length)?;
        self.allot_from(vec![0; length].into_boxed_slice(), writable)
    }

    /// Round the next extra-area address up to a word boundary.
    pub fn align(&mut self) {
        let bytes = W::BYTES as u64;
        self.next_extra = self.next_extra.div_ceil(bytes).saturating_mul(bytes);
    }

    /// Borrow `[address, address + length)` for reading.
    pub fn resolve(&self, address: u64, length: u64) -> Result<&[u8], Fault> {
        let fault = Fault::InvalidMemoryRead { address };
        let end = address.checked_add(length).ok_or(fault.clone())?;
        if end <= self.primary_len() {
            return Ok(&self.primary[address as usize..end as usize]);
        }
        self.extras
            .iter()
            .find(|area| area.contains(address, end))
            .map(|area| area.slice(address, end))
            .ok_or(fault)
    }

    /// Borrow `[address, address + length)` for writing.
    ///
    /// Read-only extra areas are refused.
    pub fn resolve_mut(&mut self, address: u64, length: u64) -> Result<&mut [u8], Fault> {
        let fault = Fault::InvalidMemoryWrite { address };
        let end = address.checked_add(length).ok_or(fault.clone())?;
        if end <= self.primary_len() {
            return Ok(&mut self.primary[address as usize..end as usize]);
        }
        match self.extras.iter_mut().find(|area| area.contains(address, end)) {
            Some(area) if area.writable => Ok(area.slice_mut(address, end)),
            _ => Err(fault),
        }
    }

    fn check_aligned(address: u64) -> Result<(), Fault> {
        if address % W::BYTES as u64 != 0 {
            return Err(Fault::UnalignedAddress { address });
        }
        Ok(())
    }

    pub fn load_word(&self, address: u64) -> Result<W, Fault> {
        Self::check_aligned(address)?;
        let bytes = self.resolve(address, W::BYTES as u64)?;
        Ok(W::read(bytes, self.endianness))
    }

    pub fn store_word(&mut self, address: u64, value: W) -> Result<(), Fault> {
        Self::check_aligned(address)?;
        let endianness = self.endianness;
        let bytes = self.resolve_mut(address, W::BYTES as u64)?;
        value.write(bytes, endianness);
        Ok(())
    }

    pub fn load_byte(&self, address: u64) -> Result<u8, Fault> {
        Ok(self.resolve(address, 1)?[0])
    }

    pub fn store_byte(&mut self, address: u64, value: u8) -> Result<(), Fault> {
        self.resolve_mut(address, 1)?[0] = value;
        Ok(())
    }

    /// One past the last address of the region holding `address`.
    pub fn region_end(&self, address: u64) -> Option<u64> {
        if address < self.primary_len() {
            return Some(self.primary_len());
        }
        self.extras
            .iter()
            .find(|area| area.base <= address && address < area.end())
            .map(ExtraArea::end)
    }

    /// A byte cursor over this memory starting at `address`.
    ///
    /// The cursor stays inside the region that holds `address`.
    pub fn cursor(&mut self, address: u64) -> MemoryCursor<'_, W> {
        let limit = self.region_end(address).unwrap_or(address);
        MemoryCursor {
            memory: self,
            address,
            limit,
        }
    }
}

/// Reads or writes memory a byte at a time from a moving address.
///
/// This is how instructions are fetched and emitted, so an instruction
/// never spans two regions.
#[derive(Debug)]
pub struct MemoryCursor<'a, W: Word> {
    memory: &'a mut Memory<W>,
    pub address: u64,
    limit: u64,
}

impl<W: Word> ByteSource for MemoryCursor<'_, W> {
    type Error = Fault;

    fn read_byte(&mut self) -> Result<u8, Fault> {
        if self.address >= self.limit {
            return Err(Fault::InvalidMemoryRead { address: self.address });
        }
        let byte = self.memory.load_byte(self.address)?;
        self.address = self.address.wrapping_add(1);
        Ok(byte)
    }
}

impl<W: Word> ByteSink for MemoryCursor<'_, W> {
    type Error = Fault;

    fn write_byte(&mut self, byte: u8) -> Result<(), Fault> {
        if self.address >= self.limit {
            return Err(Fault::InvalidMemoryWrite { address: self.address });
        }
        self.memory.store_byte(self.address, byte)?;
        self.address = self.address.wrapping_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory32() -> Memory<i32> {
        Memory::new(4096, Endianness::Little).unwrap()
    }

    // --- Construction ---

    #[test]
    fn empty_memory_is_rejected() {
        assert_eq!(
            Memory::<i32>::new(0, Endianness::Little),
            Err(MachineError::InvalidMemorySize { words: 0, bits: 32 })
        );
    }

    #[test]
    fn memory_larger_than_the_address_space_is_rejected() {
        let words = (1usize << 30) + 1;
        assert!(matches!(
            Memory::<i32>::new(words, Endianness::Little),
            Err(MachineError::InvalidMemorySize { .. })
        ));
    }

    // --- Extra areas ---

    #[test]
    fn extra_areas_follow_primary_memory() {
        let mut memory = memory32();
        assert_eq!(memory.allot(4, true), Ok(0x4000));
        assert_eq!(memory.allot(1, true), Ok(0x4004));
        assert_eq!(memory.allot(2, true), Ok(0x4005));
        memory.align();
        assert_eq!(memory.allot(4, true), Ok(0x4008));
    }

    #[test]
    fn align_on_a_boundary_is_a_no_op() {
        let mut memory = memory32();
        memory.align();
        assert_eq!(memory.next_extra(), 0x4000);
    }

    #[test]
    fn allot_past_the_address_space_fails() {
        let mut memory = memory32();
        let rest = (u32::MAX as u64 + 1 - 0x4000) as usize;
        assert_eq!(
            memory.allot(rest + 1, false),
            Err(MachineError::AddressSpaceExhausted { length: rest + 1 })
        );
        assert_eq!(memory.next_extra(), 0x4000);
    }

    // --- Resolution ---

    #[test]
    fn resolve_within_primary() {
        let memory = memory32();
        assert_eq!(memory.resolve(0, 0x4000).map(<[u8]>::len), Ok(0x4000));
        assert_eq!(memory.resolve(0x3ffc, 4).map(<[u8]>::len), Ok(4));
    }

    #[test]
    fn resolve_refuses_ranges_straddling_regions() {
        let mut memory = memory32();
        memory.allot(8, true).unwrap();
        assert_eq!(
            memory.resolve(0x3ffc, 8),
            Err(Fault::InvalidMemoryRead { address: 0x3ffc })
        );
        assert_eq!(memory.resolve(0x4004, 8), Err(Fault::InvalidMemoryRead { address: 0x4004 }));
        assert_eq!(memory.resolve(0x4000, 8).map(<[u8]>::len), Ok(8));
    }

    #[test]
    fn resolve_refuses_overflowing_ranges() {
        let memory = memory32();
        assert_eq!(
            memory.resolve(u64::MAX, 2),
            Err(Fault::InvalidMemoryRead { address: u64::MAX })
        );
    }

    #[test]
    fn empty_range_on_the_boundary_resolves() {
        let mut memory = memory32();
        memory.allot(4, true).unwrap();
        assert_eq!(memory.resolve(0x4000, 0).map(<[u8]>::len), Ok(0));
        assert_eq!(memory.resolve(0x4004, 0).map(<[u8]>::len), Ok(0));
        assert!(memory.resolve(0x4005, 0).is_err());
    }

    #[test]
    fn read_only_areas_refuse_writes() {
        let mut memory = memory32();
        let base = memory.allot_from(vec![7, 8, 9, 10].into_boxed_slice(), false).unwrap();
        assert_eq!(memory.load_byte(base + 1), Ok(8));
        assert_eq!(
            memory.store_byte(base, 0),
            Err(Fault::InvalidMemoryWrite { address: base })
        );
    }

    // --- Word access ---

    #[test]
    fn words_use_the_configured_byte_order() {
        let mut memory = Memory::<i32>::new(16, Endianness::Big).unwrap();
        memory.store_word(8, 0x0102_0304).unwrap();
        assert_eq!(memory.resolve(8, 4).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(memory.load_word(8), Ok(0x0102_0304));
    }

    #[test]
    fn word_access_must_be_aligned_everywhere() {
        let mut memory = memory32();
        let base = memory.allot(8, true).unwrap();
        assert_eq!(memory.load_word(2), Err(Fault::UnalignedAddress { address: 2 }));
        assert_eq!(
            memory.store_word(base + 1, 0),
            Err(Fault::UnalignedAddress { address: base + 1 })
        );
        assert_eq!(memory.store_word(base + 4, -1), Ok(()));
        assert_eq!(memory.load_word(base + 4), Ok(-1));
    }

    #[test]
    fn cursor_reads_and_writes_sequentially() {
        let mut memory = memory32();
        let mut cursor = memory.cursor(0x3ffe);
        cursor.write_byte(1).unwrap();
        cursor.write_byte(2).unwrap();
        assert_eq!(
            cursor.write_byte(3),
            Err(Fault::InvalidMemoryWrite { address: 0x4000 })
        );
        let mut cursor = memory.cursor(0x3ffe);
        assert_eq!(cursor.read_byte(), Ok(1));
        assert_eq!(cursor.read_byte(), Ok(2));
        assert_eq!(cursor.address, 0x4000);
    }

    #[test]
    fn cursor_stops_at_the_end_of_its_region() {
        let mut memory = memory32();
        let base = memory.allot(2, true).unwrap();
        memory.allot(2, true).unwrap();
        assert_eq!(memory.region_end(0x3fff), Some(0x4000));
        assert_eq!(memory.region_end(base + 1), Some(base + 2));
        assert_eq!(memory.region_end(base + 4), None);

        let mut cursor = memory.cursor(0x3fff);
        assert_eq!(cursor.read_byte(), Ok(0));
        assert_eq!(cursor.read_byte(), Err(Fault::InvalidMemoryRead { address: base }));

        let mut cursor = memory.cursor(base + 1);
        assert_eq!(cursor.write_byte(7), Ok(()));
        assert_eq!(
            cursor.write_byte(8),
            Err(Fault::InvalidMemoryWrite { address: base + 2 })
        );
        assert_eq!(memory.load_byte(base + 2), Ok(0));
    }
}
