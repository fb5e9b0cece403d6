//! The register set and its descriptor table.
//!
//! [`Registers`] is the storage; [`ALL_REGISTERS`] describes each register
//! for hosts that want to list or edit them by name.

use mite_common::Word;
use std::fmt;

/// Machine registers.
///
/// Addresses are kept as `u64` and always fit in the word width; `i` and
/// `exception` hold words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers<W: Word> {
    /// Address of the next instruction to fetch.
    pub pc: u64,
    /// Value of the instruction most recently decoded.
    pub i: W,
    /// Data stack pointer: address of the next free slot.
    pub sp: u64,
    /// Return stack pointer: address of the next free slot.
    pub rp: u64,
    /// Data stack base.
    pub s0: u64,
    /// Return stack base.
    pub r0: u64,
    /// Code of the last fault, or 0.
    pub exception: W,
    /// Size of the primary memory region in bytes.
    pub memory: u64,
}

/// Names a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Pc,
    I,
    Sp,
    Rp,
    S0,
    R0,
    Exception,
    Memory,
}

/// What a register holds, as seen from outside the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    /// An unsigned virtual address.
    Address,
    /// A signed machine word.
    Word,
}

/// Describes one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterInfo {
    pub register: Register,
    pub name: &'static str,
    pub kind: RegisterKind,
    pub read_only: bool,
}

const fn info(register: Register, name: &'static str, kind: RegisterKind, read_only: bool) -> RegisterInfo {
    RegisterInfo {
        register,
        name,
        kind,
        read_only,
    }
}

/// Every register, in storage order.
pub const ALL_REGISTERS: [RegisterInfo; 8] = [
    info(Register::Pc, "PC", RegisterKind::Address, false),
    info(Register::I, "I", RegisterKind::Word, false),
    info(Register::Sp, "SP", RegisterKind::Address, false),
    info(Register::Rp, "RP", RegisterKind::Address, false),
    info(Register::S0, "S0", RegisterKind::Address, true),
    info(Register::R0, "R0", RegisterKind::Address, true),
    info(Register::Exception, "EXCEPTION", RegisterKind::Word, false),
    info(Register::Memory, "MEMORY", RegisterKind::Address, true),
];

impl Register {
    /// This register's entry in [`ALL_REGISTERS`].
    pub fn info(self) -> &'static RegisterInfo {
        &ALL_REGISTERS[self as usize]
    }

    /// Look a register up by name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_REGISTERS
            .iter()
            .find(|info| info.name.eq_ignore_ascii_case(name))
            .map(|info| info.register)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

impl<W: Word> Registers<W> {
    /// Read a register as a word.
    pub fn get(&self, register: Register) -> W {
        match register {
            Register::Pc => W::from_u64(self.pc),
            Register::I => self.i,
            Register::Sp => W::from_u64(self.sp),
            Register::Rp => W::from_u64(self.rp),
            Register::S0 => W::from_u64(self.s0),
            Register::R0 => W::from_u64(self.r0),
            Register::Exception => self.exception,
            Register::Memory => W::from_u64(self.memory),
        }
    }

    /// Write a register, ignoring the read-only flag.
    pub(crate) fn put(&mut self, register: Register, value: W) {
        match register {
            Register::Pc => self.pc = value.to_u64(),
            Register::I => self.i = value,
            Register::Sp => self.sp = value.to_u64(),
            Register::Rp => self.rp = value.to_u64(),
            Register::S0 => self.s0 = value.to_u64(),
            Register::R0 => self.r0 = value.to_u64(),
            Register::Exception => self.exception = value,
            Register::Memory => self.memory = value.to_u64(),
        }
    }
}
