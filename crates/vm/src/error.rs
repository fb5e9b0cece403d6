//! Faults and errors for the Mite VM.
//!
//! A [`Fault`] is raised by execution or by address resolution. The engine
//! records faults in the `exception` register rather than treating them as
//! fatal, so every variant has a stable numeric [`Fault::code`].
//! [`MachineError`] covers the host-side API: construction, extra-area
//! allocation and register access.

use crate::registers::Register;
use thiserror::Error;

/// Faults raised while executing or addressing memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// The action code has no entry in the dispatch table.
    #[error("invalid opcode {0:#x}")]
    InvalidOpcode(u64),

    /// A push found the stack full, or the stack pointer above its limit.
    #[error("stack overflow")]
    StackOverflow,

    /// A pop found the stack empty, or the stack pointer below its base.
    #[error("stack underflow")]
    StackUnderflow,

    /// A read touched an address outside every memory region.
    #[error("invalid memory read at {address:#x}")]
    InvalidMemoryRead { address: u64 },

    /// A write touched an address outside every writable memory region.
    #[error("invalid memory write at {address:#x}")]
    InvalidMemoryWrite { address: u64 },

    /// A word access at an address that is not a multiple of the word size.
    #[error("unaligned address {address:#x}")]
    UnalignedAddress { address: u64 },

    /// DIVMOD or UDIVMOD with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,

    /// The instruction at `address` has more continuation bytes than a
    /// word can hold.
    #[error("malformed instruction at {address:#x}")]
    MalformedInstruction { address: u64 },
}

impl Fault {
    /// The value stored in the `exception` register for this fault.
    ///
    /// 0 is reserved for a clean halt.
    pub fn code(&self) -> i64 {
        match self {
            Fault::InvalidOpcode(_) => 1,
            Fault::StackOverflow => 2,
            Fault::StackUnderflow => 3,
            Fault::InvalidMemoryRead { .. } => 5,
            Fault::InvalidMemoryWrite { .. } => 6,
            Fault::UnalignedAddress { .. } => 7,
            Fault::DivisionByZero => 8,
            Fault::MalformedInstruction { .. } => 9,
        }
    }
}

/// Errors from the host-side machine API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    /// The primary memory region is empty or not addressable by a word.
    #[error("memory of {words} words is not addressable by a {bits}-bit word")]
    InvalidMemorySize { words: usize, bits: u32 },

    /// A stack does not fit inside the primary memory region.
    #[error("{stack} stack at word {base} with {capacity} words does not fit in memory")]
    StackOutOfBounds {
        stack: &'static str,
        base: usize,
        capacity: usize,
    },

    /// The data and return stacks share memory.
    #[error("data and return stacks overlap")]
    StacksOverlap,

    /// An extra memory area would end beyond the highest word address.
    #[error("no address space left for an extra area of {length} bytes")]
    AddressSpaceExhausted { length: usize },

    /// The register is read-only through the register table.
    #[error("register {0} is read-only")]
    ReadOnlyRegister(Register),
}
