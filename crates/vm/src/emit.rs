//! Laying out code and data in machine memory.

use crate::error::Fault;
use crate::machine::Machine;
use mite_common::{codec, Action, InstructionKind, Word};

/// Writes instructions and words into a machine's memory at a moving
/// address.
///
/// ```
/// use mite_common::Action;
/// use mite_vm::{Emitter, Machine, MachineConfig};
///
/// let mut machine = Machine::<i32>::new(MachineConfig::new(256)).unwrap();
/// let mut emit = Emitter::new(&mut machine, 0);
/// emit.number(2).unwrap();
/// emit.number(3).unwrap();
/// emit.action(Action::Mul).unwrap();
/// emit.action(Action::Halt).unwrap();
///
/// machine.run().unwrap();
/// assert_eq!(machine.data_stack().unwrap(), vec![6]);
/// ```
#[derive(Debug)]
pub struct Emitter<'a, W: Word> {
    machine: &'a mut Machine<W>,
    here: u64,
}

impl<'a, W: Word> Emitter<'a, W> {
    pub fn new(machine: &'a mut Machine<W>, here: u64) -> Self {
        Self { machine, here }
    }

    /// Address the next write goes to.
    pub fn here(&self) -> u64 {
        self.here
    }

    /// Encode an instruction of either kind.
    pub fn instruction(&mut self, kind: InstructionKind, value: W) -> Result<u64, Fault> {
        let start = self.here;
        let mut cursor = self.machine.memory_mut().cursor(start);
        codec::encode(&mut cursor, kind, value)?;
        self.here = cursor.address;
        Ok(start)
    }

    /// Emit a literal; returns its address.
    pub fn number(&mut self, value: W) -> Result<u64, Fault> {
        self.instruction(InstructionKind::Number, value)
    }

    /// Emit an action; returns its address.
    pub fn action(&mut self, action: Action) -> Result<u64, Fault> {
        self.instruction(InstructionKind::Action, W::from_u64(action.code()))
    }

    /// Store a raw word. `here` must be aligned.
    pub fn word(&mut self, value: W) -> Result<u64, Fault> {
        let start = self.here;
        self.machine.memory_mut().store_word(start, value)?;
        self.here = start + W::BYTES as u64;
        Ok(start)
    }

    /// Pad with NOPs up to the next word boundary.
    pub fn align(&mut self) -> Result<(), Fault> {
        while self.here % W::BYTES as u64 != 0 {
            self.action(Action::Nop)?;
        }
        Ok(())
    }
}
