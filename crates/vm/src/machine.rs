//! Machine state: memory, registers, stacks and lifecycle.

use crate::config::{MachineConfig, StackLayout};
use crate::error::{Fault, MachineError};
use crate::memory::Memory;
use crate::registers::{Register, Registers};
use mite_common::Word;

/// Where the machine is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Freshly built, or stepped without halting.
    Ready,
    /// HALT was executed.
    Halted,
    /// The last step raised this fault.
    Faulted(Fault),
}

/// A Mite virtual machine with words of type `W`.
#[derive(Debug, Clone)]
pub struct Machine<W: Word> {
    pub(crate) memory: Memory<W>,
    pub(crate) registers: Registers<W>,
    /// One past the last byte of the data stack.
    data_limit: u64,
    /// One past the last byte of the return stack.
    return_limit: u64,
    pub(crate) state: State,
}

fn check_layout(
    stack: &'static str,
    layout: StackLayout,
    memory_words: usize,
) -> Result<(), MachineError> {
    if layout.base.checked_add(layout.capacity).is_none() || layout.end() > memory_words {
        return Err(MachineError::StackOutOfBounds {
            stack,
            base: layout.base,
            capacity: layout.capacity,
        });
    }
    Ok(())
}

fn word_address<W: Word>(index: usize) -> u64 {
    index as u64 * W::BYTES as u64
}

// Stacks grow upward; `ptr` is the next free slot. A pointer outside
// `base..=limit` is reported before anything is touched.

fn stack_depth<W: Word>(ptr: u64, base: u64, limit: u64) -> Result<u64, Fault> {
    if ptr < base {
        return Err(Fault::StackUnderflow);
    }
    if ptr > limit {
        return Err(Fault::StackOverflow);
    }
    Ok((ptr - base) / W::BYTES as u64)
}

fn push_word<W: Word>(
    memory: &mut Memory<W>,
    ptr: &mut u64,
    base: u64,
    limit: u64,
    value: W,
) -> Result<(), Fault> {
    if *ptr < base {
        return Err(Fault::StackUnderflow);
    }
    if *ptr >= limit {
        return Err(Fault::StackOverflow);
    }
    memory.store_word(*ptr, value)?;
    *ptr += W::BYTES as u64;
    Ok(())
}

fn pop_word<W: Word>(memory: &Memory<W>, ptr: &mut u64, base: u64, limit: u64) -> Result<W, Fault> {
    if *ptr > limit {
        return Err(Fault::StackOverflow);
    }
    if *ptr <= base {
        return Err(Fault::StackUnderflow);
    }
    let top = *ptr - W::BYTES as u64;
    let value = memory.load_word(top)?;
    *ptr = top;
    Ok(value)
}

impl<W: Word> Machine<W> {
    /// Build a machine with zeroed memory and empty stacks.
    pub fn new(config: MachineConfig) -> Result<Self, MachineError> {
        let memory = Memory::new(config.memory_words, config.endianness)?;
        check_layout("data", config.data_stack, config.memory_words)?;
        check_layout("return", config.return_stack, config.memory_words)?;
        if config.data_stack.overlaps(&config.return_stack) {
            return Err(MachineError::StacksOverlap);
        }

        let s0 = word_address::<W>(config.data_stack.base);
        let r0 = word_address::<W>(config.return_stack.base);
        let registers = Registers {
            sp: s0,
            rp: r0,
            s0,
            r0,
            memory: memory.primary_len(),
            ..Registers::default()
        };
        Ok(Self {
            memory,
            registers,
            data_limit: word_address::<W>(config.data_stack.end()),
            return_limit: word_address::<W>(config.return_stack.end()),
            state: State::Ready,
        })
    }

    pub fn memory(&self) -> &Memory<W> {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory<W> {
        &mut self.memory
    }

    /// Map `length` zeroed bytes as a new extra area and return its address.
    pub fn allot(&mut self, length: usize, writable: bool) -> Result<u64, MachineError> {
        self.memory.allot(length, writable)
    }

    /// Pad the next extra area to a word boundary.
    pub fn align_extra(&mut self) {
        self.memory.align();
    }

    /// Store program arguments as read-only extra areas.
    ///
    /// Each argument becomes a NUL-terminated string. After them, on a word
    /// boundary, comes a table of their addresses. Returns the argument
    /// count and the table's address.
    pub fn register_args<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<(usize, u64), MachineError> {
        let mut addresses = Vec::with_capacity(args.len());
        for arg in args {
            let mut bytes = arg.as_ref().to_vec();
            bytes.push(0);
            addresses.push(self.memory.allot_from(bytes.into_boxed_slice(), false)?);
        }
        self.memory.align();

        let endianness = self.memory.endianness();
        let mut table = vec![0u8; args.len() * W::BYTES];
        for (slot, &address) in table.chunks_exact_mut(W::BYTES).zip(&addresses) {
            W::from_u64(address).write(slot, endianness);
        }
        let argv = self.memory.allot_from(table.into_boxed_slice(), false)?;
        Ok((args.len(), argv))
    }

    // --- Registers ---

    pub fn registers(&self) -> &Registers<W> {
        &self.registers
    }

    pub fn register(&self, register: Register) -> W {
        self.registers.get(register)
    }

    /// Write a register through the register table.
    pub fn set_register(&mut self, register: Register, value: W) -> Result<(), MachineError> {
        if register.info().read_only {
            return Err(MachineError::ReadOnlyRegister(register));
        }
        self.registers.put(register, value);
        Ok(())
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// The `exception` register: 0 after HALT, a fault code after a fault.
    pub fn exit_code(&self) -> W {
        self.registers.exception
    }

    // --- Stacks ---

    pub fn push(&mut self, value: W) -> Result<(), Fault> {
        let base = self.registers.s0;
        push_word(&mut self.memory, &mut self.registers.sp, base, self.data_limit, value)
    }

    pub fn pop(&mut self) -> Result<W, Fault> {
        let base = self.registers.s0;
        pop_word(&self.memory, &mut self.registers.sp, base, self.data_limit)
    }

    pub fn push_return(&mut self, value: W) -> Result<(), Fault> {
        let base = self.registers.r0;
        push_word(&mut self.memory, &mut self.registers.rp, base, self.return_limit, value)
    }

    pub fn pop_return(&mut self) -> Result<W, Fault> {
        let base = self.registers.r0;
        pop_word(&self.memory, &mut self.registers.rp, base, self.return_limit)
    }

    /// Number of items on the data stack.
    pub fn stack_depth(&self) -> Result<u64, Fault> {
        stack_depth::<W>(self.registers.sp, self.registers.s0, self.data_limit)
    }

    /// Move the data stack pointer so the stack holds `depth` items.
    pub fn set_stack_depth(&mut self, depth: u64) -> Result<(), Fault> {
        let capacity = (self.data_limit - self.registers.s0) / W::BYTES as u64;
        if depth > capacity {
            return Err(Fault::StackOverflow);
        }
        self.registers.sp = self.registers.s0 + depth * W::BYTES as u64;
        Ok(())
    }

    /// Address of the data-stack item `n` deep, 0 being the top.
    pub(crate) fn stack_slot(&self, n: u64) -> Result<u64, Fault> {
        if n >= self.stack_depth()? {
            return Err(Fault::StackUnderflow);
        }
        Ok(self.registers.sp - (n + 1) * W::BYTES as u64)
    }

    /// The top `N` data-stack items, deepest first, left in place.
    pub(crate) fn peek<const N: usize>(&self) -> Result<[W; N], Fault> {
        let mut items = [W::default(); N];
        for (depth, item) in items.iter_mut().rev().enumerate() {
            *item = self.memory.load_word(self.stack_slot(depth as u64)?)?;
        }
        Ok(items)
    }

    /// Discard the top `n` data-stack items.
    pub(crate) fn drop_items(&mut self, n: u64) -> Result<(), Fault> {
        if n > self.stack_depth()? {
            return Err(Fault::StackUnderflow);
        }
        self.registers.sp -= n * W::BYTES as u64;
        Ok(())
    }

    fn stack_contents(&self, base: u64, depth: u64) -> Result<Vec<W>, Fault> {
        (0..depth)
            .map(|i| self.memory.load_word(base + i * W::BYTES as u64))
            .collect()
    }

    /// The data stack, bottom first.
    pub fn data_stack(&self) -> Result<Vec<W>, Fault> {
        self.stack_contents(self.registers.s0, self.stack_depth()?)
    }

    /// The return stack, bottom first.
    pub fn return_stack(&self) -> Result<Vec<W>, Fault> {
        let depth = stack_depth::<W>(self.registers.rp, self.registers.r0, self.return_limit)?;
        self.stack_contents(self.registers.r0, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Machine<i32> {
        Machine::new(MachineConfig::new(64)).unwrap()
    }

    #[test]
    fn construction_sets_registers() {
        let m = small();
        let regs = m.registers();
        assert_eq!(regs.memory, 256);
        assert_eq!(regs.s0, 32 * 4);
        assert_eq!(regs.r0, 48 * 4);
        assert_eq!(regs.sp, regs.s0);
        assert_eq!(regs.rp, regs.r0);
        assert_eq!((regs.pc, regs.i, regs.exception), (0, 0, 0));
        assert_eq!(m.state(), &State::Ready);
    }

    #[test]
    fn stacks_must_fit_in_memory() {
        let config = MachineConfig::new(64).with_stacks(StackLayout::new(60, 8), StackLayout::new(0, 4));
        assert_eq!(
            Machine::<i32>::new(config).unwrap_err(),
            MachineError::StackOutOfBounds {
                stack: "data",
                base: 60,
                capacity: 8
            }
        );
    }

    #[test]
    fn stacks_must_not_overlap() {
        let config = MachineConfig::new(64).with_stacks(StackLayout::new(0, 8), StackLayout::new(4, 8));
        assert_eq!(Machine::<i64>::new(config).unwrap_err(), MachineError::StacksOverlap);
    }

    #[test]
    fn push_until_overflow_then_pop_until_underflow() {
        let mut m = small();
        for i in 0..16 {
            m.push(i).unwrap();
        }
        assert_eq!(m.push(16), Err(Fault::StackOverflow));
        assert_eq!(m.stack_depth(), Ok(16));
        for i in (0..16).rev() {
            assert_eq!(m.pop(), Ok(i));
        }
        assert_eq!(m.pop(), Err(Fault::StackUnderflow));
    }

    #[test]
    fn stray_stack_pointer_is_reported() {
        let mut m = small();
        m.set_register(Register::Sp, 0).unwrap();
        assert_eq!(m.stack_depth(), Err(Fault::StackUnderflow));
        assert_eq!(m.push(1), Err(Fault::StackUnderflow));
        m.set_register(Register::Sp, 0xfc).unwrap();
        assert_eq!(m.pop(), Err(Fault::StackOverflow));
    }

    #[test]
    fn set_stack_depth_is_bounded_by_capacity() {
        let mut m = small();
        assert_eq!(m.set_stack_depth(16), Ok(()));
        assert_eq!(m.set_stack_depth(17), Err(Fault::StackOverflow));
        assert_eq!(m.set_stack_depth(0), Ok(()));
        assert_eq!(m.data_stack(), Ok(vec![]));
    }

    #[test]
    fn peek_leaves_the_stack_alone() {
        let mut m = small();
        for i in 1..=3 {
            m.push(i).unwrap();
        }
        assert_eq!(m.peek::<2>(), Ok([2, 3]));
        assert_eq!(m.peek::<4>(), Err(Fault::StackUnderflow));
        assert_eq!(m.data_stack(), Ok(vec![1, 2, 3]));
        assert_eq!(m.drop_items(4), Err(Fault::StackUnderflow));
        assert_eq!(m.drop_items(2), Ok(()));
        assert_eq!(m.data_stack(), Ok(vec![1]));
    }

    #[test]
    fn read_only_registers_refuse_writes() {
        let mut m = small();
        assert_eq!(
            m.set_register(Register::S0, 0),
            Err(MachineError::ReadOnlyRegister(Register::S0))
        );
        assert_eq!(m.set_register(Register::Pc, 12), Ok(()));
        assert_eq!(m.register(Register::Pc), 12);
    }
}
