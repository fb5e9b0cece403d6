//! Instruction fetch and action dispatch.

use crate::error::Fault;
use crate::machine::{Machine, State};
use mite_common::{codec, Action, CodecError, Instruction, InstructionKind, Word};
use tracing::{debug, trace};

/// What a successful step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A number was pushed.
    Literal,
    /// An action other than HALT ran.
    Action(Action),
    /// HALT ran; the machine is halted.
    Halt,
}

fn flag<W: Word>(condition: bool) -> W {
    W::from_i64(condition as i64)
}

impl<W: Word> Machine<W> {
    /// Run until HALT or a fault.
    ///
    /// On a fault the code is also left in the `exception` register, so
    /// `fault.code()` and [`Machine::exit_code`] agree.
    pub fn run(&mut self) -> Result<(), Fault> {
        loop {
            if self.single_step()? == Step::Halt {
                return Ok(());
            }
        }
    }

    /// Fetch and execute one instruction.
    pub fn single_step(&mut self) -> Result<Step, Fault> {
        match self.fetch().and_then(|instruction| self.execute(instruction)) {
            Ok(Step::Halt) => {
                self.registers.exception = W::default();
                self.state = State::Halted;
                Ok(Step::Halt)
            }
            Ok(step) => {
                self.state = State::Ready;
                Ok(step)
            }
            Err(fault) => {
                debug!(pc = self.registers.pc, code = fault.code(), %fault, "fault");
                self.registers.exception = W::from_i64(fault.code());
                self.state = State::Faulted(fault.clone());
                Err(fault)
            }
        }
    }

    /// Decode the instruction at `pc`, leaving `pc` just past it and its
    /// value in `i`. A failed fetch leaves `pc` unchanged.
    fn fetch(&mut self) -> Result<Instruction<W>, Fault> {
        let start = self.registers.pc;
        let mut cursor = self.memory.cursor(start);
        let instruction = codec::decode::<W, _>(&mut cursor).map_err(|e| match e {
            CodecError::TooWide { .. } => Fault::MalformedInstruction { address: start },
            CodecError::Transport(fault) => fault,
        })?;
        let next = cursor.address;

        trace!(pc = start, kind = ?instruction.kind, value = %instruction.value, "fetch");
        self.registers.pc = next;
        self.registers.i = instruction.value;
        Ok(instruction)
    }

    fn execute(&mut self, instruction: Instruction<W>) -> Result<Step, Fault> {
        match instruction.kind {
            InstructionKind::Number => {
                self.push(instruction.value)?;
                Ok(Step::Literal)
            }
            InstructionKind::Action => {
                let code = instruction.value.to_u64();
                let action = Action::try_from(code).map_err(|_| Fault::InvalidOpcode(code))?;
                trace!(action = action.mnemonic(), "dispatch");
                self.dispatch(action)
            }
        }
    }

    // Operands are peeked and only dropped once the action can no longer
    // fault, so a fault leaves the stack untouched.

    /// Replace the top `N` items with `results`.
    fn replace<const N: usize>(&mut self, results: &[W]) -> Result<(), Fault> {
        self.drop_items(N as u64)?;
        results.iter().try_for_each(|&value| self.push(value))
    }

    fn unary(&mut self, f: impl FnOnce(W) -> W) -> Result<(), Fault> {
        let [a] = self.peek::<1>()?;
        self.replace::<1>(&[f(a)])
    }

    /// Take `b` (the top) and `a`, push `f(a, b)`.
    fn binary(&mut self, f: impl FnOnce(W, W) -> W) -> Result<(), Fault> {
        let [a, b] = self.peek::<2>()?;
        self.replace::<2>(&[f(a, b)])
    }

    fn signed(&mut self, f: impl FnOnce(i64, i64) -> i64) -> Result<(), Fault> {
        self.binary(|a, b| W::from_i64(f(a.to_i64(), b.to_i64())))
    }

    fn unsigned(&mut self, f: impl FnOnce(u64, u64) -> u64) -> Result<(), Fault> {
        self.binary(|a, b| W::from_u64(f(a.to_u64(), b.to_u64())))
    }

    fn divmod(&mut self, is_signed: bool) -> Result<(), Fault> {
        let [a, b] = self.peek::<2>()?;
        if b == W::default() {
            return Err(Fault::DivisionByZero);
        }
        let (q, r) = if is_signed {
            let (a, b) = (a.to_i64(), b.to_i64());
            (W::from_i64(a.wrapping_div(b)), W::from_i64(a.wrapping_rem(b)))
        } else {
            let (a, b) = (a.to_u64(), b.to_u64());
            (W::from_u64(a / b), W::from_u64(a % b))
        };
        self.replace::<2>(&[q, r])
    }

    fn dispatch(&mut self, action: Action) -> Result<Step, Fault> {
        match action {
            Action::Halt => return Ok(Step::Halt),
            Action::Nop => {}

            // Stack
            Action::Pop => {
                self.pop()?;
            }
            Action::Dup => {
                // Depths below count from beneath `n` itself.
                let [n] = self.peek::<1>()?;
                let depth = n.to_u64().checked_add(1).ok_or(Fault::StackUnderflow)?;
                let value = self.memory.load_word(self.stack_slot(depth)?)?;
                self.replace::<1>(&[value])?;
            }
            Action::Swap => {
                let [n] = self.peek::<1>()?;
                let depth = n.to_u64().checked_add(1).ok_or(Fault::StackUnderflow)?;
                let deep = self.stack_slot(depth)?;
                let top = self.stack_slot(1)?;
                let x = self.memory.load_word(deep)?;
                let y = self.memory.load_word(top)?;
                self.drop_items(1)?;
                self.memory.store_word(deep, y)?;
                self.memory.store_word(top, x)?;
            }

            // Logic
            Action::Not => self.unary(|a| W::from_i64(!a.to_i64()))?,
            Action::And => self.signed(|a, b| a & b)?,
            Action::Or => self.signed(|a, b| a | b)?,
            Action::Xor => self.signed(|a, b| a ^ b)?,
            Action::LShift => self.unsigned(|x, n| if n < W::BITS as u64 { x << n } else { 0 })?,
            Action::RShift => self.unsigned(|x, n| if n < W::BITS as u64 { x >> n } else { 0 })?,
            Action::ArShift => self.binary(|x, n| W::from_i64(x.to_i64() >> n.to_u64().min(63)))?,

            // Comparison
            Action::Eq => self.binary(|a, b| flag(a == b))?,
            Action::Lt => self.binary(|a, b| flag(a < b))?,
            Action::Ult => self.binary(|a, b| flag(a.to_u64() < b.to_u64()))?,

            // Arithmetic
            Action::Negate => self.unary(|a| W::from_i64(a.to_i64().wrapping_neg()))?,
            Action::Add => self.signed(i64::wrapping_add)?,
            Action::Mul => self.signed(i64::wrapping_mul)?,
            Action::DivMod => self.divmod(true)?,
            Action::UDivMod => self.divmod(false)?,

            // Memory
            Action::Load => {
                let [address] = self.peek::<1>()?;
                let value = self.memory.load_word(address.to_u64())?;
                self.replace::<1>(&[value])?;
            }
            Action::Store => {
                let [value, address] = self.peek::<2>()?;
                self.memory.store_word(address.to_u64(), value)?;
                self.drop_items(2)?;
            }
            Action::LoadB => {
                let [address] = self.peek::<1>()?;
                let byte = self.memory.load_byte(address.to_u64())?;
                self.replace::<1>(&[W::from_u64(u64::from(byte))])?;
            }
            Action::StoreB => {
                let [value, address] = self.peek::<2>()?;
                self.memory.store_byte(address.to_u64(), value.to_u64() as u8)?;
                self.drop_items(2)?;
            }

            // Control flow
            Action::Branch => {
                self.registers.pc = self.pop()?.to_u64();
            }
            Action::BranchZ => {
                let [flag, target] = self.peek::<2>()?;
                self.drop_items(2)?;
                if flag == W::default() {
                    self.registers.pc = target.to_u64();
                }
            }
            Action::Call => {
                let [target] = self.peek::<1>()?;
                self.push_return(W::from_u64(self.registers.pc))?;
                self.drop_items(1)?;
                self.registers.pc = target.to_u64();
            }
            Action::Ret => {
                self.registers.pc = self.pop_return()?.to_u64();
            }

            // Return stack
            Action::ToR => {
                let [value] = self.peek::<1>()?;
                self.push_return(value)?;
                self.drop_items(1)?;
            }
            Action::RFrom => {
                let rp = self.registers.rp;
                let value = self.pop_return()?;
                if let Err(fault) = self.push(value) {
                    self.registers.rp = rp;
                    return Err(fault);
                }
            }

            // Machine
            Action::GetWordSize => self.push(W::from_i64(W::BYTES as i64))?,
            Action::GetStackDepth => {
                let depth = self.stack_depth()?;
                self.push(W::from_u64(depth))?;
            }
            Action::SetStackDepth => {
                let [depth] = self.peek::<1>()?;
                self.set_stack_depth(depth.to_u64())?;
            }
        }
        Ok(Step::Action(action))
    }
}
