//! Mite virtual machine: state, memory and execution engine.
//!
//! A machine has:
//! - A primary memory region at address 0, plus extra areas mapped above it
//! - Data and return stacks that grow upward inside primary memory
//! - A small register set described by [`ALL_REGISTERS`]
//!
//! Instructions are fetched straight from memory in the variable-length
//! encoding of [`mite_common::codec`]. Faults never panic: they are
//! returned and their code is left in the `exception` register.
//!
//! # Usage
//!
//! ```
//! use mite_common::Action;
//! use mite_vm::{Emitter, Fault, Machine, MachineConfig, State};
//!
//! let mut machine = Machine::<i64>::new(MachineConfig::default()).unwrap();
//! let mut emit = Emitter::new(&mut machine, 0);
//! emit.number(1).unwrap();
//! emit.number(0).unwrap();
//! emit.action(Action::DivMod).unwrap();
//!
//! assert_eq!(machine.run(), Err(Fault::DivisionByZero));
//! assert_eq!(machine.exit_code(), 8);
//! assert_eq!(machine.state(), &State::Faulted(Fault::DivisionByZero));
//! ```

pub mod config;
pub mod emit;
pub mod error;
pub mod execute;
pub mod machine;
pub mod memory;
pub mod registers;

pub use config::{MachineConfig, StackLayout, DEFAULT_MEMORY_WORDS, DEFAULT_STACK_WORDS};
pub use emit::Emitter;
pub use error::{Fault, MachineError};
pub use execute::Step;
pub use machine::{Machine, State};
pub use memory::{ExtraArea, Memory, MemoryCursor};
pub use registers::{Register, RegisterInfo, RegisterKind, Registers, ALL_REGISTERS};
