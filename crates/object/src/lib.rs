//! Mite object files: memory images on disk.
//!
//! An object file is a short header followed by a raw payload copied to or
//! from machine memory. The header records the byte order and word size
//! the payload was built for; loading refuses files that do not match the
//! machine. See [`format`] for the two header layouts.
//!
//! # Usage
//!
//! ```
//! use mite_common::Action;
//! use mite_object::{load, save, Format};
//! use mite_vm::{Emitter, Machine, MachineConfig};
//!
//! let mut source = Machine::<i32>::new(MachineConfig::new(256)).unwrap();
//! let mut emit = Emitter::new(&mut source, 0);
//! emit.number(40).unwrap();
//! emit.number(2).unwrap();
//! emit.action(Action::Add).unwrap();
//! emit.action(Action::Halt).unwrap();
//! let length = emit.here();
//!
//! let mut file = Vec::new();
//! save(&source, 0, length, &mut file, Format::default()).unwrap();
//!
//! let mut target = Machine::<i32>::new(MachineConfig::new(256)).unwrap();
//! assert_eq!(load(&mut target, 0, &file[..]).unwrap(), length);
//! target.run().unwrap();
//! assert_eq!(target.data_stack().unwrap(), vec![42]);
//! ```

pub mod error;
pub mod format;
pub mod image;

pub use error::ObjectError;
pub use format::Format;
pub use image::{load, load_file, save, save_file};
