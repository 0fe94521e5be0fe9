//! Emulation of a 36-bit ones-complement mainframe instruction
//! processor: the word and instruction models, the general register set,
//! basic/extended operand-address resolution with base-register banking,
//! the machine-interrupt taxonomy and the fetch-decode-execute loop.
//!
//! The crate executes already-assembled instruction words against banked
//! main storage. Assemblers, device I/O and the executive layer are
//! external collaborators.

pub mod constants;
pub mod instruction;
pub mod loader;
pub mod runtime;
pub mod storage;
pub mod word;

pub use self::runtime::{Processor, ProcessorError, RunMode, StopReason};
pub use self::word::Word36;
