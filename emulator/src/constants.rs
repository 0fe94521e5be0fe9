//! Architectural constants.

use crate::runtime::registers;

/// Number of base registers per processor.
pub const BASE_REGISTER_COUNT: usize = 32;

/// Base register holding the level-0 bank descriptor table. Its bank
/// also begins with the interrupt vector area. B16+n holds the table
/// for level n.
pub const L0_BDT_BASE_REGISTER: usize = 16;

/// Base register describing the return control stack bank.
pub const RCS_BASE_REGISTER: usize = 25;

/// Base register describing the interrupt control stack bank.
pub const ICS_BASE_REGISTER: usize = 26;

/// GRS location of the interrupt-control-stack pointer: frame size in
/// the increment half, current frame offset in the modifier half.
pub const ICS_INDEX_REGISTER: u64 = registers::EX1;

/// Number of interrupt vector words at the front of the level-0
/// bank-descriptor-table bank.
pub const INTERRUPT_VECTOR_COUNT: u64 = 0o100;

/// Size of the jump history table, in entries.
pub const JUMP_HISTORY_TABLE_SIZE: usize = 128;

/// Jump-history fill level at which the jump-history-full condition is
/// raised.
pub const JUMP_HISTORY_TABLE_THRESHOLD: usize = 120;

/// Hard bound on basic-mode indirect-addressing chains. A longer chain
/// raises an addressing exception instead of resolving further.
pub const MAX_INDIRECT_DEPTH: u64 = 0o400;

/// Quantum-timer charge per completed instruction.
pub const QUANTUM_TIMER_CHARGE: u64 = 20;
