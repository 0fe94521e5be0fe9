//! The register file: general register set, index-register view,
//! designator register, indicator/key register and program address
//! register.

use bitflags::bitflags;

use crate::runtime::banks::AccessInfo;
use crate::word::{sign_extend_12, sign_extend_18, sign_extend_24, Word36};

//  GRS indices. X, A and R occupy the user band; ER, EX and EA are the
//  exec shadow banks. A0-A3 overlay X12-X15, and EA0-EA3 overlay
//  EX12-EX15, exactly as architected.
pub const X0: u64 = 0;
pub const X11: u64 = 0o13;
pub const X12: u64 = 0o14;
pub const X15: u64 = 0o17;
pub const A0: u64 = 0o14;
pub const A15: u64 = 0o33;
pub const R0: u64 = 0o100;
pub const R15: u64 = 0o117;
pub const ER0: u64 = 0o120;
pub const EX0: u64 = 0o140;
pub const EX1: u64 = 0o141;
pub const EX15: u64 = 0o157;
pub const EA0: u64 = 0o154;

/// Size of the general register set. Consecutive-operand transfers wrap
/// at this boundary.
pub const GRS_SIZE: u64 = 0o200;

/// Display names for every GRS location, by index.
#[rustfmt::skip]
pub const GRS_NAMES: [&str; 128] = [
    "X0",    "X1",    "X2",    "X3",    "X4",    "X5",    "X6",    "X7",
    "X8",    "X9",    "X10",   "X11",   "A0",    "A1",    "A2",    "A3",
    "A4",    "A5",    "A6",    "A7",    "A8",    "A9",    "A10",   "A11",
    "A12",   "A13",   "A14",   "A15",   "UR0",   "UR1",   "UR2",   "UR3",
    "040",   "041",   "042",   "043",   "044",   "045",   "046",   "047",
    "050",   "051",   "052",   "053",   "054",   "055",   "056",   "057",
    "060",   "061",   "062",   "063",   "064",   "065",   "066",   "067",
    "070",   "071",   "072",   "073",   "074",   "075",   "076",   "077",
    "R0",    "R1",    "R2",    "R3",    "R4",    "R5",    "R6",    "R7",
    "R8",    "R9",    "R10",   "R11",   "R12",   "R13",   "R14",   "R15",
    "ER0",   "ER1",   "ER2",   "ER3",   "ER4",   "ER5",   "ER6",   "ER7",
    "ER8",   "ER9",   "ER10",  "ER11",  "ER12",  "ER13",  "ER14",  "ER15",
    "EX0",   "EX1",   "EX2",   "EX3",   "EX4",   "EX5",   "EX6",   "EX7",
    "EX8",   "EX9",   "EX10",  "EX11",  "EA0",   "EA1",   "EA2",   "EA3",
    "EA4",   "EA5",   "EA6",   "EA7",   "EA8",   "EA9",   "EA10",  "EA11",
    "EA12",  "EA13",  "EA14",  "EA15",  "0174",  "0175",  "0176",  "0177",
];

/// The general register set: 128 words, flatly indexed.
#[derive(Clone)]
pub struct GeneralRegisterSet {
    registers: [Word36; GRS_SIZE as usize],
}

impl Default for GeneralRegisterSet {
    fn default() -> Self {
        GeneralRegisterSet {
            registers: [Word36::POSITIVE_ZERO; GRS_SIZE as usize],
        }
    }
}

impl GeneralRegisterSet {
    /// Reads a register.
    ///
    /// # Panics
    ///
    /// Panics on an out-of-range index; callers mask or validate indices
    /// before access, so this is an emulator defect.
    #[must_use]
    pub fn get(&self, index: u64) -> Word36 {
        assert!(index < GRS_SIZE, "GRS index {index:o} out of range");
        self.registers[index as usize]
    }

    /// Writes a register.
    ///
    /// # Panics
    ///
    /// Panics on an out-of-range index.
    pub fn set(&mut self, index: u64, value: Word36) {
        assert!(index < GRS_SIZE, "GRS index {index:o} out of range");
        self.registers[index as usize] = value;
    }

    /// Whether the given access is architecturally allowed at the given
    /// processor privilege. The unassigned band 040-077 is never
    /// accessible; the exec bands require privileged execution.
    #[must_use]
    pub fn access_allowed(index: u64, processor_privilege: u8, write_access: bool) -> bool {
        if index < 0o40 {
            true
        } else if index < 0o100 {
            false
        } else if index < 0o120 {
            true
        } else {
            (write_access && processor_privilege == 0)
                || (!write_access && processor_privilege <= 2)
        }
    }
}

impl std::fmt::Debug for GeneralRegisterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in (0..GRS_SIZE as usize).step_by(8) {
            write!(f, "{:>5}:", GRS_NAMES[row])?;
            for index in row..row + 8 {
                write!(f, " {}", self.registers[index])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// A word viewed as an index register: an 18-bit signed increment (XI,
/// upper half) over an 18-bit signed modifier (XM, lower half), with the
/// 12/24-bit split used by executive 24-bit indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexRegister(Word36);

impl IndexRegister {
    #[must_use]
    pub const fn new(word: Word36) -> Self {
        IndexRegister(word)
    }

    #[must_use]
    pub const fn word(self) -> Word36 {
        self.0
    }

    #[must_use]
    pub const fn xi(self) -> u64 {
        self.0.h1()
    }

    #[must_use]
    pub const fn xm(self) -> u64 {
        self.0.h2()
    }

    #[must_use]
    pub const fn xi12(self) -> u64 {
        self.0.t1()
    }

    #[must_use]
    pub const fn xm24(self) -> u64 {
        self.0.raw() & 0o000077_777777
    }

    #[must_use]
    pub fn signed_xi(self) -> Word36 {
        Word36::new(sign_extend_18(self.xi()))
    }

    #[must_use]
    pub fn signed_xm(self) -> Word36 {
        Word36::new(sign_extend_18(self.xm()))
    }

    #[must_use]
    pub fn signed_xi12(self) -> Word36 {
        Word36::new(sign_extend_12(self.xi12()))
    }

    #[must_use]
    pub fn signed_xm24(self) -> Word36 {
        Word36::new(sign_extend_24(self.xm24()))
    }

    pub fn set_xi(&mut self, value: u64) {
        self.0.set_h1(value);
    }

    pub fn set_xi12(&mut self, value: u64) {
        self.0.set_t1(value);
    }

    pub fn set_xm(&mut self, value: u64) {
        self.0.set_h2(value);
    }

    pub fn set_xm24(&mut self, value: u64) {
        self.0 = Word36::new((self.0.raw() & 0o777700_000000) | (value & 0o000077_777777));
    }

    /// Adds the signed 18-bit increment to the signed 18-bit modifier.
    pub fn increment_modifier_18(&mut self) {
        let sum = self.signed_xm().add_simple(self.signed_xi());
        self.set_xm(sum.raw());
    }

    /// Subtracts the signed 18-bit increment from the modifier.
    pub fn decrement_modifier_18(&mut self) {
        let sum = self.signed_xm().add_simple(self.signed_xi().negate());
        self.set_xm(sum.raw());
    }

    /// Adds the signed 12-bit increment to the signed 24-bit modifier.
    pub fn increment_modifier_24(&mut self) {
        let sum = self.signed_xm24().add_simple(self.signed_xi12());
        self.set_xm24(sum.raw());
    }
}

bitflags! {
    /// The designator register: processor status bits at their
    /// architectural positions. The two-bit processor-privilege field
    /// (bits 14-15) is carried in the same word and accessed through
    /// [`DesignatorRegister::processor_privilege`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DesignatorRegister: u64 {
        const ACTIVITY_LEVEL_QUEUE_MONITOR       = 1 << 35;
        const FAULT_HANDLING_IN_PROGRESS         = 1 << 29;
        const EXECUTIVE_24_BIT_INDEXING          = 1 << 24;
        const QUANTUM_TIMER_ENABLED              = 1 << 23;
        const DEFERRABLE_INTERRUPT_ENABLED       = 1 << 22;
        const BASIC_MODE                         = 1 << 19;
        const EXEC_REGISTER_SET                  = 1 << 18;
        const CARRY                              = 1 << 17;
        const OVERFLOW                           = 1 << 16;
        const CHARACTERISTIC_UNDERFLOW           = 1 << 14;
        const CHARACTERISTIC_OVERFLOW            = 1 << 13;
        const DIVIDE_CHECK                       = 1 << 12;
        const OPERATION_TRAP_ENABLED             = 1 << 8;
        const ARITHMETIC_EXCEPTION_ENABLED       = 1 << 6;
        const BASIC_MODE_BASE_REGISTER_SELECTION = 1 << 4;
        const QUARTER_WORD_MODE                  = 1 << 3;
    }
}

const PRIVILEGE_SHIFT: u64 = 20;
const PRIVILEGE_MASK: u64 = 0o3 << PRIVILEGE_SHIFT;

impl DesignatorRegister {
    /// Processor privilege, 0 (most privileged) through 3.
    #[must_use]
    pub fn processor_privilege(&self) -> u8 {
        ((self.bits() & PRIVILEGE_MASK) >> PRIVILEGE_SHIFT) as u8
    }

    pub fn set_processor_privilege(&mut self, privilege: u8) {
        let bits =
            (self.bits() & !PRIVILEGE_MASK) | (u64::from(privilege & 0o3) << PRIVILEGE_SHIFT);
        *self = Self::from_bits_retain(bits);
    }

    #[must_use]
    pub fn basic_mode(&self) -> bool {
        self.contains(Self::BASIC_MODE)
    }

    #[must_use]
    pub fn word(&self) -> Word36 {
        Word36::new(self.bits())
    }

    #[must_use]
    pub fn from_word(word: Word36) -> Self {
        Self::from_bits_retain(word.raw())
    }

    pub fn clear(&mut self) {
        *self = Self::from_bits_retain(0);
    }
}

/// The indicator/key register: the access key used for bank permission
/// comparison, plus the condition indicators the processor maintains
/// between instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorKeyRegister {
    pub access_key: AccessInfo,
    pub short_status: u8,
    pub interrupt_class: u8,
    pub instruction_in_f0: bool,
    pub breakpoint_match: bool,
    pub software_break: bool,
}

impl IndicatorKeyRegister {
    /// Composes the word pushed on the interrupt control stack: short
    /// status in S1, interrupt class in S2, indicator bits in S3, access
    /// key in H2.
    #[must_use]
    pub fn word(&self) -> Word36 {
        let mut word = Word36::POSITIVE_ZERO;
        word.set_s1(u64::from(self.short_status));
        word.set_s2(u64::from(self.interrupt_class));
        let mut indicators = 0;
        if self.instruction_in_f0 {
            indicators |= 0o40;
        }
        if self.breakpoint_match {
            indicators |= 0o20;
        }
        if self.software_break {
            indicators |= 0o10;
        }
        word.set_s3(indicators);
        word.set_h2(self.access_key.as_half_word());
        word
    }

    /// Clears the condition indicators, keeping the access key.
    pub fn clear(&mut self) {
        *self = IndicatorKeyRegister {
            access_key: self.access_key,
            ..IndicatorKeyRegister::default()
        };
    }
}

/// The program address register: bank level and descriptor index in the
/// upper half, program counter in the lower half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramAddressRegister(Word36);

impl ProgramAddressRegister {
    #[must_use]
    pub const fn word(self) -> Word36 {
        self.0
    }

    pub fn set_word(&mut self, word: Word36) {
        self.0 = word;
    }

    #[must_use]
    pub const fn level(self) -> u64 {
        self.0.raw() >> 33
    }

    #[must_use]
    pub const fn bank_descriptor_index(self) -> u64 {
        self.0.h1() & 0o77777
    }

    #[must_use]
    pub const fn program_counter(self) -> u64 {
        self.0.h2()
    }

    pub fn set_program_counter(&mut self, counter: u64) {
        self.0.set_h2(counter);
    }
}

impl std::fmt::Display for ProgramAddressRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{:o}:{:06o}",
            self.level(),
            self.bank_descriptor_index(),
            self.program_counter()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grs_access_rules() {
        //  user bands
        assert!(GeneralRegisterSet::access_allowed(A0, 3, true));
        assert!(GeneralRegisterSet::access_allowed(R0, 3, true));
        //  unassigned band
        assert!(!GeneralRegisterSet::access_allowed(0o40, 0, false));
        //  exec band: read needs privilege <= 2, write needs 0
        assert!(GeneralRegisterSet::access_allowed(EX0, 2, false));
        assert!(!GeneralRegisterSet::access_allowed(EX0, 3, false));
        assert!(GeneralRegisterSet::access_allowed(EX0, 0, true));
        assert!(!GeneralRegisterSet::access_allowed(EX0, 1, true));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn grs_out_of_range_panics() {
        let grs = GeneralRegisterSet::default();
        let _ = grs.get(GRS_SIZE);
    }

    #[test]
    fn index_register_increment_crosses_sign_boundary() {
        //  positive boundary: 0377777 + 1 wraps into negative encoding
        let mut xreg = IndexRegister::default();
        xreg.set_xm(0o377777);
        xreg.set_xi(1);
        xreg.increment_modifier_18();
        assert_eq!(xreg.xm(), 0o400000);

        //  and decrement comes back
        xreg.decrement_modifier_18();
        assert_eq!(xreg.xm(), 0o377777);
    }

    #[test]
    fn index_register_24_bit_increment() {
        let mut xreg = IndexRegister::default();
        xreg.set_xm24(0o37_777777);
        xreg.set_xi12(1);
        xreg.increment_modifier_24();
        assert_eq!(xreg.xm24(), 0o40_000000);
    }

    #[test]
    fn designator_privilege_field() {
        let mut designator = DesignatorRegister::default();
        assert_eq!(designator.processor_privilege(), 0);

        designator.set_processor_privilege(3);
        designator.insert(DesignatorRegister::BASIC_MODE | DesignatorRegister::CARRY);
        assert_eq!(designator.processor_privilege(), 3);
        assert!(designator.basic_mode());

        //  flag operations leave the privilege field alone
        designator.remove(DesignatorRegister::CARRY);
        assert_eq!(designator.processor_privilege(), 3);

        //  word round trip
        let restored = DesignatorRegister::from_word(designator.word());
        assert_eq!(restored, designator);
    }

    #[test]
    fn program_address_register_fields() {
        let mut par = ProgramAddressRegister::default();
        par.set_word(Word36::new(0o200042_001000));
        assert_eq!(par.program_counter(), 0o1000);
        par.set_program_counter(0o1001);
        assert_eq!(par.program_counter(), 0o1001);
    }
}
