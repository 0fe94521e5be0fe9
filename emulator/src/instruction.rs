//! Instruction-word decoding.
//!
//! An instruction word carries fixed bit fields: `f` (function code, bits
//! 0-5 architectural), `j` (partial-word selector or sub-function), `a`
//! (register designator), `x` (index register), `h` (index increment),
//! `i` (indirect), and either an 16/18-bit `u` displacement (basic mode)
//! or a `b` base-register selector with a 12-bit `d` displacement
//! (extended mode). Decoding is total: every 36-bit value yields a field
//! tuple; whether the combination names an instruction is a dispatch
//! concern.

use std::fmt;

use crate::runtime::registers::GRS_NAMES;
use crate::word::Word36;

//  j-field partial-word designators. Values 4..=7 read differently under
//  quarter-word mode (XH1/Q2, T3/Q4, T2/Q3, T1/Q1).
pub const J_W: u64 = 0o00;
pub const J_H2: u64 = 0o01;
pub const J_H1: u64 = 0o02;
pub const J_XH2: u64 = 0o03;
pub const J_XH1: u64 = 0o04;
pub const J_Q2: u64 = 0o04;
pub const J_T3: u64 = 0o05;
pub const J_Q4: u64 = 0o05;
pub const J_T2: u64 = 0o06;
pub const J_Q3: u64 = 0o06;
pub const J_T1: u64 = 0o07;
pub const J_Q1: u64 = 0o07;
pub const J_S6: u64 = 0o10;
pub const J_S5: u64 = 0o11;
pub const J_S4: u64 = 0o12;
pub const J_S3: u64 = 0o13;
pub const J_S2: u64 = 0o14;
pub const J_S1: u64 = 0o15;
pub const J_U: u64 = 0o16;
pub const J_XU: u64 = 0o17;

const J_FIELD_NAMES: [&str; 16] = [
    "W", "H2", "H1", "XH2", "XH1", "T3", "T2", "T1", "S6", "S5", "S4", "S3", "S2", "S1", "U", "XU",
];

const MASK_XHIU: u64 = 0o000017_777777;

/// A 36-bit word viewed as an instruction.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct InstructionWord(Word36);

impl InstructionWord {
    #[must_use]
    pub const fn new(word: Word36) -> Self {
        InstructionWord(word)
    }

    /// Builds a basic-mode word from components, with separate h/i bits
    /// and a 16-bit u field.
    #[must_use]
    pub fn from_fields(f: u64, j: u64, a: u64, x: u64, h: u64, i: u64, u: u64) -> Self {
        InstructionWord(Word36::new(
            ((f & 0o77) << 30)
                | ((j & 0o17) << 26)
                | ((a & 0o17) << 22)
                | ((x & 0o17) << 18)
                | ((h & 1) << 17)
                | ((i & 1) << 16)
                | (u & 0o177777),
        ))
    }

    /// Builds a basic-mode word where `u` spans the h and i bits as well.
    #[must_use]
    pub fn from_fields_hiu(f: u64, j: u64, a: u64, x: u64, u: u64) -> Self {
        InstructionWord(Word36::new(
            ((f & 0o77) << 30)
                | ((j & 0o17) << 26)
                | ((a & 0o17) << 22)
                | ((x & 0o17) << 18)
                | (u & 0o777777),
        ))
    }

    /// Builds an extended-mode word with b and d fields.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_fields_bd(f: u64, j: u64, a: u64, x: u64, h: u64, i: u64, b: u64, d: u64) -> Self {
        InstructionWord(Word36::new(
            ((f & 0o77) << 30)
                | ((j & 0o17) << 26)
                | ((a & 0o17) << 22)
                | ((x & 0o17) << 18)
                | ((h & 1) << 17)
                | ((i & 1) << 16)
                | ((b & 0o17) << 12)
                | (d & 0o7777),
        ))
    }

    #[must_use]
    pub const fn word(self) -> Word36 {
        self.0
    }

    #[must_use]
    pub const fn f(self) -> u64 {
        self.0.raw() >> 30
    }

    #[must_use]
    pub const fn j(self) -> u64 {
        (self.0.raw() >> 26) & 0o17
    }

    #[must_use]
    pub const fn a(self) -> u64 {
        (self.0.raw() >> 22) & 0o17
    }

    #[must_use]
    pub const fn x(self) -> u64 {
        (self.0.raw() >> 18) & 0o17
    }

    #[must_use]
    pub const fn h(self) -> u64 {
        (self.0.raw() >> 17) & 1
    }

    #[must_use]
    pub const fn i(self) -> u64 {
        (self.0.raw() >> 16) & 1
    }

    /// 16-bit displacement (basic mode, h and i excluded).
    #[must_use]
    pub const fn u(self) -> u64 {
        self.0.raw() & 0o177777
    }

    /// 18-bit displacement spanning h, i and u.
    #[must_use]
    pub const fn hiu(self) -> u64 {
        self.0.raw() & 0o777777
    }

    /// Extended-mode base-register selector.
    #[must_use]
    pub const fn b(self) -> u64 {
        (self.0.raw() >> 12) & 0o17
    }

    /// Extended-mode base-register selector extended to 5 bits by the i
    /// bit, used below processor privilege 2.
    #[must_use]
    pub const fn ib(self) -> u64 {
        (self.0.raw() >> 12) & 0o37
    }

    /// Extended-mode 12-bit displacement.
    #[must_use]
    pub const fn d(self) -> u64 {
        self.0.raw() & 0o7777
    }

    pub fn set_word(&mut self, word: Word36) {
        self.0 = word;
    }

    pub fn clear(&mut self) {
        self.0 = Word36::POSITIVE_ZERO;
    }

    /// Splices the x, h, i and u fields of `word` into this instruction,
    /// preserving f, j and a. This is the basic-mode indirect-addressing
    /// step: each chased word supplies fresh addressing fields.
    pub fn set_xhiu(&mut self, word: Word36) {
        self.0 = Word36::new((self.0.raw() & !MASK_XHIU) | (word.raw() & MASK_XHIU));
    }
}

impl fmt::Display for InstructionWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for InstructionWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstructionWord({:012o})", self.0.raw())
    }
}

impl From<Word36> for InstructionWord {
    fn from(word: Word36) -> Self {
        InstructionWord(word)
    }
}

//  ---------------------------------------------------------------------
//  Disassembly catalog. Presentation only: execution dispatch lives in
//  runtime::functions. Unknown opcodes produce an empty mnemonic or a raw
//  octal field dump, never an error.
//  ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Basic,
    Extended,
    Either,
}

/// What the a-field designates, for display purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ASem {
    None,
    A,
    B,
    BExec,
    R,
    X,
}

//  Row flags.
const JF: u8 = 1 << 0; //  j-field is part of the function code
const AF: u8 = 1 << 1; //  a-field is part of the function code
const GRS: u8 = 1 << 2; //  u < 0200 may name a GRS register
const BM: u8 = 1 << 3; //  extended-mode row uses u semantics (jumps)

struct OpInfo {
    mode: Mode,
    f: u8,
    j: u8,
    a: u8,
    flags: u8,
    a_sem: ASem,
    mnemonic: &'static str,
}

const fn op(mode: Mode, f: u8, j: u8, a: u8, flags: u8, a_sem: ASem, mnemonic: &'static str) -> OpInfo {
    OpInfo { mode, f, j, a, flags, a_sem, mnemonic }
}

use ASem as S;
use Mode::{Basic, Either, Extended};

#[rustfmt::skip]
const OP_INFOS: &[OpInfo] = &[
    op(Either,   0o01, 0o16, 0o00, JF,           S::A,     "PRBA"),
    op(Either,   0o01, 0o00, 0o00, GRS,          S::A,     "SA"),
    op(Either,   0o02, 0o00, 0o00, GRS,          S::A,     "SNA"),
    op(Either,   0o03, 0o16, 0o00, JF,           S::A,     "PRBC"),
    op(Either,   0o03, 0o00, 0o00, GRS,          S::A,     "SMA"),
    op(Either,   0o04, 0o00, 0o00, GRS,          S::R,     "SR"),
    op(Either,   0o05, 0o00, 0o00, AF | GRS,     S::None,  "SZ"),
    op(Either,   0o05, 0o00, 0o01, AF | GRS,     S::None,  "SNZ"),
    op(Either,   0o05, 0o00, 0o02, AF | GRS,     S::None,  "SP1"),
    op(Either,   0o05, 0o00, 0o03, AF | GRS,     S::None,  "SN1"),
    op(Either,   0o05, 0o00, 0o04, AF | GRS,     S::None,  "SFS"),
    op(Either,   0o05, 0o00, 0o05, AF | GRS,     S::None,  "SFZ"),
    op(Either,   0o05, 0o00, 0o06, AF | GRS,     S::None,  "SAS"),
    op(Either,   0o05, 0o00, 0o07, AF | GRS,     S::None,  "SAZ"),
    op(Either,   0o05, 0o00, 0o10, AF | GRS,     S::None,  "INC"),
    op(Either,   0o05, 0o00, 0o11, AF | GRS,     S::None,  "DEC"),
    op(Either,   0o05, 0o00, 0o12, AF | GRS,     S::None,  "INC2"),
    op(Either,   0o05, 0o00, 0o13, AF | GRS,     S::None,  "DEC2"),
    op(Either,   0o05, 0o00, 0o14, AF | GRS,     S::None,  "ENZ"),
    op(Either,   0o05, 0o00, 0o15, AF | GRS,     S::None,  "ADD1"),
    op(Either,   0o05, 0o00, 0o16, AF | GRS,     S::None,  "SUB1"),
    op(Either,   0o06, 0o00, 0o00, GRS,          S::X,     "SX"),
    op(Either,   0o07, 0o04, 0o00, JF | GRS,     S::A,     "LAQW"),
    op(Either,   0o07, 0o05, 0o00, JF | GRS,     S::A,     "SAQW"),
    op(Basic,    0o07, 0o12, 0o00, JF,           S::X,     "LDJ"),
    op(Basic,    0o07, 0o13, 0o00, JF,           S::X,     "LIJ"),
    op(Basic,    0o07, 0o14, 0o00, JF,           S::None,  "LPD"),
    op(Basic,    0o07, 0o15, 0o00, JF,           S::None,  "SPD"),
    op(Extended, 0o07, 0o16, 0o00, JF | AF | BM, S::None,  "LOCL"),
    op(Extended, 0o07, 0o16, 0o13, JF | AF,      S::None,  "CALL"),
    op(Basic,    0o07, 0o17, 0o00, JF,           S::X,     "LBJ"),
    op(Extended, 0o07, 0o17, 0o00, JF | AF,      S::None,  "GOTO"),
    op(Either,   0o10, 0o00, 0o00, GRS,          S::A,     "LA"),
    op(Either,   0o11, 0o00, 0o00, GRS,          S::A,     "LNA"),
    op(Either,   0o12, 0o00, 0o00, GRS,          S::A,     "LMA"),
    op(Either,   0o13, 0o00, 0o00, GRS,          S::A,     "LNMA"),
    op(Either,   0o14, 0o00, 0o00, GRS,          S::A,     "AA"),
    op(Either,   0o15, 0o00, 0o00, GRS,          S::A,     "ANA"),
    op(Either,   0o16, 0o00, 0o00, GRS,          S::A,     "AMA"),
    op(Either,   0o17, 0o00, 0o00, GRS,          S::A,     "ANMA"),
    op(Either,   0o20, 0o00, 0o00, GRS,          S::A,     "AU"),
    op(Either,   0o21, 0o00, 0o00, GRS,          S::A,     "ANU"),
    op(Basic,    0o22, 0o00, 0o00, GRS,          S::X,     "BT"),
    op(Extended, 0o22, 0o00, 0o00, 0,            S::None,  "BT"),
    op(Either,   0o23, 0o00, 0o00, GRS,          S::R,     "LR"),
    op(Either,   0o24, 0o00, 0o00, GRS,          S::X,     "AX"),
    op(Either,   0o25, 0o00, 0o00, GRS,          S::X,     "ANX"),
    op(Either,   0o26, 0o00, 0o00, GRS,          S::X,     "LXM"),
    op(Either,   0o27, 0o00, 0o00, GRS,          S::X,     "LX"),
    op(Either,   0o30, 0o00, 0o00, GRS,          S::A,     "MI"),
    op(Either,   0o31, 0o00, 0o00, GRS,          S::A,     "MSI"),
    op(Either,   0o32, 0o00, 0o00, GRS,          S::A,     "MF"),
    op(Extended, 0o33, 0o13, 0o00, JF | GRS,     S::A,     "TGM"),
    op(Extended, 0o33, 0o14, 0o00, JF | GRS,     S::A,     "DTGM"),
    op(Either,   0o34, 0o00, 0o00, GRS,          S::A,     "DI"),
    op(Either,   0o35, 0o00, 0o00, GRS,          S::A,     "DSF"),
    op(Either,   0o36, 0o00, 0o00, GRS,          S::A,     "DF"),
    op(Either,   0o40, 0o00, 0o00, GRS,          S::A,     "OR"),
    op(Either,   0o41, 0o00, 0o00, GRS,          S::A,     "XOR"),
    op(Either,   0o42, 0o00, 0o00, GRS,          S::A,     "AND"),
    op(Either,   0o43, 0o00, 0o00, GRS,          S::A,     "MLU"),
    op(Either,   0o44, 0o00, 0o00, GRS,          S::A,     "TEP"),
    op(Either,   0o45, 0o00, 0o00, GRS,          S::A,     "TOP"),
    op(Either,   0o46, 0o00, 0o00, GRS,          S::X,     "LXI"),
    op(Either,   0o47, 0o00, 0o00, GRS,          S::A,     "TLEM"),
    op(Basic,    0o50, 0o00, 0o00, GRS,          S::None,  "TZ"),
    op(Extended, 0o50, 0o00, 0o00, AF | GRS,     S::None,  "TNOP"),
    op(Extended, 0o50, 0o00, 0o01, AF | GRS,     S::None,  "TGZ"),
    op(Extended, 0o50, 0o00, 0o02, AF | GRS,     S::None,  "TPZ"),
    op(Extended, 0o50, 0o00, 0o03, AF | GRS,     S::None,  "TP"),
    op(Extended, 0o50, 0o00, 0o04, AF | GRS,     S::None,  "TMZ"),
    op(Extended, 0o50, 0o00, 0o05, AF | GRS,     S::None,  "TMZG"),
    op(Extended, 0o50, 0o00, 0o06, AF | GRS,     S::None,  "TZ"),
    op(Extended, 0o50, 0o00, 0o07, AF | GRS,     S::None,  "TNLZ"),
    op(Extended, 0o50, 0o00, 0o10, AF | GRS,     S::None,  "TLZ"),
    op(Extended, 0o50, 0o00, 0o11, AF | GRS,     S::None,  "TNZ"),
    op(Extended, 0o50, 0o00, 0o12, AF | GRS,     S::None,  "TPZL"),
    op(Extended, 0o50, 0o00, 0o13, AF | GRS,     S::None,  "TNMZ"),
    op(Extended, 0o50, 0o00, 0o14, AF | GRS,     S::None,  "TN"),
    op(Extended, 0o50, 0o00, 0o15, AF | GRS,     S::None,  "TNPZ"),
    op(Extended, 0o50, 0o00, 0o16, AF | GRS,     S::None,  "TNGZ"),
    op(Extended, 0o50, 0o00, 0o17, AF | GRS,     S::None,  "TSKP"),
    op(Basic,    0o51, 0o00, 0o00, GRS,          S::None,  "TNX"),
    op(Extended, 0o51, 0o00, 0o00, GRS,          S::X,     "LXSI"),
    op(Either,   0o52, 0o00, 0o00, GRS,          S::A,     "TE"),
    op(Either,   0o53, 0o00, 0o00, GRS,          S::A,     "TNE"),
    op(Either,   0o54, 0o00, 0o00, GRS,          S::A,     "TLE"),
    op(Either,   0o55, 0o00, 0o00, GRS,          S::A,     "TG"),
    op(Either,   0o56, 0o00, 0o00, GRS,          S::A,     "TW"),
    op(Either,   0o57, 0o00, 0o00, GRS,          S::A,     "TNW"),
    op(Basic,    0o60, 0o00, 0o00, GRS,          S::None,  "TP"),
    op(Extended, 0o60, 0o00, 0o00, GRS,          S::X,     "LSBO"),
    op(Basic,    0o61, 0o00, 0o00, GRS,          S::None,  "TN"),
    op(Extended, 0o61, 0o00, 0o00, GRS,          S::X,     "LSBL"),
    op(Either,   0o62, 0o00, 0o00, GRS,          S::A,     "SE"),
    op(Either,   0o63, 0o00, 0o00, GRS,          S::A,     "SNE"),
    op(Either,   0o64, 0o00, 0o00, GRS,          S::A,     "SLE"),
    op(Either,   0o65, 0o00, 0o00, GRS,          S::A,     "SG"),
    op(Either,   0o66, 0o00, 0o00, GRS,          S::A,     "SW"),
    op(Either,   0o67, 0o00, 0o00, GRS,          S::A,     "SNW"),
    op(Either,   0o70, 0o00, 0o00, 0,            S::None,  "JGD"),
    op(Basic,    0o71, 0o00, 0o00, JF | GRS,     S::A,     "MSE"),
    op(Basic,    0o71, 0o01, 0o00, JF | GRS,     S::A,     "MSNE"),
    op(Basic,    0o71, 0o02, 0o00, JF | GRS,     S::A,     "MSLE"),
    op(Basic,    0o71, 0o03, 0o00, JF | GRS,     S::A,     "MSG"),
    op(Basic,    0o71, 0o04, 0o00, JF | GRS,     S::A,     "MSW"),
    op(Basic,    0o71, 0o05, 0o00, JF | GRS,     S::A,     "MSNW"),
    op(Basic,    0o71, 0o06, 0o00, JF | GRS,     S::A,     "MASL"),
    op(Basic,    0o71, 0o07, 0o00, JF | GRS,     S::A,     "MASG"),
    op(Extended, 0o71, 0o00, 0o00, JF | GRS,     S::A,     "MTE"),
    op(Extended, 0o71, 0o01, 0o00, JF | GRS,     S::A,     "MTNE"),
    op(Extended, 0o71, 0o02, 0o00, JF | GRS,     S::A,     "MTLE"),
    op(Extended, 0o71, 0o03, 0o00, JF | GRS,     S::A,     "MTG"),
    op(Extended, 0o71, 0o04, 0o00, JF | GRS,     S::A,     "MTW"),
    op(Extended, 0o71, 0o05, 0o00, JF | GRS,     S::A,     "MTNW"),
    op(Extended, 0o71, 0o06, 0o00, JF | GRS,     S::A,     "MATL"),
    op(Extended, 0o71, 0o07, 0o00, JF | GRS,     S::A,     "MATG"),
    op(Either,   0o71, 0o10, 0o00, JF | GRS,     S::A,     "DA"),
    op(Either,   0o71, 0o11, 0o00, JF | GRS,     S::A,     "DAN"),
    op(Either,   0o71, 0o12, 0o00, JF | GRS,     S::A,     "DS"),
    op(Either,   0o71, 0o13, 0o00, JF | GRS,     S::A,     "DL"),
    op(Either,   0o71, 0o14, 0o00, JF | GRS,     S::A,     "DLN"),
    op(Either,   0o71, 0o15, 0o00, JF | GRS,     S::A,     "DLM"),
    op(Either,   0o71, 0o16, 0o00, JF | BM,      S::A,     "DJZ"),
    op(Either,   0o71, 0o17, 0o00, JF | GRS,     S::A,     "DTE"),
    op(Basic,    0o72, 0o01, 0o00, JF,           S::None,  "SLJ"),
    op(Either,   0o72, 0o02, 0o00, JF,           S::A,     "JPS"),
    op(Either,   0o72, 0o03, 0o00, JF,           S::A,     "JNS"),
    op(Either,   0o72, 0o04, 0o00, JF | GRS,     S::A,     "AH"),
    op(Either,   0o72, 0o05, 0o00, JF | GRS,     S::A,     "ANH"),
    op(Either,   0o72, 0o06, 0o00, JF | GRS,     S::A,     "AT"),
    op(Either,   0o72, 0o07, 0o00, JF | GRS,     S::A,     "ANT"),
    op(Basic,    0o72, 0o10, 0o00, JF,           S::None,  "EX"),
    op(Basic,    0o72, 0o11, 0o00, JF,           S::None,  "ER"),
    op(Either,   0o72, 0o12, 0o00, JF | GRS,     S::X,     "BN"),
    op(Either,   0o72, 0o14, 0o00, JF | GRS,     S::X,     "BBN"),
    op(Either,   0o72, 0o15, 0o00, JF,           S::X,     "TRA"),
    op(Either,   0o72, 0o16, 0o00, JF,           S::A,     "SRS"),
    op(Either,   0o72, 0o17, 0o00, JF,           S::A,     "LRS"),
    op(Either,   0o73, 0o00, 0o00, JF | BM,      S::A,     "SSC"),
    op(Either,   0o73, 0o01, 0o00, JF | BM,      S::A,     "DSC"),
    op(Either,   0o73, 0o02, 0o00, JF | BM,      S::A,     "SSL"),
    op(Either,   0o73, 0o03, 0o00, JF | BM,      S::A,     "DSL"),
    op(Either,   0o73, 0o04, 0o00, JF | BM,      S::A,     "SSA"),
    op(Either,   0o73, 0o05, 0o00, JF | BM,      S::A,     "DSA"),
    op(Either,   0o73, 0o06, 0o00, JF | BM,      S::A,     "LSC"),
    op(Either,   0o73, 0o07, 0o00, JF | BM,      S::A,     "DLSC"),
    op(Either,   0o73, 0o10, 0o00, JF | BM,      S::A,     "LSSC"),
    op(Either,   0o73, 0o11, 0o00, JF | BM,      S::A,     "LDSC"),
    op(Either,   0o73, 0o12, 0o00, JF | BM,      S::A,     "LSSL"),
    op(Either,   0o73, 0o13, 0o00, JF | BM,      S::A,     "LDSL"),
    op(Extended, 0o73, 0o14, 0o00, JF | AF | GRS, S::None, "NOP"),
    op(Either,   0o73, 0o14, 0o01, JF | AF | GRS, S::None, "LPM"),
    op(Extended, 0o73, 0o14, 0o05, JF | AF,      S::None,  "EX"),
    op(Extended, 0o73, 0o14, 0o06, JF | AF,      S::None,  "EXR"),
    op(Either,   0o73, 0o15, 0o03, JF | AF,      S::None,  "ACEL"),
    op(Either,   0o73, 0o15, 0o04, JF | AF,      S::None,  "DCEL"),
    op(Either,   0o73, 0o15, 0o05, JF | AF | GRS, S::None, "SPID"),
    op(Either,   0o73, 0o15, 0o14, JF | AF | GRS, S::None, "LD"),
    op(Either,   0o73, 0o15, 0o15, JF | AF | GRS, S::None, "SD"),
    op(Either,   0o73, 0o15, 0o16, JF | AF,      S::None,  "UR"),
    op(Either,   0o73, 0o15, 0o17, JF | AF,      S::None,  "SGNL"),
    op(Either,   0o73, 0o17, 0o00, JF | AF,      S::None,  "TS"),
    op(Either,   0o73, 0o17, 0o01, JF | AF,      S::None,  "TSS"),
    op(Either,   0o73, 0o17, 0o02, JF | AF,      S::None,  "TCS"),
    op(Extended, 0o73, 0o17, 0o03, JF | AF,      S::None,  "RTN"),
    op(Either,   0o73, 0o17, 0o04, JF | AF | GRS, S::None, "LUD"),
    op(Either,   0o73, 0o17, 0o05, JF | AF | GRS, S::None, "SUD"),
    op(Extended, 0o73, 0o17, 0o06, JF | AF,      S::None,  "IAR"),
    op(Extended, 0o73, 0o17, 0o12, JF | AF,      S::None,  "SYSC"),
    op(Either,   0o74, 0o00, 0o00, JF | BM,      S::A,     "JZ"),
    op(Either,   0o74, 0o01, 0o00, JF | BM,      S::A,     "JNZ"),
    op(Either,   0o74, 0o02, 0o00, JF | BM,      S::A,     "JP"),
    op(Either,   0o74, 0o03, 0o00, JF | BM,      S::A,     "JN"),
    op(Basic,    0o74, 0o04, 0o00, JF | AF | BM, S::None,  "J"),
    op(Basic,    0o74, 0o04, 0o00, JF | BM,      S::None,  "JK"),
    op(Basic,    0o74, 0o05, 0o00, JF | AF | BM, S::None,  "HJ"),
    op(Basic,    0o74, 0o05, 0o00, JF | BM,      S::None,  "HKJ"),
    op(Basic,    0o74, 0o06, 0o00, JF | GRS,     S::A,     "NOP"),
    op(Basic,    0o74, 0o07, 0o00, JF | BM,      S::None,  "AAIJ"),
    op(Either,   0o74, 0o10, 0o00, JF | BM,      S::A,     "JNB"),
    op(Either,   0o74, 0o11, 0o00, JF | BM,      S::A,     "JB"),
    op(Either,   0o74, 0o12, 0o00, JF | BM,      S::X,     "JMGI"),
    op(Either,   0o74, 0o13, 0o00, JF | BM,      S::X,     "LMJ"),
    op(Either,   0o74, 0o14, 0o00, JF | AF | BM, S::None,  "JO"),
    op(Either,   0o74, 0o14, 0o01, JF | AF | BM, S::None,  "JFU"),
    op(Either,   0o74, 0o14, 0o02, JF | AF | BM, S::None,  "JFO"),
    op(Either,   0o74, 0o14, 0o03, JF | AF | BM, S::None,  "JDF"),
    op(Extended, 0o74, 0o14, 0o04, JF | AF | BM, S::None,  "JC"),
    op(Extended, 0o74, 0o14, 0o05, JF | AF | BM, S::None,  "JNC"),
    op(Extended, 0o74, 0o14, 0o06, JF | AF | BM, S::None,  "AAIJ"),
    op(Either,   0o74, 0o14, 0o07, JF | AF | BM, S::None,  "PAIJ"),
    op(Either,   0o74, 0o15, 0o00, JF | AF | BM, S::None,  "JNO"),
    op(Either,   0o74, 0o15, 0o01, JF | AF | BM, S::None,  "JNFU"),
    op(Either,   0o74, 0o15, 0o02, JF | AF | BM, S::None,  "JNFO"),
    op(Either,   0o74, 0o15, 0o03, JF | AF | BM, S::None,  "JNDF"),
    op(Extended, 0o74, 0o15, 0o04, JF | AF | BM, S::None,  "J"),
    op(Either,   0o74, 0o15, 0o05, JF | AF | BM, S::None,  "HLTJ"),
    op(Basic,    0o74, 0o16, 0o00, JF | BM,      S::None,  "JC"),
    op(Basic,    0o74, 0o17, 0o00, JF | BM,      S::None,  "JNC"),
    op(Either,   0o75, 0o00, 0o00, JF | GRS,     S::B,     "LBU"),
    op(Either,   0o75, 0o02, 0o00, JF | GRS,     S::B,     "SBU"),
    op(Either,   0o75, 0o03, 0o00, JF | GRS,     S::BExec, "LBE"),
    op(Either,   0o75, 0o04, 0o00, JF,           S::BExec, "SBED"),
    op(Either,   0o75, 0o05, 0o00, JF,           S::BExec, "LBED"),
    op(Either,   0o75, 0o06, 0o00, JF,           S::B,     "SBUD"),
    op(Either,   0o75, 0o07, 0o00, JF,           S::B,     "LBUD"),
    op(Either,   0o75, 0o10, 0o00, JF,           S::X,     "TVA"),
    op(Either,   0o75, 0o13, 0o00, JF | GRS,     S::X,     "LXLM"),
    op(Either,   0o75, 0o14, 0o00, JF | GRS,     S::X,     "LBN"),
    op(Either,   0o75, 0o15, 0o00, JF,           S::A,     "CR"),
    op(Basic,    0o77, 0o17, 0o17, JF | AF,      S::None,  "HALT"),
];

/// Executive-request mnemonics, by ER index. The catalog belongs to the
/// exec layer; these are the well-known entries for display.
fn er_name(index: u64) -> Option<&'static str> {
    Some(match index {
        0o01 => "IO$",
        0o02 => "IOI$",
        0o03 => "IOW$",
        0o04 => "EDJS$",
        0o06 => "WAIT$",
        0o07 => "WANY$",
        0o10 => "COM$",
        0o11 => "EXIT$",
        0o12 => "ABORT$",
        0o13 => "FORK$",
        0o14 => "TFORK$",
        0o15 => "READ$",
        0o16 => "PRINT$",
        0o17 => "CSF$",
        0o22 => "DATE$",
        0o23 => "TIME$",
        0o27 => "II$",
        0o33 => "INT$",
        0o34 => "IDENT$",
        0o40 => "ERR$",
        0o43 => "MCORE$",
        0o44 => "LCORE$",
        _ => return None,
    })
}

fn find_info(word: InstructionWord, basic_mode: bool) -> Option<&'static OpInfo> {
    let f = word.f();
    let j = word.j();
    let a = word.a();

    OP_INFOS.iter().find(|info| {
        u64::from(info.f) == f
            && match info.mode {
                Mode::Either => true,
                Mode::Basic => basic_mode,
                Mode::Extended => !basic_mode,
            }
            && (info.flags & JF == 0 || u64::from(info.j) == j)
            && (info.flags & AF == 0 || u64::from(info.a) == a)
    })
}

/// The mnemonic for an instruction word, or the empty string when the
/// opcode is not in the catalog.
#[must_use]
pub fn mnemonic(word: InstructionWord, basic_mode: bool) -> &'static str {
    find_info(word, basic_mode).map_or("", |info| info.mnemonic)
}

/// Renders an instruction word as annotated assembly-like text. Unknown
/// opcodes render as a raw octal field dump.
#[must_use]
pub fn interpret(word: InstructionWord, basic_mode: bool, exec_registers: bool) -> String {
    if let Some(info) = find_info(word, basic_mode) {
        match info.mnemonic {
            "ER" if basic_mode => interpret_er(word),
            "JGD" => interpret_jgd(word),
            _ => interpret_normal(word, info, basic_mode, exec_registers),
        }
    } else {
        //  raw field dump
        let mut out = format!(
            "{:02o} {:02o} {:02o} {:02o} {:1o} {:1o} ",
            word.f(),
            word.j(),
            word.a(),
            word.x(),
            word.h(),
            word.i()
        );
        if basic_mode {
            out.push_str(&format!("{:06o}", word.hiu()));
        } else {
            out.push_str(&format!("{:02o} {:04o}", word.b(), word.d()));
        }
        out
    }
}

fn interpret_normal(
    word: InstructionWord,
    info: &OpInfo,
    basic_mode: bool,
    exec_registers: bool,
) -> String {
    let j = word.j();
    let a = word.a();
    let x = word.x();
    let immediate = info.flags & JF == 0 && j >= 0o16;

    //  An operand below 0200 is shown as a GRS name only when nothing
    //  else claims the field: no immediate mode, no indexing, and (in
    //  extended mode) B0.
    let grs_convert = info.flags & GRS != 0
        && !immediate
        && x == 0
        && (basic_mode || word.b() == 0);

    let mut out = String::from(info.mnemonic);
    if info.flags & JF == 0 && j > 0 {
        out.push(',');
        out.push_str(J_FIELD_NAMES[j as usize]);
    }

    out.push(' ');
    while out.len() < 12 {
        out.push(' ');
    }

    let exec_prefix = if exec_registers { "E" } else { "" };
    match info.a_sem {
        ASem::A => out.push_str(&format!("{exec_prefix}A{a},")),
        ASem::B => out.push_str(&format!("B{a},")),
        ASem::BExec => out.push_str(&format!("B{},", a + 16)),
        ASem::R => out.push_str(&format!("{exec_prefix}R{a},")),
        ASem::X => out.push_str(&format!("{exec_prefix}X{a},")),
        ASem::None => {}
    }

    let extended_operand = !basic_mode && info.flags & BM == 0 && !immediate;
    if grs_convert && word.u() < 0o200 {
        out.push_str(GRS_NAMES[word.u() as usize]);
    } else if extended_operand {
        out.push_str(&format!("0{:o}", word.d()));
    } else if immediate {
        if x == 0 {
            out.push_str(&format!("0{:o}", word.hiu()));
        } else {
            out.push_str(&format!("0{:o}", word.u()));
        }
    } else {
        if word.i() != 0 {
            out.push('*');
        }
        out.push_str(&format!("0{:o}", word.u()));
    }

    if x > 0 {
        out.push(',');
        if word.h() != 0 {
            out.push('*');
        }
        out.push_str(&format!("{exec_prefix}X{x}"));
    }

    if extended_operand && !grs_convert {
        if x == 0 {
            out.push(',');
        }
        let effective_b = word.b() + if word.i() != 0 { 16 } else { 0 };
        out.push_str(&format!(",B{effective_b}"));
    }

    out
}

/// ER renders its u field as an executive-request name.
fn interpret_er(word: InstructionWord) -> String {
    let mut out = String::from("ER          ");
    match er_name(word.u()) {
        Some(name) => out.push_str(name),
        None => out.push_str(&format!("0{:o}", word.u())),
    }

    if word.x() > 0 {
        out.push(',');
        if word.h() != 0 {
            out.push('*');
        }
        out.push_str(&format!("X{}", word.x()));
    }

    out
}

/// JGD concatenates j and a into a 7-bit GRS index.
fn interpret_jgd(word: InstructionWord) -> String {
    let grs_index = ((word.j() << 4) | word.a()) & 0o177;
    let mut out = format!("JGD         {},", GRS_NAMES[grs_index as usize]);

    if word.i() != 0 {
        out.push('*');
    }
    out.push_str(&format!("0{:o}", word.u()));

    if word.x() > 0 {
        out.push(',');
        if word.h() != 0 {
            out.push('*');
        }
        out.push_str(&format!("X{}", word.x()));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_is_total() {
        let word = InstructionWord::new(Word36::new(0o777777_777777));
        assert_eq!(word.f(), 0o77);
        assert_eq!(word.j(), 0o17);
        assert_eq!(word.a(), 0o17);
        assert_eq!(word.x(), 0o17);
        assert_eq!(word.h(), 1);
        assert_eq!(word.i(), 1);
        assert_eq!(word.u(), 0o177777);
        assert_eq!(word.hiu(), 0o777777);
        assert_eq!(word.b(), 0o17);
        assert_eq!(word.ib(), 0o37);
        assert_eq!(word.d(), 0o7777);
    }

    #[test]
    fn field_composition_round_trip() {
        let word = InstructionWord::from_fields(0o10, 0o16, 0o05, 0o3, 1, 0, 0o1000);
        assert_eq!(word.f(), 0o10);
        assert_eq!(word.j(), 0o16);
        assert_eq!(word.a(), 0o05);
        assert_eq!(word.x(), 0o3);
        assert_eq!(word.h(), 1);
        assert_eq!(word.i(), 0);
        assert_eq!(word.u(), 0o1000);

        let word = InstructionWord::from_fields_bd(0o10, 0, 0o05, 0, 0, 0, 0o2, 0o100);
        assert_eq!(word.b(), 0o2);
        assert_eq!(word.d(), 0o100);
    }

    #[test]
    fn xhiu_splice_preserves_function_fields() {
        let mut word = InstructionWord::from_fields(0o10, 0o00, 0o05, 0o1, 1, 1, 0o1234);
        word.set_xhiu(Word36::new(0o000002_401000));
        assert_eq!(word.f(), 0o10);
        assert_eq!(word.a(), 0o05);
        assert_eq!(word.x(), 0o2);
        assert_eq!(word.h(), 1);
        assert_eq!(word.i(), 0);
        assert_eq!(word.u(), 0o1000);
    }

    #[test]
    fn mnemonic_lookup() {
        let la = InstructionWord::from_fields_hiu(0o10, 0, 0o05, 0, 0o1000);
        assert_eq!(mnemonic(la, true), "LA");
        assert_eq!(mnemonic(la, false), "LA");

        //  f=050 splits on mode: TZ in basic, a-field family in extended
        let tz = InstructionWord::from_fields_hiu(0o50, 0, 0o06, 0, 0o1000);
        assert_eq!(mnemonic(tz, true), "TZ");
        assert_eq!(mnemonic(tz, false), "TZ");
        let tgz = InstructionWord::from_fields_hiu(0o50, 0, 0o01, 0, 0o1000);
        assert_eq!(mnemonic(tgz, false), "TGZ");

        //  unknown opcode yields the empty string
        let bogus = InstructionWord::from_fields_hiu(0o00, 0, 0, 0, 0);
        assert_eq!(mnemonic(bogus, true), "");
    }

    #[test]
    fn interpret_samples() {
        let cases = [
            (InstructionWord::from_fields_hiu(0o10, 0o16, 0o05, 0, 0o1000), true),
            (InstructionWord::from_fields_hiu(0o10, 0o02, 0o03, 0o2, 0o2000), true),
            (InstructionWord::from_fields(0o27, 0, 0o07, 0o1, 1, 1, 0o500), true),
            (InstructionWord::from_fields_bd(0o10, 0, 0o01, 0, 0, 0, 0o2, 0o40), false),
            (InstructionWord::from_fields_hiu(0o74, 0o13, 0o11, 0, 0o2000), true),
            (InstructionWord::from_fields_hiu(0o72, 0o11, 0, 0, 0o1), true),
            (InstructionWord::from_fields_hiu(0o70, 0o01, 0o02, 0, 0o300), true),
            (InstructionWord::from_fields_hiu(0o33, 0, 0, 0, 0), true),
        ];

        let rendered: Vec<String> = cases
            .iter()
            .map(|&(word, basic)| format!("{:012o}  {}", word.word().raw(), interpret(word, basic, false)))
            .collect();
        insta::assert_snapshot!(rendered.join("\n"), @r###"
        107120001000  LA,U        A5,01000
        101062002000  LA,H1       A3,02000,X2
        270161600500  LX          X7,*0500,*X1
        100020020040  LA          A1,040,,B2
        745620002000  LMJ         X9,02000
        724400000001  ER          IO$
        700440000300  JGD         A6,0300
        330000000000  33 00 00 00 0 0 000000
        "###);
    }
}
