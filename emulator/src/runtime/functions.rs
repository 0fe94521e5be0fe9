//! The instruction catalog and its dispatch tables.
//!
//! Dispatch maps (mode, f, j, a) to exactly one [`Function`], or to
//! nothing - which the processor turns into an invalid-instruction
//! interrupt with reason "undefined function code". The catalog is
//! closed and versioned: adding an opcode is an explicit change here and
//! in the execution match, never inferred at runtime.

use parse_display::Display;

use crate::instruction::InstructionWord;

/// One instruction behavior. Variant names are the architectural
/// mnemonics.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[display(style = "UPPERCASE")]
#[allow(clippy::upper_case_acronyms)]
pub enum Function {
    //  loads
    LA, LNA, LMA, LNMA, LR, LX, LXI, LXM, DL, DLN, DLM,
    //  stores
    SA, SNA, SMA, SR, SX, DS, SZ, SNZ, SP1, SN1, SFS, SFZ, SAS, SAZ,
    //  fixed-point arithmetic
    AA, ANA, AMA, ANMA, AU, ANU, AX, ANX, MI, MSI, MF, DI, DSF, DF,
    DA, DAN, AH, ANH, AT, ANT, ADD1, SUB1, INC, DEC, INC2, DEC2, ENZ,
    //  logical
    OR, XOR, AND, MLU,
    //  shifts
    SSC, DSC, SSL, DSL, SSA, DSA, LSC, LSSC, LSSL,
    //  tests
    TEP, TOP, TLEM, TZ, TNZ, TE, TNE, TLE, TG, TW, TNW, TP, TN, DTE,
    TNOP, TGZ, TPZ, TMZ, TMZG, TNLZ, TLZ, TPZL, TNMZ, TNPZ, TNGZ, TSKP,
    //  conditional jumps
    JZ, JNZ, JP, JN, JPS, JNS, JB, JNB, JMGI, JGD,
    JO, JNO, JFU, JNFU, JFO, JNFO, JDF, JNDF, JC, JNC, DJZ,
    //  unconditional jumps, halts
    J, SLJ, LMJ, HLTJ, NOP, HALT,
    //  test-and-set
    TS, TSS, TCS,
    //  bank management
    LBU, LBE, LBED, SBED, LBUD, SBUD,
    //  system control
    SPID, SYSC, ER, IAR, SGNL,
}

impl Function {
    /// The privilege floor: the largest (least privileged) processor
    /// privilege allowed to execute this instruction. Violations raise
    /// invalid-instruction with reason "invalid processor privilege"
    /// before any operand is touched.
    #[must_use]
    pub fn privilege_floor(self) -> u8 {
        match self {
            Function::LBE
            | Function::LBED
            | Function::SBED
            | Function::LBUD
            | Function::SBUD
            | Function::HLTJ
            | Function::HALT
            | Function::IAR
            | Function::SGNL => 0,

            Function::SPID | Function::SYSC => 2,

            _ => 3,
        }
    }
}

/// Resolves an instruction word to its behavior, honoring the
/// basic/extended mode split of the opcode space.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn lookup(word: InstructionWord, basic_mode: bool) -> Option<Function> {
    use Function as F;

    let j = word.j();
    let a = word.a();

    match word.f() {
        0o01 => Some(F::SA),
        0o02 => Some(F::SNA),
        0o03 => Some(F::SMA),
        0o04 => Some(F::SR),
        0o05 => match a {
            0o00 => Some(F::SZ),
            0o01 => Some(F::SNZ),
            0o02 => Some(F::SP1),
            0o03 => Some(F::SN1),
            0o04 => Some(F::SFS),
            0o05 => Some(F::SFZ),
            0o06 => Some(F::SAS),
            0o07 => Some(F::SAZ),
            0o10 => Some(F::INC),
            0o11 => Some(F::DEC),
            0o12 => Some(F::INC2),
            0o13 => Some(F::DEC2),
            0o14 => Some(F::ENZ),
            0o15 => Some(F::ADD1),
            0o16 => Some(F::SUB1),
            _ => None,
        },
        0o06 => Some(F::SX),
        0o10 => Some(F::LA),
        0o11 => Some(F::LNA),
        0o12 => Some(F::LMA),
        0o13 => Some(F::LNMA),
        0o14 => Some(F::AA),
        0o15 => Some(F::ANA),
        0o16 => Some(F::AMA),
        0o17 => Some(F::ANMA),
        0o20 => Some(F::AU),
        0o21 => Some(F::ANU),
        0o23 => Some(F::LR),
        0o24 => Some(F::AX),
        0o25 => Some(F::ANX),
        0o26 => Some(F::LXM),
        0o27 => Some(F::LX),
        0o30 => Some(F::MI),
        0o31 => Some(F::MSI),
        0o32 => Some(F::MF),
        0o34 => Some(F::DI),
        0o35 => Some(F::DSF),
        0o36 => Some(F::DF),
        0o40 => Some(F::OR),
        0o41 => Some(F::XOR),
        0o42 => Some(F::AND),
        0o43 => Some(F::MLU),
        0o44 => Some(F::TEP),
        0o45 => Some(F::TOP),
        0o46 => Some(F::LXI),
        0o47 => Some(F::TLEM),
        0o50 => {
            if basic_mode {
                Some(F::TZ)
            } else {
                //  the extended-mode test family selects on the a-field
                match a {
                    0o00 => Some(F::TNOP),
                    0o01 => Some(F::TGZ),
                    0o02 => Some(F::TPZ),
                    0o03 => Some(F::TP),
                    0o04 => Some(F::TMZ),
                    0o05 => Some(F::TMZG),
                    0o06 => Some(F::TZ),
                    0o07 => Some(F::TNLZ),
                    0o10 => Some(F::TLZ),
                    0o11 => Some(F::TNZ),
                    0o12 => Some(F::TPZL),
                    0o13 => Some(F::TNMZ),
                    0o14 => Some(F::TN),
                    0o15 => Some(F::TNPZ),
                    0o16 => Some(F::TNGZ),
                    0o17 => Some(F::TSKP),
                    _ => None,
                }
            }
        }
        0o51 => basic_mode.then_some(F::TNZ),
        0o52 => Some(F::TE),
        0o53 => Some(F::TNE),
        0o54 => Some(F::TLE),
        0o55 => Some(F::TG),
        0o56 => Some(F::TW),
        0o57 => Some(F::TNW),
        0o60 => basic_mode.then_some(F::TP),
        0o61 => basic_mode.then_some(F::TN),
        0o70 => Some(F::JGD),
        0o71 => match j {
            0o10 => Some(F::DA),
            0o11 => Some(F::DAN),
            0o12 => Some(F::DS),
            0o13 => Some(F::DL),
            0o14 => Some(F::DLN),
            0o15 => Some(F::DLM),
            0o16 => Some(F::DJZ),
            0o17 => Some(F::DTE),
            _ => None,
        },
        0o72 => match j {
            0o01 => basic_mode.then_some(F::SLJ),
            0o02 => Some(F::JPS),
            0o03 => Some(F::JNS),
            0o04 => Some(F::AH),
            0o05 => Some(F::ANH),
            0o06 => Some(F::AT),
            0o07 => Some(F::ANT),
            0o11 => basic_mode.then_some(F::ER),
            _ => None,
        },
        0o73 => match j {
            0o00 => Some(F::SSC),
            0o01 => Some(F::DSC),
            0o02 => Some(F::SSL),
            0o03 => Some(F::DSL),
            0o04 => Some(F::SSA),
            0o05 => Some(F::DSA),
            0o06 => Some(F::LSC),
            0o10 => Some(F::LSSC),
            0o12 => Some(F::LSSL),
            0o14 => (!basic_mode && a == 0).then_some(F::NOP),
            0o15 => match a {
                0o05 => Some(F::SPID),
                0o17 => Some(F::SGNL),
                _ => None,
            },
            0o17 => match a {
                0o00 => Some(F::TS),
                0o01 => Some(F::TSS),
                0o02 => Some(F::TCS),
                0o06 => (!basic_mode).then_some(F::IAR),
                0o12 => (!basic_mode).then_some(F::SYSC),
                _ => None,
            },
            _ => None,
        },
        0o74 => match j {
            0o00 => Some(F::JZ),
            0o01 => Some(F::JNZ),
            0o02 => Some(F::JP),
            0o03 => Some(F::JN),
            //  J and JK share 074,04 in basic mode; the key mask in the
            //  a-field is not modeled, so both jump unconditionally
            0o04 => basic_mode.then_some(F::J),
            0o05 => basic_mode.then_some(F::HLTJ),
            0o06 => basic_mode.then_some(F::NOP),
            0o10 => Some(F::JNB),
            0o11 => Some(F::JB),
            0o12 => Some(F::JMGI),
            0o13 => Some(F::LMJ),
            0o14 => match a {
                0o00 => Some(F::JO),
                0o01 => Some(F::JFU),
                0o02 => Some(F::JFO),
                0o03 => Some(F::JDF),
                0o04 => (!basic_mode).then_some(F::JC),
                0o05 => (!basic_mode).then_some(F::JNC),
                _ => None,
            },
            0o15 => match a {
                0o00 => Some(F::JNO),
                0o01 => Some(F::JNFU),
                0o02 => Some(F::JNFO),
                0o03 => Some(F::JNDF),
                0o04 => (!basic_mode).then_some(F::J),
                0o05 => Some(F::HLTJ),
                _ => None,
            },
            0o16 => basic_mode.then_some(F::JC),
            0o17 => basic_mode.then_some(F::JNC),
            _ => None,
        },
        0o75 => match j {
            0o00 => Some(F::LBU),
            0o03 => Some(F::LBE),
            0o04 => Some(F::SBED),
            0o05 => Some(F::LBED),
            0o06 => Some(F::SBUD),
            0o07 => Some(F::LBUD),
            _ => None,
        },
        0o77 => (basic_mode && j == 0o17 && a == 0o17).then_some(F::HALT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(f: u64, j: u64, a: u64) -> InstructionWord {
        InstructionWord::from_fields_hiu(f, j, a, 0, 0)
    }

    #[test]
    fn dispatch_is_mode_aware() {
        assert_eq!(lookup(word(0o10, 0, 0), true), Some(Function::LA));
        assert_eq!(lookup(word(0o10, 0, 0), false), Some(Function::LA));

        //  f=050: basic TZ regardless of a; extended selects on a
        assert_eq!(lookup(word(0o50, 0, 0o05), true), Some(Function::TZ));
        assert_eq!(lookup(word(0o50, 0, 0o05), false), Some(Function::TMZG));

        //  ER is basic-only, SYSC extended-only
        assert_eq!(lookup(word(0o72, 0o11, 0), true), Some(Function::ER));
        assert_eq!(lookup(word(0o72, 0o11, 0), false), None);
        assert_eq!(lookup(word(0o73, 0o17, 0o12), false), Some(Function::SYSC));
        assert_eq!(lookup(word(0o73, 0o17, 0o12), true), None);
    }

    #[test]
    fn unassigned_codes_are_none() {
        assert_eq!(lookup(word(0o00, 0, 0), true), None);
        assert_eq!(lookup(word(0o22, 0, 0), true), None);
        assert_eq!(lookup(word(0o77, 0, 0), true), None);
        assert_eq!(lookup(word(0o05, 0, 0o17), true), None);
    }

    #[test]
    fn privilege_floors() {
        assert_eq!(Function::LA.privilege_floor(), 3);
        assert_eq!(Function::SPID.privilege_floor(), 2);
        assert_eq!(Function::LBED.privilege_floor(), 0);
        assert_eq!(Function::IAR.privilege_floor(), 0);
    }

    #[test]
    fn display_matches_mnemonic() {
        assert_eq!(Function::LA.to_string(), "LA");
        assert_eq!(Function::HLTJ.to_string(), "HLTJ");
    }
}
