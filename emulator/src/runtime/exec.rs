//! The instruction behaviors, dispatched from a single match over the
//! [`Function`] catalog.
//!
//! Every behavior goes through the processor's operand paths for its
//! reads and writes, and through the word primitives for arithmetic, so
//! ones-complement edge cases are handled in exactly one place. Jumps
//! resolve their targets through the jump-operand path and suppress the
//! automatic program-counter increment.

use crate::instruction::{J_H1, J_H2, J_S1, J_S2, J_S3, J_S4, J_S5, J_S6};
use crate::runtime::banks::{BankType, BaseRegister, VirtualAddress};
use crate::runtime::functions::Function;
use crate::runtime::interrupts::{
    AddressingExceptionReason, ArithmeticExceptionReason, InvalidInstructionReason,
    MachineInterrupt,
};
use crate::runtime::registers::DesignatorRegister;
use crate::runtime::{OperandFault, OperandResult, Processor, StopReason};
use crate::word::{self, Word36};

/// Feature word and series/model reported by SPID.
const PROCESSOR_FEATURES: u64 = 0o001000;
const PROCESSOR_SERIES: u64 = 0o2200;
const PROCESSOR_MODEL: u64 = 0o31;

/// Sub-functions of the system-call surface that the exec contract
/// defines; anything else is an undefined function code. The semantics
/// live with the exec collaborator, not here.
const SYSC_SUBFUNCTIONS: [u64; 6] = [0o20, 0o21, 0o22, 0o30, 0o31, 0o40];

#[allow(clippy::too_many_lines)]
pub(super) fn execute(function: Function, ip: &mut Processor) -> OperandResult<()> {
    use Function as F;

    match function {
        //  ---------------------------------------------------------
        //  loads
        //  ---------------------------------------------------------
        F::LA => {
            let value = ip.get_operand(true, true, true, true)?;
            set_a(ip, value);
        }
        F::LNA => {
            let value = ip.get_operand(true, true, true, true)?;
            set_a(ip, value.negate());
        }
        F::LMA => {
            let value = ip.get_operand(true, true, true, true)?;
            set_a(ip, value.magnitude());
        }
        F::LNMA => {
            let value = ip.get_operand(true, true, true, true)?;
            set_a(ip, value.magnitude().negate());
        }
        F::LR => {
            let value = ip.get_operand(true, true, true, true)?;
            let index = r_index(ip);
            ip.grs.set(index, value);
        }
        F::LX => {
            let value = ip.get_operand(true, true, true, true)?;
            let index = x_index(ip);
            ip.grs.set(index, value);
        }
        F::LXI => {
            let value = ip.get_operand(true, true, true, true)?;
            let index = x_index(ip);
            let mut word = ip.grs.get(index);
            word.set_h1(value.raw());
            ip.grs.set(index, word);
        }
        F::LXM => {
            let value = ip.get_operand(true, true, true, true)?;
            let index = x_index(ip);
            let mut word = ip.grs.get(index);
            word.set_h2(value.raw());
            ip.grs.set(index, word);
        }
        F::DL => {
            let mut operands = [Word36::POSITIVE_ZERO; 2];
            ip.get_consecutive_operands(true, &mut operands)?;
            set_a(ip, operands[0]);
            set_a1(ip, operands[1]);
        }
        F::DLN => {
            let mut operands = [Word36::POSITIVE_ZERO; 2];
            ip.get_consecutive_operands(true, &mut operands)?;
            set_a(ip, operands[0].negate());
            set_a1(ip, operands[1].negate());
        }
        F::DLM => {
            let mut operands = [Word36::POSITIVE_ZERO; 2];
            ip.get_consecutive_operands(true, &mut operands)?;
            if word::is_negative_72(operands[0], operands[1]) {
                set_a(ip, operands[0].negate());
                set_a1(ip, operands[1].negate());
            } else {
                set_a(ip, operands[0]);
                set_a1(ip, operands[1]);
            }
        }

        //  ---------------------------------------------------------
        //  stores
        //  ---------------------------------------------------------
        F::SA => {
            let value = a_value(ip);
            ip.store_operand(true, true, true, true, value)?;
        }
        F::SNA => {
            let value = a_value(ip).negate();
            ip.store_operand(true, true, true, true, value)?;
        }
        F::SMA => {
            let value = a_value(ip).magnitude();
            ip.store_operand(true, true, true, true, value)?;
        }
        F::SR => {
            let index = r_index(ip);
            let value = ip.grs.get(index);
            ip.store_operand(true, true, true, true, value)?;
        }
        F::SX => {
            let index = x_index(ip);
            let value = ip.grs.get(index);
            ip.store_operand(true, true, true, true, value)?;
        }
        F::DS => {
            let operands = [a_value(ip), a1_value(ip)];
            ip.store_consecutive_operands(true, &operands)?;
        }
        F::SZ => ip.store_operand(false, true, true, true, Word36::POSITIVE_ZERO)?,
        F::SNZ => ip.store_operand(false, true, true, true, Word36::NEGATIVE_ZERO)?,
        F::SP1 => ip.store_operand(false, true, true, true, Word36::POSITIVE_ONE)?,
        F::SN1 => ip.store_operand(false, true, true, true, Word36::NEGATIVE_ONE)?,
        F::SFS => ip.store_operand(false, true, true, true, Word36::new(0o050505_050505))?,
        F::SFZ => ip.store_operand(false, true, true, true, Word36::new(0o606060_606060))?,
        F::SAS => ip.store_operand(false, true, true, true, Word36::new(0o040040_040040))?,
        F::SAZ => ip.store_operand(false, true, true, true, Word36::new(0o060060_060060))?,

        //  ---------------------------------------------------------
        //  read-modify-write increments
        //  ---------------------------------------------------------
        F::ADD1 => {
            let twos = twos_complement_by_j(ip);
            ip.increment_operand(true, true, Word36::POSITIVE_ONE, twos)?;
        }
        F::SUB1 => {
            let twos = twos_complement_by_j(ip);
            ip.increment_operand(true, true, Word36::NEGATIVE_ONE, twos)?;
        }
        F::INC => {
            let twos = twos_complement_by_j(ip);
            if ip.increment_operand(true, true, Word36::POSITIVE_ONE, twos)? {
                ip.skip_next_instruction();
            }
        }
        F::DEC => {
            let twos = twos_complement_by_j(ip);
            if ip.increment_operand(true, true, Word36::NEGATIVE_ONE, twos)? {
                ip.skip_next_instruction();
            }
        }
        F::INC2 => {
            let twos = twos_complement_by_j(ip);
            if ip.increment_operand(true, true, Word36::new(2), twos)? {
                ip.skip_next_instruction();
            }
        }
        F::DEC2 => {
            let twos = twos_complement_by_j(ip);
            if ip.increment_operand(true, true, Word36::new(2).negate(), twos)? {
                ip.skip_next_instruction();
            }
        }
        F::ENZ => {
            let twos = twos_complement_by_j(ip);
            if ip.increment_operand(true, true, Word36::POSITIVE_ZERO, twos)? {
                ip.skip_next_instruction();
            }
        }

        //  ---------------------------------------------------------
        //  fixed-point arithmetic
        //  ---------------------------------------------------------
        F::AA => {
            let addend = ip.get_operand(true, true, true, true)?;
            add_to_register(ip, a_index(ip), addend, a_index(ip));
        }
        F::ANA => {
            let addend = ip.get_operand(true, true, true, true)?.negate();
            add_to_register(ip, a_index(ip), addend, a_index(ip));
        }
        F::AMA => {
            let addend = ip.get_operand(true, true, true, true)?.magnitude();
            add_to_register(ip, a_index(ip), addend, a_index(ip));
        }
        F::ANMA => {
            let addend = ip.get_operand(true, true, true, true)?.magnitude().negate();
            add_to_register(ip, a_index(ip), addend, a_index(ip));
        }
        F::AU => {
            let addend = ip.get_operand(true, true, true, true)?;
            add_to_register(ip, a_index(ip), addend, a_index(ip) + 1);
        }
        F::ANU => {
            let addend = ip.get_operand(true, true, true, true)?.negate();
            add_to_register(ip, a_index(ip), addend, a_index(ip) + 1);
        }
        F::AX => {
            let addend = ip.get_operand(true, true, true, true)?;
            add_to_register(ip, x_index(ip), addend, x_index(ip));
        }
        F::ANX => {
            let addend = ip.get_operand(true, true, true, true)?.negate();
            add_to_register(ip, x_index(ip), addend, x_index(ip));
        }
        F::AH => {
            let operand = ip.get_operand(true, true, true, false)?;
            let value = a_value(ip);
            set_a(ip, add_halves(value, operand));
        }
        F::ANH => {
            let operand = ip.get_operand(true, true, true, false)?;
            let negated = Word36::new((negate_18(operand.h1()) << 18) | negate_18(operand.h2()));
            let value = a_value(ip);
            set_a(ip, add_halves(value, negated));
        }
        F::AT => {
            let operand = ip.get_operand(true, true, true, false)?;
            let value = a_value(ip);
            set_a(ip, add_thirds(value, operand));
        }
        F::ANT => {
            let operand = ip.get_operand(true, true, true, false)?;
            let negated = Word36::new(
                (negate_12(operand.t1()) << 24)
                    | (negate_12(operand.t2()) << 12)
                    | negate_12(operand.t3()),
            );
            let value = a_value(ip);
            set_a(ip, add_thirds(value, negated));
        }
        F::DA => {
            let mut operands = [Word36::POSITIVE_ZERO; 2];
            ip.get_consecutive_operands(true, &mut operands)?;
            double_add(ip, operands[0], operands[1]);
        }
        F::DAN => {
            let mut operands = [Word36::POSITIVE_ZERO; 2];
            ip.get_consecutive_operands(true, &mut operands)?;
            double_add(ip, operands[0].negate(), operands[1].negate());
        }
        F::MI => {
            let multiplier = ip.get_operand(true, true, true, true)?;
            let product =
                i128::from(a_value(ip).to_native()) * i128::from(multiplier.to_native());
            let (msw, lsw, _) = word::from_native_72(product);
            set_a(ip, msw);
            set_a1(ip, lsw);
        }
        F::MSI => {
            let multiplier = ip.get_operand(true, true, true, true)?;
            let product =
                i128::from(a_value(ip).to_native()) * i128::from(multiplier.to_native());
            let (_, lsw, _) = word::from_native_72(product);
            let overflow = product.unsigned_abs() > u128::from(word::LARGEST_POSITIVE);
            ip.designator.set(DesignatorRegister::OVERFLOW, overflow);
            set_a(ip, lsw);
        }
        F::MF => {
            //  fractional multiply: the 70-bit product aligns one place
            //  to the left in the 72-bit result
            let multiplier = ip.get_operand(true, true, true, true)?;
            let product =
                (i128::from(a_value(ip).to_native()) * i128::from(multiplier.to_native())) << 1;
            let (msw, lsw, _) = word::from_native_72(product);
            set_a(ip, msw);
            set_a1(ip, lsw);
        }
        F::DI => {
            let divisor = ip.get_operand(true, true, true, true)?;
            let dividend = word::to_native_72(a_value(ip), a1_value(ip));
            divide(ip, dividend, divisor, a_index(ip), Some(a_index(ip) + 1))?;
        }
        F::DSF => {
            //  single fractional: 35 fraction bits in the dividend
            let divisor = ip.get_operand(true, true, true, true)?;
            let dividend = i128::from(a_value(ip).to_native()) << 35;
            divide(ip, dividend, divisor, a_index(ip) + 1, None)?;
        }
        F::DF => {
            let divisor = ip.get_operand(true, true, true, true)?;
            let dividend = word::to_native_72(a_value(ip), a1_value(ip));
            divide(ip, dividend, divisor, a_index(ip), Some(a_index(ip) + 1))?;
        }

        //  ---------------------------------------------------------
        //  logical - results go to A(a+1)
        //  ---------------------------------------------------------
        F::OR => {
            let operand = ip.get_operand(true, true, true, true)?;
            let value = a_value(ip);
            set_a1(ip, value | operand);
        }
        F::XOR => {
            let operand = ip.get_operand(true, true, true, true)?;
            let value = a_value(ip);
            set_a1(ip, value ^ operand);
        }
        F::AND => {
            let operand = ip.get_operand(true, true, true, true)?;
            let value = a_value(ip);
            set_a1(ip, value & operand);
        }
        F::MLU => {
            let operand = ip.get_operand(true, true, true, true)?;
            let mask = ip.grs.get(ip.exec_or_user_r_index(2));
            let value = a_value(ip);
            set_a1(ip, (operand & mask) | (value & mask.negate()));
        }

        //  ---------------------------------------------------------
        //  shifts
        //  ---------------------------------------------------------
        F::SSC => {
            let count = shift_count(ip);
            let value = a_value(ip);
            set_a(ip, value.right_shift_circular(count));
        }
        F::SSL => {
            let count = shift_count(ip);
            let value = a_value(ip);
            set_a(ip, value.right_shift_logical(count));
        }
        F::SSA => {
            let count = shift_count(ip);
            let value = a_value(ip);
            set_a(ip, value.right_shift_algebraic(count));
        }
        F::LSSC => {
            let count = shift_count(ip);
            let value = a_value(ip);
            set_a(ip, value.left_shift_circular(count));
        }
        F::LSSL => {
            let count = shift_count(ip);
            let value = a_value(ip);
            set_a(ip, value.left_shift_logical(count));
        }
        F::DSC => {
            let count = u64::from(shift_count(ip)) % 72;
            let combined = combine_72(a_value(ip), a1_value(ip));
            let rotated = ((combined >> count) | (combined << (72 - count))) & MASK_72;
            let (msw, lsw) = split_72(rotated);
            set_a(ip, msw);
            set_a1(ip, lsw);
        }
        F::DSL => {
            let count = u64::from(shift_count(ip));
            let combined = combine_72(a_value(ip), a1_value(ip));
            let shifted = if count > 71 { 0 } else { combined >> count };
            let (msw, lsw) = split_72(shifted);
            set_a(ip, msw);
            set_a1(ip, lsw);
        }
        F::DSA => {
            let count = u64::from(shift_count(ip));
            let negative = a_value(ip).is_negative();
            let combined = combine_72(a_value(ip), a1_value(ip));
            let shifted = if count > 71 {
                if negative {
                    MASK_72
                } else {
                    0
                }
            } else {
                let mut result = combined >> count;
                if negative {
                    result |= !(MASK_72 >> count) & MASK_72;
                }
                result
            };
            let (msw, lsw) = split_72(shifted);
            set_a(ip, msw);
            set_a1(ip, lsw);
        }
        F::LSC => {
            //  normalize: shift left circularly until the two leading
            //  bits differ, count of shifts to A(a+1)
            let value = ip.get_operand(true, true, true, false)?;
            let mut shifted = value;
            let mut count = 0u64;
            if value.is_zero() {
                count = 35;
            } else {
                while (shifted.raw() >> 35) & 1 == (shifted.raw() >> 34) & 1 && count < 35 {
                    shifted = shifted.left_shift_circular(1);
                    count += 1;
                }
            }
            set_a(ip, shifted);
            set_a1(ip, Word36::new(count));
        }

        //  ---------------------------------------------------------
        //  tests - a true condition skips the next instruction
        //  ---------------------------------------------------------
        F::TEP => {
            let operand = ip.get_operand(true, true, true, true)?;
            if (operand & a_value(ip)).raw().count_ones() % 2 == 0 {
                ip.skip_next_instruction();
            }
        }
        F::TOP => {
            let operand = ip.get_operand(true, true, true, true)?;
            if (operand & a_value(ip)).raw().count_ones() % 2 == 1 {
                ip.skip_next_instruction();
            }
        }
        F::TLEM => {
            //  test against the modifier of X(a), then increment it
            let operand = ip.get_operand(true, true, true, true)?;
            let register = ip.exec_or_user_x_index(ip.current_instruction.a());
            let mut xreg = crate::runtime::registers::IndexRegister::new(ip.grs.get(register));
            if operand.raw() & 0o777777 <= xreg.xm() {
                ip.skip_next_instruction();
            }
            xreg.increment_modifier_18();
            ip.grs.set(register, xreg.word());
        }
        F::TZ | F::TNZ | F::TP | F::TN | F::TNOP | F::TGZ | F::TPZ | F::TMZ | F::TMZG
        | F::TNLZ | F::TLZ | F::TPZL | F::TNMZ | F::TNPZ | F::TNGZ | F::TSKP => {
            let mask = condition_mask(function, ip);
            let operand = ip.get_operand(true, true, true, true)?;
            if condition_matches(operand, mask) {
                ip.skip_next_instruction();
            }
        }
        F::TE => {
            let operand = ip.get_operand(true, true, true, true)?;
            if operand.compare(a_value(ip)) == std::cmp::Ordering::Equal {
                ip.skip_next_instruction();
            }
        }
        F::TNE => {
            let operand = ip.get_operand(true, true, true, true)?;
            if operand.compare(a_value(ip)) != std::cmp::Ordering::Equal {
                ip.skip_next_instruction();
            }
        }
        F::TLE => {
            let operand = ip.get_operand(true, true, true, true)?;
            if operand.compare(a_value(ip)) != std::cmp::Ordering::Greater {
                ip.skip_next_instruction();
            }
        }
        F::TG => {
            let operand = ip.get_operand(true, true, true, true)?;
            if operand.compare(a_value(ip)) == std::cmp::Ordering::Greater {
                ip.skip_next_instruction();
            }
        }
        F::TW => {
            let operand = ip.get_operand(true, true, true, true)?;
            if within(operand, a_value(ip), a1_value(ip)) {
                ip.skip_next_instruction();
            }
        }
        F::TNW => {
            let operand = ip.get_operand(true, true, true, true)?;
            if !within(operand, a_value(ip), a1_value(ip)) {
                ip.skip_next_instruction();
            }
        }
        F::DTE => {
            let mut operands = [Word36::POSITIVE_ZERO; 2];
            ip.get_consecutive_operands(true, &mut operands)?;
            let equal = word::to_native_72(operands[0], operands[1])
                == word::to_native_72(a_value(ip), a1_value(ip));
            if equal {
                ip.skip_next_instruction();
            }
        }

        //  ---------------------------------------------------------
        //  conditional jumps
        //  ---------------------------------------------------------
        F::JZ => {
            let take = a_value(ip).is_zero();
            conditional_jump(ip, take)?;
        }
        F::JNZ => {
            let take = !a_value(ip).is_zero();
            conditional_jump(ip, take)?;
        }
        F::JP => {
            let take = a_value(ip).is_positive();
            conditional_jump(ip, take)?;
        }
        F::JN => {
            let take = a_value(ip).is_negative();
            conditional_jump(ip, take)?;
        }
        F::JPS => {
            let target = ip.jump_operand()?;
            let value = a_value(ip);
            set_a(ip, value.left_shift_circular(1));
            if value.is_positive() {
                ip.jump_to(target);
            }
        }
        F::JNS => {
            let target = ip.jump_operand()?;
            let value = a_value(ip);
            set_a(ip, value.left_shift_circular(1));
            if value.is_negative() {
                ip.jump_to(target);
            }
        }
        F::JB => {
            let take = a_value(ip).raw() & 1 == 1;
            conditional_jump(ip, take)?;
        }
        F::JNB => {
            let take = a_value(ip).raw() & 1 == 0;
            conditional_jump(ip, take)?;
        }
        F::JC => {
            let take = ip.designator.contains(DesignatorRegister::CARRY);
            conditional_jump(ip, take)?;
        }
        F::JNC => {
            let take = !ip.designator.contains(DesignatorRegister::CARRY);
            conditional_jump(ip, take)?;
        }
        F::JO | F::JNO => {
            //  test and clear
            let set = ip.designator.contains(DesignatorRegister::OVERFLOW);
            ip.designator.remove(DesignatorRegister::OVERFLOW);
            conditional_jump(ip, set == (function == F::JO))?;
        }
        F::JFU | F::JNFU => {
            let set = ip
                .designator
                .contains(DesignatorRegister::CHARACTERISTIC_UNDERFLOW);
            ip.designator
                .remove(DesignatorRegister::CHARACTERISTIC_UNDERFLOW);
            conditional_jump(ip, set == (function == F::JFU))?;
        }
        F::JFO | F::JNFO => {
            let set = ip
                .designator
                .contains(DesignatorRegister::CHARACTERISTIC_OVERFLOW);
            ip.designator
                .remove(DesignatorRegister::CHARACTERISTIC_OVERFLOW);
            conditional_jump(ip, set == (function == F::JFO))?;
        }
        F::JDF | F::JNDF => {
            let set = ip.designator.contains(DesignatorRegister::DIVIDE_CHECK);
            ip.designator.remove(DesignatorRegister::DIVIDE_CHECK);
            conditional_jump(ip, set == (function == F::JDF))?;
        }
        F::JGD => {
            //  the j‖a concatenation names a GRS location; the
            //  pre-decrement value decides, the decrement always lands
            let target = ip.jump_operand()?;
            let index =
                ((ip.current_instruction.j() << 4) | ip.current_instruction.a()) & 0o177;
            let value = ip.grs.get(index);
            let take = value.is_positive() && !value.is_zero();
            ip.grs.set(index, value.add_simple(Word36::NEGATIVE_ONE));
            if take {
                ip.jump_to(target);
            }
        }
        F::JMGI => {
            //  pre-increment modifier decides; the increment always lands
            let target = ip.jump_operand()?;
            let register = ip.exec_or_user_x_index(ip.current_instruction.a());
            let mut xreg = crate::runtime::registers::IndexRegister::new(ip.grs.get(register));
            let take = xreg.signed_xm().to_native() > 0;
            xreg.increment_modifier_18();
            ip.grs.set(register, xreg.word());
            if take {
                ip.jump_to(target);
            }
        }
        F::DJZ => {
            let take = word::is_zero_72(a_value(ip), a1_value(ip));
            conditional_jump(ip, take)?;
        }

        //  ---------------------------------------------------------
        //  unconditional jumps and halts
        //  ---------------------------------------------------------
        F::J => {
            let target = ip.jump_operand()?;
            ip.jump_to(target);
        }
        F::SLJ => {
            //  store the return address in the target's lower half, then
            //  resume past it
            let target = ip.jump_operand()?;
            let return_counter = (ip.par.program_counter() + 1) & 0o777777;
            let index = ip.find_base_register_index(target, true)?;
            let address = ip.base_registers[index].absolute_address(target);
            let mut word = ip.read_storage(address, false)?;
            word.set_h2(return_counter);
            ip.write_storage(address, word)?;
            ip.jump_to(target + 1);
        }
        F::LMJ => {
            let target = ip.jump_operand()?;
            let register = ip.exec_or_user_x_index(ip.current_instruction.a());
            let mut word = ip.grs.get(register);
            word.set_h2((ip.par.program_counter() + 1) & 0o777777);
            ip.grs.set(register, word);
            ip.jump_to(target);
        }
        F::HLTJ => {
            let target = ip.jump_operand()?;
            ip.jump_to(target);
            ip.stop(StopReason::HaltJumpExecuted, Word36::new(target));
        }
        F::NOP => {}
        F::HALT => {
            let detail = Word36::new(ip.current_instruction.hiu());
            ip.stop(StopReason::Development, detail);
        }

        //  ---------------------------------------------------------
        //  test-and-set
        //  ---------------------------------------------------------
        F::TS => ip.test_and_store(true)?,
        F::TSS => match ip.test_and_store(true) {
            Ok(()) => ip.skip_next_instruction(),
            Err(OperandFault::Interrupt(MachineInterrupt::TestAndSet { .. })) => {}
            Err(fault) => return Err(fault),
        },
        F::TCS => match ip.test_and_store(false) {
            Ok(()) => ip.skip_next_instruction(),
            Err(OperandFault::Interrupt(MachineInterrupt::TestAndSet { .. })) => {}
            Err(fault) => return Err(fault),
        },

        //  ---------------------------------------------------------
        //  bank management
        //  ---------------------------------------------------------
        F::LBU => {
            let register = ip.current_instruction.a() as usize;
            if register < 2 {
                return Err(MachineInterrupt::InvalidInstruction(
                    InvalidInstructionReason::InvalidBaseRegister,
                )
                .into());
            }
            load_bank(ip, register, false)?;
        }
        F::LBE => {
            let register = ip.current_instruction.a() as usize + 16;
            load_bank(ip, register, true)?;
        }
        F::LBED | F::LBUD => {
            let register = ip.current_instruction.a() as usize
                + if function == F::LBED { 16 } else { 0 };
            let mut words = [Word36::POSITIVE_ZERO; 4];
            ip.get_consecutive_operands(false, &mut words)?;
            ip.base_registers[register] = BaseRegister::from_words(words);
        }
        F::SBED | F::SBUD => {
            let register = ip.current_instruction.a() as usize
                + if function == F::SBED { 16 } else { 0 };
            let words = ip.base_registers[register].to_words();
            ip.store_consecutive_operands(false, &words)?;
        }

        //  ---------------------------------------------------------
        //  system control
        //  ---------------------------------------------------------
        F::SPID => {
            let mut word0 = Word36::POSITIVE_ZERO;
            word0.set_h1(PROCESSOR_FEATURES);
            word0.set_h2(u64::from(ip.upi));
            let mut word1 = Word36::POSITIVE_ZERO;
            word1.set_h1(PROCESSOR_SERIES);
            word1.set_h2(PROCESSOR_MODEL);
            ip.store_consecutive_operands(true, &[word0, word1])?;
        }
        F::SYSC => {
            let packet = ip.get_operand(false, true, false, false)?;
            let subfunction = packet.s1();
            if !SYSC_SUBFUNCTIONS.contains(&subfunction) {
                return Err(MachineInterrupt::InvalidInstruction(
                    InvalidInstructionReason::UndefinedFunctionCode,
                )
                .into());
            }
            //  the sub-function semantics belong to the exec layer; the
            //  call is surfaced as a signal for it to service
            ip.raise_interrupt(MachineInterrupt::Signal {
                signal: subfunction,
            });
        }
        F::ER => {
            //  the u field is the executive-request index, not an
            //  address; indexing still applies
            let mut index = ip.current_instruction.u();
            if ip.current_instruction.x() != 0 {
                let xreg = ip.exec_or_user_x_register(ip.current_instruction.x());
                index = Word36::new(index).add_simple(xreg.signed_xm()).raw();
            }
            ip.increment_index_register_in_f0();
            ip.raise_interrupt(MachineInterrupt::Signal {
                signal: index & 0o777777,
            });
        }
        F::SGNL => {
            let value = ip.get_operand(false, true, true, false)?;
            ip.raise_interrupt(MachineInterrupt::Signal {
                signal: value.raw() & 0o777777,
            });
        }
        F::IAR => {
            let detail = Word36::new(ip.current_instruction.d());
            ip.stop(StopReason::InitiateAutoRecovery, detail);
        }
    }

    Ok(())
}

//  -------------------------------------------------------------------
//  register shorthands
//  -------------------------------------------------------------------

fn a_index(ip: &Processor) -> u64 {
    ip.exec_or_user_a_index(ip.current_instruction.a())
}

fn x_index(ip: &Processor) -> u64 {
    ip.exec_or_user_x_index(ip.current_instruction.a())
}

fn r_index(ip: &Processor) -> u64 {
    ip.exec_or_user_r_index(ip.current_instruction.a())
}

fn a_value(ip: &Processor) -> Word36 {
    ip.grs.get(a_index(ip))
}

fn a1_value(ip: &Processor) -> Word36 {
    ip.grs.get(a_index(ip) + 1)
}

fn set_a(ip: &mut Processor, value: Word36) {
    let index = a_index(ip);
    ip.grs.set(index, value);
}

fn set_a1(ip: &mut Processor, value: Word36) {
    let index = a_index(ip) + 1;
    ip.grs.set(index, value);
}

//  -------------------------------------------------------------------
//  arithmetic helpers
//  -------------------------------------------------------------------

fn add_to_register(ip: &mut Processor, source: u64, addend: Word36, destination: u64) {
    let (sum, flags) = ip.grs.get(source).add(addend);
    ip.designator.set(DesignatorRegister::CARRY, flags.carry);
    ip.designator
        .set(DesignatorRegister::OVERFLOW, flags.overflow);
    ip.grs.set(destination, sum);
}

fn negate_18(value: u64) -> u64 {
    (value ^ 0o777777) & 0o777777
}

fn negate_12(value: u64) -> u64 {
    (value ^ 0o7777) & 0o7777
}

/// Ones-complement 18-bit add with end-around carry; cancellation of
/// distinct operands yields positive zero.
fn add_18(a: u64, b: u64) -> u64 {
    let mut sum = a + b;
    if sum & 0o1_000000 != 0 {
        sum = (sum & 0o777777) + 1;
    }
    if sum == 0o777777 && a != b {
        sum = 0;
    }
    sum & 0o777777
}

/// Ones-complement 12-bit add with end-around carry.
fn add_12(a: u64, b: u64) -> u64 {
    let mut sum = a + b;
    if sum & 0o10000 != 0 {
        sum = (sum & 0o7777) + 1;
    }
    if sum == 0o7777 && a != b {
        sum = 0;
    }
    sum & 0o7777
}

/// Adds per 18-bit half, with no carry between the halves.
fn add_halves(a: Word36, b: Word36) -> Word36 {
    Word36::new((add_18(a.h1(), b.h1()) << 18) | add_18(a.h2(), b.h2()))
}

/// Adds per 12-bit third, with no carry between the thirds.
fn add_thirds(a: Word36, b: Word36) -> Word36 {
    Word36::new((add_12(a.t1(), b.t1()) << 24) | (add_12(a.t2(), b.t2()) << 12) | add_12(a.t3(), b.t3()))
}

const MASK_72: u128 = 0o777777_777777_777777_777777;

fn combine_72(msw: Word36, lsw: Word36) -> u128 {
    (u128::from(msw.raw()) << 36) | u128::from(lsw.raw())
}

fn split_72(combined: u128) -> (Word36, Word36) {
    (
        Word36::new((combined >> 36) as u64),
        Word36::new(combined as u64),
    )
}

/// 72-bit ones-complement add into A(a), A(a+1) with end-around carry
/// and the carry/overflow designators.
fn double_add(ip: &mut Processor, addend_msw: Word36, addend_lsw: Word36) {
    let a = combine_72(a_value(ip), a1_value(ip));
    let b = combine_72(addend_msw, addend_lsw);

    let mut sum = a + b;
    let carry = sum & (1u128 << 72) != 0;
    if carry {
        sum = (sum & MASK_72) + 1;
    }
    sum &= MASK_72;

    let negative_72 = 1u128 << 71;
    let a_negative = a & negative_72 != 0;
    let b_negative = b & negative_72 != 0;
    let sum_negative = sum & negative_72 != 0;
    let overflow = a_negative == b_negative && sum_negative != a_negative;

    ip.designator.set(DesignatorRegister::CARRY, carry);
    ip.designator.set(DesignatorRegister::OVERFLOW, overflow);

    let (msw, lsw) = split_72(sum);
    set_a(ip, msw);
    set_a1(ip, lsw);
}

/// Common divide tail: divide-check handling, then quotient (and
/// optionally remainder) into the named registers.
fn divide(
    ip: &mut Processor,
    dividend: i128,
    divisor: Word36,
    quotient_index: u64,
    remainder_index: Option<u64>,
) -> OperandResult<()> {
    let divisor_native = i128::from(divisor.to_native());
    let check = divisor.is_zero()
        || (dividend / if divisor_native == 0 { 1 } else { divisor_native })
            .unsigned_abs()
            > u128::from(word::LARGEST_POSITIVE);

    if check {
        if ip
            .designator
            .contains(DesignatorRegister::ARITHMETIC_EXCEPTION_ENABLED)
        {
            return Err(MachineInterrupt::ArithmeticException(
                ArithmeticExceptionReason::DivideCheck,
            )
            .into());
        }
        ip.designator.insert(DesignatorRegister::DIVIDE_CHECK);
        return Ok(());
    }

    let quotient = dividend / divisor_native;
    let remainder = dividend % divisor_native;

    let (quotient_word, _) = Word36::from_native(quotient as i64);
    ip.grs.set(quotient_index, quotient_word);
    if let Some(index) = remainder_index {
        let (remainder_word, _) = Word36::from_native(remainder as i64);
        ip.grs.set(index, remainder_word);
    }

    Ok(())
}

//  -------------------------------------------------------------------
//  tests and jumps
//  -------------------------------------------------------------------

/// Per-instruction shift count: the composed relative address, of which
/// the low seven bits are significant.
fn shift_count(ip: &mut Processor) -> u32 {
    let count = ip.calculate_relative_address(0) & 0o177;
    ip.increment_index_register_in_f0();
    count as u32
}

/// The f=050 test family reduces to a four-bit condition mask: greater
/// than zero, positive zero, negative zero, less than zero.
fn condition_mask(function: Function, ip: &Processor) -> u64 {
    use Function as F;

    match function {
        //  basic-mode forms carry the mask implicitly
        F::TZ if ip.designator.basic_mode() => 0o06,
        F::TNZ if ip.designator.basic_mode() => 0o11,
        F::TP if ip.designator.basic_mode() => 0o03,
        F::TN if ip.designator.basic_mode() => 0o14,
        //  extended-mode forms carry it in the a-field
        _ => ip.current_instruction.a(),
    }
}

fn condition_matches(operand: Word36, mask: u64) -> bool {
    let raw = operand.raw();
    (mask & 0o01 != 0 && operand.is_positive() && raw != 0)
        || (mask & 0o02 != 0 && raw == 0)
        || (mask & 0o04 != 0 && raw == crate::word::BIT_MASK)
        || (mask & 0o10 != 0 && operand.is_negative() && raw != crate::word::BIT_MASK)
}

/// Whether `operand` lies within (low, high]: the window test of TW/TNW.
fn within(operand: Word36, low: Word36, high: Word36) -> bool {
    low.compare(operand) == std::cmp::Ordering::Less
        && operand.compare(high) != std::cmp::Ordering::Greater
}

/// Resolves the jump target unconditionally - index increments and
/// indirect chains happen whether or not the jump is taken - and loads
/// the program counter when it is.
fn conditional_jump(ip: &mut Processor, take: bool) -> OperandResult<()> {
    let target = ip.jump_operand()?;
    if take {
        ip.jump_to(target);
    }
    Ok(())
}

/// Instructions that choose twos-complement arithmetic when the j-field
/// names a half or sixth partial word (or a quarter, in quarter-word
/// mode).
fn twos_complement_by_j(ip: &Processor) -> bool {
    match ip.current_instruction.j() {
        J_H1 | J_H2 | J_S1 | J_S2 | J_S3 | J_S4 | J_S5 | J_S6 => true,
        0o04..=0o07 => ip.designator.contains(DesignatorRegister::QUARTER_WORD_MODE),
        _ => false,
    }
}

//  -------------------------------------------------------------------
//  bank loading
//  -------------------------------------------------------------------

/// The common path of LBU and LBE: resolve the operand's virtual
/// address to a bank descriptor (following one indirect hop) and base
/// the named register on it.
fn load_bank(ip: &mut Processor, register: usize, exec: bool) -> OperandResult<()> {
    let operand = ip.get_operand(false, true, false, false)?;
    let address = VirtualAddress::from_word(operand);
    let level = address.level();
    let bank_descriptor_index = address.bank_descriptor_index();

    if level == 0 && (1..32).contains(&bank_descriptor_index) {
        let reason = if exec {
            AddressingExceptionReason::FatalAddressingException
        } else {
            AddressingExceptionReason::InvalidSourceLevelBdi
        };
        return Err(MachineInterrupt::AddressingException {
            reason,
            level,
            bank_descriptor_index,
        }
        .into());
    }

    if level == 0 && bank_descriptor_index == 0 {
        //  the void bank name
        ip.base_registers[register] = BaseRegister::default();
        return Ok(());
    }

    let source = ip.find_bank_descriptor(level, bank_descriptor_index)?;
    let mut void = false;
    let target = match source.bank_type() {
        BankType::Indirect => {
            let target_level = source.target_level;
            let target_index = source.target_bank_descriptor_index;
            let target = ip.find_bank_descriptor(target_level, target_index)?;
            if matches!(
                target.bank_type(),
                BankType::Indirect | BankType::QueueRepository
            ) {
                return Err(MachineInterrupt::AddressingException {
                    reason: AddressingExceptionReason::InvalidBankType,
                    level: target_level,
                    bank_descriptor_index: target_index,
                }
                .into());
            }
            target
        }
        BankType::QueueRepository => {
            return Err(MachineInterrupt::AddressingException {
                reason: AddressingExceptionReason::InvalidBankType,
                level,
                bank_descriptor_index,
            }
            .into());
        }
        _ => source,
    };

    //  an unenterable basic-mode bank loads void for unprivileged LBU
    if !exec
        && target.bank_type() == BankType::BasicMode
        && ip.designator.processor_privilege() > 1
        && !target.general_permissions.can_enter()
        && !target.special_permissions.can_enter()
    {
        void = true;
    }

    ip.base_registers[register] = if void {
        BaseRegister::default()
    } else {
        target.base_register()
    };

    if !void && target.general_fault {
        return Err(MachineInterrupt::TerminalAddressingException {
            level,
            bank_descriptor_index,
        }
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::InstructionWord;
    use crate::runtime::testing::{basic_processor, extended_processor, CODE_START};
    use crate::runtime::interrupts::ReferenceViolationKind;
    use crate::runtime::registers;
    use pretty_assertions::assert_eq;

    //  The end-to-end scenarios assemble small programs into the code
    //  bank and run them to completion or to a halt.

    fn halt() -> u64 {
        //  HALT with zero detail (f=077, j=017, a=017)
        InstructionWord::from_fields_hiu(0o77, 0o17, 0o17, 0, 0)
            .word()
            .raw()
    }

    fn la_immediate(a: u64, value: u64) -> u64 {
        InstructionWord::from_fields_hiu(0o10, 0o16, a, 0, value)
            .word()
            .raw()
    }

    #[test]
    fn load_accumulator_immediate() {
        let mut processor = basic_processor();
        processor.load_program(&[la_immediate(5, 0o1000), halt()]);
        let (reason, _) = processor.run();

        assert_eq!(reason, StopReason::Development);
        assert_eq!(
            processor
                .general_registers()
                .get(registers::A0 + 5)
                .raw(),
            0o1000
        );
    }

    #[test]
    fn privileged_instruction_is_gated() {
        let mut processor = basic_processor();
        processor.designator_register_mut().set_processor_privilege(3);
        //  LBED B16,... at privilege 3
        let lbed = InstructionWord::from_fields_hiu(0o75, 0o05, 0, 0, CODE_START + 0o100)
            .word()
            .raw();
        processor.load_program(&[lbed]);
        processor.step_n(3);

        assert_eq!(
            processor.last_interrupt(),
            Some(MachineInterrupt::InvalidInstruction(
                InvalidInstructionReason::InvalidProcessorPrivilege
            ))
        );
        //  B16 still describes the descriptor-table bank
        assert!(!processor.base_register(16).void_flag);
    }

    #[test]
    fn spid_is_gated_and_reports_identity() {
        //  at privilege 3 SPID raises invalid processor privilege and
        //  leaves the destination untouched
        let mut processor = basic_processor();
        processor.designator_register_mut().set_processor_privilege(3);
        let spid = InstructionWord::from_fields_hiu(0o73, 0o15, 0o05, 0, CODE_START + 0o100)
            .word()
            .raw();
        processor.load_program(&[spid]);
        processor.step_n(3);
        assert_eq!(
            processor.last_interrupt(),
            Some(MachineInterrupt::InvalidInstruction(
                InvalidInstructionReason::InvalidProcessorPrivilege
            ))
        );
        assert_eq!(processor.peek(CODE_START + 0o100).raw(), 0);

        //  at privilege 0 it stores the two-word identity
        let mut processor = basic_processor();
        processor.load_program(&[spid, halt()]);
        processor.run();
        assert_eq!(
            processor.peek(CODE_START + 0o100).h2(),
            u64::from(crate::runtime::testing::UPI)
        );
        assert_eq!(processor.peek(CODE_START + 0o101).h1(), PROCESSOR_SERIES);
    }

    #[test]
    fn store_and_reload_partial_word() {
        let mut processor = basic_processor();
        let data = CODE_START + 0o200;
        //  LA,U A0,0123; SA,H1 A0,data; LA,H1 A1,data; HALT
        let sa_h1 = InstructionWord::from_fields_hiu(0o01, 0o02, 0, 0, data).word().raw();
        let la_h1 = InstructionWord::from_fields_hiu(0o10, 0o02, 1, 0, data).word().raw();
        processor.load_program(&[la_immediate(0, 0o123), sa_h1, la_h1, halt()]);
        processor.poke(data, 0o777777_654321);
        processor.run();

        //  H1 was replaced, H2 untouched
        assert_eq!(processor.peek(data).raw(), 0o000123_654321);
        assert_eq!(processor.general_registers().get(registers::A0 + 1).raw(), 0o123);
    }

    #[test]
    fn double_load_store_round_trip() {
        let mut processor = basic_processor();
        let source = CODE_START + 0o300;
        let dest = CODE_START + 0o310;
        processor.poke(source, 0o111111_111111);
        processor.poke(source + 1, 0o222222_222222);

        //  DL A2,source; DS A2,dest; HALT
        let dl = InstructionWord::from_fields_hiu(0o71, 0o13, 2, 0, source).word().raw();
        let ds = InstructionWord::from_fields_hiu(0o71, 0o12, 2, 0, dest).word().raw();
        processor.load_program(&[dl, ds, halt()]);
        processor.run();

        assert_eq!(processor.peek(dest).raw(), 0o111111_111111);
        assert_eq!(processor.peek(dest + 1).raw(), 0o222222_222222);
    }

    #[test]
    fn decrement_and_branch_semantics() {
        //  JGD with initial value 1 branches once and leaves 0; with
        //  initial value 0 it does not branch and leaves -1
        let mut processor = basic_processor();
        let a2 = registers::A0 + 2;
        //  j||a concatenation naming GRS 016 (A2)
        let jgd = InstructionWord::from_fields_hiu(0o70, 0o00, 0o16, 0, CODE_START)
            .word()
            .raw();
        processor.load_program(&[jgd, halt()]);

        processor.general_registers_mut().set(a2, Word36::new(1));
        processor.step_n(2); // fetch + execute (branch taken)
        assert_eq!(processor.general_registers().get(a2).raw(), 0);
        assert_eq!(
            processor.program_address_register().program_counter(),
            CODE_START
        );

        //  second round: value 0, no branch, decrements to -1
        processor.step_n(2);
        assert_eq!(
            processor.general_registers().get(a2),
            Word36::NEGATIVE_ONE
        );
        assert_eq!(
            processor.program_address_register().program_counter(),
            CODE_START + 1
        );
    }

    #[test]
    fn jump_carry_flag_untouched_overflow_cleared() {
        let mut processor = basic_processor();
        processor
            .designator_register_mut()
            .insert(DesignatorRegister::OVERFLOW | DesignatorRegister::CARRY);

        //  JO jumps and clears overflow; JC leaves carry alone. The
        //  traps between the jumps stop with a marker detail if a jump
        //  falls through.
        let jo = InstructionWord::from_fields_hiu(0o74, 0o14, 0o00, 0, CODE_START + 2)
            .word()
            .raw();
        let jc = InstructionWord::from_fields_hiu(0o74, 0o16, 0o00, 0, CODE_START + 4)
            .word()
            .raw();
        let trap1 = InstructionWord::from_fields_hiu(0o77, 0o17, 0o17, 0, 0o111)
            .word()
            .raw();
        let trap2 = InstructionWord::from_fields_hiu(0o77, 0o17, 0o17, 0, 0o222)
            .word()
            .raw();
        processor.load_program(&[jo, trap1, jc, trap2, halt()]);
        let (_, detail) = processor.run();

        assert_eq!(detail.raw(), 0);
        assert!(!processor
            .designator_register()
            .contains(DesignatorRegister::OVERFLOW));
        assert!(processor
            .designator_register()
            .contains(DesignatorRegister::CARRY));
    }

    #[test]
    fn ones_complement_add_sets_carry() {
        let mut processor = basic_processor();
        //  A0 = -2, then AA,U A0,5: end-around carry, result 3
        let (minus_two, _) = Word36::from_native(-2);
        processor
            .general_registers_mut()
            .set(registers::A0, minus_two);
        let aa = InstructionWord::from_fields_hiu(0o14, 0o16, 0, 0, 5).word().raw();
        processor.load_program(&[aa, halt()]);
        processor.run();

        assert_eq!(processor.general_registers().get(registers::A0).to_native(), 3);
        assert!(processor
            .designator_register()
            .contains(DesignatorRegister::CARRY));
    }

    #[test]
    fn divide_check_raises_or_flags() {
        //  divide by zero with arithmetic exceptions enabled raises
        let mut processor = basic_processor();
        processor
            .designator_register_mut()
            .insert(DesignatorRegister::ARITHMETIC_EXCEPTION_ENABLED);
        processor
            .general_registers_mut()
            .set(registers::A0, Word36::new(1));
        let di = InstructionWord::from_fields_hiu(0o34, 0o16, 0, 0, 0).word().raw();
        processor.load_program(&[di, halt()]);
        processor.step_n(3);
        assert_eq!(
            processor.last_interrupt(),
            Some(MachineInterrupt::ArithmeticException(
                ArithmeticExceptionReason::DivideCheck
            ))
        );

        //  with them disabled, the designator bit records it
        let mut processor = basic_processor();
        processor
            .general_registers_mut()
            .set(registers::A0, Word36::new(1));
        processor.load_program(&[di, halt()]);
        processor.run();
        assert!(processor
            .designator_register()
            .contains(DesignatorRegister::DIVIDE_CHECK));
    }

    #[test]
    fn multiply_produces_double_word() {
        let mut processor = basic_processor();
        processor
            .general_registers_mut()
            .set(registers::A0 + 3, Word36::new(0o200000_000000 >> 1));
        //  MI,U A3,4 -> 72-bit product spans both words
        let mi = InstructionWord::from_fields_hiu(0o30, 0o16, 3, 0, 4).word().raw();
        processor.load_program(&[mi, halt()]);
        processor.run();

        let msw = processor.general_registers().get(registers::A0 + 3);
        let lsw = processor.general_registers().get(registers::A0 + 4);
        assert_eq!(
            word::to_native_72(msw, lsw),
            i128::from(0o200000_000000u64 >> 1) * 4
        );
    }

    #[test]
    fn logical_results_go_to_a_plus_one() {
        let mut processor = basic_processor();
        processor
            .general_registers_mut()
            .set(registers::A0, Word36::new(0o770000_000000));
        let or = InstructionWord::from_fields_hiu(0o40, 0o16, 0, 0, 0o7700).word().raw();
        processor.load_program(&[or, halt()]);
        processor.run();

        assert_eq!(
            processor.general_registers().get(registers::A0 + 1).raw(),
            0o770000_007700
        );
        //  A0 itself is untouched
        assert_eq!(
            processor.general_registers().get(registers::A0).raw(),
            0o770000_000000
        );
    }

    #[test]
    fn shifts_operate_on_the_register() {
        let mut processor = basic_processor();
        processor
            .general_registers_mut()
            .set(registers::A0, Word36::new(0o400000_000001));
        //  SSC A0,1 then LSSC A0,2
        let ssc = InstructionWord::from_fields_hiu(0o73, 0o00, 0, 0, 1).word().raw();
        let lssc = InstructionWord::from_fields_hiu(0o73, 0o10, 0, 0, 2).word().raw();
        processor.load_program(&[ssc, lssc, halt()]);
        processor.run();

        //  right circular 1: 600000000000; left circular 2 brings the
        //  pair around to the low end
        assert_eq!(
            processor.general_registers().get(registers::A0).raw(),
            0o000000_000003
        );
    }

    #[test]
    fn test_family_skips() {
        let mut processor = basic_processor();
        //  TZ on a zero operand skips the next instruction
        let data = CODE_START + 0o100;
        let tz = InstructionWord::from_fields_hiu(0o50, 0, 0, 0, data).word().raw();
        //  the skipped slot would halt with a marker detail
        let trap = InstructionWord::from_fields_hiu(0o77, 0o17, 0o17, 0, 0o777).word().raw();
        processor.load_program(&[tz, trap, halt()]);
        processor.poke(data, 0);
        let (reason, detail) = processor.run();

        assert_eq!(reason, StopReason::Development);
        assert_eq!(detail.raw(), 0);
    }

    #[test]
    fn extended_test_family_uses_condition_mask() {
        let mut processor = extended_processor();
        //  TGZ (a=1) against a negative operand: no skip
        let data = 0o1100u64;
        let tgz = InstructionWord::from_fields_bd(0o50, 0, 0o01, 0, 0, 0, 0, data)
            .word()
            .raw();
        processor.load_program(&[tgz]);
        processor.poke(data, crate::word::BIT_MASK ^ 0o1); // a negative value
        processor.step_n(2);
        assert_eq!(
            processor.program_address_register().program_counter(),
            CODE_START + 1
        );

        //  TLZ (a=010) against the same operand: skip
        let mut processor = extended_processor();
        let tlz = InstructionWord::from_fields_bd(0o50, 0, 0o10, 0, 0, 0, 0, data)
            .word()
            .raw();
        processor.load_program(&[tlz]);
        processor.poke(data, crate::word::BIT_MASK ^ 0o1);
        processor.step_n(2);
        assert_eq!(
            processor.program_address_register().program_counter(),
            CODE_START + 2
        );
    }

    #[test]
    fn test_and_set_is_exclusive() {
        let mut processor = basic_processor();
        let lock = CODE_START + 0o140;
        let ts = InstructionWord::from_fields_hiu(0o73, 0o17, 0o00, 0, lock).word().raw();
        processor.load_program(&[ts, halt()]);
        processor.run();

        //  the lock bit landed in S1
        assert_eq!(processor.peek(lock).s1(), 0o01);

        //  a second TS on the set lock raises the test-and-set interrupt
        let mut processor = basic_processor();
        processor.load_program(&[ts, halt()]);
        processor.poke(lock, 0o010000_000000);
        processor.step_n(3);
        assert!(matches!(
            processor.last_interrupt(),
            Some(MachineInterrupt::TestAndSet { .. })
        ));
    }

    #[test]
    fn test_and_clear_skips_on_success() {
        let mut processor = basic_processor();
        let lock = CODE_START + 0o140;
        let tcs = InstructionWord::from_fields_hiu(0o73, 0o17, 0o02, 0, lock).word().raw();
        let trap = InstructionWord::from_fields_hiu(0o77, 0o17, 0o17, 0, 0o777).word().raw();
        processor.load_program(&[tcs, trap, halt()]);
        processor.poke(lock, 0o010000_000000);
        let (_, detail) = processor.run();

        assert_eq!(detail.raw(), 0);
        assert_eq!(processor.peek(lock).s1(), 0);
    }

    #[test]
    fn store_location_and_jump() {
        let mut processor = basic_processor();
        let subroutine = CODE_START + 0o100;
        let slj = InstructionWord::from_fields_hiu(0o72, 0o01, 0, 0, subroutine).word().raw();
        processor.load_program(&[slj, halt()]);
        processor.poke(subroutine, 0);
        processor.poke(subroutine + 1, halt());
        let (reason, _) = processor.run();

        //  the return address (caller + 1) is in the target's lower half
        assert_eq!(reason, StopReason::Development);
        assert_eq!(processor.peek(subroutine).h2(), CODE_START + 1);
    }

    #[test]
    fn load_modifier_and_jump() {
        let mut processor = basic_processor();
        let target = CODE_START + 0o50;
        let lmj = InstructionWord::from_fields_hiu(0o74, 0o13, 0o11, 0, target).word().raw();
        processor.load_program(&[lmj]);
        processor.poke(target, halt());
        processor.run();

        assert_eq!(
            processor.general_registers().get(registers::X0 + 0o11).h2(),
            CODE_START + 1
        );
    }

    #[test]
    fn halt_jump_stops_with_target_detail() {
        let mut processor = basic_processor();
        let target = CODE_START + 0o70;
        let hltj = InstructionWord::from_fields_hiu(0o74, 0o15, 0o05, 0, target).word().raw();
        processor.load_program(&[hltj]);
        let (reason, detail) = processor.run();

        assert_eq!(reason, StopReason::HaltJumpExecuted);
        assert_eq!(detail.raw(), target);
        assert_eq!(
            processor.program_address_register().program_counter(),
            target
        );
    }

    #[test]
    fn auto_indexing_steps_through_memory() {
        let mut processor = basic_processor();
        let table = CODE_START + 0o400;
        for entry in 0..3 {
            processor.poke(table + entry, 0o100 + entry);
        }

        //  X1: modifier = table, increment = 1
        let mut x1 = Word36::POSITIVE_ZERO;
        x1.set_h1(1);
        x1.set_h2(table);
        processor.general_registers_mut().set(registers::X0 + 1, x1);

        //  three LA *X1 with h-bit: loads consecutive table entries
        let la = InstructionWord::from_fields(0o10, 0, 0, 1, 1, 0, 0).word().raw();
        processor.load_program(&[la, la, la, halt()]);
        processor.run();

        assert_eq!(processor.general_registers().get(registers::A0).raw(), 0o102);
        let x1 = processor.general_registers().get(registers::X0 + 1);
        assert_eq!(x1.h2(), table + 3);
    }

    #[test]
    fn grs_window_reads_registers() {
        let mut processor = basic_processor();
        //  an operand address below 0200 reads the GRS: LA A0,X5 reads
        //  the X5 register itself
        processor
            .general_registers_mut()
            .set(registers::X0 + 5, Word36::new(0o123456));
        let la = InstructionWord::from_fields_hiu(0o10, 0, 0, 0, registers::X0 + 5)
            .word()
            .raw();
        processor.load_program(&[la, halt()]);
        processor.run();

        assert_eq!(processor.general_registers().get(registers::A0).raw(), 0o123456);
    }

    #[test]
    fn grs_window_privilege_is_enforced() {
        let mut processor = basic_processor();
        processor.designator_register_mut().set_processor_privilege(3);
        //  reading an exec register from privilege 3 is a reference
        //  violation
        let la = InstructionWord::from_fields_hiu(0o10, 0, 0, 0, registers::EX0)
            .word()
            .raw();
        processor.load_program(&[la, halt()]);
        processor.step_n(3);

        assert!(matches!(
            processor.last_interrupt(),
            Some(MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::ReadAccess,
                ..
            })
        ));
    }

    #[test]
    fn sysc_rejects_unknown_subfunction() {
        let mut processor = extended_processor();
        let packet = 0o1200u64;
        let sysc = InstructionWord::from_fields_bd(0o73, 0o17, 0o12, 0, 0, 0, 0, packet)
            .word()
            .raw();
        processor.load_program(&[sysc]);
        //  leading sub-field 077 is not a defined sub-function
        let mut word = Word36::POSITIVE_ZERO;
        word.set_s1(0o77);
        processor.poke(packet, word.raw());
        processor.step_n(3);

        assert_eq!(
            processor.last_interrupt(),
            Some(MachineInterrupt::InvalidInstruction(
                InvalidInstructionReason::UndefinedFunctionCode
            ))
        );
    }

    #[test]
    fn bank_dump_and_reload() {
        let mut processor = basic_processor();
        let buffer = CODE_START + 0o500;
        //  SBUD B12 -> buffer, then LBUD B3 <- buffer
        let sbud = InstructionWord::from_fields_hiu(0o75, 0o06, 0o14, 0, buffer).word().raw();
        let lbud = InstructionWord::from_fields_hiu(0o75, 0o07, 0o03, 0, buffer).word().raw();
        processor.load_program(&[sbud, lbud, halt()]);
        processor.run();

        assert_eq!(
            processor.base_register(3),
            processor.base_register(12),
        );
    }
}
