//! The instruction processor: register state, operand-address
//! resolution, interrupt delivery and the fetch-decode-execute loop.

use thiserror::Error;
use tracing::{debug, info};

use crate::constants as C;
use crate::instruction::{self, InstructionWord};
use crate::storage::{AbsoluteAddress, StorageInventory};
use crate::word::Word36;

pub mod banks;
mod exec;
pub mod functions;
pub mod interrupts;
pub mod registers;

use self::banks::{BankDescriptor, BankType, BaseRegister};
use self::interrupts::{
    AddressingExceptionReason, Deferrability, InvalidInstructionReason, MachineInterrupt,
    ReferenceViolationKind,
};
use self::registers::{
    DesignatorRegister, GeneralRegisterSet, IndexRegister, IndicatorKeyRegister,
    ProgramAddressRegister,
};

use parse_display::Display;

/// Errors surfaced to the embedder. Machine conditions never appear
/// here - they are delivered as interrupts inside the processor.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("processor is not running")]
    NotRunning,
}

/// Why the processor last stopped.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    #[default]
    Initial,
    Cleared,
    Debug,
    Development,
    Breakpoint,
    HaltJumpExecuted,
    IcsBaseRegisterInvalid,
    IcsOverflow,
    InitiateAutoRecovery,
    L0BaseRegisterInvalid,
    PanelHalt,
    InterruptHandlerHardwareFailure,
    InterruptHandlerOffsetOutOfRange,
    InterruptHandlerInvalidBankType,
    InterruptHandlerInvalidLevelBdi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Normal,
    SingleInstruction,
    SingleCycle,
}

/// Breakpoint comparison register: an absolute address and the accesses
/// that should match on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreakpointRegister {
    pub address: Option<AbsoluteAddress>,
    pub fetch: bool,
    pub read: bool,
    pub write: bool,
    pub halt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakpointComparison {
    Fetch,
    Read,
    Write,
}

/// Outcome of an operand or address step that did not produce a value:
/// either a machine interrupt to raise, or an unfinished basic-mode
/// indirect-addressing step to resume on the next cycle.
#[derive(Debug, Clone, Copy)]
pub(crate) enum OperandFault {
    Interrupt(MachineInterrupt),
    Unresolved,
}

impl From<MachineInterrupt> for OperandFault {
    fn from(interrupt: MachineInterrupt) -> Self {
        OperandFault::Interrupt(interrupt)
    }
}

pub(crate) type OperandResult<T> = Result<T, OperandFault>;

/// Order of base-register candidates for basic-mode bank search, by the
/// state of designator bit 31.
const BASE_REGISTER_CANDIDATES_FALSE: [usize; 4] = [12, 14, 13, 15];
const BASE_REGISTER_CANDIDATES_TRUE: [usize; 4] = [13, 15, 12, 14];

/// One emulated instruction processor. All state is owned here; several
/// processors may share a [`StorageInventory`].
pub struct Processor {
    name: String,
    upi: u16,
    inventory: StorageInventory,

    base_registers: [BaseRegister; C::BASE_REGISTER_COUNT],
    grs: GeneralRegisterSet,
    designator: DesignatorRegister,
    indicator_key: IndicatorKeyRegister,
    par: ProgramAddressRegister,
    current_instruction: InstructionWord,
    quantum_timer: Word36,

    pending_interrupts: Vec<MachineInterrupt>,
    last_interrupt: Option<MachineInterrupt>,
    mid_instruction: bool,
    prevent_pc_increment: bool,
    indirect_depth: u64,

    jump_history: [Word36; C::JUMP_HISTORY_TABLE_SIZE],
    jump_history_next: usize,
    jump_history_threshold_reached: bool,
    jump_history_full_interrupt_enabled: bool,

    breakpoint: BreakpointRegister,

    run_mode: RunMode,
    running: bool,
    stop_reason: StopReason,
    stop_detail: Word36,
    broadcast_interrupt_eligibility: bool,
}

impl Processor {
    #[must_use]
    pub fn new(name: impl Into<String>, upi: u16, inventory: StorageInventory) -> Self {
        Processor {
            name: name.into(),
            upi,
            inventory,
            base_registers: [BaseRegister::default(); C::BASE_REGISTER_COUNT],
            grs: GeneralRegisterSet::default(),
            designator: DesignatorRegister::default(),
            indicator_key: IndicatorKeyRegister::default(),
            par: ProgramAddressRegister::default(),
            current_instruction: InstructionWord::default(),
            quantum_timer: Word36::POSITIVE_ZERO,
            pending_interrupts: Vec::new(),
            last_interrupt: None,
            mid_instruction: false,
            prevent_pc_increment: false,
            indirect_depth: 0,
            jump_history: [Word36::POSITIVE_ZERO; C::JUMP_HISTORY_TABLE_SIZE],
            jump_history_next: 0,
            jump_history_threshold_reached: false,
            jump_history_full_interrupt_enabled: false,
            breakpoint: BreakpointRegister::default(),
            run_mode: RunMode::default(),
            running: false,
            stop_reason: StopReason::Initial,
            stop_detail: Word36::POSITIVE_ZERO,
            broadcast_interrupt_eligibility: false,
        }
    }

    //  -----------------------------------------------------------------
    //  Accessors
    //  -----------------------------------------------------------------

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn upi(&self) -> u16 {
        self.upi
    }

    #[must_use]
    pub const fn general_registers(&self) -> &GeneralRegisterSet {
        &self.grs
    }

    pub fn general_registers_mut(&mut self) -> &mut GeneralRegisterSet {
        &mut self.grs
    }

    #[must_use]
    pub const fn designator_register(&self) -> &DesignatorRegister {
        &self.designator
    }

    pub fn designator_register_mut(&mut self) -> &mut DesignatorRegister {
        &mut self.designator
    }

    #[must_use]
    pub const fn indicator_key_register(&self) -> &IndicatorKeyRegister {
        &self.indicator_key
    }

    pub fn indicator_key_register_mut(&mut self) -> &mut IndicatorKeyRegister {
        &mut self.indicator_key
    }

    /// # Panics
    ///
    /// Panics if `index` is not a valid base-register index.
    #[must_use]
    pub fn base_register(&self, index: usize) -> &BaseRegister {
        &self.base_registers[index]
    }

    /// # Panics
    ///
    /// Panics if `index` is not a valid base-register index.
    pub fn set_base_register(&mut self, index: usize, register: BaseRegister) {
        self.base_registers[index] = register;
    }

    #[must_use]
    pub const fn program_address_register(&self) -> ProgramAddressRegister {
        self.par
    }

    pub fn set_program_address(&mut self, word: Word36) {
        self.par.set_word(word);
    }

    pub fn breakpoint_register_mut(&mut self) -> &mut BreakpointRegister {
        &mut self.breakpoint
    }

    #[must_use]
    pub const fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    #[must_use]
    pub const fn stop_detail(&self) -> Word36 {
        self.stop_detail
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub const fn last_interrupt(&self) -> Option<MachineInterrupt> {
        self.last_interrupt
    }

    /// The highest-priority pending interrupt, if any.
    #[must_use]
    pub fn pending_interrupt(&self) -> Option<MachineInterrupt> {
        self.pending_interrupts
            .iter()
            .copied()
            .min_by_key(MachineInterrupt::code)
    }

    #[must_use]
    pub const fn current_instruction(&self) -> InstructionWord {
        self.current_instruction
    }

    pub fn set_run_mode(&mut self, mode: RunMode) {
        self.run_mode = mode;
    }

    pub fn set_jump_history_full_interrupt_enabled(&mut self, enabled: bool) {
        self.jump_history_full_interrupt_enabled = enabled;
    }

    pub fn set_broadcast_interrupt_eligibility(&mut self, eligible: bool) {
        self.broadcast_interrupt_eligibility = eligible;
    }

    #[must_use]
    pub const fn broadcast_interrupt_eligibility(&self) -> bool {
        self.broadcast_interrupt_eligibility
    }

    //  -----------------------------------------------------------------
    //  Start / stop
    //  -----------------------------------------------------------------

    /// External start signal: clears the stop state and resumes the
    /// fetch-decode-execute loop.
    pub fn start(&mut self) {
        info!(processor = %self.name, "starting");
        self.running = true;
        self.stop_reason = StopReason::Cleared;
        self.stop_detail = Word36::POSITIVE_ZERO;
    }

    /// Enters the terminal stopped state with a reason and detail.
    pub fn stop(&mut self, reason: StopReason, detail: Word36) {
        if self.running {
            info!(processor = %self.name, %reason, detail = %detail, "stopping");
            self.running = false;
            self.stop_reason = reason;
            self.stop_detail = detail;
        }
    }

    /// Queues an interrupt for delivery. Pending interrupts are honored
    /// in class-priority order; a second interrupt of a class already
    /// pending is absorbed into the first.
    pub fn raise_interrupt(&mut self, interrupt: MachineInterrupt) {
        debug!(processor = %self.name, %interrupt, "raising interrupt");
        if self
            .pending_interrupts
            .iter()
            .all(|pending| pending.code() != interrupt.code())
        {
            self.pending_interrupts.push(interrupt);
        }
    }

    //  -----------------------------------------------------------------
    //  The cycle
    //  -----------------------------------------------------------------

    /// Executes one processor cycle: delivers a pending interrupt,
    /// fetches an instruction, or executes (or resumes) the one in F0.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::NotRunning`] when the processor is
    /// stopped.
    pub fn step(&mut self) -> Result<(), ProcessorError> {
        if !self.running {
            return Err(ProcessorError::NotRunning);
        }

        if self.check_pending_interrupts() {
            return Ok(());
        }

        if !self.indicator_key.instruction_in_f0 {
            if let Err(interrupt) = self.fetch_instruction() {
                self.raise_interrupt(interrupt);
            }
            return Ok(());
        }

        self.execute_current_instruction();

        if self.run_mode == RunMode::SingleCycle {
            self.stop(StopReason::Debug, Word36::POSITIVE_ZERO);
        }

        Ok(())
    }

    /// Runs until the processor stops, returning the stop state.
    pub fn run(&mut self) -> (StopReason, Word36) {
        while self.step().is_ok() {}
        (self.stop_reason, self.stop_detail)
    }

    fn execute_current_instruction(&mut self) {
        self.mid_instruction = false;

        let basic = self.designator.basic_mode();
        let Some(function) = functions::lookup(self.current_instruction, basic) else {
            self.raise_interrupt(MachineInterrupt::InvalidInstruction(
                InvalidInstructionReason::UndefinedFunctionCode,
            ));
            return;
        };

        //  The privilege floor is enforced before any operand access.
        if self.designator.processor_privilege() > function.privilege_floor() {
            self.raise_interrupt(MachineInterrupt::InvalidInstruction(
                InvalidInstructionReason::InvalidProcessorPrivilege,
            ));
            return;
        }

        debug!(processor = %self.name, %function, pc = self.par.program_counter(), "executing");
        match exec::execute(function, self) {
            Ok(()) => {
                if self.prevent_pc_increment {
                    self.prevent_pc_increment = false;
                } else {
                    self.par
                        .set_program_counter(self.par.program_counter().wrapping_add(1) & 0o777777);
                }

                self.indicator_key.instruction_in_f0 = false;
                self.indirect_depth = 0;
                self.charge_quantum_timer(C::QUANTUM_TIMER_CHARGE);

                if self.run_mode == RunMode::SingleInstruction {
                    self.stop(StopReason::Debug, Word36::POSITIVE_ZERO);
                }
            }
            Err(OperandFault::Unresolved) => {
                //  A basic-mode indirect step was consumed; the
                //  instruction stays in F0 and resumes next cycle, with
                //  interrupts recognized in between.
                self.mid_instruction = true;
                self.charge_quantum_timer(1);
            }
            Err(OperandFault::Interrupt(interrupt)) => {
                self.raise_interrupt(interrupt);
            }
        }
    }

    /// Delivers or raises interrupts and pending conditions. Returns
    /// true if this cycle did something.
    fn check_pending_interrupts(&mut self) -> bool {
        //  deliver the highest-priority interrupt that may be honored
        //  now; deferrable classes wait for a between-instructions point
        //  with designator bit 13 set
        let next = self
            .pending_interrupts
            .iter()
            .enumerate()
            .filter(|(_, interrupt)| match interrupt.deferrability() {
                Deferrability::Deferrable => {
                    !self.mid_instruction
                        && self
                            .designator
                            .contains(DesignatorRegister::DEFERRABLE_INTERRUPT_ENABLED)
                }
                _ => true,
            })
            .min_by_key(|(_, interrupt)| interrupt.code())
            .map(|(slot, _)| slot);
        if let Some(slot) = next {
            let interrupt = self.pending_interrupts.remove(slot);
            self.handle_interrupt(interrupt);
            return true;
        }

        if self.indicator_key.breakpoint_match && !self.mid_instruction {
            self.indicator_key.breakpoint_match = false;
            if self.breakpoint.halt {
                self.stop(StopReason::Breakpoint, Word36::POSITIVE_ZERO);
            } else {
                self.raise_interrupt(MachineInterrupt::Breakpoint);
            }
            return true;
        }

        if self.quantum_timer.is_negative()
            && self
                .designator
                .contains(DesignatorRegister::QUANTUM_TIMER_ENABLED)
        {
            self.quantum_timer = Word36::POSITIVE_ZERO;
            self.raise_interrupt(MachineInterrupt::QuantumTimer);
            return true;
        }

        if self.indicator_key.software_break && !self.mid_instruction {
            self.indicator_key.software_break = false;
            self.raise_interrupt(MachineInterrupt::SoftwareBreak);
            return true;
        }

        if self.jump_history_threshold_reached
            && self.jump_history_full_interrupt_enabled
            && !self.mid_instruction
        {
            self.jump_history_threshold_reached = false;
            self.raise_interrupt(MachineInterrupt::JumpHistoryFull);
            return true;
        }

        false
    }

    fn charge_quantum_timer(&mut self, charge: u64) {
        if self
            .designator
            .contains(DesignatorRegister::QUANTUM_TIMER_ENABLED)
        {
            let (negated, _) = Word36::from_native(-(charge as i64));
            self.quantum_timer = self.quantum_timer.add_simple(negated);
        }
    }

    //  -----------------------------------------------------------------
    //  Instruction fetch
    //  -----------------------------------------------------------------

    fn fetch_instruction(&mut self) -> Result<(), MachineInterrupt> {
        self.mid_instruction = false;
        self.indirect_depth = 0;
        if self.designator.basic_mode() {
            self.fetch_instruction_basic()
        } else {
            self.fetch_instruction_extended()
        }
    }

    fn fetch_instruction_basic(&mut self) -> Result<(), MachineInterrupt> {
        let counter = self.par.program_counter();
        let index = self.find_basic_mode_bank(counter, true);
        if index == 0 {
            return Err(MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::StorageLimits,
                on_fetch: true,
            });
        }

        let bank = self.base_registers[index];
        if bank.large_size {
            return Err(MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::StorageLimits,
                on_fetch: true,
            });
        }

        let permissions = bank.effective_permissions(self.indicator_key.access_key);
        if !permissions.can_enter() || !permissions.can_read() {
            return Err(MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::ReadAccess,
                on_fetch: true,
            });
        }

        let address = bank.absolute_address(counter);
        self.check_breakpoint(BreakpointComparison::Fetch, address);
        let word = self.read_storage(address, true)?;
        self.current_instruction.set_word(word);
        self.indicator_key.instruction_in_f0 = true;
        Ok(())
    }

    fn fetch_instruction_extended(&mut self) -> Result<(), MachineInterrupt> {
        let bank = self.base_registers[0];
        if bank.void_flag || bank.large_size {
            return Err(MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::StorageLimits,
                on_fetch: true,
            });
        }

        //  enter permission was established when the bank was based
        let counter = self.par.program_counter();
        if !bank.contains(counter) {
            return Err(MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::StorageLimits,
                on_fetch: true,
            });
        }

        let address = bank.absolute_address(counter);
        self.check_breakpoint(BreakpointComparison::Fetch, address);
        let word = self.read_storage(address, true)?;
        self.current_instruction.set_word(word);
        self.indicator_key.instruction_in_f0 = true;
        Ok(())
    }

    //  -----------------------------------------------------------------
    //  Storage access
    //  -----------------------------------------------------------------

    fn read_storage(
        &self,
        address: AbsoluteAddress,
        on_fetch: bool,
    ) -> Result<Word36, MachineInterrupt> {
        self.inventory
            .get(address)
            .map_err(|_| MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::StorageLimits,
                on_fetch,
            })
    }

    fn write_storage(
        &self,
        address: AbsoluteAddress,
        value: Word36,
    ) -> Result<(), MachineInterrupt> {
        self.inventory
            .set(address, value)
            .map_err(|_| MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::StorageLimits,
                on_fetch: false,
            })
    }

    fn check_breakpoint(&mut self, comparison: BreakpointComparison, address: AbsoluteAddress) {
        let matched = self.breakpoint.address == Some(address)
            && match comparison {
                BreakpointComparison::Fetch => self.breakpoint.fetch,
                BreakpointComparison::Read => self.breakpoint.read,
                BreakpointComparison::Write => self.breakpoint.write,
            };
        if matched {
            self.indicator_key.breakpoint_match = true;
        }
    }

    //  -----------------------------------------------------------------
    //  Register selection helpers
    //  -----------------------------------------------------------------

    pub(crate) fn exec_or_user_a_index(&self, register: u64) -> u64 {
        register
            + if self
                .designator
                .contains(DesignatorRegister::EXEC_REGISTER_SET)
            {
                registers::EA0
            } else {
                registers::A0
            }
    }

    pub(crate) fn exec_or_user_x_index(&self, register: u64) -> u64 {
        register
            + if self
                .designator
                .contains(DesignatorRegister::EXEC_REGISTER_SET)
            {
                registers::EX0
            } else {
                registers::X0
            }
    }

    pub(crate) fn exec_or_user_r_index(&self, register: u64) -> u64 {
        register
            + if self
                .designator
                .contains(DesignatorRegister::EXEC_REGISTER_SET)
            {
                registers::ER0
            } else {
                registers::R0
            }
    }

    pub(crate) fn exec_or_user_x_register(&self, register: u64) -> IndexRegister {
        IndexRegister::new(self.grs.get(self.exec_or_user_x_index(register)))
    }

    pub(crate) fn set_exec_or_user_x_register(&mut self, register: u64, value: IndexRegister) {
        let index = self.exec_or_user_x_index(register);
        self.grs.set(index, value.word());
    }

    //  -----------------------------------------------------------------
    //  Address formation
    //  -----------------------------------------------------------------

    /// Composes the relative operand address for the current
    /// instruction: displacement plus signed index modifier. Does not
    /// modify any index register. `offset` shifts the address for the
    /// n-th word of a multi-word transfer.
    pub(crate) fn calculate_relative_address(&self, offset: u64) -> u64 {
        let xreg = match self.current_instruction.x() {
            0 => None,
            x => Some(self.exec_or_user_x_register(x)),
        };

        let (displacement, modifier) = if self.designator.basic_mode() {
            (
                self.current_instruction.u(),
                xreg.map_or(Word36::POSITIVE_ZERO, IndexRegister::signed_xm),
            )
        } else {
            let modifier = xreg.map_or(Word36::POSITIVE_ZERO, |xreg| {
                if self
                    .designator
                    .contains(DesignatorRegister::EXECUTIVE_24_BIT_INDEXING)
                    && self.designator.processor_privilege() < 2
                {
                    xreg.signed_xm24()
                } else {
                    xreg.signed_xm()
                }
            });
            (self.current_instruction.d(), modifier)
        };

        let mut result = Word36::new(displacement).add_simple(modifier);
        if offset != 0 {
            result = result.add_simple(Word36::new(offset));
        }

        result.raw() & 0o77_777777
    }

    /// Applies the index increment named by the current instruction, if
    /// its x and h fields call for one.
    pub(crate) fn increment_index_register_in_f0(&mut self) {
        if self.current_instruction.x() != 0 && self.current_instruction.h() != 0 {
            let mut xreg = self.exec_or_user_x_register(self.current_instruction.x());
            if !self.designator.basic_mode()
                && self
                    .designator
                    .contains(DesignatorRegister::EXECUTIVE_24_BIT_INDEXING)
                && self.designator.processor_privilege() < 2
            {
                xreg.increment_modifier_24();
            } else {
                xreg.increment_modifier_18();
            }
            self.set_exec_or_user_x_register(self.current_instruction.x(), xreg);
        }
    }

    /// Finds the basic-mode bank containing a relative address, honoring
    /// the candidate order selected by designator bit 31. Returns 0 when
    /// no based bank contains the address.
    fn find_basic_mode_bank(&mut self, relative_address: u64, update_selection: bool) -> usize {
        let selected = self
            .designator
            .contains(DesignatorRegister::BASIC_MODE_BASE_REGISTER_SELECTION);
        let table = if selected {
            BASE_REGISTER_CANDIDATES_TRUE
        } else {
            BASE_REGISTER_CANDIDATES_FALSE
        };

        for (position, &index) in table.iter().enumerate() {
            if self.base_registers[index].contains(relative_address) {
                if update_selection && position >= 2 {
                    //  found in the secondary pair: flip the selection
                    self.designator
                        .set(DesignatorRegister::BASIC_MODE_BASE_REGISTER_SELECTION, !selected);
                }
                return index;
            }
        }

        0
    }

    /// Locates the base register for a relative operand address, with
    /// limits and permission checks. In basic mode this is also where
    /// one indirect-addressing step is consumed: the addressed word's
    /// x/h/i/u fields replace those of the live instruction and
    /// [`OperandFault::Unresolved`] asks the caller to retry.
    pub(crate) fn find_base_register_index(
        &mut self,
        relative_address: u64,
        write_access: bool,
    ) -> OperandResult<usize> {
        if self.designator.basic_mode() {
            self.find_base_register_index_basic(relative_address, write_access)
        } else {
            self.find_base_register_index_extended(relative_address, write_access)
        }
    }

    fn find_base_register_index_basic(
        &mut self,
        relative_address: u64,
        write_access: bool,
    ) -> OperandResult<usize> {
        let index = self.find_basic_mode_bank(relative_address, false);
        if index == 0 {
            return Err(MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::StorageLimits,
                on_fetch: false,
            }
            .into());
        }

        let bank = self.base_registers[index];

        if self.current_instruction.i() != 0 {
            //  indirect addressing: chase one level, bounded
            self.indirect_depth += 1;
            if self.indirect_depth > C::MAX_INDIRECT_DEPTH {
                return Err(MachineInterrupt::AddressingException {
                    reason: AddressingExceptionReason::IndirectChainLimitExceeded,
                    level: 0,
                    bank_descriptor_index: 0,
                }
                .into());
            }

            self.increment_index_register_in_f0();

            if !bank
                .effective_permissions(self.indicator_key.access_key)
                .can_read()
            {
                return Err(MachineInterrupt::ReferenceViolation {
                    kind: ReferenceViolationKind::ReadAccess,
                    on_fetch: false,
                }
                .into());
            }

            let address = bank.absolute_address(relative_address);
            let replacement = self.read_storage(address, false)?;
            self.current_instruction.set_xhiu(replacement);
            return Err(OperandFault::Unresolved);
        }

        let permissions = bank.effective_permissions(self.indicator_key.access_key);
        let allowed = if write_access {
            permissions.can_write()
        } else {
            permissions.can_read()
        };
        if !allowed {
            return Err(MachineInterrupt::ReferenceViolation {
                kind: if write_access {
                    ReferenceViolationKind::WriteAccess
                } else {
                    ReferenceViolationKind::ReadAccess
                },
                on_fetch: false,
            }
            .into());
        }

        Ok(index)
    }

    fn find_base_register_index_extended(
        &mut self,
        relative_address: u64,
        write_access: bool,
    ) -> OperandResult<usize> {
        let index = self.effective_base_register_index();
        let bank = self.base_registers[index];
        if bank.void_flag || !bank.contains(relative_address) {
            return Err(MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::StorageLimits,
                on_fetch: false,
            }
            .into());
        }

        let permissions = bank.effective_permissions(self.indicator_key.access_key);
        let allowed = if write_access {
            permissions.can_write()
        } else {
            permissions.can_read()
        };
        if !allowed {
            return Err(MachineInterrupt::ReferenceViolation {
                kind: if write_access {
                    ReferenceViolationKind::WriteAccess
                } else {
                    ReferenceViolationKind::ReadAccess
                },
                on_fetch: false,
            }
            .into());
        }

        Ok(index)
    }

    /// The base register an extended-mode instruction names: below
    /// privilege 2 the i bit extends the b field to address B0-B31;
    /// otherwise the b field alone selects from B0-B15.
    fn effective_base_register_index(&self) -> usize {
        if self.designator.processor_privilege() < 2 {
            self.current_instruction.ib() as usize
        } else {
            self.current_instruction.b() as usize
        }
    }

    /// Whether the current operand reference lands in the GRS window:
    /// the address is below the GRS size, and either we are in basic
    /// mode or the instruction names B0.
    fn is_grs_reference(&self, relative_address: u64) -> bool {
        relative_address < registers::GRS_SIZE
            && (self.designator.basic_mode() || self.current_instruction.b() == 0)
    }

    //  -----------------------------------------------------------------
    //  Operand access
    //  -----------------------------------------------------------------

    /// The immediate operand for j = 016/017: derived from h|i|u (no
    /// indexing) or u plus the index modifier, 18 or 24 bits wide per
    /// mode, privilege and designator, sign-extended only for j = 017.
    pub(crate) fn immediate_operand(&mut self) -> Word36 {
        let exec24 = self
            .designator
            .contains(DesignatorRegister::EXECUTIVE_24_BIT_INDEXING);
        let privilege = self.designator.processor_privilege();
        let value_is_24_bits =
            (privilege < 2 && exec24) || (privilege > 1 && self.current_instruction.i() != 0);
        let extend = self.current_instruction.j() == instruction::J_XU;

        let mut value;
        if self.current_instruction.x() == 0 {
            value = self.current_instruction.hiu();
            if value == 0o777777 {
                value = 0;
            }
        } else {
            value = self.current_instruction.u();
            if value == 0o177777 {
                value = 0;
            }

            let mut xreg = self.exec_or_user_x_register(self.current_instruction.x());
            if !self.designator.basic_mode() && privilege < 2 && exec24 {
                value = Word36::new(value).add_simple(Word36::new(xreg.xm24())).raw();
                if self.current_instruction.h() != 0 {
                    xreg.increment_modifier_24();
                    self.set_exec_or_user_x_register(self.current_instruction.x(), xreg);
                }
            } else {
                value = Word36::new(value).add_simple(Word36::new(xreg.xm())).raw();
                if self.current_instruction.h() != 0 {
                    xreg.increment_modifier_18();
                    self.set_exec_or_user_x_register(self.current_instruction.x(), xreg);
                }
            }
        }

        if value_is_24_bits {
            value &= 0o77_777777;
            if extend && value & 0o40_000000 != 0 {
                value |= 0o777700_000000;
            }
        } else {
            value &= 0o777777;
            if extend && value & 0o400000 != 0 {
                value |= 0o777777_000000;
            }
        }

        Word36::new(value)
    }

    /// The relative target for the jump family. Basic-mode indirect
    /// chains resolve through the usual path; the final relative address
    /// is the new program counter candidate.
    pub(crate) fn jump_operand(&mut self) -> OperandResult<u64> {
        let relative_address = if self.designator.basic_mode() {
            let relative_address = self.calculate_relative_address(0);
            //  resolve any indirect chain; the bank lookup result is not
            //  itself needed for the jump
            self.find_base_register_index(relative_address, false)?;
            relative_address
        } else {
            //  extended-mode jumps use the full 18-bit displacement
            //  within the current code bank
            let xreg = match self.current_instruction.x() {
                0 => None,
                x => Some(self.exec_or_user_x_register(x)),
            };
            let modifier = xreg.map_or(Word36::POSITIVE_ZERO, IndexRegister::signed_xm);
            Word36::new(self.current_instruction.hiu())
                .add_simple(modifier)
                .raw()
                & 0o777777
        };

        self.increment_index_register_in_f0();
        Ok(relative_address & 0o777777)
    }

    /// The general operand read: immediate, GRS or storage, with
    /// partial-word selection by the j field.
    pub(crate) fn get_operand(
        &mut self,
        grs_destination: bool,
        grs_check: bool,
        allow_immediate: bool,
        allow_partial: bool,
    ) -> OperandResult<Word36> {
        let j = self.current_instruction.j();
        if allow_immediate && j >= instruction::J_U {
            return Ok(self.immediate_operand());
        }

        let relative_address = self.calculate_relative_address(0);

        if grs_check && self.is_grs_reference(relative_address) {
            self.increment_index_register_in_f0();

            if !GeneralRegisterSet::access_allowed(
                relative_address,
                self.designator.processor_privilege(),
                false,
            ) {
                return Err(MachineInterrupt::ReferenceViolation {
                    kind: ReferenceViolationKind::ReadAccess,
                    on_fetch: false,
                }
                .into());
            }

            //  register-to-register transfers are always full-word
            let value = self.grs.get(relative_address);
            if grs_destination || !allow_partial {
                return Ok(value);
            }
            let quarter = self
                .designator
                .contains(DesignatorRegister::QUARTER_WORD_MODE);
            return Ok(extract_partial_word(value, j, quarter));
        }

        let index = self.find_base_register_index(relative_address, false)?;
        self.increment_index_register_in_f0();

        let address = self.base_registers[index].absolute_address(relative_address);
        self.check_breakpoint(BreakpointComparison::Read, address);
        let value = self.read_storage(address, false)?;
        if allow_partial {
            let quarter = self
                .designator
                .contains(DesignatorRegister::QUARTER_WORD_MODE);
            Ok(extract_partial_word(value, j, quarter))
        } else {
            Ok(value)
        }
    }

    /// The general operand write.
    pub(crate) fn store_operand(
        &mut self,
        grs_source: bool,
        grs_check: bool,
        check_immediate: bool,
        allow_partial: bool,
        operand: Word36,
    ) -> OperandResult<()> {
        let j = self.current_instruction.j();
        if check_immediate && j >= instruction::J_U {
            //  an immediate destination discards the store
            return Ok(());
        }

        let relative_address = self.calculate_relative_address(0);

        if grs_check && self.is_grs_reference(relative_address) {
            self.increment_index_register_in_f0();

            if !GeneralRegisterSet::access_allowed(
                relative_address,
                self.designator.processor_privilege(),
                true,
            ) {
                return Err(MachineInterrupt::ReferenceViolation {
                    kind: ReferenceViolationKind::WriteAccess,
                    on_fetch: false,
                }
                .into());
            }

            if !grs_source && allow_partial {
                let quarter = self
                    .designator
                    .contains(DesignatorRegister::QUARTER_WORD_MODE);
                let original = self.grs.get(relative_address);
                self.grs
                    .set(relative_address, inject_partial_word(original, operand, j, quarter));
            } else {
                self.grs.set(relative_address, operand);
            }

            return Ok(());
        }

        let index = self.find_base_register_index(relative_address, true)?;
        self.increment_index_register_in_f0();

        let address = self.base_registers[index].absolute_address(relative_address);
        self.check_breakpoint(BreakpointComparison::Write, address);
        if allow_partial {
            let quarter = self
                .designator
                .contains(DesignatorRegister::QUARTER_WORD_MODE);
            let original = self.read_storage(address, false)?;
            self.write_storage(address, inject_partial_word(original, operand, j, quarter))?;
        } else {
            self.write_storage(address, operand)?;
        }

        Ok(())
    }

    /// Reads consecutive words for double/multiple-word transfers. The
    /// effective address is computed per word; a GRS reference wraps at
    /// the register-set boundary.
    pub(crate) fn get_consecutive_operands(
        &mut self,
        grs_check: bool,
        operands: &mut [Word36],
    ) -> OperandResult<()> {
        let relative_address = self.calculate_relative_address(0);

        if grs_check && self.is_grs_reference(relative_address) {
            self.increment_index_register_in_f0();

            let mut index = relative_address;
            for operand in operands.iter_mut() {
                if index == registers::GRS_SIZE {
                    index = 0;
                }

                if !GeneralRegisterSet::access_allowed(
                    index,
                    self.designator.processor_privilege(),
                    false,
                ) {
                    return Err(MachineInterrupt::ReferenceViolation {
                        kind: ReferenceViolationKind::ReadAccess,
                        on_fetch: false,
                    }
                    .into());
                }

                *operand = self.grs.get(index);
                index += 1;
            }

            return Ok(());
        }

        //  resolve every address first, then read
        let mut addresses = [AbsoluteAddress::default(); 4];
        assert!(operands.len() <= addresses.len());
        for (ox, slot) in addresses.iter_mut().take(operands.len()).enumerate() {
            let relative_address = if ox == 0 {
                relative_address
            } else {
                self.calculate_relative_address(ox as u64)
            };
            let index = self.find_base_register_index(relative_address, false)?;
            *slot = self.base_registers[index].absolute_address(relative_address);
        }
        self.increment_index_register_in_f0();

        for (ox, operand) in operands.iter_mut().enumerate() {
            self.check_breakpoint(BreakpointComparison::Read, addresses[ox]);
            *operand = self.read_storage(addresses[ox], false)?;
        }

        Ok(())
    }

    /// Stores consecutive words, the counterpart of
    /// [`Processor::get_consecutive_operands`].
    pub(crate) fn store_consecutive_operands(
        &mut self,
        grs_check: bool,
        operands: &[Word36],
    ) -> OperandResult<()> {
        let relative_address = self.calculate_relative_address(0);

        if grs_check && self.is_grs_reference(relative_address) {
            self.increment_index_register_in_f0();

            let mut index = relative_address;
            for operand in operands {
                if index == registers::GRS_SIZE {
                    index = 0;
                }

                if !GeneralRegisterSet::access_allowed(
                    index,
                    self.designator.processor_privilege(),
                    true,
                ) {
                    return Err(MachineInterrupt::ReferenceViolation {
                        kind: ReferenceViolationKind::WriteAccess,
                        on_fetch: false,
                    }
                    .into());
                }

                self.grs.set(index, *operand);
                index += 1;
            }

            return Ok(());
        }

        let mut addresses = [AbsoluteAddress::default(); 4];
        assert!(operands.len() <= addresses.len());
        for (ox, slot) in addresses.iter_mut().take(operands.len()).enumerate() {
            let relative_address = if ox == 0 {
                relative_address
            } else {
                self.calculate_relative_address(ox as u64)
            };
            let index = self.find_base_register_index(relative_address, true)?;
            *slot = self.base_registers[index].absolute_address(relative_address);
        }
        self.increment_index_register_in_f0();

        for (ox, operand) in operands.iter().enumerate() {
            self.check_breakpoint(BreakpointComparison::Write, addresses[ox]);
            self.write_storage(addresses[ox], *operand)?;
        }

        Ok(())
    }

    /// Read-modify-write of an operand by a signed increment, used by
    /// the f=005 family. Ones-complement by default; twos-complement
    /// when the j-field names a half/sixth partial word. Returns true
    /// when the starting or ending value is zero.
    pub(crate) fn increment_operand(
        &mut self,
        grs_check: bool,
        allow_partial: bool,
        increment: Word36,
        twos_complement: bool,
    ) -> OperandResult<bool> {
        let j = self.current_instruction.j();
        let relative_address = self.calculate_relative_address(0);

        if grs_check && self.is_grs_reference(relative_address) {
            self.increment_index_register_in_f0();

            if !GeneralRegisterSet::access_allowed(
                relative_address,
                self.designator.processor_privilege(),
                true,
            ) {
                return Err(MachineInterrupt::ReferenceViolation {
                    kind: ReferenceViolationKind::ReadAccess,
                    on_fetch: false,
                }
                .into());
            }

            let value = self.grs.get(relative_address);
            let (sum, zero) = apply_increment(value, increment, twos_complement, &mut self.designator);
            self.grs.set(relative_address, sum);
            return Ok(zero);
        }

        let index = self.find_base_register_index(relative_address, true)?;
        self.increment_index_register_in_f0();

        let address = self.base_registers[index].absolute_address(relative_address);
        self.check_breakpoint(BreakpointComparison::Read, address);
        let quarter = self
            .designator
            .contains(DesignatorRegister::QUARTER_WORD_MODE);
        let storage_value = self.read_storage(address, false)?;
        let value = if allow_partial {
            extract_partial_word(storage_value, j, quarter)
        } else {
            storage_value
        };

        let (sum, zero) = apply_increment(value, increment, twos_complement, &mut self.designator);

        let result = if allow_partial {
            inject_partial_word(storage_value, sum, j, quarter)
        } else {
            sum
        };
        self.check_breakpoint(BreakpointComparison::Write, address);
        self.write_storage(address, result)?;
        Ok(zero)
    }

    /// Atomically updates the S1 lock field of the operand word for the
    /// test-and-set family. With `set` true the lock must be clear and
    /// is set; with `set` false the reverse. A lock already in the
    /// requested state raises the test-and-set interrupt.
    pub(crate) fn test_and_store(&mut self, set: bool) -> OperandResult<()> {
        const LOCK_BIT: u64 = 0o010000_000000;

        let relative_address = self.calculate_relative_address(0);
        let index = self.find_base_register_index(relative_address, true)?;
        let address = self.base_registers[index].absolute_address(relative_address);

        self.check_breakpoint(BreakpointComparison::Read, address);
        let outcome = self
            .inventory
            .update(address, |value| {
                let locked = value & LOCK_BIT != 0;
                if locked == set {
                    None
                } else if set {
                    Some(value | LOCK_BIT)
                } else {
                    Some(value & !LOCK_BIT)
                }
            })
            .map_err(|_| MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::ReadAccess,
                on_fetch: false,
            })?;

        match outcome {
            Ok(_) => {
                self.check_breakpoint(BreakpointComparison::Write, address);
                Ok(())
            }
            Err(_) => Err(MachineInterrupt::TestAndSet {
                base_register: index as u64,
                relative_address,
            }
            .into()),
        }
    }

    //  -----------------------------------------------------------------
    //  Jumps
    //  -----------------------------------------------------------------

    /// Loads the program counter for a taken jump and suppresses the
    /// automatic increment.
    pub(crate) fn jump_to(&mut self, counter: u64) {
        self.create_jump_history_entry(self.par.word());
        self.par.set_program_counter(counter);
        self.prevent_pc_increment = true;
    }

    pub(crate) fn skip_next_instruction(&mut self) {
        self.par
            .set_program_counter((self.par.program_counter() + 1) & 0o777777);
    }

    fn create_jump_history_entry(&mut self, value: Word36) {
        self.jump_history[self.jump_history_next] = value;
        self.jump_history_next += 1;

        if self.jump_history_next > C::JUMP_HISTORY_TABLE_THRESHOLD {
            self.jump_history_threshold_reached = true;
        }

        if self.jump_history_next == C::JUMP_HISTORY_TABLE_SIZE {
            self.jump_history_next = 0;
        }
    }

    //  -----------------------------------------------------------------
    //  Bank descriptors
    //  -----------------------------------------------------------------

    /// Reads the bank descriptor at (level, BDI) from the descriptor
    /// table based on B16+level.
    pub(crate) fn find_bank_descriptor(
        &self,
        level: u64,
        bank_descriptor_index: u64,
    ) -> Result<BankDescriptor, MachineInterrupt> {
        let fatal = MachineInterrupt::AddressingException {
            reason: AddressingExceptionReason::FatalAddressingException,
            level,
            bank_descriptor_index,
        };

        if level > 7 {
            return Err(fatal);
        }

        let table_bank = self.base_registers[C::L0_BDT_BASE_REGISTER + level as usize];
        if table_bank.void_flag {
            return Err(fatal);
        }

        let offset = table_bank.lower_limit_normalized
            + bank_descriptor_index * banks::BANK_DESCRIPTOR_WORDS;
        if !table_bank.contains(offset + banks::BANK_DESCRIPTOR_WORDS - 1) {
            return Err(fatal);
        }

        let mut words = [Word36::POSITIVE_ZERO; banks::BANK_DESCRIPTOR_WORDS as usize];
        for (wx, word) in words.iter_mut().enumerate() {
            *word = self.read_storage(
                table_bank.absolute_address(offset + wx as u64),
                false,
            )?;
        }

        Ok(BankDescriptor::from_words(words))
    }

    //  -----------------------------------------------------------------
    //  Interrupt delivery
    //  -----------------------------------------------------------------

    /// Delivers one interrupt: pushes the interrupt control stack frame,
    /// records the jump, vectors the program address register through
    /// the level-0 descriptor-table bank and bases B0 on the handler
    /// bank. Failures stop the processor.
    fn handle_interrupt(&mut self, interrupt: MachineInterrupt) {
        info!(processor = %self.name, %interrupt, "delivering interrupt");
        self.last_interrupt = Some(interrupt);

        self.indicator_key.short_status = interrupt.short_status();
        self.indicator_key.interrupt_class = interrupt.code() as u8;

        let ics = self.base_registers[C::ICS_BASE_REGISTER];
        if ics.void_flag {
            self.stop(StopReason::IcsBaseRegisterInvalid, Word36::POSITIVE_ZERO);
            return;
        }

        //  acquire a stack frame through the ICS stack pointer
        let mut stack_pointer = IndexRegister::new(self.grs.get(C::ICS_INDEX_REGISTER));
        stack_pointer.decrement_modifier_18();
        self.grs.set(C::ICS_INDEX_REGISTER, stack_pointer.word());

        let frame_offset = stack_pointer.xm();
        let frame_limit = frame_offset + stack_pointer.xi();
        if frame_offset < ics.lower_limit_normalized
            || frame_limit == frame_offset
            || frame_limit - 1 > ics.upper_limit_normalized
        {
            self.stop(StopReason::IcsOverflow, Word36::POSITIVE_ZERO);
            return;
        }

        let frame = [
            self.par.word(),
            self.designator.word(),
            self.indicator_key.word(),
            self.quantum_timer,
            interrupt.status_word_0(),
            interrupt.status_word_1(),
        ];
        for (wx, word) in frame.iter().enumerate() {
            let address = ics.absolute_address(frame_offset + wx as u64);
            if self.write_storage(address, *word).is_err() {
                self.stop(StopReason::IcsBaseRegisterInvalid, Word36::POSITIVE_ZERO);
                return;
            }
        }

        self.create_jump_history_entry(self.par.word());

        //  vector: word [class] of the bank based on B16
        let vector_bank = self.base_registers[C::L0_BDT_BASE_REGISTER];
        if vector_bank.void_flag {
            self.stop(StopReason::L0BaseRegisterInvalid, Word36::POSITIVE_ZERO);
            return;
        }
        let vector_offset = vector_bank.lower_limit_normalized + interrupt.code();
        if !vector_bank.contains(vector_offset) {
            self.stop(
                StopReason::InterruptHandlerOffsetOutOfRange,
                Word36::POSITIVE_ZERO,
            );
            return;
        }
        let Ok(vector) = self.read_storage(vector_bank.absolute_address(vector_offset), false)
        else {
            self.stop(StopReason::L0BaseRegisterInvalid, Word36::POSITIVE_ZERO);
            return;
        };
        self.par.set_word(vector);

        //  reset the designator for handler entry
        let fault_handling = self
            .designator
            .contains(DesignatorRegister::FAULT_HANDLING_IN_PROGRESS);
        self.designator.clear();
        self.designator.insert(
            DesignatorRegister::EXEC_REGISTER_SET
                | DesignatorRegister::ARITHMETIC_EXCEPTION_ENABLED,
        );
        self.designator
            .set(DesignatorRegister::FAULT_HANDLING_IN_PROGRESS, fault_handling);

        if interrupt == MachineInterrupt::HardwareCheck {
            if fault_handling {
                self.stop(
                    StopReason::InterruptHandlerHardwareFailure,
                    Word36::POSITIVE_ZERO,
                );
                return;
            }
            self.designator
                .insert(DesignatorRegister::FAULT_HANDLING_IN_PROGRESS);
        }

        self.indicator_key.clear();
        self.current_instruction.clear();
        self.mid_instruction = false;
        self.indirect_depth = 0;
        self.prevent_pc_increment = false;

        //  base the handler bank named by the new PAR on B0
        let level = self.par.level();
        let bank_descriptor_index = self.par.bank_descriptor_index();
        if level == 0 && bank_descriptor_index < 32 {
            self.stop(
                StopReason::InterruptHandlerInvalidLevelBdi,
                Word36::POSITIVE_ZERO,
            );
            return;
        }

        let Ok(descriptor) = self.find_bank_descriptor(level, bank_descriptor_index) else {
            self.stop(
                StopReason::InterruptHandlerInvalidLevelBdi,
                Word36::POSITIVE_ZERO,
            );
            return;
        };

        if descriptor.bank_type() != BankType::ExtendedMode {
            self.stop(
                StopReason::InterruptHandlerInvalidBankType,
                Word36::POSITIVE_ZERO,
            );
            return;
        }

        self.base_registers[0] = descriptor.base_register();
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Processor {{ name: {:?}, upi: {:03o}, par: {}, running: {} }}",
            self.name, self.upi, self.par, self.running
        )
    }
}

//  ---------------------------------------------------------------------
//  Partial-word access
//  ---------------------------------------------------------------------

/// Extracts the partial word named by a j-field designator, honoring
/// quarter-word mode for the dual designators 4-7.
#[must_use]
pub(crate) fn extract_partial_word(value: Word36, j_field: u64, quarter_word_mode: bool) -> Word36 {
    use crate::instruction as iw;

    Word36::new(match j_field {
        iw::J_W => value.raw(),
        iw::J_H2 => value.h2(),
        iw::J_H1 => value.h1(),
        iw::J_XH2 => value.xh2(),
        iw::J_XH1 => {
            if quarter_word_mode {
                value.q2()
            } else {
                value.xh1()
            }
        }
        iw::J_T3 => {
            if quarter_word_mode {
                value.q4()
            } else {
                value.xt3()
            }
        }
        iw::J_T2 => {
            if quarter_word_mode {
                value.q3()
            } else {
                value.xt2()
            }
        }
        iw::J_T1 => {
            if quarter_word_mode {
                value.q1()
            } else {
                value.xt1()
            }
        }
        iw::J_S6 => value.s6(),
        iw::J_S5 => value.s5(),
        iw::J_S4 => value.s4(),
        iw::J_S3 => value.s3(),
        iw::J_S2 => value.s2(),
        iw::J_S1 => value.s1(),
        _ => value.raw(),
    })
}

/// Replaces the partial word named by a j-field designator, the inverse
/// of [`extract_partial_word`].
#[must_use]
pub(crate) fn inject_partial_word(
    original: Word36,
    new_value: Word36,
    j_field: u64,
    quarter_word_mode: bool,
) -> Word36 {
    use crate::instruction as iw;

    let mut result = original;
    match j_field {
        iw::J_W => result = new_value,
        iw::J_H2 | iw::J_XH2 => result.set_h2(new_value.raw()),
        iw::J_H1 => result.set_h1(new_value.raw()),
        iw::J_XH1 => {
            if quarter_word_mode {
                result.set_q2(new_value.raw());
            } else {
                result.set_h1(new_value.raw());
            }
        }
        iw::J_T3 => {
            if quarter_word_mode {
                result.set_q4(new_value.raw());
            } else {
                result.set_t3(new_value.raw());
            }
        }
        iw::J_T2 => {
            if quarter_word_mode {
                result.set_q3(new_value.raw());
            } else {
                result.set_t2(new_value.raw());
            }
        }
        iw::J_T1 => {
            if quarter_word_mode {
                result.set_q1(new_value.raw());
            } else {
                result.set_t1(new_value.raw());
            }
        }
        iw::J_S6 => result.set_s6(new_value.raw()),
        iw::J_S5 => result.set_s5(new_value.raw()),
        iw::J_S4 => result.set_s4(new_value.raw()),
        iw::J_S3 => result.set_s3(new_value.raw()),
        iw::J_S2 => result.set_s2(new_value.raw()),
        iw::J_S1 => result.set_s1(new_value.raw()),
        _ => {}
    }
    result
}

/// Adds an increment to a value, ones- or twos-complement, maintaining
/// the carry/overflow designators. Returns the sum and whether either
/// the original or the sum is zero.
fn apply_increment(
    value: Word36,
    increment: Word36,
    twos_complement: bool,
    designator: &mut DesignatorRegister,
) -> (Word36, bool) {
    if twos_complement {
        let mut zero = value.raw() == 0;
        let sum = Word36::new(value.raw().wrapping_add(increment.to_native() as u64));
        zero |= sum.raw() == 0;
        designator.remove(DesignatorRegister::CARRY | DesignatorRegister::OVERFLOW);
        (sum, zero)
    } else {
        let mut zero = value.is_zero();
        let (sum, flags) = value.add(increment);
        zero |= sum.is_zero();
        designator.set(DesignatorRegister::CARRY, flags.carry);
        designator.set(DesignatorRegister::OVERFLOW, flags.overflow);
        (sum, zero)
    }
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use super::testing::{basic_processor, extended_processor, CODE_START};
    use super::*;
    use crate::runtime::interrupts::InvalidInstructionReason;

    #[test]
    fn partial_word_round_trips() {
        use crate::instruction as iw;

        let original = Word36::new(0o123456_701234);
        for j in [
            iw::J_W,
            iw::J_H1,
            iw::J_H2,
            iw::J_T1,
            iw::J_T2,
            iw::J_T3,
            iw::J_S1,
            iw::J_S2,
            iw::J_S3,
            iw::J_S4,
            iw::J_S5,
            iw::J_S6,
        ] {
            for quarter in [false, true] {
                let injected = inject_partial_word(original, Word36::new(0o33), j, quarter);
                let extracted = extract_partial_word(injected, j, quarter);
                //  sign-extended reads still carry the written field
                assert_eq!(extracted.raw() & 0o77, 0o33, "j {j:o} quarter {quarter}");
            }
        }
    }

    #[test]
    fn sign_extending_extract() {
        use crate::instruction as iw;

        let value = Word36::new(0o4765_0000_3765);
        assert_eq!(
            extract_partial_word(value, iw::J_T1, false).raw(),
            0o777777_774765
        );
        assert_eq!(extract_partial_word(value, iw::J_T3, false).raw(), 0o3765);
        //  quarter-word mode reads the same bits unsigned
        assert_eq!(extract_partial_word(value, iw::J_T1, true).raw(), 0o476);
    }

    #[test]
    fn stopped_processor_reports_not_running() {
        let mut processor = extended_processor();
        processor.stop(StopReason::PanelHalt, Word36::POSITIVE_ZERO);
        assert_eq!(processor.step(), Err(ProcessorError::NotRunning));
    }

    #[test]
    fn undefined_function_code_interrupts() {
        let mut processor = extended_processor();
        //  f = 00 is unassigned
        processor.load_program(&[0]);
        processor.step_n(3);

        assert_eq!(
            processor.last_interrupt(),
            Some(MachineInterrupt::InvalidInstruction(
                InvalidInstructionReason::UndefinedFunctionCode
            ))
        );
    }

    #[test]
    fn fetch_outside_banks_raises_reference_violation() {
        let mut processor = basic_processor();
        let mut par = processor.program_address_register().word();
        par.set_h2(0o770000);
        processor.set_program_address(par);

        processor.step().unwrap();
        assert!(matches!(
            processor.pending_interrupt(),
            Some(MachineInterrupt::ReferenceViolation {
                kind: ReferenceViolationKind::StorageLimits,
                on_fetch: true,
            })
        ));
    }

    #[test]
    fn indirect_chain_is_bounded() {
        let mut processor = basic_processor();
        //  LA A0,*X,U where the target word points back at itself
        let target = CODE_START + 0o100;
        let la = crate::instruction::InstructionWord::from_fields(
            0o10, 0, 0, 0, 0, 1, target,
        );
        processor.load_program(&[la.word().raw()]);
        //  the indirect word chains to itself
        processor.poke(target, (1 << 16) | target);

        //  resolve until the chain bound trips
        processor.step_n(3 + C::MAX_INDIRECT_DEPTH as usize);

        assert_eq!(
            processor.last_interrupt(),
            Some(MachineInterrupt::AddressingException {
                reason: AddressingExceptionReason::IndirectChainLimitExceeded,
                level: 0,
                bank_descriptor_index: 0,
            })
        );
    }

    #[test]
    fn interrupt_priority_delivers_highest_first() {
        let mut processor = extended_processor();
        processor
            .designator_register_mut()
            .insert(DesignatorRegister::DEFERRABLE_INTERRUPT_ENABLED);

        processor.raise_interrupt(MachineInterrupt::Dayclock);
        processor.raise_interrupt(MachineInterrupt::Breakpoint);

        //  the higher-priority (lower code) interrupt is next up
        assert_eq!(
            processor.pending_interrupt(),
            Some(MachineInterrupt::Breakpoint)
        );

        processor.step().unwrap();
        assert_eq!(processor.last_interrupt(), Some(MachineInterrupt::Breakpoint));

        //  the lower-priority interrupt is still queued (delivery
        //  cleared designator bit 13, so it stays deferred)
        assert_eq!(processor.pending_interrupt(), Some(MachineInterrupt::Dayclock));
    }

    #[test]
    fn interrupt_delivery_pushes_ics_frame_and_vectors() {
        let mut processor = extended_processor();
        processor
            .designator_register_mut()
            .insert(DesignatorRegister::DEFERRABLE_INTERRUPT_ENABLED);
        let par_before = processor.program_address_register().word();

        processor.raise_interrupt(MachineInterrupt::SoftwareBreak);
        processor.step().unwrap();

        //  the frame went to the ICS bank at the decremented pointer
        let frame = processor.read_ics_frame();
        assert_eq!(frame[0], par_before);

        //  PAR was loaded from the vector for class 030
        assert_eq!(
            processor.program_address_register().word(),
            processor.interrupt_vector(0o30)
        );

        //  handler entry state
        assert!(processor
            .designator_register()
            .contains(DesignatorRegister::EXEC_REGISTER_SET));
        assert!(!processor.designator_register().basic_mode());
        assert!(!processor.base_register(0).void_flag);
    }

    #[test]
    fn ics_void_stops_processor() {
        let mut processor = extended_processor();
        processor.set_base_register(C::ICS_BASE_REGISTER, BaseRegister::default());
        processor.raise_interrupt(MachineInterrupt::HardwareDefault);
        processor.step().unwrap();

        assert!(!processor.is_running());
        assert_eq!(processor.stop_reason(), StopReason::IcsBaseRegisterInvalid);
    }
}
