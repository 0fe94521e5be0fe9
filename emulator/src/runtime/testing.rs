//! Shared fixtures for the runtime tests: processors wired with storage,
//! code/data banks, an interrupt control stack and a populated level-0
//! bank descriptor table.

use std::sync::Arc;

use crate::constants as C;
use crate::runtime::banks::{
    AccessInfo, AccessPermissions, BankDescriptor, BankType, BaseRegister,
};
use crate::runtime::registers;
use crate::runtime::Processor;
use crate::storage::{AbsoluteAddress, MainStorage, StorageInventory};
use crate::word::Word36;

pub const UPI: u16 = 1;

/// First relative address of the code/data bank.
pub const CODE_START: u64 = 0o1000;

const CODE_LIMIT: u64 = 0o1777;
const CODE_BASE: u64 = 0o10000;
const ICS_BASE: u64 = 0o30000;
const ICS_LIMIT: u64 = 0o377;
const BDT_BASE: u64 = 0o40000;
const BDT_LIMIT: u64 = 0o3777;
const HANDLER_BASE: u64 = 0o50000;
const HANDLER_BDI: u64 = 0o40;

fn all_access() -> AccessPermissions {
    AccessPermissions::ENTER | AccessPermissions::READ | AccessPermissions::WRITE
}

fn bank(base: u64, lower: u64, upper: u64) -> BaseRegister {
    BaseRegister {
        void_flag: false,
        large_size: false,
        base_address: AbsoluteAddress::new(UPI, 0, base),
        lower_limit_normalized: lower,
        upper_limit_normalized: upper,
        access_lock: AccessInfo::default(),
        general_permissions: all_access(),
        special_permissions: all_access(),
    }
}

fn build_processor(basic_mode: bool) -> Processor {
    let storage = Arc::new(MainStorage::new(UPI, 0o200000));

    //  interrupt vectors: every class vectors to the handler bank at
    //  level 0, BDI 040, offset 0
    let vector = Word36::new(HANDLER_BDI << 18);
    for class in 0..C::INTERRUPT_VECTOR_COUNT {
        storage
            .set(AbsoluteAddress::new(UPI, 0, BDT_BASE + class), vector)
            .unwrap();
    }

    //  the handler bank descriptor, inside the level-0 table
    let descriptor = BankDescriptor {
        bank_type_code: BankType::ExtendedMode.code(),
        general_permissions: all_access(),
        special_permissions: all_access(),
        access_lock: AccessInfo::default(),
        large_size: false,
        general_fault: false,
        lower_limit_normalized: 0,
        upper_limit_normalized: 0o777,
        base_address: AbsoluteAddress::new(UPI, 0, HANDLER_BASE),
        target_level: 0,
        target_bank_descriptor_index: 0,
    };
    for (wx, word) in descriptor.to_words().iter().enumerate() {
        storage
            .set(
                AbsoluteAddress::new(UPI, 0, BDT_BASE + HANDLER_BDI * 8 + wx as u64),
                *word,
            )
            .unwrap();
    }

    let mut inventory = StorageInventory::new();
    inventory.add(storage);

    let mut processor = Processor::new("IP0", UPI, inventory);

    if basic_mode {
        processor
            .designator_register_mut()
            .insert(registers::DesignatorRegister::BASIC_MODE);
        processor.set_base_register(12, bank(CODE_BASE, CODE_START, CODE_LIMIT));
    } else {
        processor.set_base_register(0, bank(CODE_BASE, CODE_START, CODE_LIMIT));
    }

    processor.set_base_register(C::ICS_BASE_REGISTER, bank(ICS_BASE, 0, ICS_LIMIT));
    processor.set_base_register(C::L0_BDT_BASE_REGISTER, bank(BDT_BASE, 0, BDT_LIMIT));

    //  ICS stack pointer: 16-word frames, stack top at 0200
    let mut pointer = Word36::POSITIVE_ZERO;
    pointer.set_h1(0o20);
    pointer.set_h2(0o200);
    processor
        .general_registers_mut()
        .set(C::ICS_INDEX_REGISTER, pointer);

    //  program address: handler-independent code bank, counter at start
    processor.set_program_address(Word36::new(CODE_START));

    processor.start();
    processor
}

/// A started extended-mode processor with code at [`CODE_START`].
pub fn extended_processor() -> Processor {
    build_processor(false)
}

/// A started basic-mode processor with code banked on B12.
pub fn basic_processor() -> Processor {
    build_processor(true)
}

impl Processor {
    /// Writes a program at [`CODE_START`] in the code bank.
    pub(crate) fn load_program(&mut self, words: &[u64]) {
        for (wx, word) in words.iter().enumerate() {
            self.poke(CODE_START + wx as u64, *word);
        }
    }

    /// Writes a word at a relative address of the code/data bank.
    pub(crate) fn poke(&mut self, relative_address: u64, value: u64) {
        let address = AbsoluteAddress::new(UPI, 0, CODE_BASE + relative_address - CODE_START);
        self.inventory.set(address, Word36::new(value)).unwrap();
    }

    /// Reads a word at a relative address of the code/data bank.
    pub(crate) fn peek(&self, relative_address: u64) -> Word36 {
        let address = AbsoluteAddress::new(UPI, 0, CODE_BASE + relative_address - CODE_START);
        self.inventory.get(address).unwrap()
    }

    /// Steps up to `count` cycles, stopping quietly if the processor
    /// stops first.
    pub(crate) fn step_n(&mut self, count: usize) {
        for _ in 0..count {
            if self.step().is_err() {
                break;
            }
        }
    }

    /// The six-word interrupt control stack frame at the current stack
    /// pointer.
    pub(crate) fn read_ics_frame(&self) -> [Word36; 6] {
        let pointer = registers::IndexRegister::new(
            self.general_registers().get(C::ICS_INDEX_REGISTER),
        );
        let mut frame = [Word36::POSITIVE_ZERO; 6];
        for (wx, word) in frame.iter_mut().enumerate() {
            let address = AbsoluteAddress::new(UPI, 0, ICS_BASE + pointer.xm() + wx as u64);
            *word = self.inventory.get(address).unwrap();
        }
        frame
    }

    /// The interrupt vector word for a class.
    pub(crate) fn interrupt_vector(&self, class: u64) -> Word36 {
        self.inventory
            .get(AbsoluteAddress::new(UPI, 0, BDT_BASE + class))
            .unwrap()
    }
}
