//! Word-image loading.
//!
//! An image file carries already-assembled 36-bit words, one per line,
//! as `address: value` in octal. `#` starts a comment. The loader banks
//! the image into fresh main storage and wires the conventional system
//! banks (interrupt control stack, level-0 descriptor table) so the
//! processor can deliver interrupts from the first cycle.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::constants as C;
use crate::runtime::banks::{
    AccessInfo, AccessPermissions, BankDescriptor, BankType, BaseRegister,
};
use crate::runtime::Processor;
use crate::storage::{AbsoluteAddress, MainStorage, StorageInventory};
use crate::word::{Word36, BIT_MASK};

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("line {line}: expected `address: value`")]
    MalformedLine { line: usize },

    #[error("line {line}: invalid octal field {field:?}")]
    InvalidOctal { line: usize, field: String },

    #[error("line {line}: word {value:o} exceeds 36 bits")]
    WordTooWide { line: usize, value: u64 },

    #[error("address {address:o} is below the program bank (lower limit {PROGRAM_LOWER_LIMIT:o})")]
    AddressOutOfRange { address: u64 },

    #[error("image is empty")]
    Empty,
}

/// A parsed word image: relative addresses and their contents.
#[derive(Debug, Clone, Default)]
pub struct Image {
    pub words: Vec<(u64, Word36)>,
}

impl Image {
    /// Parses the `address: value` text form.
    ///
    /// # Errors
    ///
    /// Returns an [`ImageError`] describing the first malformed line.
    pub fn parse(source: &str) -> Result<Image, ImageError> {
        let mut words = Vec::new();

        for (index, raw_line) in source.lines().enumerate() {
            let line = index + 1;
            let text = raw_line.split('#').next().unwrap_or("").trim();
            if text.is_empty() {
                continue;
            }

            let (address_text, value_text) = text
                .split_once(':')
                .ok_or(ImageError::MalformedLine { line })?;

            let address = parse_octal(address_text.trim(), line)?;
            let value = parse_octal(value_text.trim(), line)?;
            if value > BIT_MASK {
                return Err(ImageError::WordTooWide { line, value });
            }

            words.push((address & 0o777777, Word36::new(value)));
        }

        Ok(Image { words })
    }

    /// Lowest populated address, the default entry point.
    #[must_use]
    pub fn first_address(&self) -> Option<u64> {
        self.words.iter().map(|&(address, _)| address).min()
    }

    /// Highest populated address.
    #[must_use]
    pub fn last_address(&self) -> Option<u64> {
        self.words.iter().map(|&(address, _)| address).max()
    }
}

fn parse_octal(field: &str, line: usize) -> Result<u64, ImageError> {
    let digits = field.strip_prefix("0o").unwrap_or(field);
    u64::from_str_radix(digits, 8).map_err(|_| ImageError::InvalidOctal {
        line,
        field: field.to_owned(),
    })
}

//  Conventional absolute layout of the booted machine.
const PROGRAM_BASE: u64 = 0o100000;
const ICS_BASE: u64 = 0o30000;
const ICS_SIZE: u64 = 0o400;
const ICS_FRAME_SIZE: u64 = 0o20;
const BDT_BASE: u64 = 0o40000;
const BDT_SIZE: u64 = 0o4000;
const HANDLER_BASE: u64 = 0o50000;
const HANDLER_SIZE: u64 = 0o1000;
const HANDLER_BDI: u64 = 0o40;

/// Lowest relative address a program bank may occupy; below it lies the
/// GRS window.
pub const PROGRAM_LOWER_LIMIT: u64 = 0o200;

fn all_access() -> AccessPermissions {
    AccessPermissions::ENTER | AccessPermissions::READ | AccessPermissions::WRITE
}

fn bank(base: u64, lower: u64, upper: u64) -> BaseRegister {
    BaseRegister {
        void_flag: false,
        large_size: false,
        base_address: AbsoluteAddress::new(0, 0, base),
        lower_limit_normalized: lower,
        upper_limit_normalized: upper,
        access_lock: AccessInfo::default(),
        general_permissions: all_access(),
        special_permissions: all_access(),
    }
}

/// Builds a started basic-mode processor with the image banked on B12
/// and the program counter at `entry`.
///
/// # Errors
///
/// Returns [`ImageError::Empty`] for an image with no words.
pub fn boot(image: &Image, entry: Option<u64>) -> Result<Processor, ImageError> {
    let first = image.first_address().ok_or(ImageError::Empty)?;
    let last = image.last_address().unwrap_or(first);
    let entry = entry.unwrap_or(first);

    let lower = PROGRAM_LOWER_LIMIT;
    if first < lower {
        return Err(ImageError::AddressOutOfRange { address: first });
    }
    let upper = (last | 0o777).max(entry);
    let storage_size = PROGRAM_BASE + (upper - lower) + 1;
    let storage = Arc::new(MainStorage::new(0, storage_size as usize));

    debug!(words = image.words.len(), entry, "banking image");
    for &(address, value) in &image.words {
        let absolute = AbsoluteAddress::new(0, 0, PROGRAM_BASE + address - lower);
        storage.set(absolute, value).expect("image fits its bank");
    }

    //  interrupt vectors: all classes share one handler bank for the
    //  embedder to fill in
    let vector = Word36::new(HANDLER_BDI << 18);
    for class in 0..C::INTERRUPT_VECTOR_COUNT {
        storage
            .set(AbsoluteAddress::new(0, 0, BDT_BASE + class), vector)
            .expect("vector area fits");
    }

    let descriptor = BankDescriptor {
        bank_type_code: BankType::ExtendedMode.code(),
        general_permissions: all_access(),
        special_permissions: all_access(),
        access_lock: AccessInfo::default(),
        large_size: false,
        general_fault: false,
        lower_limit_normalized: 0,
        upper_limit_normalized: HANDLER_SIZE - 1,
        base_address: AbsoluteAddress::new(0, 0, HANDLER_BASE),
        target_level: 0,
        target_bank_descriptor_index: 0,
    };
    for (wx, word) in descriptor.to_words().iter().enumerate() {
        storage
            .set(
                AbsoluteAddress::new(0, 0, BDT_BASE + HANDLER_BDI * 8 + wx as u64),
                *word,
            )
            .expect("descriptor fits");
    }

    let mut inventory = StorageInventory::new();
    inventory.add(storage);

    let mut processor = Processor::new("IP0", 0, inventory);
    processor
        .designator_register_mut()
        .insert(crate::runtime::registers::DesignatorRegister::BASIC_MODE);

    processor.set_base_register(12, bank(PROGRAM_BASE, lower, upper));
    processor.set_base_register(C::ICS_BASE_REGISTER, bank(ICS_BASE, 0, ICS_SIZE - 1));
    processor.set_base_register(C::L0_BDT_BASE_REGISTER, bank(BDT_BASE, 0, BDT_SIZE - 1));

    let mut pointer = Word36::POSITIVE_ZERO;
    pointer.set_h1(ICS_FRAME_SIZE);
    pointer.set_h2(ICS_SIZE - ICS_FRAME_SIZE);
    processor
        .general_registers_mut()
        .set(C::ICS_INDEX_REGISTER, pointer);

    processor.set_program_address(Word36::new(entry));
    processor.start();
    Ok(processor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_addresses_and_comments() {
        let image = Image::parse(
            "# a tiny image\n\
             01000: 107120001000\n\
             01001: 0o777760000000  # HALT\n\
             \n",
        )
        .unwrap();

        assert_eq!(image.words.len(), 2);
        assert_eq!(image.first_address(), Some(0o1000));
        assert_eq!(image.words[0].1.raw(), 0o107120_001000);
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(matches!(
            Image::parse("01000 107120001000"),
            Err(ImageError::MalformedLine { line: 1 })
        ));
        assert!(matches!(
            Image::parse("01000: 9999"),
            Err(ImageError::InvalidOctal { line: 1, .. })
        ));
        assert!(matches!(
            Image::parse("01000: 7777777777777"),
            Err(ImageError::WordTooWide { line: 1, .. })
        ));
    }

    #[test]
    fn boots_and_runs_an_image() {
        use crate::instruction::InstructionWord;
        use crate::runtime::{registers, StopReason};

        //  LA,U A5,01000 then HALT
        let la = InstructionWord::from_fields_hiu(0o10, 0o16, 5, 0, 0o1000).word();
        let halt = InstructionWord::from_fields_hiu(0o77, 0o17, 0o17, 0, 0).word();
        let source = format!("01000: {la}\n01001: {halt}\n");

        let image = Image::parse(&source).unwrap();
        let mut processor = boot(&image, None).unwrap();
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
    fn empty_image_is_an_error() {
        let image = Image::parse("# nothing\n").unwrap();
        assert!(matches!(boot(&image, None), Err(ImageError::Empty)));
    }
}
