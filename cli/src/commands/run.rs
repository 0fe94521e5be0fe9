use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueHint};
use tracing::{debug, info};

use dorado_emulator::loader::{boot, Image};
use dorado_emulator::runtime::registers;

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Input word-image file
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Entry point (octal); defaults to the image's first address
    #[clap(short, long, value_parser = parse_octal)]
    entry: Option<u64>,

    /// Print the register file after the run
    #[clap(short, long)]
    registers: bool,
}

fn parse_octal(field: &str) -> Result<u64, String> {
    u64::from_str_radix(field.trim_start_matches("0o"), 8)
        .map_err(|e| format!("invalid octal value: {e}"))
}

impl RunOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        info!(path = ?self.input, "Reading image");
        let source = std::fs::read_to_string(&self.input)
            .with_context(|| format!("could not read {}", self.input.display()))?;
        let image = Image::parse(&source).context("could not parse image")?;

        debug!(words = image.words.len(), "Booting processor");
        let mut processor = boot(&image, self.entry).context("could not boot image")?;

        info!("Running");
        let (reason, detail) = processor.run();

        let counter = format!(
            "{:06o}",
            processor.program_address_register().program_counter()
        );
        info!(%reason, detail = %detail, pc = %counter, "Processor stopped");

        if let Some(interrupt) = processor.last_interrupt() {
            info!(%interrupt, "Last interrupt delivered");
        }

        if self.registers {
            for register in 0..16 {
                println!(
                    "A{register:<2} {}   X{register:<2} {}   R{register:<2} {}",
                    processor.general_registers().get(registers::A0 + register),
                    processor.general_registers().get(registers::X0 + register),
                    processor.general_registers().get(registers::R0 + register),
                );
            }
        }

        Ok(())
    }
}
