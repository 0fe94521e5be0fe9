use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueHint};
use tracing::info;

use dorado_emulator::instruction::{interpret, InstructionWord};
use dorado_emulator::loader::Image;

#[derive(Parser, Debug)]
pub struct DumpOpt {
    /// Input word-image file
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Disassemble with extended-mode field semantics
    #[clap(short = 'x', long, action = ArgAction::SetTrue)]
    extended: bool,
}

impl DumpOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        info!(path = ?self.input, "Reading image");
        let source = std::fs::read_to_string(&self.input)
            .with_context(|| format!("could not read {}", self.input.display()))?;
        let image = Image::parse(&source).context("could not parse image")?;

        for (address, word) in &image.words {
            let rendered = interpret(InstructionWord::new(*word), !self.extended, false);
            println!("{address:06o}  {word}  {rendered}");
        }

        Ok(())
    }
}
