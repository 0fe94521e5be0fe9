mod completion;
mod dump;
mod run;

#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Load a word image and run it to a stop
    Run(self::run::RunOpt),

    /// Disassemble a word image
    Dump(self::dump::DumpOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Subcommand::Run(opt) => opt.exec(),
            Subcommand::Dump(opt) => opt.exec(),
            Subcommand::Completion(opt) => opt.exec(),
        }
    }
}
