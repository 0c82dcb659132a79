use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(about = "A compiler for a miniature C-like language")]
pub struct Options {
    #[clap(subcommand)]
    pub operation: Operation,
    #[clap(short, long, default_value_t = 1)]
    pub verbose: usize,
}

#[derive(Debug, Subcommand)]
pub enum Operation {
    /// Check a program for errors
    Check { file: PathBuf },
    /// Compile a program
    Compile {
        file: PathBuf,
        #[clap(flatten)]
        backend: BackendOptions,
    },
}

#[derive(Debug, Args)]
pub struct BackendOptions {
    /// Do not optimise the generated code
    #[clap(short, long)]
    no_optimise: bool,
    /// Print the intermediate code instead of assembly
    #[clap(long)]
    pub emit_tac: bool,
    /// Write the listing to a file instead of stdout
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

impl BackendOptions {
    pub fn optimise(&self) -> bool {
        !self.no_optimise
    }
}
