use std::{fs, iter, path::Path};

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::{
    commandline::{BackendOptions, Operation, Options},
    error::PositionalError,
};

mod ast;
mod codegen;
mod commandline;
mod error;
mod il;
mod lexer;
mod listing;
mod parser;
mod span;
mod type_checking;

fn main() -> Result<()> {
    let options = Options::parse();

    stderrlog::new()
        .verbosity(options.verbose)
        .init()
        .context("Failed to initialise logging")?;

    match options.operation {
        Operation::Check { file } => check(&file),
        Operation::Compile { file, backend } => compile(&file, &backend),
    }
}

fn check(file: &Path) -> Result<()> {
    let source = read_source(file)?;
    front_end(&source)?;
    println!("No errors found in {}", file.display());
    Ok(())
}

fn compile(file: &Path, backend: &BackendOptions) -> Result<()> {
    let source = read_source(file)?;
    let program = front_end(&source)?;

    let mut tac = il::generate(&program);
    if backend.optimise() {
        tac = il::optimise(tac);
    }

    let listing = if backend.emit_tac {
        tac.to_string()
    } else {
        codegen::compile(&tac).to_string()
    };

    match &backend.output {
        Some(path) => fs::write(path, listing)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{}", listing),
    }
    Ok(())
}

/// Run the lexer, parser and type checker, describing every error
/// against the source text.
fn front_end(source: &str) -> Result<ast::Program> {
    let tokens = match lexer::lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => bail!(describe_all(&errors, source, "lexical")),
    };

    let program = match parser::parse(&tokens) {
        Ok(program) => program,
        Err(error) => bail!(describe_all(&[error], source, "syntax")),
    };

    if let Err(errors) = type_checking::verify_well_typed(&program) {
        bail!(describe_all(&errors, source, "type"));
    }

    Ok(program)
}

fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn describe_all<E: PositionalError>(errors: &[E], source: &str, stage: &str) -> String {
    for error in errors {
        describe_error(error, source);
    }
    format!(
        "{} {} error{} found",
        errors.len(),
        stage,
        if errors.len() == 1 { "" } else { "s" }
    )
}

/// Print an error with the offending source line and a caret marker.
fn describe_error<E: PositionalError>(error: &E, source: &str) {
    let (line_no, line_start, error_line) = find_line(source, error.range().start());
    let padding = error.range().start() - line_start;

    fn pad_char(ch: char, times: usize) -> String {
        iter::repeat(ch).take(times).collect()
    }

    let gutter = format!("{}", line_no);

    eprintln!("{}| {}", gutter, error_line);
    eprintln!(
        "{}| {}{}--- {}",
        pad_char(' ', gutter.len()),
        pad_char(' ', padding),
        pad_char('^', error.length().max(1)),
        error.describe()
    );
}

fn find_line(source: &str, target_position: usize) -> (usize, usize, &str) {
    let lines = source.split_inclusive(|c| c == '\n' || c == '\r');
    let mut position = 0usize;
    for (line_idx, line) in lines.enumerate() {
        let end_position = position + line.len();
        if target_position >= position && target_position <= end_position {
            return (line_idx + 1, position, line.trim_end());
        }
        position = end_position;
    }

    (1, 0, "")
}
