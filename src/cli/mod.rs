//! The `sugarlisp` command-line interface.
//!
//! Reads source through the dialect machinery and prints what the reader
//! produced. Nothing is generated or evaluated.

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use crate::cli::args::{Command, SugarArgs};
use crate::dialect::{builtin, cached_dialect_names};
use crate::errors::{print_error, ErrorKind, SugarError};
use crate::runtime::options::ReaderOptions;
use crate::runtime::session::Session;

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    let args = SugarArgs::parse();
    let result = match args.command {
        Command::Read {
            file,
            json,
            dialects,
            config,
            width,
        } => handle_read(&file, json, &dialects, config.as_deref(), width),
        Command::Dialects => {
            output::print_dialects(builtin::NAMES, &cached_dialect_names());
            Ok(())
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(e);
            ExitCode::FAILURE
        }
    }
}

fn handle_read(
    file: &Path,
    json: bool,
    dialects: &[String],
    config: Option<&Path>,
    width: usize,
) -> Result<(), SugarError> {
    let options = match config {
        Some(path) => ReaderOptions::from_yaml_file(path)?,
        None => ReaderOptions::default(),
    };
    let (name, text) = read_input(file)?;
    let mut session = Session::for_text(&name, &text, options)?;
    for dialect in dialects {
        session.use_dialect(dialect)?;
    }
    let forms = session.read_all();
    output::print_warnings(session.take_warnings());
    let forms = forms?;
    if json {
        output::print_json(&forms)
    } else {
        output::print_forms(&forms, width);
        Ok(())
    }
}

fn read_input(file: &Path) -> Result<(String, String), SugarError> {
    let io_error = |e: std::io::Error| {
        SugarError::unsourced(
            ErrorKind::Io {
                path: file.display().to_string(),
                message: e.to_string(),
            },
            "input",
        )
    };
    if file == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).map_err(io_error)?;
        return Ok(("<stdin>".to_string(), text));
    }
    let text = std::fs::read_to_string(file).map_err(io_error)?;
    Ok((file.display().to_string(), text))
}
