//! Command-line arguments for the `sugarlisp` inspection tool.
//!
//! Uses `clap` derive, one variant per subcommand.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "sugarlisp",
    version,
    about = "Reads SugarLisp source through its dialects and prints the forms."
)]
pub struct SugarArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read a file and print its top-level forms.
    Read {
        /// Source file, or `-` for standard input.
        #[arg(required = true)]
        file: PathBuf,
        /// Print the forms as JSON instead of text.
        #[arg(long)]
        json: bool,
        /// Activate a dialect before reading. May be repeated.
        #[arg(long = "use", value_name = "DIALECT")]
        dialects: Vec<String>,
        /// Reader options as YAML.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Break lists longer than this many columns.
        #[arg(long, default_value_t = 80)]
        width: usize,
    },
    /// List the dialects the built-in loader provides.
    Dialects,
}
