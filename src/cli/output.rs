//! User-facing output for the CLI: forms, warnings and dialect listings.
//! Forms go to stdout; warnings and headings go to stderr.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::ast::Form;
use crate::errors::{ErrorKind, SugarError, Warning};

/// Prints each form on its own, wrapped at `width` columns.
pub fn print_forms(forms: &[Form], width: usize) {
    for form in forms {
        println!("{}", form.pretty_indented(width));
    }
}

/// Prints the forms as one JSON array.
pub fn print_json(forms: &[Form]) -> Result<(), SugarError> {
    let values: Vec<serde_json::Value> = forms.iter().map(Form::to_json).collect();
    let text = serde_json::to_string_pretty(&values).map_err(|e| {
        SugarError::unsourced(
            ErrorKind::Io {
                path: "<stdout>".into(),
                message: e.to_string(),
            },
            "output",
        )
    })?;
    println!("{}", text);
    Ok(())
}

/// Prints warnings as `miette` reports under a colored heading.
pub fn print_warnings(warnings: Vec<Warning>) {
    if warnings.is_empty() {
        return;
    }
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
    let _ = writeln!(stderr, "{} warning(s)", warnings.len());
    let _ = stderr.reset();
    for warning in warnings {
        eprintln!("{:?}", miette::Report::new(warning));
    }
}

pub fn print_dialects(names: &[&str], cached: &[String]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for name in names {
        let loaded = cached.iter().any(|c| c == name);
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = write!(stdout, "{}", name);
        let _ = stdout.reset();
        let _ = writeln!(stdout, "{}", if loaded { " (loaded)" } else { "" });
    }
}
