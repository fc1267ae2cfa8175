//! Shared helpers for the integration suites.
#![allow(dead_code)]

use sugarlisp::{Form, ReaderOptions, Session, SugarError};

/// Options with `base` as the primed dialect.
pub fn options(base: &str) -> ReaderOptions {
    ReaderOptions {
        base_dialect: base.into(),
        ..ReaderOptions::default()
    }
}

pub fn session(base: &str, text: &str) -> Session {
    Session::for_text("test.sl", text, options(base)).unwrap()
}

pub fn read(base: &str, text: &str) -> Result<Vec<Form>, SugarError> {
    session(base, text).read_all()
}

/// Top-level forms as single-line text.
pub fn texts(base: &str, text: &str) -> Vec<String> {
    read(base, text)
        .unwrap_or_else(|e| panic!("{}", e.render_plain()))
        .iter()
        .map(Form::pretty)
        .collect()
}
