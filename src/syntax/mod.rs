//! # Syntax
//!
//! Everything between source text and forms.
//!
//! ## Module Structure
//!
//! - **`pattern`**: literal/regex/predicate matchers
//! - **`scanner`**: position-tracked character stream with rewind points
//! - **`token`**: word-, pattern- and delimiter-bounded tokens
//! - **`reader`**: dialect dispatch and precedence climbing

use crate::ast::Form;

pub mod pattern;
pub mod reader;
pub mod scanner;
pub mod token;

/// What a syntax handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Matched(Form),
    /// The handler declines; dispatch rewinds and tries the next candidate.
    Retry,
    /// A directive ran for its effect and contributes no form.
    Ignorable,
}

impl ReadOutcome {
    pub fn into_form(self) -> Option<Form> {
        match self {
            ReadOutcome::Matched(form) => Some(form),
            ReadOutcome::Retry | ReadOutcome::Ignorable => None,
        }
    }
}

impl From<Form> for ReadOutcome {
    fn from(form: Form) -> Self {
        ReadOutcome::Matched(form)
    }
}
