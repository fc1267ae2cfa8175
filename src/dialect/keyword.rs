//! Contract between the reader and the code generator.
//!
//! Keyword handlers receive a recognized form and the shared emission state
//! and return generated text interleaved with forms still to be emitted. The
//! reader only stores and resolves them; it never calls them itself.

use std::sync::Arc;

use crate::ast::Form;
use crate::errors::SugarError;

pub type KeywordFn = Arc<dyn Fn(&Form, &mut EmitContext) -> Result<Generated, SugarError> + Send + Sync>;

/// Mutable state shared by every handler of one emission pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitContext {
    pub indent: usize,
    pub suppress_semicolon: bool,
    pub suppress_newline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    /// A form emitted in place, keeping its source position.
    Node(Form),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    Code(Vec<Fragment>),
    /// The form exists for its effect and emits nothing.
    NoCode,
    /// The handler declines; the next handler in the chain is tried.
    Retry,
}

/// Runs `chain` in order until a handler does not retry.
pub fn run_chain(chain: &[KeywordFn], form: &Form, ctx: &mut EmitContext) -> Result<Generated, SugarError> {
    for handler in chain {
        match handler(form, ctx)? {
            Generated::Retry => continue,
            generated => return Ok(generated),
        }
    }
    Ok(Generated::Retry)
}
