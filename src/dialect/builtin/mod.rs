//! Dialects shipped with the crate.
//!
//! - **`base`**: `core`, the Lisp base grammar every session starts with
//! - **`plus`**: infix operators, object literals and blocks, comma separators
//! - **`reactive`**: `#cell` declarations and `@cell` references

use super::DialectModule;

pub mod base;
pub mod plus;
pub mod reactive;

/// Names the built-in loader can provide.
pub const NAMES: &[&str] = &["core", "plus", "reactive"];

pub fn module(name: &str) -> Option<DialectModule> {
    match name {
        "core" => Some(base::module()),
        "plus" => Some(plus::module()),
        "reactive" => Some(reactive::module()),
        _ => None,
    }
}
