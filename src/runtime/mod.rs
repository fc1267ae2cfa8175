//! # Runtime
//!
//! Per-compile-unit state and its configuration.
//!
//! - **`session`**: the [`Session`](session::Session) owning scanner, dialect stack and scopes
//! - **`options`**: [`ReaderOptions`](options::ReaderOptions), loadable from YAML
//! - **`source`**: named source text shared with diagnostics

pub mod options;
pub mod session;
pub mod source;
