pub use crate::ast::{Atom, Form, List, Position, ScopeId, Value};
pub use crate::errors::{ErrorCategory, ErrorKind, ErrorReporting, SugarError, Warning};
pub use crate::runtime::options::ReaderOptions;
pub use crate::runtime::session::Session;
pub use crate::runtime::source::SourceContext;
pub use crate::syntax::reader::{read_str, read_str_with};
pub use crate::syntax::ReadOutcome;

pub mod ast;
pub mod cli;
pub mod dialect;
pub mod errors;
pub mod macros;
pub mod runtime;
pub mod syntax;
