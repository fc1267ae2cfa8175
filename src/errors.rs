//! SugarLisp Error Handling
//!
//! Every failure in the reader front end is an immediate, positioned, fatal
//! `SugarError`. Non-fatal advisories are `Warning`s collected on the session.
//! Both are `miette` diagnostics; `SugarError::render_plain` produces the
//! line-oriented format used by test fixtures and terminals without color.

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::ast::Position;
use crate::runtime::source::SourceContext;

// ============================================================================
// ERROR KINDS
// ============================================================================

/// What went wrong. Messages are rendered through `thiserror`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Scanner and reader errors
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("missing closing '{delimiter}' for {construct} opened at line {line}, column {column}")]
    Unterminated {
        delimiter: String,
        construct: String,
        line: usize,
        column: usize,
    },

    #[error("unexpected '{found}'")]
    UnexpectedToken { found: String },

    #[error("no syntax in dialect '{dialect}' can read '{found}'")]
    NoSyntaxMatch { dialect: String, found: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid {literal_type} '{value}'")]
    InvalidLiteral { literal_type: String, value: String },

    #[error("operand of '{operator}' expands to {count} forms")]
    SplicedOperand { operator: String, count: usize },

    /// Raised by an optimistic production that does not apply; callers rewind
    /// and try the alternative.
    #[error("{production} does not apply here")]
    Ambiguous { production: String },

    #[error("rewind stack imbalance: expected depth {expected}, found {actual}")]
    RewindImbalance { expected: usize, actual: usize },

    #[error("no rewind point to {operation}")]
    NoRewindPoint { operation: String },

    // Dialect errors
    #[error("dialect '{name}' is misconfigured: {reason}")]
    InvalidDialect { name: String, reason: String },

    #[error("unknown dialect '{name}'")]
    UnknownDialect { name: String },

    #[error("include cycle through '{file}'")]
    IncludeCycle { file: String },

    // Macro errors
    #[error("invalid macro '{macro_name}': {reason}")]
    InvalidMacro { macro_name: String, reason: String },

    #[error("macro '{macro_name}': '{marker}' is not bound")]
    UnboundMarker { macro_name: String, marker: String },

    #[error("macro '{macro_name}': '{directive}' needs an array binding, but '{name}' is not one")]
    NotAnArray {
        macro_name: String,
        directive: String,
        name: String,
    },

    #[error("macro '{macro_name}' expects at least {expected} argument(s), got {actual}")]
    ArityMismatch {
        macro_name: String,
        expected: usize,
        actual: usize,
    },

    #[error("macro '{macro_name}': compile-time evaluation failed: {message}")]
    EvalFailure { macro_name: String, message: String },

    // Resource and configuration errors
    #[error("{what} nested deeper than {limit} levels")]
    DepthLimit { what: String, limit: usize },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("could not read '{path}': {message}")]
    Io { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Dialect,
    Macro,
    Internal,
}

impl ErrorKind {
    /// Get the error category for test assertions
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnexpectedEof { .. }
            | Self::Unterminated { .. }
            | Self::UnexpectedToken { .. }
            | Self::NoSyntaxMatch { .. }
            | Self::InvalidPattern { .. }
            | Self::InvalidLiteral { .. }
            | Self::SplicedOperand { .. }
            | Self::Ambiguous { .. } => ErrorCategory::Parse,

            Self::InvalidDialect { .. } | Self::UnknownDialect { .. } | Self::IncludeCycle { .. } => {
                ErrorCategory::Dialect
            }

            Self::InvalidMacro { .. }
            | Self::UnboundMarker { .. }
            | Self::NotAnArray { .. }
            | Self::ArityMismatch { .. }
            | Self::EvalFailure { .. } => ErrorCategory::Macro,

            Self::RewindImbalance { .. }
            | Self::NoRewindPoint { .. }
            | Self::DepthLimit { .. }
            | Self::Config { .. }
            | Self::Io { .. } => ErrorCategory::Internal,
        }
    }

    /// Get error code suffix for diagnostic codes
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::UnexpectedEof { .. } => "unexpected_eof",
            Self::Unterminated { .. } => "unterminated",
            Self::UnexpectedToken { .. } => "unexpected_token",
            Self::NoSyntaxMatch { .. } => "no_syntax_match",
            Self::InvalidPattern { .. } => "invalid_pattern",
            Self::InvalidLiteral { .. } => "invalid_literal",
            Self::SplicedOperand { .. } => "spliced_operand",
            Self::Ambiguous { .. } => "ambiguous",
            Self::RewindImbalance { .. } => "rewind_imbalance",
            Self::NoRewindPoint { .. } => "no_rewind_point",
            Self::InvalidDialect { .. } => "invalid_dialect",
            Self::UnknownDialect { .. } => "unknown_dialect",
            Self::IncludeCycle { .. } => "include_cycle",
            Self::InvalidMacro { .. } => "invalid_macro",
            Self::UnboundMarker { .. } => "unbound_marker",
            Self::NotAnArray { .. } => "not_an_array",
            Self::ArityMismatch { .. } => "arity_mismatch",
            Self::EvalFailure { .. } => "eval_failure",
            Self::DepthLimit { .. } => "depth_limit",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
        }
    }

    fn primary_label(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Parse => "while reading here",
            ErrorCategory::Dialect => "dialect requested here",
            ErrorCategory::Macro => "in this macro invocation",
            ErrorCategory::Internal => "here",
        }
    }
}

// ============================================================================
// THE ERROR TYPE
// ============================================================================

/// The single error type - kind, location, and diagnostic extras.
#[derive(Debug, Clone)]
pub struct SugarError {
    /// What went wrong
    pub kind: ErrorKind,
    /// Where it happened
    pub source_info: SourceInfo,
    /// How to help
    pub diagnostic_info: DiagnosticInfo,
}

/// Context-specific source information
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: SourceContext,
    pub primary_span: SourceSpan,
    pub position: Option<Position>,
    pub phase: String,
}

/// Diagnostic enhancement data
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

impl SugarError {
    /// Builds an error located at `position` inside `source`.
    pub fn at(kind: ErrorKind, source: &SourceContext, position: Option<&Position>, phase: &str) -> Self {
        let primary_span = match position {
            Some(pos) => SourceSpan::from((pos.offset, 1usize.min(source.content.len().saturating_sub(pos.offset)))),
            None => unspanned(),
        };
        let error_code = format!("sugarlisp::{}::{}", phase, kind.code_suffix());
        SugarError {
            kind,
            source_info: SourceInfo {
                source: source.clone(),
                primary_span,
                position: position.cloned(),
                phase: phase.to_string(),
            },
            diagnostic_info: DiagnosticInfo { help: None, error_code },
        }
    }

    /// Builds an error that has no source text, such as a dialect configuration error.
    pub fn unsourced(kind: ErrorKind, phase: &str) -> Self {
        Self::at(kind, &SourceContext::fallback(phase), None, phase)
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn position(&self) -> Option<&Position> {
        self.source_info.position.as_ref()
    }

    /// Renders `<file>:<line>\n<source line>\n<caret at column>\n<message>`.
    ///
    /// Without a position only the message is printed.
    pub fn render_plain(&self) -> String {
        let Some(pos) = &self.source_info.position else {
            return self.kind.to_string();
        };
        let line_text = self.source_info.source.line_at(pos.line_start);
        let caret = format!("{}^", " ".repeat(pos.col));
        format!("{}:{}\n{}\n{}\n{}", pos.file, pos.line, line_text, caret, self.kind)
    }
}

impl std::error::Error for SugarError {}

impl fmt::Display for SugarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_info.position {
            Some(pos) => write!(f, "{}:{}:{}: {}", pos.file, pos.line, pos.col, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl Diagnostic for SugarError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.source_info.position.as_ref()?;
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.kind.primary_label().to_string()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(self.source_info.source.named())
    }
}

// ============================================================================
// CONTEXT-AWARE CONSTRUCTION
// ============================================================================

/// Context-aware error creation - the scanner and the session know the
/// source text and the current position.
pub trait ErrorReporting {
    /// Create an error located at `position`, or at the current position if `None`.
    fn report(&self, kind: ErrorKind, position: Option<&Position>) -> SugarError;

    fn unexpected_eof(&self, expected: &str) -> SugarError {
        self.report(
            ErrorKind::UnexpectedEof {
                expected: expected.into(),
            },
            None,
        )
    }

    fn unexpected_token(&self, found: &str, position: Option<&Position>) -> SugarError {
        self.report(
            ErrorKind::UnexpectedToken {
                found: found.into(),
            },
            position,
        )
    }

    fn unterminated(&self, delimiter: &str, construct: &str, opened: &Position) -> SugarError {
        self.report(
            ErrorKind::Unterminated {
                delimiter: delimiter.into(),
                construct: construct.into(),
                line: opened.line,
                column: opened.col,
            },
            Some(opened),
        )
    }

    fn ambiguous(&self, production: &str) -> SugarError {
        self.report(
            ErrorKind::Ambiguous {
                production: production.into(),
            },
            None,
        )
    }

    /// Creates an internal error - these indicate reader bugs or misbehaving
    /// dialect handlers, not user errors.
    fn internal_error(&self, kind: ErrorKind) -> SugarError {
        self.report(kind, None)
            .with_help("This is an internal reader error. A dialect handler left the scanner in an inconsistent state.")
    }
}

// ============================================================================
// WARNINGS
// ============================================================================

/// A non-fatal advisory collected while reading; it never halts the compile.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(sugarlisp::warning), severity(Warning))]
pub struct Warning {
    pub message: String,
    #[source_code]
    pub src: Arc<NamedSource<String>>,
    #[label("here")]
    pub span: Option<SourceSpan>,
    pub position: Option<Position>,
}

impl Warning {
    pub fn new(message: impl Into<String>, source: &SourceContext, position: Option<&Position>) -> Self {
        Warning {
            message: message.into(),
            src: source.to_named_source(),
            span: position.map(|p| SourceSpan::from((p.offset, 0usize))),
            position: position.cloned(),
        }
    }
}

// ============================================================================
// ERROR FORMATTING UTILITIES
// ============================================================================

/// Creates a placeholder span for errors not tied to a source location.
pub fn unspanned() -> SourceSpan {
    SourceSpan::from(0..0)
}

/// Prints a SugarError with full miette diagnostics.
pub fn print_error(error: SugarError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceContext {
        SourceContext::from_file("demo.sl", "(foo\n  (bar \"baz)\n")
    }

    fn position(offset: usize, line: usize, col: usize, line_start: usize) -> Position {
        Position {
            file: Arc::from("demo.sl"),
            offset,
            line,
            col,
            line_start,
        }
    }

    #[test]
    fn render_plain_points_at_column() {
        let pos = position(12, 2, 7, 5);
        let err = SugarError::at(
            ErrorKind::Unterminated {
                delimiter: "\"".into(),
                construct: "string".into(),
                line: 2,
                column: 7,
            },
            &source(),
            Some(&pos),
            "read",
        );
        let rendered = err.render_plain();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "demo.sl:2");
        assert_eq!(lines[1], "  (bar \"baz)");
        assert_eq!(lines[2], "       ^");
        assert!(lines[3].contains("missing closing '\"'"));
    }

    #[test]
    fn unsourced_errors_render_message_only() {
        let err = SugarError::unsourced(ErrorKind::UnknownDialect { name: "nope".into() }, "dialect");
        assert_eq!(err.render_plain(), "unknown dialect 'nope'");
        assert_eq!(err.category(), ErrorCategory::Dialect);
        assert_eq!(err.diagnostic_info.error_code, "sugarlisp::dialect::unknown_dialect");
    }

    #[test]
    fn report_includes_help_and_label() {
        let pos = position(1, 1, 1, 0);
        let err = SugarError::at(
            ErrorKind::UnexpectedToken { found: ")".into() },
            &source(),
            Some(&pos),
            "read",
        )
        .with_help("remove the stray delimiter");
        let output = format!("{:?}", miette::Report::new(err));
        assert!(output.contains("remove the stray delimiter"));
        assert!(output.contains("while reading here"));
    }

    #[test]
    fn warnings_carry_warning_severity() {
        let warning = Warning::new("cell 'x' was never declared", &source(), None);
        assert_eq!(warning.severity(), Some(miette::Severity::Warning));
    }
}
