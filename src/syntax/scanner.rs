//! Backtracking character scanner.
//!
//! The scanner tracks line, column and byte offsets while it walks the source
//! one character at a time. Every field that reading can change lives in
//! `ScanState`, so a rewind point is a copy of that struct and rewinding puts
//! it back wholesale.

use std::sync::Arc;

use crate::ast::Position;
use crate::errors::{ErrorKind, ErrorReporting, SugarError};
use crate::runtime::source::SourceContext;
use crate::syntax::pattern::Pattern;
use crate::syntax::token::Token;

/// Everything a rewind restores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanState {
    /// Index into the character array.
    pub pos: usize,
    pub line: usize,
    pub col: usize,
    /// Byte offset where the current line begins.
    pub line_start: usize,
    pub last_char: Option<char>,
    pub last_token: Option<String>,
    pub token_start: usize,
    pub token_line: usize,
    pub token_col: usize,
    pub token_line_start: usize,
    /// Where the filler preceding the current token began.
    pub filler_start: usize,
}

impl ScanState {
    fn start() -> Self {
        ScanState {
            pos: 0,
            line: 1,
            col: 0,
            line_start: 0,
            last_char: None,
            last_token: None,
            token_start: 0,
            token_line: 1,
            token_col: 0,
            token_line_start: 0,
            filler_start: 0,
        }
    }
}

pub struct Scanner {
    source: SourceContext,
    file: Arc<str>,
    chars: Vec<char>,
    /// Byte offset of every character, plus one entry for the end of input.
    offsets: Vec<usize>,
    state: ScanState,
    rewind_stack: Vec<ScanState>,
    silent_marker: String,
}

impl Scanner {
    pub fn new(source: SourceContext, silent_marker: impl Into<String>) -> Self {
        let chars: Vec<char> = source.content.chars().collect();
        let mut offsets: Vec<usize> = source.content.char_indices().map(|(i, _)| i).collect();
        offsets.push(source.content.len());
        let file: Arc<str> = Arc::from(source.name.as_str());
        Scanner {
            source,
            file,
            chars,
            offsets,
            state: ScanState::start(),
            rewind_stack: Vec::new(),
            silent_marker: silent_marker.into(),
        }
    }

    pub fn source(&self) -> &SourceContext {
        &self.source
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Replaces the scan state without touching the rewind stack.
    pub(crate) fn restore(&mut self, state: ScanState) {
        self.state = state;
    }

    pub fn eof(&self) -> bool {
        self.state.pos >= self.chars.len()
    }

    /// The unread input.
    pub fn remaining(&self) -> &str {
        &self.source.content[self.offsets[self.state.pos]..]
    }

    pub fn position(&self) -> Position {
        Position {
            file: Arc::clone(&self.file),
            offset: self.offsets[self.state.pos],
            line: self.state.line,
            col: self.state.col,
            line_start: self.state.line_start,
        }
    }

    /// Position where the current token began.
    pub fn token_position(&self) -> Position {
        Position {
            file: Arc::clone(&self.file),
            offset: self.offsets[self.state.token_start],
            line: self.state.token_line,
            col: self.state.token_col,
            line_start: self.state.token_line_start,
        }
    }

    // ------------------------------------------------------------------------
    // Characters
    // ------------------------------------------------------------------------

    /// Consumes up to `n` characters and returns them.
    pub fn next_char(&mut self, n: usize) -> String {
        let mut taken = String::new();
        for _ in 0..n {
            let Some(&c) = self.chars.get(self.state.pos) else {
                break;
            };
            self.state.pos += 1;
            if c == '\n' {
                self.state.line += 1;
                self.state.col = 0;
                self.state.line_start = self.offsets[self.state.pos];
            } else {
                self.state.col += 1;
            }
            self.state.last_char = Some(c);
            taken.push(c);
        }
        taken
    }

    pub fn peek_char(&self, lookahead: usize) -> Option<char> {
        self.chars.get(self.state.pos + lookahead).copied()
    }

    pub fn peek_str(&self, n: usize) -> String {
        self.chars.iter().skip(self.state.pos).take(n).collect()
    }

    /// The character just before the scan position.
    pub fn prev_char(&self) -> Option<char> {
        self.state.pos.checked_sub(1).and_then(|i| self.chars.get(i).copied())
    }

    // ------------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------------

    /// Length in characters of the match of `pattern` at the scan position.
    pub fn match_len(&self, pattern: &Pattern) -> Option<usize> {
        let rest = self.remaining();
        pattern.match_len(rest).map(|bytes| rest[..bytes].chars().count())
    }

    pub fn on(&self, pattern: &Pattern) -> bool {
        self.match_len(pattern).is_some()
    }

    /// Like [`Scanner::on`] for the textual pattern form (`/re/` or literal).
    pub fn on_text(&self, expected: &str) -> Result<bool, SugarError> {
        let pattern = Pattern::parse(expected).map_err(|kind| self.report(kind, None))?;
        Ok(self.on(&pattern))
    }

    pub fn on_literal(&self, text: &str) -> bool {
        self.remaining().starts_with(text)
    }

    // ------------------------------------------------------------------------
    // Rewind points
    // ------------------------------------------------------------------------

    pub fn mark_rewind_point(&mut self) {
        self.rewind_stack.push(self.state.clone());
    }

    pub fn commit_rewind_point(&mut self) -> Result<(), SugarError> {
        match self.rewind_stack.pop() {
            Some(_) => Ok(()),
            None => Err(self.internal_error(ErrorKind::NoRewindPoint {
                operation: "commit".into(),
            })),
        }
    }

    pub fn rewind(&mut self) -> Result<(), SugarError> {
        match self.rewind_stack.pop() {
            Some(state) => {
                self.state = state;
                Ok(())
            }
            None => Err(self.internal_error(ErrorKind::NoRewindPoint {
                operation: "rewind".into(),
            })),
        }
    }

    pub fn depth(&self) -> usize {
        self.rewind_stack.len()
    }

    // ------------------------------------------------------------------------
    // Filler and tokens
    // ------------------------------------------------------------------------

    /// Skips whitespace and comments until none remain at the scan position.
    pub fn skip_filler(&mut self) -> Result<(), SugarError> {
        loop {
            let before = self.state.pos;
            while self.peek_char(0).is_some_and(char::is_whitespace) {
                self.next_char(1);
            }
            if self.on_literal("//") || self.on_silent_marker() {
                self.skip_line();
            } else if self.on_literal("/*") {
                let opened = self.position();
                self.next_char(2);
                loop {
                    if self.eof() {
                        return Err(self.unterminated("*/", "block comment", &opened));
                    }
                    if self.on_literal("*/") {
                        self.next_char(2);
                        break;
                    }
                    self.next_char(1);
                }
            }
            if self.state.pos == before {
                return Ok(());
            }
        }
    }

    fn on_silent_marker(&self) -> bool {
        !self.silent_marker.is_empty() && self.on_literal(&self.silent_marker)
    }

    fn skip_line(&mut self) {
        while self.peek_char(0).is_some_and(|c| c != '\n') {
            self.next_char(1);
        }
    }

    pub fn mark_token_start(&mut self) {
        self.state.token_start = self.state.pos;
        self.state.token_line = self.state.line;
        self.state.token_col = self.state.col;
        self.state.token_line_start = self.state.line_start;
    }

    /// Starts a fresh token: remembers where the filler begins, skips it and
    /// marks the token start.
    pub fn prime(&mut self) -> Result<(), SugarError> {
        self.state.filler_start = self.state.pos;
        self.skip_filler()?;
        self.mark_token_start();
        Ok(())
    }

    /// True when no filler separates the scan position from the last token.
    pub fn adjacent(&self) -> bool {
        self.state.filler_start == self.state.pos && !self.eof()
    }

    /// Captures the text since the token start, with the filler before it as
    /// prelude, then primes the scanner for the next token.
    pub fn create_token(&mut self) -> Result<Token, SugarError> {
        let text: String = self.chars[self.state.token_start..self.state.pos].iter().collect();
        let filler_end = self.state.token_start.max(self.state.filler_start);
        let filler: String = self.chars[self.state.filler_start..filler_end].iter().collect();
        let token = Token {
            text: text.clone(),
            pos: self.token_position(),
            prelude: self.prelude_from(&filler),
        };
        self.state.last_token = Some(text);
        self.prime()?;
        Ok(token)
    }

    /// Trimmed filler with silent comments removed; `None` when nothing is left.
    fn prelude_from(&self, filler: &str) -> Option<String> {
        let mut kept = String::new();
        let mut rest = filler;
        while !rest.is_empty() {
            if rest.starts_with("/*") {
                let end = rest.find("*/").map(|i| i + 2).unwrap_or(rest.len());
                kept.push_str(&rest[..end]);
                rest = &rest[end..];
            } else if rest.starts_with("//")
                || (!self.silent_marker.is_empty() && rest.starts_with(self.silent_marker.as_str()))
            {
                let end = rest.find('\n').unwrap_or(rest.len());
                if rest.starts_with("//") {
                    kept.push_str(&rest[..end]);
                }
                rest = &rest[end..];
            } else {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    kept.push(c);
                }
                rest = chars.as_str();
            }
        }
        let trimmed = kept.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Consumes `open`, everything up to the matching `close`, and `close`.
    /// The `escape` character protects the character after it.
    pub fn scan_delimited(
        &mut self,
        open: &str,
        close: &str,
        escape: Option<char>,
        construct: &str,
    ) -> Result<String, SugarError> {
        if !self.on_literal(open) {
            return Err(self.unexpected_token(&self.peek_str(open.chars().count()), None));
        }
        let opened = self.position();
        let mut text = self.next_char(open.chars().count());
        loop {
            if self.eof() {
                return Err(self.unterminated(close, construct, &opened));
            }
            if escape.is_some() && self.peek_char(0) == escape {
                text.push_str(&self.next_char(2));
                continue;
            }
            if self.on_literal(close) {
                text.push_str(&self.next_char(close.chars().count()));
                return Ok(text);
            }
            text.push_str(&self.next_char(1));
        }
    }
}

impl ErrorReporting for Scanner {
    fn report(&self, kind: ErrorKind, position: Option<&Position>) -> SugarError {
        match position {
            Some(pos) => SugarError::at(kind, &self.source, Some(pos), "read"),
            None => SugarError::at(kind, &self.source, Some(&self.position()), "read"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner(text: &str) -> Scanner {
        Scanner::new(SourceContext::from_file("test.sl", text), ";")
    }

    #[test]
    fn tracks_lines_and_columns() {
        let mut s = scanner("ab\ncd");
        assert_eq!(s.next_char(4), "ab\nc");
        let pos = s.position();
        assert_eq!((pos.line, pos.col, pos.line_start, pos.offset), (2, 1, 3, 4));
    }

    #[test]
    fn rewind_restores_everything() {
        let mut s = scanner("one two\nthree");
        s.prime().unwrap();
        let before = s.state().clone();
        s.mark_rewind_point();
        s.next_char(3);
        s.create_token().unwrap();
        s.next_char(5);
        s.rewind().unwrap();
        assert_eq!(s.state(), &before);
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn rewind_without_mark_is_an_error() {
        let mut s = scanner("x");
        assert!(matches!(
            s.rewind().unwrap_err().kind,
            ErrorKind::NoRewindPoint { .. }
        ));
        assert!(s.commit_rewind_point().is_err());
    }

    #[test]
    fn peeking_consumes_nothing() {
        let mut s = scanner("héllo");
        assert_eq!(s.peek_char(1), Some('é'));
        assert_eq!(s.peek_str(3), "hél");
        assert!(s.on(&Pattern::literal("hé")));
        assert_eq!(s.position().offset, 0);
        assert_eq!(s.next_char(2), "hé");
        assert_eq!(s.position().offset, 3);
    }

    #[test]
    fn prelude_keeps_comments_but_drops_silent_ones() {
        let mut s = scanner("  // keep me\n  ; drop me\n  x");
        s.prime().unwrap();
        s.next_char(1);
        let token = s.create_token().unwrap();
        assert_eq!(token.text, "x");
        assert_eq!(token.prelude.as_deref(), Some("// keep me"));
        assert_eq!(token.pos.line, 3);
    }

    #[test]
    fn unterminated_block_comment_names_its_closer() {
        let mut s = scanner("x /* never closed");
        s.next_char(1);
        let err = s.skip_filler().unwrap_err();
        match err.kind {
            ErrorKind::Unterminated { delimiter, line, column, .. } => {
                assert_eq!(delimiter, "*/");
                assert_eq!((line, column), (1, 2));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn scan_delimited_honours_escapes() {
        let mut s = scanner(r#""a\"b" rest"#);
        let text = s.scan_delimited("\"", "\"", Some('\\'), "string").unwrap();
        assert_eq!(text, r#""a\"b""#);
    }

    #[test]
    fn on_text_rejects_bad_regex() {
        let s = scanner("abc");
        assert!(s.on_text("/[a-z]+/").unwrap());
        let err = s.on_text("/[/").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidPattern { .. }));
    }
}
