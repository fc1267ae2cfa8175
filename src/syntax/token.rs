//! Token layer: word-, pattern- and delimiter-bounded tokens on top of the
//! scanner. The memoized single-token lookahead lives on the session, which
//! owns the scanner (see `Session::peek_word`).

use std::collections::BTreeSet;

use crate::ast::{Atom, Position, Value};
use crate::errors::SugarError;
use crate::syntax::pattern::Pattern;
use crate::syntax::scanner::Scanner;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub pos: Position,
    pub prelude: Option<String>,
}

impl Token {
    pub fn into_atom(self, value: Value) -> Atom {
        Atom {
            value,
            category: None,
            pos: Some(self.pos),
            prelude: self.prelude,
            parent: None,
        }
    }

    pub fn into_symbol(self) -> Atom {
        let text = self.text.clone();
        self.into_atom(Value::Symbol(text))
    }
}

/// Which characters end a word: whitespace, and terminating characters that
/// are not also listed as nonterminating.
#[derive(Debug, Clone, Copy)]
pub struct WordRules<'a> {
    pub terminating: &'a BTreeSet<char>,
    pub nonterminating: &'a BTreeSet<char>,
}

impl WordRules<'_> {
    pub fn ends_word(&self, c: char) -> bool {
        c.is_whitespace() || (self.terminating.contains(&c) && !self.nonterminating.contains(&c))
    }

    /// True at end of input or when `c` would end a word.
    pub fn is_boundary(&self, c: Option<char>) -> bool {
        c.map_or(true, |c| self.ends_word(c))
    }
}

/// Reads a word token. The first character is always taken, so a lone
/// terminating character still makes progress.
pub fn read_word(scanner: &mut Scanner, rules: WordRules<'_>) -> Result<Option<Token>, SugarError> {
    match scanner.peek_char(0) {
        None => return Ok(None),
        Some(c) if c.is_whitespace() => return Ok(None),
        Some(_) => scanner.next_char(1),
    };
    while let Some(c) = scanner.peek_char(0) {
        if rules.ends_word(c) {
            break;
        }
        scanner.next_char(1);
    }
    scanner.create_token().map(Some)
}

/// Reads a token spanning `open` .. `close`, delimiters included.
pub fn read_delimited(
    scanner: &mut Scanner,
    open: &str,
    close: &str,
    escape: Option<char>,
    construct: &str,
) -> Result<Token, SugarError> {
    scanner.scan_delimited(open, close, escape, construct)?;
    scanner.create_token()
}

/// Reads a token matching `pattern`, or nothing when the scanner is not on it.
pub fn read_matching(scanner: &mut Scanner, pattern: &Pattern) -> Result<Option<Token>, SugarError> {
    match scanner.match_len(pattern) {
        Some(len) => {
            scanner.next_char(len);
            scanner.create_token().map(Some)
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::source::SourceContext;

    fn primed(text: &str) -> Scanner {
        let mut s = Scanner::new(SourceContext::from_file("t.sl", text), ";");
        s.prime().unwrap();
        s
    }

    #[test]
    fn words_stop_at_terminators_unless_nonterminating() {
        let terminating: BTreeSet<char> = ['(', ')', '-', '+'].into_iter().collect();
        let nonterminating: BTreeSet<char> = ['-'].into_iter().collect();
        let rules = WordRules {
            terminating: &terminating,
            nonterminating: &nonterminating,
        };
        let mut s = primed("  foo-bar+baz)");
        let word = read_word(&mut s, rules).unwrap().unwrap();
        assert_eq!(word.text, "foo-bar");
        assert_eq!(word.pos.col, 2);
        let plus = read_word(&mut s, rules).unwrap().unwrap();
        assert_eq!(plus.text, "+baz");
    }

    #[test]
    fn delimited_tokens_carry_their_prelude() {
        let mut s = primed("/* doc */ \"hi there\" next");
        let tok = read_delimited(&mut s, "\"", "\"", Some('\\'), "string").unwrap();
        assert_eq!(tok.text, "\"hi there\"");
        assert_eq!(tok.prelude.as_deref(), Some("/* doc */"));
        assert!(s.on_literal("next"));
    }

    #[test]
    fn pattern_tokens_consume_only_the_match() {
        let mut s = primed("42abc");
        let digits = Pattern::parse("/[0-9]+/").unwrap();
        assert_eq!(read_matching(&mut s, &digits).unwrap().unwrap().text, "42");
        assert!(read_matching(&mut s, &digits).unwrap().is_none());
    }
}
