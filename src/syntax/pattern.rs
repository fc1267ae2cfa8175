//! Matchers the scanner can test the input against without consuming it.

use regex::Regex;
use std::fmt;

use crate::errors::ErrorKind;

/// Something the scanner can be "on": a literal, an anchored regex, a
/// character predicate, or the first matching of several alternatives.
#[derive(Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
    Predicate(fn(char) -> bool),
    Any(Vec<Pattern>),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    /// Compiles `source` anchored at the scan position.
    pub fn regex(source: &str) -> Result<Self, ErrorKind> {
        Regex::new(&format!("^(?:{})", source))
            .map(Pattern::Regex)
            .map_err(|e| ErrorKind::InvalidPattern {
                pattern: source.to_string(),
                reason: e.to_string(),
            })
    }

    /// Parses the textual form used in dialect tables: `/re/` is a regex,
    /// anything else is a literal.
    pub fn parse(text: &str) -> Result<Self, ErrorKind> {
        if text.is_empty() {
            return Err(ErrorKind::InvalidPattern {
                pattern: text.to_string(),
                reason: "empty pattern".into(),
            });
        }
        match text.strip_prefix('/').and_then(|rest| rest.strip_suffix('/')) {
            Some(body) if !body.is_empty() => Self::regex(body),
            _ => Ok(Self::literal(text)),
        }
    }

    /// Length in bytes of the match at the start of `text`. Empty matches
    /// count as no match.
    pub fn match_len(&self, text: &str) -> Option<usize> {
        let len = match self {
            Pattern::Literal(lit) => text.starts_with(lit.as_str()).then_some(lit.len()),
            Pattern::Regex(re) => re.find(text).map(|m| m.end()),
            Pattern::Predicate(pred) => text.chars().next().filter(|c| pred(*c)).map(char::len_utf8),
            Pattern::Any(options) => options.iter().find_map(|p| p.match_len(text)),
        }?;
        (len > 0).then_some(len)
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Pattern::Literal(lit) => Some(lit),
            _ => None,
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(lit) => write!(f, "{:?}", lit),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
            Pattern::Predicate(_) => write!(f, "<predicate>"),
            Pattern::Any(options) => f.debug_list().entries(options).finish(),
        }
    }
}

impl From<&str> for Pattern {
    fn from(text: &str) -> Self {
        Pattern::literal(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regexes_are_anchored() {
        let digits = Pattern::parse("/[0-9]+/").unwrap();
        assert_eq!(digits.match_len("123abc"), Some(3));
        assert_eq!(digits.match_len("abc123"), None);
    }

    #[test]
    fn any_takes_first_alternative() {
        let p = Pattern::Any(vec![
            Pattern::literal("=="),
            Pattern::Predicate(|c| c == '='),
        ]);
        assert_eq!(p.match_len("==x"), Some(2));
        assert_eq!(p.match_len("=x"), Some(1));
        assert_eq!(p.match_len("x"), None);
    }

    #[test]
    fn bad_regex_is_reported() {
        let err = Pattern::parse("/(unclosed/").unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidPattern { .. }));
    }
}
