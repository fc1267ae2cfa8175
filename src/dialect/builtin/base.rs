//! The `core` dialect: parenthesized lists, `[...]` arrays, string literals,
//! the quoting prefixes, `#use` directives, and bare words classified as
//! numbers, booleans, `null` or symbols.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Atom, Form, List, Value};
use crate::dialect::{self, DialectModule, Generated, SyntaxEntry, UseOptions, DEFAULT_KEY};
use crate::errors::{ErrorKind, ErrorReporting, SugarError};
use crate::runtime::session::Session;
use crate::syntax::reader;
use crate::syntax::token::{self, Token};
use crate::syntax::ReadOutcome;

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?$").unwrap());

/// Characters that keep a quoting prefix from applying to what follows.
const CLOSERS: &[char] = &[')', ']', '}'];

pub fn module() -> DialectModule {
    DialectModule::builder("core")
        .syntax("(", SyntaxEntry::reader(|s| reader::read_list(s, "(", ")")))
        .syntax(")", SyntaxEntry::reader(|s| stray(s, ")")))
        .syntax("[", SyntaxEntry::reader(read_array))
        .syntax("]", SyntaxEntry::reader(|s| stray(s, "]")))
        .syntax("}", SyntaxEntry::reader(|s| stray(s, "}")))
        .syntax("\"", SyntaxEntry::reader(read_string))
        .syntax("'", SyntaxEntry::reader(|s| prefixed(s, "'", "quote")))
        .syntax("`", SyntaxEntry::reader(|s| prefixed(s, "`", "quasiquote")))
        .syntax("~", SyntaxEntry::reader(|s| prefixed(s, "~", "~")))
        .syntax("~@", SyntaxEntry::reader(|s| prefixed(s, "~@", "~@")))
        .syntax("#use", SyntaxEntry::reader(|s| use_directive(s, "#use", UseOptions::default())))
        .syntax("#use-local", SyntaxEntry::reader(|s| use_directive(s, "#use-local", UseOptions::local())))
        .syntax(DEFAULT_KEY, SyntaxEntry::reader(read_word))
        .keyword("macro", |_, _| Ok(Generated::NoCode))
        .build()
}

/// Value of a bare word. Numeric words outside the finite `f64` range are
/// rejected so that every number atom survives a JSON round trip.
pub fn classify(text: &str) -> Result<Value, ErrorKind> {
    Ok(match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ if NUMBER.is_match(text) => match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => {
                return Err(ErrorKind::InvalidLiteral {
                    literal_type: "number".into(),
                    value: text.to_string(),
                })
            }
        },
        _ => Value::Symbol(text.to_string()),
    })
}

fn read_word(session: &mut Session) -> Result<ReadOutcome, SugarError> {
    let Some(token) = session.next_word()? else {
        return Ok(ReadOutcome::Retry);
    };
    let value = classify(&token.text).map_err(|kind| session.report(kind, Some(&token.pos)))?;
    let category = match &value {
        Value::Number(_) => Some("number"),
        Value::Bool(_) => Some("boolean"),
        Value::Null => Some("null"),
        _ => None,
    };
    let mut atom = token.into_atom(value);
    atom.category = category.map(str::to_string);
    Ok(Form::Atom(atom).into())
}

fn read_string(session: &mut Session) -> Result<ReadOutcome, SugarError> {
    let token = token::read_delimited(session.scanner_mut(), "\"", "\"", Some('\\'), "string")?;
    let body = token
        .text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or_default();
    let value = Value::Str(crate::ast::value::unescape(body));
    Ok(Form::Atom(token.into_atom(value).with_category("string")).into())
}

fn read_array(session: &mut Session) -> Result<ReadOutcome, SugarError> {
    let list = reader::read_sequence(session, "[", "]", "array")?;
    Ok(Form::List(with_head(list, "array")).into())
}

/// Prepends `head` to a list read from source.
pub(crate) fn with_head(mut list: List, head: &str) -> List {
    let mut atom = Atom::symbol(head).at(list.open.clone());
    atom.parent = list.scope;
    list.items.insert(0, Form::Atom(atom));
    list
}

fn stray(session: &mut Session, closer: &str) -> Result<ReadOutcome, SugarError> {
    Err(session.unexpected_token(closer, None))
}

/// `'x`, `` `x ``, `~x` and `~@x` apply only when glued to a form; on their
/// own they read as plain symbols, as in `(~ name)`.
fn prefixed(session: &mut Session, prefix: &str, head: &str) -> Result<ReadOutcome, SugarError> {
    let after = session.scanner().peek_char(prefix.chars().count());
    let detached = after.map_or(true, |c| c.is_whitespace() || CLOSERS.contains(&c));
    if detached || (prefix == "~" && after == Some('@')) {
        return Ok(ReadOutcome::Retry);
    }
    reader::read_wrapped(session, prefix, head)
}

fn consume(session: &mut Session, key: &str) -> Result<Token, SugarError> {
    let scanner = session.scanner_mut();
    scanner.next_char(key.chars().count());
    scanner.create_token()
}

/// `#use name` switches the file to a dialect; `#use-local name` scopes it to
/// the enclosing list.
fn use_directive(session: &mut Session, key: &str, options: UseOptions) -> Result<ReadOutcome, SugarError> {
    consume(session, key)?;
    let Some(name) = session.next_word()? else {
        return Err(session.unexpected_eof(&format!("a dialect name after '{}'", key)));
    };
    dialect::use_dialect(session, &name.text, options)?;
    Ok(ReadOutcome::Ignorable)
}
