//! The `plus` dialect: infix, prefix and postfix operators over `core`.
//!
//! ```text
//! a = b + c * 2     =>  (= a (+ b (* c 2)))
//! !done && i++      =>  (&& (! done) (++ i))
//! {x: 1, y: 2}      =>  (object x 1 y 2)
//! {f(); g()}        =>  (do ...)
//! ```
//!
//! `{` is ambiguous: it is tried as an object literal first and read as a
//! block when the first entry is not followed by `:`.

use crate::ast::{Form, List};
use crate::dialect::{DialectModule, OperatorSpec, SyntaxEntry};
use crate::errors::{ErrorReporting, SugarError};
use crate::runtime::session::Session;
use crate::syntax::reader;
use crate::syntax::token::Token;
use crate::syntax::ReadOutcome;

use super::base::with_head;

const MACROS: &str = r#"
(macro unless (cond ...body) (if (not (~ cond)) (do (~@ body))))
(macro when (cond ...body) (if (~ cond) (do (~@ body))))
"#;

fn infix(precedence: u32) -> SyntaxEntry {
    SyntaxEntry::token().operator(OperatorSpec::infix(precedence))
}

pub fn module() -> DialectModule {
    let mut builder = DialectModule::builder("plus").extends("core");
    for (key, precedence) in [
        ("||", 3),
        ("or", 3),
        ("&&", 4),
        ("and", 4),
        ("==", 8),
        ("!=", 8),
        ("===", 8),
        ("!==", 8),
        ("<", 9),
        (">", 9),
        ("<=", 9),
        (">=", 9),
        ("+", 11),
        ("*", 12),
        ("/", 12),
        ("%", 12),
    ] {
        builder = builder.syntax(key, infix(precedence));
    }
    builder
        .syntax("=", SyntaxEntry::token().operator(OperatorSpec::infix(1).right()))
        .syntax("^", SyntaxEntry::token().operator(OperatorSpec::infix(14).right()))
        .syntax(
            "-",
            SyntaxEntry::token()
                .operator(OperatorSpec::infix(11))
                .operator(OperatorSpec::prefix(15)),
        )
        .syntax("!", SyntaxEntry::token().operator(OperatorSpec::prefix(15)))
        .syntax(
            "++",
            SyntaxEntry::token()
                .operator(OperatorSpec::prefix(16).altprefix("pre++"))
                .operator(OperatorSpec::postfix(16)),
        )
        .syntax(
            "--",
            SyntaxEntry::token()
                .operator(OperatorSpec::prefix(16).altprefix("pre--"))
                .operator(OperatorSpec::postfix(16)),
        )
        .syntax("{", SyntaxEntry::reader(read_brace))
        .syntax(",", SyntaxEntry::reader(read_separator).punctuation())
        .terminating(":")
        .nonterminating("-?")
        .macro_source(MACROS)
        .build()
}

fn consume(session: &mut Session, key: &str) -> Result<Token, SugarError> {
    let scanner = session.scanner_mut();
    scanner.next_char(key.chars().count());
    scanner.create_token()
}

fn read_separator(session: &mut Session) -> Result<ReadOutcome, SugarError> {
    consume(session, ",")?;
    Ok(ReadOutcome::Ignorable)
}

fn read_brace(session: &mut Session) -> Result<ReadOutcome, SugarError> {
    if let Some(object) = session.attempt(read_object)? {
        return Ok(object.into());
    }
    let block = reader::read_sequence(session, "{", "}", "block")?;
    reader::complete_list(session, with_head(block, "do"))
}

/// `{key: value, ...}` as `(object key value ...)`. Fails as ambiguous as
/// soon as an entry lacks its `:`.
fn read_object(session: &mut Session) -> Result<Form, SugarError> {
    let open = consume(session, "{")?;
    let (scope, previous) = session.enter_scope();
    let mut list = List {
        open: Some(open.pos.clone()),
        open_prelude: open.prelude.clone(),
        scope: Some(scope),
        parent: previous,
        ..Default::default()
    };
    let entries = read_entries(session, &open);
    session.leave_scope(previous);
    let (entries, close) = entries?;
    list.close = Some(close.pos);
    list.close_prelude = close.prelude;
    for form in entries {
        list.push(form);
    }
    Ok(Form::List(with_head(list, "object")))
}

fn read_entries(session: &mut Session, open: &Token) -> Result<(Vec<Form>, Token), SugarError> {
    let mut entries = Vec::new();
    loop {
        let scanner = session.scanner();
        if scanner.eof() {
            return Err(session.unterminated("}", "object", &open.pos));
        }
        if scanner.on_literal("}") {
            let close = consume(session, "}")?;
            return Ok((entries, close));
        }
        if scanner.on_literal(",") {
            consume(session, ",")?;
            continue;
        }
        let key = reader::read_operand(session, 0, "{")?;
        if !session.scanner().on_literal(":") {
            return Err(session.ambiguous("object literal"));
        }
        consume(session, ":")?;
        let value = reader::read_operand(session, 0, ":")?;
        entries.push(key);
        entries.push(value);
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::options::ReaderOptions;
    use crate::syntax::reader::read_str_with;

    fn read(text: &str) -> Vec<String> {
        let options = ReaderOptions {
            base_dialect: "plus".into(),
            ..ReaderOptions::default()
        };
        read_str_with("p.sl", text, options)
            .unwrap()
            .iter()
            .map(|f| f.to_string())
            .collect()
    }

    #[test]
    fn binary_operators_climb_precedence() {
        assert_eq!(read("a = b + c * 2"), vec!["(= a (+ b (* c 2)))"]);
        assert_eq!(read("a || b && c"), vec!["(|| a (&& b c))"]);
        assert_eq!(read("x and y or z"), vec!["(or (and x y) z)"]);
        assert_eq!(read("1 - 2 - 3"), vec!["(- (- 1 2) 3)"]);
    }

    #[test]
    fn prefix_and_postfix_forms() {
        assert_eq!(read("!done"), vec!["(! done)"]);
        assert_eq!(read("i++"), vec!["(++ i)"]);
        assert_eq!(read("++i"), vec!["(pre++ i)"]);
        assert_eq!(read("-x * 2"), vec!["(* (- x) 2)"]);
    }

    #[test]
    fn dashed_names_stay_whole() {
        assert_eq!(read("to-string <= max-len"), vec!["(<= to-string max-len)"]);
        assert_eq!(read("empty? && ready?"), vec!["(&& empty? ready?)"]);
    }

    #[test]
    fn operators_need_no_surrounding_spaces() {
        assert_eq!(read("a*b"), vec!["(* a b)"]);
        assert_eq!(read("x==y"), vec!["(== x y)"]);
        assert_eq!(read("i<n"), vec!["(< i n)"]);
        assert_eq!(read("i<=n"), vec!["(<= i n)"]);
        assert_eq!(read("1 + 2*3"), vec!["(+ 1 (* 2 3))"]);
        assert_eq!(read("a=b/c"), vec!["(= a (/ b c))"]);
    }

    #[test]
    fn braces_read_as_objects_or_blocks() {
        assert_eq!(read("{x: 1, y: 2 + 3}"), vec!["(object x 1 y (+ 2 3))"]);
        assert_eq!(read("{(f) (g)}"), vec!["(do (f) (g))"]);
        assert_eq!(read("{}"), vec!["(object)"]);
    }

    #[test]
    fn commas_separate_array_items() {
        assert_eq!(read("[1, 2, 3]"), vec!["(array 1 2 3)"]);
    }

    #[test]
    fn dialect_macros_expand() {
        assert_eq!(read("(unless ok (warn) (stop))"), vec!["(if (not ok) (do (warn) (stop)))"]);
    }
}
