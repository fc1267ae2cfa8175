//! The `reactive` dialect: `#cell name` declares a cell for the file and
//! `@name` reads as `(cell-ref name)`. Referencing a cell that was never
//! declared is allowed but warned about.

use crate::ast::{Form, Value};
use crate::dialect::{DialectModule, EmitContext, Fragment, Generated, SyntaxEntry};
use crate::errors::{ErrorKind, ErrorReporting, SugarError};
use crate::runtime::session::Session;
use crate::syntax::reader;
use crate::syntax::ReadOutcome;

pub fn module() -> DialectModule {
    DialectModule::builder("reactive")
        .extends("core")
        .syntax("#cell", SyntaxEntry::reader(read_declaration))
        .syntax("@", SyntaxEntry::reader(read_reference))
        .nonterminating("@")
        .keyword("cell-ref", emit_reference)
        .build()
}

fn read_declaration(session: &mut Session) -> Result<ReadOutcome, SugarError> {
    {
        let scanner = session.scanner_mut();
        scanner.next_char("#cell".len());
        scanner.create_token()?;
    }
    let Some(name) = session.next_word()? else {
        return Err(session.unexpected_eof("a cell name after '#cell'"));
    };
    session.declare_cell(&name.text);
    Ok(ReadOutcome::Ignorable)
}

fn read_reference(session: &mut Session) -> Result<ReadOutcome, SugarError> {
    if !session.scanner().peek_char(1).is_some_and(|c| c.is_alphabetic() || c == '_') {
        return Ok(ReadOutcome::Retry);
    }
    let marker = {
        let scanner = session.scanner_mut();
        scanner.next_char(1);
        scanner.create_token()?
    };
    let Some(name) = session.next_word()? else {
        return Err(session.unexpected_eof("a cell name after '@'"));
    };
    session.reference_cell(&name.text, Some(&marker.pos));
    let mut head = marker.into_symbol();
    head.value = Value::Symbol("cell-ref".into());
    let name = Form::Atom(name.into_symbol().with_category("cell"));
    Ok(reader::wrap(session, vec![Form::Atom(head), name]).into())
}

/// `(cell-ref name)` emits `name.value`.
fn emit_reference(form: &Form, _ctx: &mut EmitContext) -> Result<Generated, SugarError> {
    let name = form
        .as_list()
        .and_then(|list| list.items.get(1))
        .and_then(Form::as_symbol)
        .ok_or_else(|| {
            SugarError::unsourced(
                ErrorKind::InvalidLiteral {
                    literal_type: "cell reference".into(),
                    value: form.to_string(),
                },
                "emit",
            )
        })?;
    Ok(Generated::Code(vec![Fragment::Text(format!("{}.value", name))]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::keyword::run_chain;
    use crate::runtime::options::ReaderOptions;

    fn session(text: &str) -> Session {
        let options = ReaderOptions {
            base_dialect: "reactive".into(),
            ..ReaderOptions::default()
        };
        Session::for_text("r.sl", text, options).unwrap()
    }

    #[test]
    fn declarations_vanish_and_references_wrap() {
        let mut s = session("#cell count\n(show @count)");
        let forms = s.read_all().unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].to_string(), "(show (cell-ref count))");
        assert!(s.warnings().is_empty());
        assert!(s.cells().contains("count"));
    }

    #[test]
    fn undeclared_references_warn() {
        let mut s = session("@total");
        let forms = s.read_all().unwrap();
        assert_eq!(forms[0].to_string(), "(cell-ref total)");
        assert_eq!(s.warnings().len(), 1);
    }

    #[test]
    fn references_emit_through_the_keyword_chain() {
        let mut s = session("@n");
        let forms = s.read_all().unwrap();
        let chain = s.keyword_chain(&forms[0]).unwrap();
        let generated = run_chain(&chain, &forms[0], &mut EmitContext::default()).unwrap();
        assert_eq!(generated, Generated::Code(vec![Fragment::Text("n.value".into())]));
    }

    #[test]
    fn lone_at_signs_are_symbols() {
        let mut s = session("(f @ x)");
        assert_eq!(s.read_all().unwrap()[0].to_string(), "(f @ x)");
    }
}
