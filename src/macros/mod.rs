//! # Macro Expansion
//!
//! Macros are expanded while reading: a list whose head names a macro is
//! replaced by the macro's body with its parameters substituted, before the
//! reader returns it.
//!
//! ## Module Structure
//!
//! - **`definition`**: `(macro name (params...) body...)` parsing and binding
//! - **`expander`**: template substitution and the `~`/`~@` directives
//! - **`eval`**: the compile-time evaluator behind `(~ (expr ...))`
//!
//! ## Lookup
//!
//! Macros defined in the file being read shadow the macros of its dialects,
//! which are searched in the order their syntax is. Expansion output is
//! expanded again until no macro calls remain, bounded by
//! `max_macro_depth`.

use crate::ast::{Form, List, ScopeId};
use crate::errors::{ErrorKind, ErrorReporting, SugarError};
use crate::runtime::options::ReaderOptions;
use crate::runtime::session::Session;

pub mod definition;
pub mod eval;
pub mod expander;

pub use definition::{Binding, Bindings, MacroDefinition};
pub use eval::{FormEvaluator, SnippetEvaluator};

/// Heads whose lists are left untouched when expansion output is rescanned.
const UNEXPANDED_HEADS: &[&str] = &["macro", "quote", "quasiquote"];

// ============================================================================
// EXPANSION
// ============================================================================

/// Expands `call` with `definition` and attaches the result to the scope the
/// call was read in. A body producing several forms yields a scratch list
/// for the caller to splice.
pub fn expand_call(session: &mut Session, call: &List, definition: &MacroDefinition) -> Result<Form, SugarError> {
    let mut form = expand_nested(session, call, definition)?;
    adopt(session, &mut form, call.parent);
    Ok(form)
}

fn expand_nested(session: &mut Session, call: &List, definition: &MacroDefinition) -> Result<Form, SugarError> {
    session.macro_depth += 1;
    let limit = session.options().max_macro_depth;
    let result = if session.macro_depth > limit {
        Err(session.report(
            ErrorKind::DepthLimit {
                what: "macro expansion".into(),
                limit,
            },
            call.open.as_ref(),
        ))
    } else {
        expander::expand(session, call, definition).and_then(|list| resolve_form(session, Form::List(list)))
    };
    session.macro_depth -= 1;
    result
}

/// Expands macro calls left in expansion output, innermost lists last.
fn resolve_form(session: &mut Session, form: Form) -> Result<Form, SugarError> {
    let Form::List(mut list) = form else {
        return Ok(form);
    };
    if !list.no_parenting {
        if let Some(head) = list.head_symbol() {
            if UNEXPANDED_HEADS.contains(&head) {
                return Ok(Form::List(list));
            }
            if let Some(definition) = session.lookup_macro(head, session.current_scope())? {
                return expand_nested(session, &list, &definition);
            }
        }
    }
    let items = std::mem::take(&mut list.items);
    for item in items {
        match resolve_form(session, item)? {
            Form::List(scratch) if scratch.no_parenting => list.items.extend(scratch.items),
            resolved => list.items.push(resolved),
        }
    }
    Ok(Form::List(list))
}

/// Gives expansion output parent handles under `parent`. Every real list
/// gets a scope of its own; scratch lists pass `parent` through.
fn adopt(session: &mut Session, form: &mut Form, parent: Option<ScopeId>) {
    match form {
        Form::Atom(atom) => atom.parent = parent,
        Form::List(list) => {
            list.parent = parent;
            let inner = if list.no_parenting {
                parent
            } else {
                let scope = match list.scope {
                    Some(scope) => {
                        session.set_scope_parent(scope, parent);
                        scope
                    }
                    None => session.new_scope(parent),
                };
                list.scope = Some(scope);
                Some(scope)
            };
            for item in &mut list.items {
                adopt(session, item, inner);
            }
        }
    }
}

// ============================================================================
// DIALECT MACROS
// ============================================================================

/// Reads the `(macro ...)` definitions in a dialect's macro source.
pub fn definitions_from_source(dialect: &str, text: &str) -> Result<Vec<MacroDefinition>, SugarError> {
    let name = format!("<dialect {}>", dialect);
    let mut session = Session::for_text(&name, text, ReaderOptions::default())?;
    session.read_all()?;
    let mut definitions: Vec<MacroDefinition> = session
        .take_user_macros()
        .into_values()
        .map(|definition| (*definition).clone())
        .collect();
    definitions.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::reader::read_str;

    fn read_one(text: &str) -> String {
        let forms = read_str("m.sl", text).unwrap();
        assert_eq!(forms.len(), 1, "{:?}", forms);
        forms[0].to_string()
    }

    #[test]
    fn expansion_output_is_expanded_again() {
        let text = "(macro twice (x) (pair (~ x) (~ x)))\n(macro pair (a b) (list (~ a) (~ b)))\n(twice 7)";
        assert_eq!(read_one(text), "(list 7 7)");
    }

    #[test]
    fn runaway_recursion_hits_the_depth_limit() {
        let forms = read_str("m.sl", "(macro loop (x) (loop (~ x)))\n(loop 1)");
        let err = forms.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DepthLimit { .. }), "{:?}", err.kind);
    }

    #[test]
    fn multi_form_bodies_splice_into_the_enclosing_list() {
        let text = "(macro both (a b) (~ a) (~ b))\n(do (both 1 2) 3)";
        assert_eq!(read_one(text), "(do 1 2 3)");
    }

    #[test]
    fn expanded_lists_get_fresh_scopes() {
        let text = "(macro wrap (x) (outer (inner (~ x))))\n(wrap 1)";
        let mut session = Session::for_text("m.sl", text, ReaderOptions::default()).unwrap();
        let forms = session.read_all().unwrap();
        let outer = forms[0].as_list().unwrap();
        let inner = outer.items[1].as_list().unwrap();
        assert!(outer.scope.is_some());
        assert_eq!(inner.parent, outer.scope);
        assert_ne!(inner.scope, outer.scope);
    }

    #[test]
    fn dialect_sources_yield_definitions() {
        let defs = definitions_from_source("t", "(macro b (x) (~ x))\n(macro a () 1)").unwrap();
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
