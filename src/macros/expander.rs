//! Template substitution.
//!
//! A macro body is copied with its unquote markers rewritten:
//!
//! - `(~ name)` inserts the binding; a rest binding is inserted as one list
//! - `(~@ name)` splices the elements of a rest binding
//! - `(~ (shift xs))`, `second`, `get` and `if` work on rest bindings in
//!   place; the `@shift` forms unwrap single-element list results
//! - any other `(~ (expr ...))` goes to the session's `SnippetEvaluator`

use std::sync::Arc;

use super::definition::{Binding, Bindings, MacroDefinition};
use super::eval::SnippetEvaluator;
use crate::ast::{Atom, Form, List};
use crate::errors::{ErrorKind, ErrorReporting, SugarError};
use crate::runtime::session::Session;

const DIRECTIVES: &[&str] = &["shift", "second", "get", "if"];

/// Expands one invocation of `definition`. The result is the single list the
/// body produced, or a scratch list holding everything it produced.
pub fn expand(session: &mut Session, call: &List, definition: &MacroDefinition) -> Result<List, SugarError> {
    let position = call.open.clone();
    let macro_name = if definition.name.is_empty() {
        call.head_symbol().unwrap_or("<anonymous>").to_string()
    } else {
        definition.name.clone()
    };
    let bindings = definition.bind(call.args()).map_err(|kind| {
        let kind = match kind {
            ErrorKind::ArityMismatch { expected, actual, .. } => ErrorKind::ArityMismatch {
                macro_name: macro_name.clone(),
                expected,
                actual,
            },
            other => other,
        };
        session.report(kind, position.as_ref())
    })?;

    let mut expansion = Expansion {
        macro_name: &macro_name,
        bindings,
        evaluator: session.evaluator(),
        warnings: Vec::new(),
    };
    let mut generated = Vec::new();
    let mut failure = None;
    for form in &definition.body {
        match expansion.substitute(form) {
            Ok(forms) => generated.extend(forms),
            Err(kind) => {
                failure = Some(kind);
                break;
            }
        }
    }
    for warning in std::mem::take(&mut expansion.warnings) {
        session.warn(format!("macro '{}': {}", macro_name, warning), position.as_ref());
    }
    if let Some(kind) = failure {
        return Err(session.report(kind, position.as_ref()));
    }

    let single_list = definition.body.len() == 1
        && generated.len() == 1
        && matches!(generated.first(), Some(Form::List(list)) if !list.no_parenting);
    if single_list {
        if let Some(Form::List(list)) = generated.pop() {
            return Ok(list);
        }
    }
    Ok(List::scratch(generated))
}

struct Expansion<'a> {
    macro_name: &'a str,
    bindings: Bindings,
    evaluator: Arc<dyn SnippetEvaluator>,
    warnings: Vec<String>,
}

impl Expansion<'_> {
    fn substitute(&mut self, form: &Form) -> Result<Vec<Form>, ErrorKind> {
        let list = match form {
            Form::Atom(atom) => return Ok(vec![Form::Atom(detached(atom))]),
            Form::List(list) => list,
        };
        match list.head_symbol() {
            Some("~") => return self.unquote(list, false),
            Some("~@") => return self.unquote(list, true),
            _ => {}
        }
        let mut copy = List {
            items: Vec::with_capacity(list.items.len()),
            open: list.open.clone(),
            close: list.close.clone(),
            open_prelude: list.open_prelude.clone(),
            close_prelude: list.close_prelude.clone(),
            no_parenting: list.no_parenting,
            scope: None,
            parent: None,
        };
        for item in &list.items {
            copy.items.extend(self.substitute(item)?);
        }
        Ok(vec![Form::List(copy)])
    }

    fn unquote(&mut self, marker: &List, splice: bool) -> Result<Vec<Form>, ErrorKind> {
        let target = marker.items.get(1).ok_or_else(|| ErrorKind::InvalidMacro {
            macro_name: self.macro_name.to_string(),
            reason: format!("'{}' needs an operand", if splice { "~@" } else { "~" }),
        })?;
        match target {
            Form::Atom(atom) => match atom.as_symbol() {
                Some(name) => self.insert_binding(name, splice),
                None => Ok(vec![target.clone()]),
            },
            Form::List(expr) => {
                let result = match self.directive_of(expr) {
                    Some(directive) => self.directive(directive, expr)?,
                    None => vec![self.evaluate(target)?],
                };
                Ok(if splice { spread(result) } else { result })
            }
        }
    }

    fn insert_binding(&self, name: &str, splice: bool) -> Result<Vec<Form>, ErrorKind> {
        let binding = self.bindings.get(name).ok_or_else(|| ErrorKind::UnboundMarker {
            macro_name: self.macro_name.to_string(),
            marker: name.to_string(),
        })?;
        Ok(match (binding, splice) {
            (Binding::Rest(items), true) => items.clone(),
            (Binding::Rest(items), false) => vec![Form::list(items.clone())],
            (Binding::Value(Form::List(list)), true) => list.items.clone(),
            (Binding::Value(form), _) => vec![form.clone()],
        })
    }

    /// The directive `expr` names, when its first argument is a bound name.
    fn directive_of<'e>(&self, expr: &'e List) -> Option<&'e str> {
        let head = expr.head_symbol()?;
        let bare = head.strip_prefix('@').unwrap_or(head);
        let subject = expr.items.get(1)?.as_symbol()?;
        (DIRECTIVES.contains(&bare) && self.bindings.contains_key(subject)).then_some(head)
    }

    fn directive(&mut self, head: &str, expr: &List) -> Result<Vec<Form>, ErrorKind> {
        let unwrap = head.starts_with('@');
        let directive = head.trim_start_matches('@');
        let subject = expr.items.get(1).and_then(Form::as_symbol).unwrap_or_default();

        let result = match directive {
            "if" => {
                let non_empty = match self.bindings.get(subject) {
                    Some(Binding::Rest(items)) => !items.is_empty(),
                    Some(Binding::Value(Form::List(list))) => !list.is_empty(),
                    Some(Binding::Value(Form::Atom(atom))) => atom.value.is_truthy(),
                    None => false,
                };
                let branch = if non_empty { expr.items.get(2) } else { expr.items.get(3) };
                match branch {
                    Some(template) => self.substitute(template)?,
                    None => Vec::new(),
                }
            }
            "shift" => {
                let items = self.array(subject, head)?;
                if items.is_empty() {
                    Vec::new()
                } else {
                    vec![items.remove(0)]
                }
            }
            // Removes the element, like shift does for the first one.
            "second" => {
                let items = self.array(subject, head)?;
                if items.len() > 1 {
                    vec![items.remove(1)]
                } else {
                    Vec::new()
                }
            }
            _ => {
                let index = expr
                    .items
                    .get(2)
                    .and_then(Form::value)
                    .and_then(|v| v.as_number())
                    .filter(|n| *n >= 0.0 && n.fract() == 0.0)
                    .ok_or_else(|| ErrorKind::InvalidMacro {
                        macro_name: self.macro_name.to_string(),
                        reason: format!("'{}' needs a non-negative integer index", head),
                    })?;
                let items = self.array(subject, head)?;
                items.get(index as usize).cloned().into_iter().collect()
            }
        };
        Ok(if unwrap {
            result.into_iter().map(unwrap_singleton).collect()
        } else {
            result
        })
    }

    fn array(&mut self, name: &str, directive: &str) -> Result<&mut Vec<Form>, ErrorKind> {
        match self.bindings.get_mut(name) {
            Some(Binding::Rest(items)) => Ok(items),
            Some(Binding::Value(Form::List(list))) => Ok(&mut list.items),
            Some(Binding::Value(Form::Atom(_))) => Err(ErrorKind::NotAnArray {
                macro_name: self.macro_name.to_string(),
                directive: directive.to_string(),
                name: name.to_string(),
            }),
            None => Err(ErrorKind::UnboundMarker {
                macro_name: self.macro_name.to_string(),
                marker: name.to_string(),
            }),
        }
    }

    fn evaluate(&mut self, expr: &Form) -> Result<Form, ErrorKind> {
        self.evaluator
            .evaluate(expr, &self.bindings, &mut self.warnings)
            .map_err(|message| ErrorKind::EvalFailure {
                macro_name: self.macro_name.to_string(),
                message,
            })
    }
}

fn detached(atom: &Atom) -> Atom {
    Atom {
        parent: None,
        ..atom.clone()
    }
}

fn unwrap_singleton(form: Form) -> Form {
    match form {
        Form::List(mut list) if list.items.len() == 1 => list.items.remove(0),
        other => other,
    }
}

/// Lists give up their items for splicing; other forms stay whole.
fn spread(forms: Vec<Form>) -> Vec<Form> {
    forms
        .into_iter()
        .flat_map(|form| match form {
            Form::List(list) => list.items,
            other => vec![other],
        })
        .collect()
}
