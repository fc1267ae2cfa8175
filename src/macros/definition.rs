//! Macro definitions and parameter binding.

use std::collections::HashMap;

use crate::ast::Form;
use crate::errors::ErrorKind;

/// A parsed `(macro [name] (param...) body...)` form.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDefinition {
    /// Empty for anonymous definitions.
    pub name: String,
    pub params: Vec<String>,
    /// Rest parameter, written `...name` or `name...`.
    pub rest: Option<String>,
    pub body: Vec<Form>,
}

/// What a parameter is bound to during one expansion.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Value(Form),
    /// The remaining arguments of a rest parameter.
    Rest(Vec<Form>),
}

impl Binding {
    /// The binding as a single form; rest arguments become a list.
    pub fn to_form(&self) -> Form {
        match self {
            Binding::Value(form) => form.clone(),
            Binding::Rest(items) => Form::list(items.clone()),
        }
    }
}

pub type Bindings = HashMap<String, Binding>;

fn invalid(name: &str, reason: impl Into<String>) -> ErrorKind {
    ErrorKind::InvalidMacro {
        macro_name: if name.is_empty() { "<anonymous>".into() } else { name.into() },
        reason: reason.into(),
    }
}

fn rest_name(param: &str) -> Option<&str> {
    param
        .strip_prefix("...")
        .or_else(|| param.strip_suffix("..."))
        .filter(|name| !name.is_empty())
}

impl MacroDefinition {
    pub fn parse(form: &Form) -> Result<Self, ErrorKind> {
        let list = form
            .as_list()
            .filter(|l| l.head_symbol() == Some("macro"))
            .ok_or_else(|| invalid("", "expected (macro [name] (params...) body...)"))?;

        let (name, rest_items) = match list.items.get(1) {
            Some(Form::Atom(atom)) => match atom.as_symbol() {
                Some(name) => (name.to_string(), &list.items[2..]),
                None => return Err(invalid("", "a macro name must be a symbol")),
            },
            Some(Form::List(_)) => (String::new(), &list.items[1..]),
            None => return Err(invalid("", "missing parameter list")),
        };

        let params_form = rest_items
            .first()
            .and_then(Form::as_list)
            .ok_or_else(|| invalid(&name, "missing parameter list"))?;

        let mut params = Vec::new();
        let mut rest = None;
        for (index, param) in params_form.items.iter().enumerate() {
            let text = param
                .as_symbol()
                .ok_or_else(|| invalid(&name, format!("parameter {} is not a symbol", index + 1)))?;
            if rest.is_some() {
                return Err(invalid(&name, "the rest parameter must come last"));
            }
            let (bare, is_rest) = match rest_name(text) {
                Some(bare) => (bare, true),
                None => (text, false),
            };
            if params.iter().any(|p| p == bare) {
                return Err(invalid(&name, format!("duplicate parameter '{}'", bare)));
            }
            if is_rest {
                rest = Some(bare.to_string());
            } else {
                params.push(bare.to_string());
            }
        }

        Ok(MacroDefinition {
            name,
            params,
            rest,
            body: rest_items[1..].to_vec(),
        })
    }

    /// Binds invocation arguments positionally. Arguments past the named
    /// parameters go to the rest parameter, or are dropped without one.
    pub fn bind(&self, args: &[Form]) -> Result<Bindings, ErrorKind> {
        if args.len() < self.params.len() {
            return Err(ErrorKind::ArityMismatch {
                macro_name: self.name.clone(),
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        let mut bindings: Bindings = self
            .params
            .iter()
            .cloned()
            .zip(args.iter().cloned().map(Binding::Value))
            .collect();
        if let Some(rest) = &self.rest {
            bindings.insert(rest.clone(), Binding::Rest(args[self.params.len()..].to_vec()));
        }
        Ok(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::reader::read_str;

    /// Reads a definition quoted, so the reader does not register it.
    fn definition(text: &str) -> Result<MacroDefinition, ErrorKind> {
        let quoted = read_str("t.sl", &format!("'{}", text)).unwrap();
        MacroDefinition::parse(&quoted[0].as_list().unwrap().items[1])
    }

    #[test]
    fn parses_leading_and_trailing_rest_markers() {
        let lead = definition("(macro m (a ...more) a)").unwrap();
        assert_eq!(lead.params, vec!["a"]);
        assert_eq!(lead.rest.as_deref(), Some("more"));

        let trail = definition("(macro (xs...) xs)").unwrap();
        assert!(trail.name.is_empty());
        assert_eq!(trail.rest.as_deref(), Some("xs"));
    }

    #[test]
    fn rest_must_be_last_and_names_unique() {
        assert!(definition("(macro m (...a b) a)").is_err());
        assert!(definition("(macro m (a a) a)").is_err());
    }

    #[test]
    fn binding_checks_arity_and_collects_rest() {
        let def = definition("(macro m (a ...r) a)").unwrap();
        let args = read_str("t.sl", "1 2 3").unwrap();
        let bindings = def.bind(&args).unwrap();
        assert_eq!(bindings["a"], Binding::Value(Form::number(1.0)));
        assert_eq!(
            bindings["r"],
            Binding::Rest(vec![Form::number(2.0), Form::number(3.0)])
        );
        let err = def.bind(&[]).unwrap_err();
        assert!(matches!(err, ErrorKind::ArityMismatch { expected: 1, actual: 0, .. }));
    }
}
