//! Compile-time evaluation for complex unquotes.
//!
//! `(~ (expr ...))` is the only place a macro runs code while expanding. All
//! of it goes through [`SnippetEvaluator`], so replacing the evaluator on a
//! session swaps out everything macros can compute. The default,
//! [`FormEvaluator`], interprets a small expression language directly on
//! forms: it sees the macro's bindings and nothing else.

use super::definition::{Binding, Bindings};
use crate::ast::{Form, Value};

pub trait SnippetEvaluator: Send + Sync {
    /// Evaluates `snippet` with `bindings` as its only variables. Advisory
    /// messages go to `warnings`; failures are returned as a message.
    fn evaluate(&self, snippet: &Form, bindings: &Bindings, warnings: &mut Vec<String>) -> Result<Form, String>;
}

/// Evaluates literals, bound names, `quote`, arithmetic and comparison,
/// `not`/`and`/`or`/`if`, and the list helpers `list`, `concat`, `length`,
/// `first`, `rest`, `nth`, `str` and `symbol`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormEvaluator;

impl SnippetEvaluator for FormEvaluator {
    fn evaluate(&self, snippet: &Form, bindings: &Bindings, warnings: &mut Vec<String>) -> Result<Form, String> {
        Evaluation { bindings, warnings }.eval(snippet)
    }
}

struct Evaluation<'a> {
    bindings: &'a Bindings,
    warnings: &'a mut Vec<String>,
}

fn number(form: &Form, op: &str) -> Result<f64, String> {
    form.value()
        .and_then(Value::as_number)
        .ok_or_else(|| format!("'{}' expects numbers, got {}", op, form))
}

fn items(form: &Form, op: &str) -> Result<Vec<Form>, String> {
    form.as_list()
        .map(|l| l.items.clone())
        .ok_or_else(|| format!("'{}' expects a list, got {}", op, form))
}

fn finite(n: f64, op: &str) -> Result<Form, String> {
    if n.is_finite() {
        Ok(Form::number(n))
    } else {
        Err(format!("'{}' overflowed the number range", op))
    }
}

fn truthy(form: &Form) -> bool {
    form.value().map_or(true, Value::is_truthy)
}

impl Evaluation<'_> {
    fn eval(&mut self, form: &Form) -> Result<Form, String> {
        let list = match form {
            Form::Atom(atom) => {
                return match atom.as_symbol() {
                    Some(name) => self
                        .bindings
                        .get(name)
                        .map(Binding::to_form)
                        .ok_or_else(|| format!("'{}' is not bound", name)),
                    None => Ok(form.clone()),
                };
            }
            Form::List(list) => list,
        };
        let Some(op) = list.head_symbol() else {
            return Ok(form.clone());
        };
        let raw = list.args();

        // Special forms see their arguments unevaluated.
        match op {
            "quote" => return raw.first().cloned().ok_or_else(|| "'quote' needs an argument".to_string()),
            "if" => {
                let cond = raw.first().ok_or_else(|| "'if' needs a condition".to_string())?;
                let branch = if truthy(&self.eval(cond)?) { raw.get(1) } else { raw.get(2) };
                return match branch {
                    Some(branch) => self.eval(branch),
                    None => Ok(Form::null()),
                };
            }
            "and" => {
                let mut last = Form::boolean(true);
                for arg in raw {
                    last = self.eval(arg)?;
                    if !truthy(&last) {
                        break;
                    }
                }
                return Ok(last);
            }
            "or" => {
                let mut last = Form::boolean(false);
                for arg in raw {
                    last = self.eval(arg)?;
                    if truthy(&last) {
                        break;
                    }
                }
                return Ok(last);
            }
            _ => {}
        }

        let args = raw.iter().map(|arg| self.eval(arg)).collect::<Result<Vec<_>, _>>()?;
        match op {
            "+" if args.iter().any(|a| a.value().and_then(Value::as_str).is_some()) => {
                Ok(Form::string(args.iter().map(text_of).collect::<String>()))
            }
            "+" => args
                .iter()
                .try_fold(0.0, |acc, a| number(a, op).map(|n| acc + n))
                .and_then(|n| finite(n, op)),
            "*" => args
                .iter()
                .try_fold(1.0, |acc, a| number(a, op).map(|n| acc * n))
                .and_then(|n| finite(n, op)),
            "-" | "/" | "%" => {
                let nums = args.iter().map(|a| number(a, op)).collect::<Result<Vec<_>, _>>()?;
                let (first, rest) = nums.split_first().ok_or_else(|| format!("'{}' needs an argument", op))?;
                if rest.is_empty() && op == "-" {
                    return Ok(Form::number(-first));
                }
                let mut acc = *first;
                for n in rest {
                    if op != "-" && *n == 0.0 {
                        return Err(format!("'{}' by zero", op));
                    }
                    acc = match op {
                        "-" => acc - n,
                        "/" => acc / n,
                        _ => acc % n,
                    };
                }
                finite(acc, op)
            }
            "==" | "=" => Ok(Form::boolean(args.windows(2).all(|w| w[0] == w[1]))),
            "!=" => Ok(Form::boolean(args.windows(2).any(|w| w[0] != w[1]))),
            "<" | ">" | "<=" | ">=" => {
                let nums = args.iter().map(|a| number(a, op)).collect::<Result<Vec<_>, _>>()?;
                Ok(Form::boolean(nums.windows(2).all(|w| match op {
                    "<" => w[0] < w[1],
                    ">" => w[0] > w[1],
                    "<=" => w[0] <= w[1],
                    _ => w[0] >= w[1],
                })))
            }
            "not" => Ok(Form::boolean(!args.first().map_or(false, truthy))),
            "list" => Ok(Form::list(args)),
            "concat" => {
                let mut out = Vec::new();
                for arg in args {
                    match arg {
                        Form::List(list) => out.extend(list.items),
                        other => {
                            self.warnings
                                .push(format!("concat given a non-list operand {}", other));
                            out.push(other);
                        }
                    }
                }
                Ok(Form::list(out))
            }
            "length" => match args.first() {
                Some(Form::List(list)) => Ok(Form::number(list.len() as f64)),
                Some(Form::Atom(atom)) => match &atom.value {
                    Value::Str(s) => Ok(Form::number(s.chars().count() as f64)),
                    _ => Err(format!("'length' expects a list or string, got {}", atom.value)),
                },
                None => Err("'length' needs an argument".into()),
            },
            "first" => {
                let list = items(args.first().unwrap_or(&Form::null()), op)?;
                Ok(list.into_iter().next().unwrap_or_else(Form::null))
            }
            "rest" => {
                let list = items(args.first().unwrap_or(&Form::null()), op)?;
                Ok(Form::list(list.into_iter().skip(1).collect()))
            }
            "nth" => {
                let list = items(args.first().unwrap_or(&Form::null()), op)?;
                let index = number(args.get(1).unwrap_or(&Form::null()), op)?;
                Ok(list.get(index as usize).cloned().unwrap_or_else(Form::null))
            }
            "str" => Ok(Form::string(args.iter().map(text_of).collect::<String>())),
            "symbol" => Ok(Form::symbol(args.iter().map(text_of).collect::<String>())),
            other => Err(format!("'{}' cannot be evaluated at compile time", other)),
        }
    }
}

/// Text of a form for `str`: strings and symbols without quotes.
fn text_of(form: &Form) -> String {
    match form {
        Form::Atom(atom) => atom.value.text(),
        list => list.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(form: Form, bindings: &[(&str, Binding)]) -> Result<(Form, Vec<String>), String> {
        let bindings: Bindings = bindings.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        let mut warnings = Vec::new();
        let value = FormEvaluator.evaluate(&form, &bindings, &mut warnings)?;
        Ok((value, warnings))
    }

    fn call(op: &str, args: Vec<Form>) -> Form {
        let mut items = vec![Form::symbol(op)];
        items.extend(args);
        Form::list(items)
    }

    #[test]
    fn arithmetic_uses_bindings() {
        let (value, _) = eval(
            call("*", vec![Form::symbol("n"), Form::number(3.0)]),
            &[("n", Binding::Value(Form::number(4.0)))],
        )
        .unwrap();
        assert_eq!(value, Form::number(12.0));
    }

    #[test]
    fn rest_bindings_are_lists() {
        let rest = Binding::Rest(vec![Form::number(1.0), Form::number(2.0)]);
        let (value, _) = eval(call("length", vec![Form::symbol("xs")]), &[("xs", rest)]).unwrap();
        assert_eq!(value, Form::number(2.0));
    }

    #[test]
    fn concat_warns_on_non_lists() {
        let (value, warnings) = eval(
            call("concat", vec![call("list", vec![Form::number(1.0)]), Form::number(2.0)]),
            &[],
        )
        .unwrap();
        assert_eq!(value, Form::list(vec![Form::number(1.0), Form::number(2.0)]));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn only_false_and_null_are_false() {
        let pick = |cond: Form| {
            eval(call("if", vec![cond, Form::string("yes"), Form::string("no")]), &[])
                .unwrap()
                .0
        };
        assert_eq!(pick(Form::number(0.0)), Form::string("yes"));
        assert_eq!(pick(Form::null()), Form::string("no"));
        assert_eq!(pick(Form::boolean(false)), Form::string("no"));
    }

    #[test]
    fn overflowing_arithmetic_fails() {
        let big = Form::number(1e300);
        let err = eval(call("*", vec![big.clone(), big.clone()]), &[]).unwrap_err();
        assert!(err.contains("'*'"), "{}", err);
        assert!(eval(call("/", vec![big, Form::number(1e-300)]), &[]).is_err());
        let (value, _) = eval(call("+", vec![Form::number(1e300), Form::number(1.0)]), &[]).unwrap();
        assert_eq!(value, Form::number(1e300));
    }

    #[test]
    fn unknown_names_fail() {
        assert!(eval(Form::symbol("ghost"), &[]).is_err());
        assert!(eval(call("launch", vec![]), &[]).is_err());
    }
}
