//! Canonical JSON shape of a form tree.
//!
//! Lists become arrays. Symbols become bare JSON strings and string literals
//! keep their double quotes inside the JSON string, so `(print "hi")` is
//! `["print", "\"hi\""]`. Numbers, booleans and `null` map directly.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Number};

use super::value::{quote_string, unescape};
use super::{Atom, Form, Value};
use crate::errors::{ErrorKind, SugarError};

impl Form {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Form::Atom(atom) => match &atom.value {
                Value::Symbol(s) => json!(s),
                Value::Str(s) => json!(quote_string(s)),
                Value::Number(n) => Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
                Value::Bool(b) => json!(b),
                Value::Null => serde_json::Value::Null,
            },
            Form::List(list) => serde_json::Value::Array(list.items.iter().map(Form::to_json).collect()),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Form, SugarError> {
        let form = match value {
            serde_json::Value::Null => Form::null(),
            serde_json::Value::Bool(b) => Form::boolean(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(n) => Form::number(n),
                None => return Err(invalid_json(&n.to_string())),
            },
            serde_json::Value::String(s) => Form::Atom(atom_from_text(s)),
            serde_json::Value::Array(items) => {
                Form::list(items.iter().map(Form::from_json).collect::<Result<_, _>>()?)
            }
            serde_json::Value::Object(_) => return Err(invalid_json(&value.to_string())),
        };
        Ok(form)
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    pub fn from_json_str(text: &str) -> Result<Form, SugarError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| invalid_json(&e.to_string()))?;
        Form::from_json(&value)
    }
}

fn atom_from_text(s: &str) -> Atom {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        Atom::string(unescape(&s[1..s.len() - 1]))
    } else {
        Atom::symbol(s)
    }
}

fn invalid_json(value: &str) -> SugarError {
    SugarError::unsourced(
        ErrorKind::InvalidLiteral {
            literal_type: "form JSON".into(),
            value: value.into(),
        },
        "json",
    )
}

impl Serialize for Form {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Form {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Form::from_json(&value).map_err(|e| D::Error::custom(e.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_keep_quotes_and_symbols_stay_bare() {
        let form = Form::list(vec![Form::symbol("print"), Form::string("hi"), Form::number(2.0)]);
        assert_eq!(form.to_json_string(), r#"["print","\"hi\"",2.0]"#);
    }

    #[test]
    fn nested_tree_survives_json() {
        let form = Form::list(vec![
            Form::symbol("if"),
            Form::boolean(true),
            Form::list(vec![Form::symbol("f"), Form::null(), Form::string("a \"b\"")]),
            Form::list(vec![]),
        ]);
        let back = Form::from_json(&form.to_json()).unwrap();
        assert_eq!(back, form);
        assert_eq!(back.pretty(), form.pretty());
    }

    #[test]
    fn serde_uses_canonical_shape() {
        let form: Form = serde_json::from_str(r#"["+", 1, "\"s\"", null]"#).unwrap();
        assert_eq!(form.pretty(), "(+ 1 \"s\" null)");
        assert_eq!(serde_json::to_string(&form).unwrap(), r#"["+",1.0,"\"s\"",null]"#);
    }

    #[test]
    fn objects_are_rejected() {
        assert!(Form::from_json_str(r#"{"a": 1}"#).is_err());
    }
}
