//! Form model for SugarLisp
//!
//! A program is a tree of `Form`s: `Atom` leaves and `List` s-expressions.
//! Forms carry their source position and the comment/whitespace "prelude"
//! that preceded them so code generation can pass it through verbatim.
//!
//! Parent links are `ScopeId` handles into the reading session's scope arena.
//! They exist for scope lookup (which dialect governs a form) and are never
//! used for ownership or traversal; lists own their children outright.

use std::fmt;
use std::sync::Arc;

pub mod json;
pub mod value;

pub use value::Value;

// ============================================================================
// POSITIONS AND HANDLES
// ============================================================================

/// A location in a source file.
///
/// `line` is 1-based, `col` is a 0-based character column, `offset` and
/// `line_start` are byte offsets into the source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub file: Arc<str>,
    pub offset: usize,
    pub line: usize,
    pub col: usize,
    pub line_start: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// Handle to a node in a session's scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) usize);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0
    }
}

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A leaf form: a primitive value plus where it came from.
#[derive(Debug, Clone)]
pub struct Atom {
    pub value: Value,
    /// Category tag assigned by the syntax entry that read the atom
    /// (for example `"operator"`, `"keyword"`, `"string"`).
    pub category: Option<String>,
    pub pos: Option<Position>,
    pub prelude: Option<String>,
    pub parent: Option<ScopeId>,
}

/// An ordered, owned sequence of forms: one s-expression.
#[derive(Debug, Clone, Default)]
pub struct List {
    pub items: Vec<Form>,
    pub open: Option<Position>,
    pub close: Option<Position>,
    pub open_prelude: Option<String>,
    pub close_prelude: Option<String>,
    /// Scratch list generated by a macro. Its children never register it as
    /// their parent, and readers splice its items into the enclosing context.
    pub no_parenting: bool,
    /// The scope this list opens, if it was read from source or adopted.
    pub scope: Option<ScopeId>,
    pub parent: Option<ScopeId>,
}

/// The parsed-tree unit.
///
/// Equality is structural: shapes and primitive values are compared, while
/// positions, preludes, categories and scope handles are ignored.
#[derive(Debug, Clone)]
pub enum Form {
    Atom(Atom),
    List(List),
}

// ============================================================================
// ATOM
// ============================================================================

impl Atom {
    pub fn new(value: Value) -> Self {
        Atom {
            value,
            category: None,
            pos: None,
            prelude: None,
            parent: None,
        }
    }

    pub fn symbol(text: impl Into<String>) -> Self {
        Self::new(Value::Symbol(text.into()))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::new(Value::Str(text.into()))
    }

    pub fn number(n: f64) -> Self {
        Self::new(Value::Number(n))
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn at(mut self, pos: Option<Position>) -> Self {
        self.pos = pos;
        self
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.value {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_category(&self, category: &str) -> bool {
        self.category.as_deref() == Some(category)
    }
}

// ============================================================================
// LIST
// ============================================================================

impl List {
    pub fn new(items: Vec<Form>) -> Self {
        List {
            items,
            ..Default::default()
        }
    }

    /// A macro-generated sequence that is spliced into its context.
    pub fn scratch(items: Vec<Form>) -> Self {
        List {
            items,
            no_parenting: true,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn head(&self) -> Option<&Form> {
        self.items.first()
    }

    /// The leading symbol, if the list starts with one.
    pub fn head_symbol(&self) -> Option<&str> {
        self.head().and_then(Form::as_symbol)
    }

    pub fn args(&self) -> &[Form] {
        self.items.get(1..).unwrap_or(&[])
    }

    /// Alternating elements from `start` viewed as key/value pairs, as in
    /// `(object k1 v1 k2 v2)`. A trailing key without a value is dropped.
    pub fn pairs(&self, start: usize) -> impl Iterator<Item = (&Form, &Form)> {
        self.items
            .get(start..)
            .unwrap_or(&[])
            .chunks_exact(2)
            .map(|pair| (&pair[0], &pair[1]))
    }

    /// Appends a child, registering this list as its parent unless this is a
    /// scratch list.
    pub fn push(&mut self, mut form: Form) {
        let parent = if self.no_parenting { self.parent } else { self.scope.or(self.parent) };
        form.set_parent(parent);
        self.items.push(form);
    }
}

// ============================================================================
// FORM
// ============================================================================

impl Form {
    pub fn symbol(text: impl Into<String>) -> Self {
        Form::Atom(Atom::symbol(text))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Form::Atom(Atom::string(text))
    }

    pub fn number(n: f64) -> Self {
        Form::Atom(Atom::number(n))
    }

    pub fn boolean(b: bool) -> Self {
        Form::Atom(Atom::new(Value::Bool(b)))
    }

    pub fn null() -> Self {
        Form::Atom(Atom::new(Value::Null))
    }

    pub fn list(items: Vec<Form>) -> Self {
        Form::List(List::new(items))
    }

    pub fn as_atom(&self) -> Option<&Atom> {
        match self {
            Form::Atom(a) => Some(a),
            Form::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Form::List(l) => Some(l),
            Form::Atom(_) => None,
        }
    }

    pub fn into_list(self) -> Option<List> {
        match self {
            Form::List(l) => Some(l),
            Form::Atom(_) => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        self.as_atom().and_then(Atom::as_symbol)
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        self.as_symbol() == Some(name)
    }

    pub fn value(&self) -> Option<&Value> {
        self.as_atom().map(|a| &a.value)
    }

    /// True for a scratch list that must be spliced into its context.
    pub fn is_scratch(&self) -> bool {
        matches!(self, Form::List(l) if l.no_parenting)
    }

    /// Start position: the atom's position or the list's opening delimiter.
    pub fn pos(&self) -> Option<&Position> {
        match self {
            Form::Atom(a) => a.pos.as_ref(),
            Form::List(l) => l.open.as_ref().or_else(|| l.items.iter().find_map(Form::pos)),
        }
    }

    pub fn prelude(&self) -> Option<&str> {
        match self {
            Form::Atom(a) => a.prelude.as_deref(),
            Form::List(l) => l.open_prelude.as_deref(),
        }
    }

    pub fn parent(&self) -> Option<ScopeId> {
        match self {
            Form::Atom(a) => a.parent,
            Form::List(l) => l.parent,
        }
    }

    pub fn set_parent(&mut self, parent: Option<ScopeId>) {
        match self {
            Form::Atom(a) => a.parent = parent,
            Form::List(l) => l.parent = parent,
        }
    }

    /// The innermost scope for lookups made on behalf of this form.
    pub fn scope(&self) -> Option<ScopeId> {
        match self {
            Form::Atom(a) => a.parent,
            Form::List(l) => l.scope.or(l.parent),
        }
    }

    // ------------------------------------------------------------------------
    // Text forms
    // ------------------------------------------------------------------------

    /// Single-line parenthesized text, e.g. `(+ 1 (* 2 3))`.
    pub fn pretty(&self) -> String {
        self.to_string()
    }

    /// Parenthesized text that breaks lists longer than `width` columns,
    /// putting each argument on its own line indented under the head.
    pub fn pretty_indented(&self, width: usize) -> String {
        let mut out = String::new();
        self.write_indented(&mut out, 0, width);
        out
    }

    fn write_indented(&self, out: &mut String, indent: usize, width: usize) {
        let flat = self.to_string();
        let Form::List(list) = self else {
            out.push_str(&flat);
            return;
        };
        if indent + flat.len() <= width || list.items.len() < 2 {
            out.push_str(&flat);
            return;
        }
        out.push('(');
        list.items[0].write_indented(out, indent + 1, width);
        for item in &list.items[1..] {
            out.push('\n');
            out.push_str(&" ".repeat(indent + 2));
            item.write_indented(out, indent + 2, width);
        }
        out.push(')');
    }
}

impl PartialEq for Form {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Form::Atom(a), Form::Atom(b)) => a.value == b.value,
            (Form::List(a), Form::List(b)) => a.items == b.items,
            _ => false,
        }
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Form::Atom(a) => write!(f, "{}", a.value),
            Form::List(l) => write!(f, "{}", l),
        }
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, ")")
    }
}

impl From<Atom> for Form {
    fn from(atom: Atom) -> Self {
        Form::Atom(atom)
    }
}

impl From<List> for Form {
    fn from(list: List) -> Self {
        Form::List(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Form {
        Form::list(vec![
            Form::symbol("+"),
            Form::number(1.0),
            Form::list(vec![Form::symbol("*"), Form::number(2.0), Form::number(3.0)]),
        ])
    }

    #[test]
    fn pretty_prints_nested_lists() {
        assert_eq!(sample().pretty(), "(+ 1 (* 2 3))");
        assert_eq!(Form::string("a\"b").pretty(), "\"a\\\"b\"");
    }

    #[test]
    fn pretty_indented_breaks_long_lists() {
        let text = sample().pretty_indented(8);
        assert_eq!(text, "(+\n  1\n  (* 2 3))");
        assert_eq!(sample().pretty_indented(80), "(+ 1 (* 2 3))");
    }

    #[test]
    fn equality_ignores_positions_and_categories() {
        let mut located = Atom::symbol("x").with_category("keyword");
        located.prelude = Some("// note".into());
        located.pos = Some(Position {
            file: Arc::from("a.sl"),
            offset: 3,
            line: 1,
            col: 3,
            line_start: 0,
        });
        assert_eq!(Form::Atom(located), Form::symbol("x"));
        assert_ne!(Form::symbol("x"), Form::string("x"));
    }

    #[test]
    fn pairs_view_skips_head() {
        let obj = List::new(vec![
            Form::symbol("object"),
            Form::symbol("a"),
            Form::number(1.0),
            Form::symbol("b"),
            Form::number(2.0),
        ]);
        let keys: Vec<String> = obj.pairs(1).map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn scratch_lists_do_not_parent_children() {
        let mut scratch = List::scratch(vec![]);
        scratch.parent = Some(ScopeId(4));
        scratch.scope = Some(ScopeId(9));
        scratch.push(Form::symbol("x"));
        assert_eq!(scratch.items[0].parent(), Some(ScopeId(4)));

        let mut list = List::new(vec![]);
        list.scope = Some(ScopeId(9));
        list.push(Form::symbol("y"));
        assert_eq!(list.items[0].parent(), Some(ScopeId(9)));
    }
}
