//! # Dialects
//!
//! A dialect is a named bundle of syntax and keyword extensions. Modules are
//! described with [`DialectModule::builder`], cached process-wide by name,
//! and merged per session into a [`Dialect`] whose tables chain over the
//! dialects already active.
//!
//! ## Module Structure
//!
//! - **`registry`**: process-wide cache, loaders, merge and `use_dialect`
//! - **`keyword`**: the code-generation handler contract
//! - **`builtin`**: the `core`, `plus` and `reactive` dialects

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::errors::SugarError;
use crate::macros::MacroDefinition;
use crate::runtime::session::Session;
use crate::syntax::pattern::Pattern;
use crate::syntax::token::WordRules;
use crate::syntax::ReadOutcome;

pub mod builtin;
pub mod keyword;
pub mod registry;

pub use keyword::{EmitContext, Fragment, Generated, KeywordFn};
pub use registry::{
    cached_dialect_names, register_dialect, use_dialect, BuiltinLoader, DialectLoader, UseOptions,
};

/// Key of the bare-symbol fallback entry, tried after every other key.
pub const DEFAULT_KEY: &str = "__default";
/// Key of the entry tried when no dialect in the search order matched.
pub const CATCHALL_KEY: &str = "__catchall";

/// A custom reader. It starts at the primed token start and either consumes
/// input and returns a form, declines with `Retry`, or ran for effect only.
pub type ReaderFn = Arc<dyn Fn(&mut Session) -> Result<ReadOutcome, SugarError> + Send + Sync>;

/// One-time initializer run the first time a session uses a dialect.
pub type InitFn = Arc<dyn Fn(&mut Session) -> Result<(), SugarError> + Send + Sync>;

// ============================================================================
// TABLE ENTRIES
// ============================================================================

/// A table slot: one handler, or a handler followed by its fallbacks.
#[derive(Clone)]
pub enum Entry<T> {
    Single(T),
    Chain(Vec<T>),
}

impl<T: Clone> Entry<T> {
    pub fn handlers(&self) -> &[T] {
        match self {
            Entry::Single(handler) => std::slice::from_ref(handler),
            Entry::Chain(handlers) => handlers,
        }
    }

    /// This entry's handlers first, then `fallback`'s.
    pub fn then(&self, fallback: &Entry<T>) -> Entry<T> {
        let mut chain = self.handlers().to_vec();
        chain.extend_from_slice(fallback.handlers());
        Entry::Chain(chain)
    }
}

impl<T> fmt::Debug for Entry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Single(_) => write!(f, "Single"),
            Entry::Chain(handlers) => write!(f, "Chain({})", handlers.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixity {
    Prefix,
    Infix,
    Postfix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorSpec {
    pub fixity: Fixity,
    pub precedence: u32,
    pub assoc: Assoc,
    /// Symbol emitted instead of the operator text in prefix position.
    pub altprefix: Option<String>,
}

impl OperatorSpec {
    pub fn infix(precedence: u32) -> Self {
        OperatorSpec {
            fixity: Fixity::Infix,
            precedence,
            assoc: Assoc::Left,
            altprefix: None,
        }
    }

    pub fn prefix(precedence: u32) -> Self {
        OperatorSpec {
            fixity: Fixity::Prefix,
            ..Self::infix(precedence)
        }
    }

    pub fn postfix(precedence: u32) -> Self {
        OperatorSpec {
            fixity: Fixity::Postfix,
            ..Self::infix(precedence)
        }
    }

    pub fn right(mut self) -> Self {
        self.assoc = Assoc::Right;
        self
    }

    pub fn altprefix(mut self, symbol: impl Into<String>) -> Self {
        self.altprefix = Some(symbol.into());
        self
    }
}

/// How the reader handles one syntax key: a reader function, or a token
/// descriptor that turns the matched text into a symbol atom.
#[derive(Clone, Default)]
pub struct SyntaxEntry {
    pub reader: Option<ReaderFn>,
    /// What the input must match for this entry to apply. Defaults to the key.
    pub matcher: Option<Pattern>,
    pub priority: Option<i64>,
    pub category: Option<String>,
    /// The atom carries the key text instead of the matched text.
    pub replace: bool,
    /// Tried after all other keys of the dialect.
    pub punctuation: bool,
    pub operators: Vec<OperatorSpec>,
}

impl SyntaxEntry {
    pub fn reader<F>(f: F) -> Self
    where
        F: Fn(&mut Session) -> Result<ReadOutcome, SugarError> + Send + Sync + 'static,
    {
        SyntaxEntry {
            reader: Some(Arc::new(f)),
            ..Default::default()
        }
    }

    /// A symbol token matching the entry key.
    pub fn token() -> Self {
        SyntaxEntry::default()
    }

    /// A symbol token matching `pattern`.
    pub fn matching(pattern: Pattern) -> Self {
        SyntaxEntry {
            matcher: Some(pattern),
            ..Default::default()
        }
    }

    pub fn operator(mut self, spec: OperatorSpec) -> Self {
        self.operators.push(spec);
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn replace(mut self) -> Self {
        self.replace = true;
        self
    }

    pub fn punctuation(mut self) -> Self {
        self.punctuation = true;
        self
    }

    pub fn is_operator(&self) -> bool {
        !self.operators.is_empty()
    }

    pub fn operator_spec(&self, fixity: Fixity) -> Option<&OperatorSpec> {
        self.operators.iter().find(|op| op.fixity == fixity)
    }

    /// Category given to atoms read through a descriptor.
    pub fn atom_category(&self) -> Option<String> {
        self.category
            .clone()
            .or_else(|| self.is_operator().then(|| "operator".to_string()))
    }
}

// ============================================================================
// DIALECT MODULES
// ============================================================================

/// A dialect as supplied by a loader, before merging.
#[derive(Clone, Default)]
pub struct DialectModule {
    pub name: String,
    pub syntax: Option<BTreeMap<String, SyntaxEntry>>,
    pub keywords: Option<BTreeMap<String, KeywordFn>>,
    pub extends: Vec<String>,
    /// File to include whenever the dialect is used.
    pub onuse: Option<String>,
    pub init: Option<InitFn>,
    pub syntax_init: Option<InitFn>,
    pub keywords_init: Option<InitFn>,
    pub terminating: Vec<char>,
    pub terminating_override: Option<Vec<char>>,
    pub nonterminating: Vec<char>,
    /// `(macro name ...)` definitions attached to the dialect.
    pub macro_source: Option<String>,
}

impl DialectModule {
    pub fn builder(name: impl Into<String>) -> DialectBuilder {
        DialectBuilder {
            module: DialectModule {
                name: name.into(),
                ..Default::default()
            },
        }
    }
}

impl fmt::Debug for DialectModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectModule")
            .field("name", &self.name)
            .field("syntax", &self.syntax.as_ref().map(|s| s.keys().collect::<Vec<_>>()))
            .field("keywords", &self.keywords.as_ref().map(|k| k.keys().collect::<Vec<_>>()))
            .field("extends", &self.extends)
            .finish()
    }
}

pub struct DialectBuilder {
    module: DialectModule,
}

impl DialectBuilder {
    pub fn syntax(mut self, key: impl Into<String>, entry: SyntaxEntry) -> Self {
        self.module
            .syntax
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), entry);
        self
    }

    pub fn keyword<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&crate::ast::Form, &mut EmitContext) -> Result<Generated, SugarError> + Send + Sync + 'static,
    {
        self.module
            .keywords
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), Arc::new(f));
        self
    }

    pub fn extends(mut self, name: impl Into<String>) -> Self {
        self.module.extends.push(name.into());
        self
    }

    pub fn onuse(mut self, include: impl Into<String>) -> Self {
        self.module.onuse = Some(include.into());
        self
    }

    pub fn init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Session) -> Result<(), SugarError> + Send + Sync + 'static,
    {
        self.module.init = Some(Arc::new(f));
        self
    }

    pub fn syntax_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Session) -> Result<(), SugarError> + Send + Sync + 'static,
    {
        self.module.syntax_init = Some(Arc::new(f));
        self
    }

    pub fn keywords_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Session) -> Result<(), SugarError> + Send + Sync + 'static,
    {
        self.module.keywords_init = Some(Arc::new(f));
        self
    }

    pub fn terminating(mut self, chars: &str) -> Self {
        self.module.terminating.extend(chars.chars());
        self
    }

    pub fn terminating_override(mut self, chars: &str) -> Self {
        self.module.terminating_override = Some(chars.chars().collect());
        self
    }

    pub fn nonterminating(mut self, chars: &str) -> Self {
        self.module.nonterminating.extend(chars.chars());
        self
    }

    pub fn macro_source(mut self, source: impl Into<String>) -> Self {
        self.module.macro_source = Some(source.into());
        self
    }

    pub fn build(self) -> DialectModule {
        self.module
    }
}

// ============================================================================
// MERGED DIALECTS
// ============================================================================

/// A dialect merged for one session, with its derived lookup tables.
#[derive(Clone)]
pub struct Dialect {
    pub name: String,
    pub syntax: HashMap<String, Entry<SyntaxEntry>>,
    pub keywords: HashMap<String, Entry<KeywordFn>>,
    pub extends: Vec<String>,
    /// Non-punctuation keys, highest priority first.
    pub priority_keys: Vec<String>,
    pub punctuation_keys: Vec<String>,
    pub operators: HashMap<String, Vec<OperatorSpec>>,
    /// Operator keys, longest first.
    pub operator_keys: Vec<String>,
    pub terminating: BTreeSet<char>,
    pub nonterminating: BTreeSet<char>,
    pub macros: HashMap<String, Arc<MacroDefinition>>,
    pub module: Arc<DialectModule>,
}

impl Dialect {
    pub fn word_rules(&self) -> WordRules<'_> {
        WordRules {
            terminating: &self.terminating,
            nonterminating: &self.nonterminating,
        }
    }

    pub fn default_entry(&self) -> Option<&Entry<SyntaxEntry>> {
        self.syntax.get(DEFAULT_KEY)
    }

    pub fn catchall_entry(&self) -> Option<&Entry<SyntaxEntry>> {
        self.syntax.get(CATCHALL_KEY)
    }

    /// The operator specs registered for `symbol`, if any.
    pub fn operator(&self, symbol: &str) -> Option<&[OperatorSpec]> {
        self.operators.get(symbol).map(Vec::as_slice)
    }
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("name", &self.name)
            .field("priority_keys", &self.priority_keys)
            .field("punctuation_keys", &self.punctuation_keys)
            .field("operator_keys", &self.operator_keys)
            .finish()
    }
}
