//! The per-file reading session.
//!
//! A `Session` owns everything mutable about reading one compile unit: the
//! scanner, the file-level dialect stack (front is searched first), the scope
//! arena that parent handles point into, the token peek cache, and the
//! file-scoped bookkeeping (cells, include guard, macros, warnings). Nothing
//! here is shared between sessions except the dialect module cache.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::ast::{Form, Position, ScopeId};
use crate::dialect::{self, Dialect, DialectLoader, KeywordFn, UseOptions};
use crate::errors::{ErrorKind, ErrorReporting, SugarError, Warning};
use crate::macros::{FormEvaluator, MacroDefinition, SnippetEvaluator};
use crate::runtime::options::ReaderOptions;
use crate::runtime::source::SourceContext;
use crate::syntax::reader;
use crate::syntax::scanner::{ScanState, Scanner};
use crate::syntax::token::{self, Token, WordRules};
use crate::syntax::ReadOutcome;

/// Stack reserved for a reading worker, plus an allowance per level of form
/// nesting or macro expansion.
const READ_STACK_BASE: usize = 8 * 1024 * 1024;
const READ_STACK_PER_LEVEL: usize = 96 * 1024;

/// A node of the scope arena. Lists read from source each open one.
#[derive(Debug, Clone)]
pub struct ScopeNode {
    pub parent: Option<ScopeId>,
    /// A local dialect activated inside this scope.
    pub dialect: Option<Arc<Dialect>>,
}

struct PeekCache {
    before: ScanState,
    token: Option<Token>,
    after: ScanState,
}

pub struct Session {
    scanner: Scanner,
    dialects: Vec<Arc<Dialect>>,
    scopes: Vec<ScopeNode>,
    current_scope: Option<ScopeId>,
    peeked: Option<PeekCache>,
    warnings: Vec<Warning>,
    cells: BTreeSet<String>,
    include_stack: Vec<String>,
    pending_includes: Vec<String>,
    macros: HashMap<String, Arc<MacroDefinition>>,
    initialized: HashSet<String>,
    options: ReaderOptions,
    loader: Arc<dyn DialectLoader>,
    evaluator: Arc<dyn SnippetEvaluator>,
    pub(crate) read_depth: usize,
    pub(crate) macro_depth: usize,
    /// Non-zero while reading inside `macro`, `quote` or `quasiquote`.
    pub(crate) quote_depth: usize,
}

impl Session {
    /// Creates a session over `source` with the built-in dialects available
    /// and the base dialect active.
    pub fn new(source: SourceContext, options: ReaderOptions) -> Result<Self, SugarError> {
        Self::with_loader(source, options, Arc::new(dialect::BuiltinLoader))
    }

    pub fn with_loader(
        source: SourceContext,
        options: ReaderOptions,
        loader: Arc<dyn DialectLoader>,
    ) -> Result<Self, SugarError> {
        let scanner = Scanner::new(source, options.silent_comment_marker.clone());
        let mut session = Session {
            scanner,
            dialects: Vec::new(),
            scopes: Vec::new(),
            current_scope: None,
            peeked: None,
            warnings: Vec::new(),
            cells: BTreeSet::new(),
            include_stack: Vec::new(),
            pending_includes: Vec::new(),
            macros: HashMap::new(),
            initialized: HashSet::new(),
            options,
            loader,
            evaluator: Arc::new(FormEvaluator),
            read_depth: 0,
            macro_depth: 0,
            quote_depth: 0,
        };
        let name = session.scanner.source().name.clone();
        session.include_stack.push(name);
        session.scanner.prime()?;
        let base = session.options.base_dialect.clone();
        if !base.is_empty() {
            dialect::use_dialect(&mut session, &base, UseOptions::default())?;
        }
        Ok(session)
    }

    pub fn for_text(name: &str, text: &str, options: ReaderOptions) -> Result<Self, SugarError> {
        Self::new(SourceContext::from_file(name, text), options)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut Scanner {
        &mut self.scanner
    }

    pub fn source(&self) -> &SourceContext {
        self.scanner.source()
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn loader(&self) -> &dyn DialectLoader {
        self.loader.as_ref()
    }

    pub fn evaluator(&self) -> Arc<dyn SnippetEvaluator> {
        Arc::clone(&self.evaluator)
    }

    /// Replaces the compile-time evaluator used by `(~ (expr ...))`.
    pub fn set_evaluator(&mut self, evaluator: Arc<dyn SnippetEvaluator>) {
        self.evaluator = evaluator;
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    pub fn read(&mut self) -> Result<ReadOutcome, SugarError> {
        reader::read(self, 0)
    }

    /// Reads every remaining top-level form.
    ///
    /// Reading recurses once per nesting level, so it runs on a worker thread
    /// whose stack is sized from the depth limits. Input nested past
    /// `max_read_depth` fails with `DepthLimit` instead of exhausting the
    /// caller's stack.
    pub fn read_all(&mut self) -> Result<Vec<Form>, SugarError> {
        let levels = self.options.max_read_depth.saturating_add(self.options.max_macro_depth);
        let stack_size = levels.saturating_mul(READ_STACK_PER_LEVEL).saturating_add(READ_STACK_BASE);
        let worker = std::thread::scope(|scope| {
            std::thread::Builder::new()
                .name("sugarlisp-read".into())
                .stack_size(stack_size)
                .spawn_scoped(scope, || reader::read_all(self))
                .map(|handle| handle.join())
        });
        match worker {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => std::panic::resume_unwind(panic),
            Err(_) => reader::read_all(self),
        }
    }

    pub fn use_dialect(&mut self, name: &str) -> Result<Option<Arc<Dialect>>, SugarError> {
        dialect::use_dialect(self, name, UseOptions::default())
    }

    // ------------------------------------------------------------------------
    // Dialect stack and scopes
    // ------------------------------------------------------------------------

    /// File-level dialects, most recently used first.
    pub fn dialects(&self) -> &[Arc<Dialect>] {
        &self.dialects
    }

    pub fn file_dialect(&self, name: &str) -> Option<Arc<Dialect>> {
        self.dialects.iter().find(|d| d.name == name).cloned()
    }

    pub(crate) fn push_dialect(&mut self, dialect: Arc<Dialect>) {
        self.dialects.insert(0, dialect);
        self.invalidate_peek();
    }

    pub(crate) fn attach_dialect(&mut self, scope: ScopeId, dialect: Arc<Dialect>) {
        if let Some(node) = self.scopes.get_mut(scope.index()) {
            node.dialect = Some(dialect);
        }
        self.invalidate_peek();
    }

    pub fn current_scope(&self) -> Option<ScopeId> {
        self.current_scope
    }

    pub fn scope(&self, id: ScopeId) -> Option<&ScopeNode> {
        self.scopes.get(id.index())
    }

    pub(crate) fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(ScopeNode { parent, dialect: None });
        ScopeId(self.scopes.len() - 1)
    }

    pub(crate) fn set_scope_parent(&mut self, id: ScopeId, parent: Option<ScopeId>) {
        if let Some(node) = self.scopes.get_mut(id.index()) {
            node.parent = parent;
        }
    }

    /// Opens a scope under the current one and makes it current. Returns the
    /// new scope and the one to restore with [`Session::leave_scope`].
    pub(crate) fn enter_scope(&mut self) -> (ScopeId, Option<ScopeId>) {
        let previous = self.current_scope;
        let scope = self.new_scope(previous);
        self.current_scope = Some(scope);
        (scope, previous)
    }

    pub(crate) fn leave_scope(&mut self, previous: Option<ScopeId>) {
        if self.current_scope != previous {
            self.current_scope = previous;
            self.invalidate_peek();
        }
    }

    /// Dialects to search for a form in `scope`: local dialects from the
    /// innermost scope outwards, then the file-level stack.
    pub fn search_order(&self, scope: Option<ScopeId>) -> Result<Vec<Arc<Dialect>>, SugarError> {
        let limit = self.options.max_scope_depth;
        let mut order = Vec::new();
        let mut cursor = scope;
        let mut steps = 0;
        while let Some(id) = cursor {
            steps += 1;
            if steps > limit {
                return Err(self.report(
                    ErrorKind::DepthLimit {
                        what: "scope chain".into(),
                        limit,
                    },
                    None,
                ));
            }
            let Some(node) = self.scopes.get(id.index()) else {
                break;
            };
            if let Some(dialect) = &node.dialect {
                order.push(Arc::clone(dialect));
            }
            cursor = node.parent;
        }
        order.extend(self.dialects.iter().cloned());
        Ok(order)
    }

    /// Search order at the reading position.
    pub fn active_dialects(&self) -> Result<Vec<Arc<Dialect>>, SugarError> {
        self.search_order(self.current_scope)
    }

    pub(crate) fn find_active(&self, name: &str) -> Result<Option<Arc<Dialect>>, SugarError> {
        Ok(self.active_dialects()?.into_iter().find(|d| d.name == name))
    }

    /// The dialect governing `form`.
    pub fn dialect_for(&self, form: &Form) -> Result<Option<Arc<Dialect>>, SugarError> {
        Ok(self.search_order(form.scope())?.into_iter().next())
    }

    /// Code-generation handlers for `form`'s leading symbol, newest first.
    pub fn keyword_chain(&self, form: &Form) -> Result<Vec<KeywordFn>, SugarError> {
        let Some(head) = form.as_list().and_then(|l| l.head_symbol()) else {
            return Ok(Vec::new());
        };
        for dialect in self.search_order(form.scope())? {
            if let Some(entry) = dialect.keywords.get(head) {
                return Ok(entry.handlers().to_vec());
            }
        }
        Ok(Vec::new())
    }

    /// Records that `name`'s init hooks ran. True the first time.
    pub(crate) fn mark_initialized(&mut self, name: &str) -> bool {
        self.initialized.insert(name.to_string())
    }

    // ------------------------------------------------------------------------
    // Rewind points
    // ------------------------------------------------------------------------

    pub fn mark(&mut self) {
        self.scanner.mark_rewind_point();
    }

    pub fn commit(&mut self) -> Result<(), SugarError> {
        self.scanner.commit_rewind_point()
    }

    pub fn rewind(&mut self) -> Result<(), SugarError> {
        self.invalidate_peek();
        self.scanner.rewind()
    }

    /// Tries an optimistic production. An `Ambiguous` failure rewinds and
    /// yields `None`, dropping the warnings, macros and cells the production
    /// recorded; any other failure rewinds and propagates.
    pub fn attempt<T>(
        &mut self,
        production: impl FnOnce(&mut Session) -> Result<T, SugarError>,
    ) -> Result<Option<T>, SugarError> {
        let depth = self.scanner.depth();
        let warned = self.warnings.len();
        let macros = self.macros.clone();
        let cells = self.cells.clone();
        self.mark();
        let result = production(self);
        let actual = self.scanner.depth();
        if actual != depth + 1 {
            return Err(self.internal_error(ErrorKind::RewindImbalance {
                expected: depth + 1,
                actual,
            }));
        }
        match result {
            Ok(value) => {
                self.commit()?;
                Ok(Some(value))
            }
            Err(err) if matches!(err.kind, ErrorKind::Ambiguous { .. }) => {
                self.rewind()?;
                self.warnings.truncate(warned);
                self.macros = macros;
                self.cells = cells;
                Ok(None)
            }
            Err(err) => {
                self.rewind()?;
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------------

    pub(crate) fn invalidate_peek(&mut self) {
        self.peeked = None;
    }

    fn word_dialect(&self) -> Result<Option<Arc<Dialect>>, SugarError> {
        Ok(self.active_dialects()?.into_iter().next())
    }

    fn scan_word(&mut self) -> Result<Option<Token>, SugarError> {
        let dialect = self.word_dialect()?;
        let empty = BTreeSet::new();
        let rules = match &dialect {
            Some(d) => d.word_rules(),
            None => WordRules {
                terminating: &empty,
                nonterminating: &empty,
            },
        };
        token::read_word(&mut self.scanner, rules)
    }

    /// The next word token, without consuming it. Repeated peeks at the same
    /// state are answered from the cache.
    pub fn peek_word(&mut self) -> Result<Option<Token>, SugarError> {
        if let Some(cache) = &self.peeked {
            if &cache.before == self.scanner.state() {
                return Ok(cache.token.clone());
            }
        }
        let before = self.scanner.state().clone();
        self.scanner.mark_rewind_point();
        let token = self.scan_word();
        let after = self.scanner.state().clone();
        self.scanner.rewind()?;
        let token = token?;
        self.peeked = Some(PeekCache {
            before,
            token: token.clone(),
            after,
        });
        Ok(token)
    }

    /// Consumes the next word token, reusing a cached peek.
    pub fn next_word(&mut self) -> Result<Option<Token>, SugarError> {
        if let Some(cache) = self.peeked.take() {
            if &cache.before == self.scanner.state() {
                self.scanner.restore(cache.after);
                return Ok(cache.token);
            }
        }
        self.scan_word()
    }

    // ------------------------------------------------------------------------
    // Warnings, cells, includes, macros
    // ------------------------------------------------------------------------

    pub fn warn(&mut self, message: impl Into<String>, position: Option<&Position>) {
        let warning = Warning::new(message, self.scanner.source(), position);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn declare_cell(&mut self, name: &str) {
        self.cells.insert(name.to_string());
    }

    /// Notes a reference to a cell, warning when it was never declared.
    pub fn reference_cell(&mut self, name: &str, position: Option<&Position>) -> bool {
        let declared = self.cells.contains(name);
        if !declared {
            self.warn(format!("cell '{}' is referenced but never declared", name), position);
        }
        declared
    }

    pub fn cells(&self) -> &BTreeSet<String> {
        &self.cells
    }

    /// Enters an included file, failing when it is already being read.
    pub fn enter_include(&mut self, file: &str) -> Result<(), SugarError> {
        if self.include_stack.iter().any(|f| f == file) {
            return Err(self.report(ErrorKind::IncludeCycle { file: file.into() }, None));
        }
        self.include_stack.push(file.to_string());
        Ok(())
    }

    pub fn leave_include(&mut self) {
        if self.include_stack.len() > 1 {
            self.include_stack.pop();
        }
    }

    pub(crate) fn request_include(&mut self, file: String) {
        if !self.pending_includes.contains(&file) {
            self.pending_includes.push(file);
        }
    }

    /// Files requested by dialects' `onuse`, for the include resolver.
    pub fn pending_includes(&self) -> &[String] {
        &self.pending_includes
    }

    pub fn define_macro(&mut self, definition: MacroDefinition) {
        self.macros.insert(definition.name.clone(), Arc::new(definition));
    }

    pub fn user_macros(&self) -> &HashMap<String, Arc<MacroDefinition>> {
        &self.macros
    }

    pub(crate) fn take_user_macros(&mut self) -> HashMap<String, Arc<MacroDefinition>> {
        std::mem::take(&mut self.macros)
    }

    /// File-level macros first, then dialect macros in search order.
    pub fn lookup_macro(&self, name: &str, scope: Option<ScopeId>) -> Result<Option<Arc<MacroDefinition>>, SugarError> {
        if let Some(def) = self.macros.get(name) {
            return Ok(Some(Arc::clone(def)));
        }
        Ok(self
            .search_order(scope)?
            .iter()
            .find_map(|d| d.macros.get(name).cloned()))
    }
}

impl ErrorReporting for Session {
    fn report(&self, kind: ErrorKind, position: Option<&Position>) -> SugarError {
        self.scanner.report(kind, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(text: &str) -> Session {
        Session::for_text("s.sl", text, ReaderOptions::default()).unwrap()
    }

    #[test]
    fn peeks_are_transparent_and_cached() {
        let mut s = session("alpha beta");
        let before = s.scanner().position();
        let first = s.peek_word().unwrap().unwrap();
        let again = s.peek_word().unwrap().unwrap();
        assert_eq!(first, again);
        assert_eq!(s.scanner().position(), before);
        assert_eq!(s.next_word().unwrap().unwrap().text, "alpha");
        assert_eq!(s.next_word().unwrap().unwrap().text, "beta");
        assert!(s.next_word().unwrap().is_none());
    }

    #[test]
    fn attempt_rewinds_on_ambiguity_only() {
        let mut s = session("abc");
        let start = s.scanner().state().clone();
        let result = s
            .attempt(|s| -> Result<(), SugarError> {
                s.scanner_mut().next_char(2);
                Err(s.ambiguous("test production"))
            })
            .unwrap();
        assert!(result.is_none());
        assert_eq!(s.scanner().state(), &start);

        let err = s
            .attempt(|s| -> Result<(), SugarError> { Err(s.unexpected_token("x", None)) })
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnexpectedToken { .. }));
        assert_eq!(s.scanner().depth(), 0);
    }

    #[test]
    fn abandoned_attempts_forget_their_side_effects() {
        let mut s = session("abc");
        s.warn("before", None);
        let result = s
            .attempt(|s| -> Result<(), SugarError> {
                s.warn("inside", None);
                s.declare_cell("scratch");
                Err(s.ambiguous("test production"))
            })
            .unwrap();
        assert!(result.is_none());
        assert_eq!(s.warnings().len(), 1);
        assert_eq!(s.warnings()[0].message, "before");
        assert!(s.cells().is_empty());

        s.attempt(|s| -> Result<(), SugarError> {
            s.declare_cell("kept");
            Ok(())
        })
        .unwrap();
        assert!(s.cells().contains("kept"));
    }

    #[test]
    fn unbalanced_attempt_is_detected() {
        let mut s = session("abc");
        let err = s
            .attempt(|s| {
                s.mark();
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::RewindImbalance { expected: 1, actual: 2 }));
    }

    #[test]
    fn scope_walk_is_bounded() {
        let options = ReaderOptions {
            max_scope_depth: 3,
            ..ReaderOptions::default()
        };
        let mut s = Session::for_text("s.sl", "", options).unwrap();
        let mut parent = None;
        for _ in 0..5 {
            parent = Some(s.new_scope(parent));
        }
        let err = s.search_order(parent).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DepthLimit { limit: 3, .. }));
    }

    #[test]
    fn include_cycles_are_rejected() {
        let mut s = session("");
        s.enter_include("lib.sl").unwrap();
        assert!(matches!(
            s.enter_include("s.sl").unwrap_err().kind,
            ErrorKind::IncludeCycle { .. }
        ));
        s.leave_include();
        s.enter_include("lib.sl").unwrap();
    }

    #[test]
    fn undeclared_cells_warn() {
        let mut s = session("");
        s.declare_cell("count");
        assert!(s.reference_cell("count", None));
        assert!(!s.reference_cell("missing", None));
        assert_eq!(s.warnings().len(), 1);
        assert!(s.warnings()[0].message.contains("missing"));
    }
}
