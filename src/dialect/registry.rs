//! Dialect loading and merging.
//!
//! Modules are loaded once per name into a process-wide, append-only cache.
//! Using a dialect merges the cached module against the dialects already
//! active in the session: keys it shares with them keep the older handlers
//! as fallbacks, and the derived tables are recomputed from scratch.
//!
//! ## Usage
//! ```rust
//! use sugarlisp::dialect::{use_dialect, UseOptions};
//! use sugarlisp::{ReaderOptions, Session};
//! let mut session = Session::for_text("demo.sl", "1 + 2", ReaderOptions::default()).unwrap();
//! use_dialect(&mut session, "plus", UseOptions::default()).unwrap();
//! assert_eq!(session.read_all().unwrap()[0].pretty(), "(+ 1 2)");
//! ```

use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use super::{
    builtin, Dialect, DialectModule, Entry, KeywordFn, SyntaxEntry, CATCHALL_KEY, DEFAULT_KEY,
};
use crate::errors::{ErrorKind, ErrorReporting, SugarError};
use crate::macros;
use crate::runtime::session::Session;

static DIALECT_CACHE: Lazy<RwLock<HashMap<String, Arc<DialectModule>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

// ============================================================================
// LOADING
// ============================================================================

/// Fetches a dialect module by name on a cache miss.
pub trait DialectLoader: Send + Sync {
    fn load(&self, name: &str) -> Option<DialectModule>;
}

/// Loads the dialects shipped with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLoader;

impl DialectLoader for BuiltinLoader {
    fn load(&self, name: &str) -> Option<DialectModule> {
        builtin::module(name)
    }
}

/// Adds `module` to the process-wide cache. The first registration of a
/// name wins; later ones get the cached module back.
pub fn register_dialect(module: DialectModule) -> Arc<DialectModule> {
    let mut cache = DIALECT_CACHE.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(
        cache
            .entry(module.name.clone())
            .or_insert_with(|| Arc::new(module)),
    )
}

/// Names currently in the process-wide cache, sorted.
pub fn cached_dialect_names() -> Vec<String> {
    let cache = DIALECT_CACHE.read().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut names: Vec<String> = cache.keys().cloned().collect();
    names.sort();
    names
}

fn load_module(name: &str, loader: &dyn DialectLoader) -> Option<Arc<DialectModule>> {
    {
        let cache = DIALECT_CACHE.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(module) = cache.get(name) {
            return Some(Arc::clone(module));
        }
    }
    loader.load(name).map(register_dialect)
}

// ============================================================================
// ACTIVATION
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UseOptions {
    /// Attach to the list being read instead of the file-level stack.
    pub local: bool,
    /// Merge again even when the dialect is already active.
    pub force: bool,
}

impl UseOptions {
    pub fn local() -> Self {
        UseOptions {
            local: true,
            force: false,
        }
    }
}

/// Activates `name` in `session`, returning the merged dialect.
///
/// `Ok(None)` means an unknown local dialect was skipped with a warning and
/// the enclosing dialects stay in effect.
pub fn use_dialect(session: &mut Session, name: &str, options: UseOptions) -> Result<Option<Arc<Dialect>>, SugarError> {
    let mut activating = Vec::new();
    activate(session, name, options, &mut activating)
}

fn activate(
    session: &mut Session,
    name: &str,
    options: UseOptions,
    activating: &mut Vec<String>,
) -> Result<Option<Arc<Dialect>>, SugarError> {
    if !options.force {
        let already = if options.local {
            session.find_active(name)?
        } else {
            session.file_dialect(name)
        };
        if let Some(dialect) = already {
            return Ok(Some(dialect));
        }
    }

    let Some(module) = load_module(name, session.loader()) else {
        if options.local {
            let pos = session.scanner().token_position();
            session.warn(
                format!("unknown dialect '{}' ignored, the enclosing dialect stays in effect", name),
                Some(&pos),
            );
            return Ok(None);
        }
        return Err(session.report(ErrorKind::UnknownDialect { name: name.into() }, None));
    };

    if module.syntax.is_none() && module.keywords.is_none() {
        return Err(session.report(
            ErrorKind::InvalidDialect {
                name: name.into(),
                reason: "it defines neither syntax nor keywords".into(),
            },
            None,
        ));
    }

    activating.push(name.to_string());
    if session.options().allow_extends {
        for parent in &module.extends {
            if activating.contains(parent) {
                continue;
            }
            let parent_options = UseOptions {
                local: options.local,
                force: false,
            };
            activate(session, parent, parent_options, activating)?;
        }
    }
    activating.pop();

    let scope = if options.local { session.current_scope() } else { None };
    let beneath = session.search_order(scope)?;
    let dialect = Arc::new(merge(session, &module, &beneath)?);

    match scope {
        Some(scope) => session.attach_dialect(scope, Arc::clone(&dialect)),
        None => session.push_dialect(Arc::clone(&dialect)),
    }

    if let Some(include) = &module.onuse {
        session.request_include(include.clone());
    }
    if session.mark_initialized(name) {
        for hook in [&module.init, &module.syntax_init, &module.keywords_init]
            .into_iter()
            .flatten()
        {
            hook(session)?;
        }
    }
    Ok(Some(dialect))
}

// ============================================================================
// MERGING
// ============================================================================

/// Merges `module` over `beneath` (search order, innermost first).
fn merge(session: &Session, module: &Arc<DialectModule>, beneath: &[Arc<Dialect>]) -> Result<Dialect, SugarError> {
    let mut own = module.syntax.clone().unwrap_or_default();
    let own_keywords = module.keywords.clone().unwrap_or_default();
    for keyword in own_keywords.keys() {
        own.entry(keyword.clone())
            .or_insert_with(|| SyntaxEntry::token().category("keyword"));
    }

    let mut syntax: HashMap<String, Entry<SyntaxEntry>> = HashMap::new();
    for (key, entry) in own {
        let fallback = beneath.iter().find_map(|d| d.syntax.get(&key));
        let merged = match fallback {
            Some(older) => Entry::Single(entry).then(older),
            None => Entry::Single(entry),
        };
        syntax.insert(key, merged);
    }

    let mut keywords: HashMap<String, Entry<KeywordFn>> = HashMap::new();
    for (name, handler) in own_keywords {
        let fallback = beneath.iter().find_map(|d| d.keywords.get(&name));
        let merged = match fallback {
            Some(older) => Entry::Single(handler).then(older),
            None => Entry::Single(handler),
        };
        keywords.insert(name, merged);
    }

    let mut ranked: Vec<(i64, String, bool)> = syntax
        .iter()
        .filter(|(key, _)| key.as_str() != DEFAULT_KEY && key.as_str() != CATCHALL_KEY)
        .map(|(key, entry)| {
            let handlers = entry.handlers();
            let explicit = handlers.iter().filter_map(|h| h.priority).max();
            let priority = explicit.unwrap_or(key.chars().count() as i64);
            let punctuation = handlers.first().is_some_and(|h| h.punctuation);
            (priority, key.clone(), punctuation)
        })
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    let priority_keys = ranked.iter().filter(|r| !r.2).map(|r| r.1.clone()).collect();
    let punctuation_keys = ranked.iter().filter(|r| r.2).map(|r| r.1.clone()).collect();

    let mut operators = HashMap::new();
    for (key, entry) in &syntax {
        if let Some(handler) = entry.handlers().iter().find(|h| h.is_operator()) {
            operators.insert(key.clone(), handler.operators.clone());
        }
    }
    let mut operator_keys: Vec<String> = operators.keys().cloned().collect();
    operator_keys.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));

    let below = beneath.first();
    let terminating: BTreeSet<char> = match &module.terminating_override {
        Some(chars) => chars.iter().copied().collect(),
        None => syntax
            .keys()
            .filter(|key| key.as_str() != DEFAULT_KEY && key.as_str() != CATCHALL_KEY)
            .filter_map(|key| key.chars().next())
            .filter(|c| !c.is_alphanumeric())
            .chain(below.into_iter().flat_map(|d| d.terminating.iter().copied()))
            .chain(module.terminating.iter().copied())
            .collect(),
    };
    let nonterminating: BTreeSet<char> = module
        .nonterminating
        .iter()
        .copied()
        .chain(below.into_iter().flat_map(|d| d.nonterminating.iter().copied()))
        .collect();

    let macros = match &module.macro_source {
        Some(text) => macros::definitions_from_source(&module.name, text)
            .map_err(|e| {
                session.report(
                    ErrorKind::InvalidDialect {
                        name: module.name.clone(),
                        reason: format!("its macros do not read: {}", e.kind),
                    },
                    None,
                )
            })?
            .into_iter()
            .map(|def| (def.name.clone(), Arc::new(def)))
            .collect(),
        None => HashMap::new(),
    };

    Ok(Dialect {
        name: module.name.clone(),
        syntax,
        keywords,
        extends: module.extends.clone(),
        priority_keys,
        punctuation_keys,
        operators,
        operator_keys,
        terminating,
        nonterminating,
        macros,
        module: Arc::clone(module),
    })
}
