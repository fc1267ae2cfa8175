// tests/dialect_tests.rs
//
// Dialect modules are cached process-wide by name, so every test registers
// dialects under names of its own.

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{options, read, session, texts};
use sugarlisp::dialect::{
    register_dialect, use_dialect, DialectLoader, DialectModule, Generated, OperatorSpec, SyntaxEntry, UseOptions,
};
use sugarlisp::{ErrorKind, Form, ReadOutcome, ReaderOptions, Session, SourceContext, SugarError};

fn consume_word(session: &mut Session, len: usize) -> Result<(), SugarError> {
    let scanner = session.scanner_mut();
    scanner.next_char(len);
    scanner.create_token()?;
    Ok(())
}

#[test]
fn extending_dialect_runs_first_and_falls_back_on_retry() {
    register_dialect(
        DialectModule::builder("t-fallback-a")
            .extends("core")
            .syntax(
                "foo",
                SyntaxEntry::reader(|s| {
                    consume_word(s, 3)?;
                    Ok(Form::symbol("from-a").into())
                }),
            )
            .build(),
    );
    register_dialect(
        DialectModule::builder("t-fallback-b")
            .extends("t-fallback-a")
            .syntax(
                "foo",
                SyntaxEntry::reader(|s| {
                    if s.scanner().position().line != 1 {
                        return Ok(ReadOutcome::Retry);
                    }
                    consume_word(s, 3)?;
                    Ok(Form::symbol("from-b").into())
                }),
            )
            .build(),
    );
    assert_eq!(texts("t-fallback-b", "foo\nfoo"), vec!["from-b", "from-a"]);
}

#[test]
fn retrying_reader_leaves_the_scanner_untouched() {
    register_dialect(
        DialectModule::builder("t-greedy-retry")
            .extends("core")
            .syntax(
                "x",
                SyntaxEntry::reader(|s| {
                    s.scanner_mut().next_char(5);
                    Ok(ReadOutcome::Retry)
                }),
            )
            .build(),
    );
    assert_eq!(texts("t-greedy-retry", "x y"), vec!["x", "y"]);
}

#[test]
fn keywords_without_syntax_read_as_keyword_atoms() {
    register_dialect(
        DialectModule::builder("t-keywords")
            .extends("core")
            .keyword("emit-me", |_, _| Ok(Generated::NoCode))
            .build(),
    );
    let forms = read("t-keywords", "(emit-me emit-me-not)").unwrap();
    let list = forms[0].as_list().unwrap();
    assert_eq!(list.items[0].as_atom().unwrap().category.as_deref(), Some("keyword"));
    assert_eq!(list.items[1].as_atom().unwrap().category, None);
}

#[test]
fn keyword_chain_follows_the_form_scope() {
    let mut s = session("core", "'(macro m () 1) (other)");
    let forms = s.read_all().unwrap();
    let definition = &forms[0].as_list().unwrap().items[1];
    assert_eq!(s.keyword_chain(definition).unwrap().len(), 1);
    assert!(s.keyword_chain(&forms[1]).unwrap().is_empty());
}

#[test]
fn module_without_tables_is_rejected() {
    register_dialect(DialectModule::builder("t-empty").build());
    let err = Session::for_text("t.sl", "x", options("t-empty")).err().unwrap();
    assert!(matches!(err.kind, ErrorKind::InvalidDialect { ref name, .. } if name == "t-empty"));
}

#[test]
fn extends_can_be_disabled() {
    let opts = ReaderOptions {
        base_dialect: "plus".into(),
        allow_extends: false,
        ..ReaderOptions::default()
    };
    let mut s = Session::for_text("t.sl", "abc", opts).unwrap();
    assert_eq!(s.dialects().len(), 1);
    let err = s.read_all().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NoSyntaxMatch { ref dialect, .. } if dialect == "plus"));
}

#[test]
fn file_dialects_stack_most_recent_first() {
    let mut s = session("core", "");
    s.use_dialect("reactive").unwrap();
    s.use_dialect("plus").unwrap();
    let names: Vec<&str> = s.dialects().iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["plus", "reactive", "core"]);
    let again = s.use_dialect("plus").unwrap().unwrap();
    assert!(Arc::ptr_eq(&again, &s.dialects()[0]));
    assert_eq!(s.dialects().len(), 3);
}

#[test]
fn forced_use_merges_again() {
    let mut s = session("plus", "");
    let first = s.file_dialect("plus").unwrap();
    let forced = use_dialect(&mut s, "plus", UseOptions { local: false, force: true })
        .unwrap()
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &forced));
    assert!(Arc::ptr_eq(&forced, &s.dialects()[0]));
}

#[test]
fn init_hooks_run_once_per_session() {
    static RUNS: AtomicUsize = AtomicUsize::new(0);
    register_dialect(
        DialectModule::builder("t-init-once")
            .extends("core")
            .syntax("zz", SyntaxEntry::token())
            .init(|_| {
                RUNS.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build(),
    );
    let mut s = session("t-init-once", "");
    use_dialect(&mut s, "t-init-once", UseOptions { local: false, force: true }).unwrap();
    assert_eq!(RUNS.load(Ordering::SeqCst), 1);
    session("t-init-once", "");
    assert_eq!(RUNS.load(Ordering::SeqCst), 2);
}

#[test]
fn onuse_requests_an_include() {
    register_dialect(
        DialectModule::builder("t-onuse")
            .extends("core")
            .syntax("qq", SyntaxEntry::token())
            .onuse("runtime/support.sl")
            .build(),
    );
    let s = session("t-onuse", "");
    assert_eq!(s.pending_includes(), ["runtime/support.sl".to_string()]);
}

#[test]
fn first_registration_wins() {
    let first = register_dialect(
        DialectModule::builder("t-first-wins")
            .syntax("a", SyntaxEntry::token())
            .build(),
    );
    let second = register_dialect(
        DialectModule::builder("t-first-wins")
            .syntax("b", SyntaxEntry::token())
            .build(),
    );
    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.syntax.as_ref().unwrap().contains_key("a"));
}

struct MapLoader(HashMap<&'static str, fn() -> DialectModule>);

impl DialectLoader for MapLoader {
    fn load(&self, name: &str) -> Option<DialectModule> {
        self.0.get(name).map(|build| build())
    }
}

fn loader_core() -> DialectModule {
    DialectModule::builder("t-loader-core")
        .syntax(
            "__default",
            SyntaxEntry::reader(|s| match s.next_word()? {
                Some(token) => Ok(Form::string(token.text).into()),
                None => Ok(ReadOutcome::Retry),
            }),
        )
        .build()
}

#[test]
fn custom_loaders_supply_missing_dialects() {
    let mut modules: HashMap<&'static str, fn() -> DialectModule> = HashMap::new();
    modules.insert("t-loader-core", loader_core);
    let opts = options("t-loader-core");
    let mut s = Session::with_loader(
        SourceContext::from_file("l.sl", "a b"),
        opts,
        Arc::new(MapLoader(modules)),
    )
    .unwrap();
    let forms = s.read_all().unwrap();
    assert_eq!(forms, vec![Form::string("a"), Form::string("b")]);
}

#[test]
fn terminating_characters_come_from_keys() {
    register_dialect(
        DialectModule::builder("t-arrow")
            .extends("core")
            .syntax("=>", SyntaxEntry::token().category("arrow"))
            .build(),
    );
    assert_eq!(texts("t-arrow", "(a=>b)"), vec!["(a => b)"]);
    let forms = read("t-arrow", "=>").unwrap();
    assert_eq!(forms[0].as_atom().unwrap().category.as_deref(), Some("arrow"));
}

#[test]
fn explicit_priority_beats_a_longer_key() {
    register_dialect(
        DialectModule::builder("t-priority")
            .extends("core")
            .syntax("=>a", SyntaxEntry::token().category("long"))
            .syntax("=>", SyntaxEntry::token().priority(10).category("short"))
            .build(),
    );
    let forms = read("t-priority", "=>a").unwrap();
    assert!(forms[0].as_atom().is_some_and(|atom| atom.is_category("short")));
    assert_eq!(texts("t-priority", "=>a"), vec!["=>", "a"]);
}

#[test]
fn prefix_only_keys_leave_longer_operators_beneath() {
    register_dialect(
        DialectModule::builder("t-prefix-top")
            .extends("plus")
            .syntax("<", SyntaxEntry::token().operator(OperatorSpec::prefix(15)))
            .build(),
    );
    assert_eq!(texts("t-prefix-top", "a <= b"), vec!["(<= a b)"]);
}
