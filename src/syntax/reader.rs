//! The form reader.
//!
//! `read` dispatches the next token through the merged syntax tables of the
//! dialects in search order, then climbs operator precedence so infix,
//! prefix and postfix syntax comes out as canonical prefix lists:
//!
//! ```text
//! 1 + 2 * 3   =>  (+ 1 (* 2 3))
//! 2 ^ 3 ^ 4   =>  (^ 2 (^ 3 4))
//! ```
//!
//! Every handler runs inside a rewind point. A handler that returns
//! `ReadOutcome::Retry` is rolled back and the next candidate is tried: the
//! rest of its fallback chain, then lower-priority keys, then the dialects
//! further down the stack, then the first catch-all.

use std::sync::Arc;

use crate::ast::{Atom, Form, List, ScopeId, Value};
use crate::dialect::{Assoc, Dialect, Entry, Fixity, OperatorSpec, SyntaxEntry, CATCHALL_KEY, DEFAULT_KEY};
use crate::errors::{ErrorKind, ErrorReporting, SugarError};
use crate::macros::{self, MacroDefinition};
use crate::runtime::options::ReaderOptions;
use crate::runtime::session::Session;
use crate::syntax::token::Token;
use crate::syntax::ReadOutcome;

/// Characters after which a dual prefix/postfix operator is read as postfix.
const POSTFIX_FOLLOWERS: &[char] = &[')', ']', '}', ',', ';'];

/// Heads whose arguments are never macro-expanded.
const QUOTING_HEADS: &[&str] = &["macro", "quote", "quasiquote"];

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Reads every top-level form of `text` with the default options.
pub fn read_str(name: &str, text: &str) -> Result<Vec<Form>, SugarError> {
    read_str_with(name, text, ReaderOptions::default())
}

pub fn read_str_with(name: &str, text: &str, options: ReaderOptions) -> Result<Vec<Form>, SugarError> {
    Session::for_text(name, text, options)?.read_all()
}

pub fn read_all(session: &mut Session) -> Result<Vec<Form>, SugarError> {
    let mut forms = Vec::new();
    while !session.scanner().eof() {
        match read(session, 0)? {
            ReadOutcome::Matched(form) if form.is_scratch() => {
                if let Form::List(scratch) = form {
                    forms.extend(scratch.items);
                }
            }
            ReadOutcome::Matched(form) => forms.push(form),
            ReadOutcome::Ignorable => {}
            ReadOutcome::Retry => return Err(no_match(session, None)),
        }
    }
    Ok(forms)
}

/// Reads one form, continuing through operators that bind tighter than
/// `min_precedence`.
pub fn read(session: &mut Session, min_precedence: u32) -> Result<ReadOutcome, SugarError> {
    session.read_depth += 1;
    let limit = session.options().max_read_depth;
    let result = if session.read_depth > limit {
        Err(session.report(
            ErrorKind::DepthLimit {
                what: "form nesting".into(),
                limit,
            },
            None,
        ))
    } else {
        read_expression(session, min_precedence)
    };
    session.read_depth -= 1;
    result
}

fn read_expression(session: &mut Session, min_precedence: u32) -> Result<ReadOutcome, SugarError> {
    if session.scanner().eof() {
        return Err(session.unexpected_eof("a form"));
    }
    let primary = match dispatch(session)? {
        ReadOutcome::Matched(form) => form,
        other => return Ok(other),
    };
    let mut left = reduce_prefix(session, primary)?;

    while let Some((key, spec)) = peek_operator(session)? {
        if spec.precedence <= min_precedence {
            break;
        }
        left = single_operand(session, left, &key)?;
        let operator = consume_operator(session, &key)?;
        left = match spec.fixity {
            Fixity::Infix => {
                let right_precedence = match spec.assoc {
                    Assoc::Right => spec.precedence.saturating_sub(1),
                    Assoc::Left => spec.precedence,
                };
                let right = read_operand(session, right_precedence, &key)?;
                wrap(session, vec![operator, left, right])
            }
            Fixity::Postfix => wrap(session, vec![operator, left]),
            Fixity::Prefix => break,
        };
    }
    Ok(ReadOutcome::Matched(left))
}

/// Reads a form that must exist, skipping effect-only directives.
pub fn read_operand(session: &mut Session, min_precedence: u32, after: &str) -> Result<Form, SugarError> {
    loop {
        if session.scanner().eof() {
            return Err(session.unexpected_eof(&format!("an operand after '{}'", after)));
        }
        match read(session, min_precedence)? {
            ReadOutcome::Matched(form) => return single_operand(session, form, after),
            ReadOutcome::Ignorable => continue,
            ReadOutcome::Retry => return Err(no_match(session, None)),
        }
    }
}

/// Unwraps a macro expansion used as an operand. Expansions producing more
/// or fewer than one form have no single value to operate on.
fn single_operand(session: &Session, form: Form, operator: &str) -> Result<Form, SugarError> {
    match form {
        Form::List(mut scratch) if scratch.no_parenting => {
            if scratch.items.len() == 1 {
                return Ok(scratch.items.remove(0));
            }
            Err(session.report(
                ErrorKind::SplicedOperand {
                    operator: operator.to_string(),
                    count: scratch.items.len(),
                },
                None,
            ))
        }
        form => Ok(form),
    }
}

// ============================================================================
// DISPATCH
// ============================================================================

fn dispatch(session: &mut Session) -> Result<ReadOutcome, SugarError> {
    let order = session.active_dialects()?;
    for dialect in &order {
        let keys = dialect
            .priority_keys
            .iter()
            .chain(dialect.punctuation_keys.iter())
            .map(String::as_str)
            .chain(std::iter::once(DEFAULT_KEY));
        for key in keys {
            let Some(entry) = dialect.syntax.get(key) else {
                continue;
            };
            if let Some(outcome) = try_entry(session, dialect, key, entry)? {
                return Ok(outcome);
            }
        }
    }
    if let Some(dialect) = order.iter().find(|d| d.catchall_entry().is_some()) {
        if let Some(entry) = dialect.catchall_entry() {
            if let Some(outcome) = try_entry(session, dialect, CATCHALL_KEY, entry)? {
                return Ok(outcome);
            }
        }
    }
    Err(no_match(session, order.first()))
}

/// Runs the applicable handlers of `entry` in chain order until one does
/// not retry.
fn try_entry(
    session: &mut Session,
    dialect: &Dialect,
    key: &str,
    entry: &Entry<SyntaxEntry>,
) -> Result<Option<ReadOutcome>, SugarError> {
    for handler in entry.handlers() {
        let Some(len) = match_length(session, dialect, key, handler) else {
            continue;
        };
        session.mark();
        match run_handler(session, key, handler, len) {
            Ok(ReadOutcome::Retry) => session.rewind()?,
            Ok(outcome) => {
                session.commit()?;
                return Ok(Some(outcome));
            }
            Err(err) => {
                session.rewind()?;
                return Err(err);
            }
        }
    }
    Ok(None)
}

/// Characters `handler` would match at the scan position, or `None` when it
/// does not apply.
fn match_length(session: &Session, dialect: &Dialect, key: &str, handler: &SyntaxEntry) -> Option<usize> {
    let scanner = session.scanner();
    let reserved = key == DEFAULT_KEY || key == CATCHALL_KEY;
    let len = match (&handler.matcher, reserved) {
        (Some(pattern), _) => scanner.match_len(pattern)?,
        (None, true) => return Some(0),
        (None, false) => scanner.on_literal(key).then(|| key.chars().count())?,
    };
    let last = scanner.peek_char(len.checked_sub(1)?)?;
    let after = scanner.peek_char(len);
    if last.is_alphanumeric() {
        return dialect.word_rules().is_boundary(after).then_some(len);
    }
    if handler.reader.is_none() && glued_to_symbol(dialect, after) {
        return None;
    }
    Some(len)
}

/// True when `after` is a nonterminating symbol character, so the text at
/// hand is the start of a longer symbol such as `->` rather than an operator.
fn glued_to_symbol(dialect: &Dialect, after: Option<char>) -> bool {
    after.is_some_and(|c| !c.is_alphanumeric() && !c.is_whitespace() && dialect.nonterminating.contains(&c))
}

fn run_handler(session: &mut Session, key: &str, handler: &SyntaxEntry, len: usize) -> Result<ReadOutcome, SugarError> {
    if let Some(reader) = &handler.reader {
        let reader = Arc::clone(reader);
        return reader(session);
    }
    if len == 0 {
        return Ok(ReadOutcome::Retry);
    }
    let scanner = session.scanner_mut();
    scanner.next_char(len);
    let token = scanner.create_token()?;
    let reserved = key == DEFAULT_KEY || key == CATCHALL_KEY;
    let text = if handler.replace && !reserved {
        key.to_string()
    } else {
        token.text.clone()
    };
    let mut atom = token.into_atom(Value::Symbol(text));
    atom.category = handler.atom_category();
    Ok(ReadOutcome::Matched(Form::Atom(atom)))
}

fn no_match(session: &Session, dialect: Option<&Arc<Dialect>>) -> SugarError {
    let found: String = session
        .scanner()
        .remaining()
        .chars()
        .take_while(|c| !c.is_whitespace())
        .take(24)
        .collect();
    session.report(
        ErrorKind::NoSyntaxMatch {
            dialect: dialect.map(|d| d.name.clone()).unwrap_or_else(|| "<none>".into()),
            found,
        },
        None,
    )
}

// ============================================================================
// OPERATORS
// ============================================================================

/// The first operator spec of `fixity` registered for `symbol`.
fn find_operator(session: &Session, symbol: &str, fixity: Fixity) -> Result<Option<OperatorSpec>, SugarError> {
    for dialect in session.active_dialects()? {
        if let Some(specs) = dialect.operator(symbol) {
            return Ok(specs.iter().find(|s| s.fixity == fixity).cloned());
        }
    }
    Ok(None)
}

/// Turns an operator atom directly followed by its operand into `(op operand)`.
fn reduce_prefix(session: &mut Session, primary: Form) -> Result<Form, SugarError> {
    let Form::Atom(atom) = &primary else {
        return Ok(primary);
    };
    if !atom.is_category("operator") {
        return Ok(primary);
    }
    let Some(symbol) = atom.as_symbol().map(str::to_string) else {
        return Ok(primary);
    };
    let Some(spec) = find_operator(session, &symbol, Fixity::Prefix)? else {
        return Ok(primary);
    };
    let scanner = session.scanner();
    if !scanner.adjacent() || scanner.peek_char(0).is_some_and(|c| POSTFIX_FOLLOWERS.contains(&c)) {
        return Ok(primary);
    }
    let operand = read_operand(session, spec.precedence, &symbol)?;
    let mut operator = atom.clone();
    if let Some(alt) = spec.altprefix {
        operator.value = Value::Symbol(alt);
    }
    Ok(wrap(session, vec![Form::Atom(operator), operand]))
}

/// The infix or postfix operator at the scan position, if one applies.
///
/// A matching key that only reads as prefix here shadows shorter keys, so
/// `x ++i` never reads as `x + (+i)`; longer keys from any dialect still apply.
fn peek_operator(session: &Session) -> Result<Option<(String, OperatorSpec)>, SugarError> {
    let scanner = session.scanner();
    if scanner.eof() {
        return Ok(None);
    }
    let mut shadowed = 0;
    for dialect in session.active_dialects()? {
        for key in &dialect.operator_keys {
            let len = key.chars().count();
            if len <= shadowed || !scanner.on_literal(key) {
                continue;
            }
            let after = scanner.peek_char(len);
            let boundary_ok = match key.chars().last() {
                Some(c) if c.is_alphanumeric() => dialect.word_rules().is_boundary(after),
                _ => !glued_to_symbol(&dialect, after),
            };
            if !boundary_ok {
                continue;
            }
            let Some(specs) = dialect.operator(key) else {
                continue;
            };
            let find = |fixity: Fixity| specs.iter().find(|s| s.fixity == fixity);
            if let Some(infix) = find(Fixity::Infix) {
                return Ok(Some((key.clone(), infix.clone())));
            }
            match find(Fixity::Postfix) {
                Some(postfix) if find(Fixity::Prefix).is_none() || in_postfix_position(session, len) => {
                    return Ok(Some((key.clone(), postfix.clone())));
                }
                _ => shadowed = len,
            }
        }
    }
    Ok(None)
}

/// `i++ ` reads as postfix, `x ++i` as prefix: postfix needs the operator
/// glued to its operand and followed by whitespace, a closer, or the end.
fn in_postfix_position(session: &Session, len: usize) -> bool {
    let scanner = session.scanner();
    let followed_ok = match scanner.peek_char(len) {
        None => true,
        Some(c) => c.is_whitespace() || POSTFIX_FOLLOWERS.contains(&c),
    };
    scanner.adjacent() && followed_ok
}

fn consume_operator(session: &mut Session, key: &str) -> Result<Form, SugarError> {
    let scanner = session.scanner_mut();
    scanner.next_char(key.chars().count());
    let token = scanner.create_token()?;
    Ok(Form::Atom(token.into_symbol().with_category("operator")))
}

/// Builds a list for generated structure, giving it a scope under the
/// current one and re-parenting the items into it.
pub fn wrap(session: &mut Session, items: Vec<Form>) -> Form {
    let parent = session.current_scope();
    let scope = session.new_scope(parent);
    let open = items.iter().find_map(Form::pos).cloned();
    let mut list = List {
        open,
        scope: Some(scope),
        parent,
        ..Default::default()
    };
    for item in items {
        if let Form::List(inner) = &item {
            if let Some(inner_scope) = inner.scope {
                session.set_scope_parent(inner_scope, Some(scope));
            }
        }
        list.push(item);
    }
    Form::List(list)
}

// ============================================================================
// LISTS
// ============================================================================

/// Reads `open` item... `close` into a list with its own scope. Nothing is
/// expanded; see [`read_list`].
pub fn read_sequence(session: &mut Session, open: &str, close: &str, construct: &str) -> Result<List, SugarError> {
    if !session.scanner().on_literal(open) {
        let found = session.scanner().peek_str(1);
        return Err(session.unexpected_token(&found, None));
    }
    let open_token = {
        let scanner = session.scanner_mut();
        scanner.next_char(open.chars().count());
        scanner.create_token()?
    };
    let (scope, previous) = session.enter_scope();
    let quote_depth = session.quote_depth;
    let result = read_items(session, &open_token, close, construct, scope, previous);
    session.quote_depth = quote_depth;
    session.leave_scope(previous);
    result
}

fn read_items(
    session: &mut Session,
    open: &Token,
    close: &str,
    construct: &str,
    scope: ScopeId,
    parent: Option<ScopeId>,
) -> Result<List, SugarError> {
    let mut list = List {
        open: Some(open.pos.clone()),
        open_prelude: open.prelude.clone(),
        scope: Some(scope),
        parent,
        ..Default::default()
    };
    loop {
        if session.scanner().eof() {
            return Err(session.unterminated(close, construct, &open.pos));
        }
        if session.scanner().on_literal(close) {
            let scanner = session.scanner_mut();
            scanner.next_char(close.chars().count());
            let token = scanner.create_token()?;
            list.close = Some(token.pos);
            list.close_prelude = token.prelude;
            return Ok(list);
        }
        match read(session, 0)? {
            ReadOutcome::Matched(form) => {
                let was_empty = list.is_empty();
                splice_into(&mut list, form);
                if was_empty && list.head_symbol().is_some_and(|h| QUOTING_HEADS.contains(&h)) {
                    session.quote_depth += 1;
                }
            }
            ReadOutcome::Ignorable => {}
            ReadOutcome::Retry => return Err(no_match(session, None)),
        }
    }
}

/// Appends `form`, splicing the items of a scratch list.
pub fn splice_into(list: &mut List, form: Form) {
    match form {
        Form::List(scratch) if scratch.no_parenting => {
            for item in scratch.items {
                list.push(item);
            }
        }
        form => list.push(form),
    }
}

/// Reads a parenthesized list, then registers it as a macro definition or
/// expands it as a macro call where that applies.
pub fn read_list(session: &mut Session, open: &str, close: &str) -> Result<ReadOutcome, SugarError> {
    let list = read_sequence(session, open, close, "list")?;
    complete_list(session, list)
}

pub fn complete_list(session: &mut Session, list: List) -> Result<ReadOutcome, SugarError> {
    if session.quote_depth > 0 {
        return Ok(ReadOutcome::Matched(Form::List(list)));
    }
    let Some(head) = list.head_symbol() else {
        return Ok(ReadOutcome::Matched(Form::List(list)));
    };
    if head == "macro" {
        let form = Form::List(list);
        let definition = MacroDefinition::parse(&form).map_err(|kind| session.report(kind, form.pos()))?;
        if definition.name.is_empty() {
            return Err(session.report(
                ErrorKind::InvalidMacro {
                    macro_name: "<anonymous>".into(),
                    reason: "a macro read from source needs a name".into(),
                },
                form.pos(),
            ));
        }
        session.define_macro(definition);
        return Ok(ReadOutcome::Ignorable);
    }
    match session.lookup_macro(head, list.scope)? {
        Some(definition) => {
            let expanded = macros::expand_call(session, &list, &definition)?;
            Ok(ReadOutcome::Matched(expanded))
        }
        None => Ok(ReadOutcome::Matched(Form::List(list))),
    }
}

/// Reads the form after a prefix such as `'` and wraps it as `(head form)`.
pub fn read_wrapped(session: &mut Session, prefix: &str, head: &str) -> Result<ReadOutcome, SugarError> {
    let token = {
        let scanner = session.scanner_mut();
        scanner.next_char(prefix.chars().count());
        scanner.create_token()?
    };
    let quoting = QUOTING_HEADS.contains(&head);
    if quoting {
        session.quote_depth += 1;
    }
    let operand = read_operand(session, 0, prefix);
    if quoting {
        session.quote_depth -= 1;
    }
    let operand = operand?;
    let mut head_atom: Atom = token.into_symbol();
    head_atom.value = Value::Symbol(head.to_string());
    Ok(ReadOutcome::Matched(wrap(session, vec![Form::Atom(head_atom), operand])))
}
