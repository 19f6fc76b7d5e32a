//! Handle registry protocol
//!
//! Every native object crosses the boundary as a record `#s(TYPE PTR)` whose
//! single field is a user pointer. The pointer's finalizer doubles as the type
//! tag: validation checks the record shape first, then compares the finalizer
//! by identity against the one registered for the expected kind. A record of
//! the right shape holding somebody else's pointer fails the second check.

use super::Context;
use super::cursor::Cursor;
use super::language::LanguageData;
use super::node::{NodeRef, TreeHandle};
use super::query::QueryHandle;
use crate::host::{BorrowError, Env, Finalizer, Record, Symbol, UserPtr, Value};
use crate::{Error, Result};
use std::any::Any;
use std::cell::{Ref, RefMut};

/// The kinds of native object the bridge hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Language,
    Query,
    QueryCursor,
    Tree,
    Node,
}

impl HandleKind {
    /// Get all handle kinds
    pub fn all() -> &'static [HandleKind] {
        &[
            HandleKind::Language,
            HandleKind::Query,
            HandleKind::QueryCursor,
            HandleKind::Tree,
            HandleKind::Node,
        ]
    }

    /// Host record type name
    pub fn record_name(&self) -> &'static str {
        match self {
            HandleKind::Language => super::symbols::LANGUAGE_RECORD,
            HandleKind::Query => super::symbols::QUERY_RECORD,
            HandleKind::QueryCursor => super::symbols::CURSOR_RECORD,
            HandleKind::Tree => super::symbols::TREE_RECORD,
            HandleKind::Node => super::symbols::NODE_RECORD,
        }
    }

    /// Predicate named in `wrong-type-argument` signals
    pub fn predicate(&self) -> &'static str {
        match self {
            HandleKind::Language => "tree-sitter-language-p",
            HandleKind::Query => "tree-sitter-query-p",
            HandleKind::QueryCursor => "tree-sitter-query-cursor-p",
            HandleKind::Tree => "tree-sitter-tree-p",
            HandleKind::Node => "tree-sitter-node-p",
        }
    }

    /// The finalizer that tags pointers of this kind
    pub fn finalizer(&self) -> &'static Finalizer {
        match self {
            HandleKind::Language => &LANGUAGE_FINALIZER,
            HandleKind::Query => &QUERY_FINALIZER,
            HandleKind::QueryCursor => &CURSOR_FINALIZER,
            HandleKind::Tree => &TREE_FINALIZER,
            HandleKind::Node => &NODE_FINALIZER,
        }
    }

    /// Map a finalizer back to the kind it tags
    pub fn of(finalizer: &'static Finalizer) -> Option<HandleKind> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.finalizer().is(finalizer))
    }

    fn type_symbol<'a>(&self, ctx: &'a Context) -> &'a Symbol {
        let symbols = &ctx.symbols;
        match self {
            HandleKind::Language => &symbols.language_type,
            HandleKind::Query => &symbols.query_type,
            HandleKind::QueryCursor => &symbols.cursor_type,
            HandleKind::Tree => &symbols.tree_type,
            HandleKind::Node => &symbols.node_type,
        }
    }

    fn constructor<'a>(&self, ctx: &'a Context) -> &'a Symbol {
        let symbols = &ctx.symbols;
        match self {
            HandleKind::Language => &symbols.language_create,
            HandleKind::Query => &symbols.query_create,
            HandleKind::QueryCursor => &symbols.cursor_create,
            HandleKind::Tree => &symbols.tree_create,
            HandleKind::Node => &symbols.node_create,
        }
    }
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.record_name())
    }
}

fn release<T: Any>(kind: HandleKind, payload: Box<dyn Any>) {
    match payload.downcast::<T>() {
        Ok(payload) => {
            tracing::debug!("Releasing {}", kind);
            drop(payload);
        }
        Err(_) => tracing::error!("Finalizer for {} received a foreign payload", kind),
    }
}

fn release_language(payload: Box<dyn Any>) {
    release::<LanguageData>(HandleKind::Language, payload);
}

fn release_query(payload: Box<dyn Any>) {
    release::<QueryHandle>(HandleKind::Query, payload);
}

fn release_cursor(payload: Box<dyn Any>) {
    release::<Cursor>(HandleKind::QueryCursor, payload);
}

fn release_tree(payload: Box<dyn Any>) {
    release::<TreeHandle>(HandleKind::Tree, payload);
}

fn release_node(payload: Box<dyn Any>) {
    release::<NodeRef>(HandleKind::Node, payload);
}

static LANGUAGE_FINALIZER: Finalizer = Finalizer {
    name: "tree-sitter-language",
    release: release_language,
};

static QUERY_FINALIZER: Finalizer = Finalizer {
    name: "tree-sitter-query",
    release: release_query,
};

static CURSOR_FINALIZER: Finalizer = Finalizer {
    name: "tree-sitter-query-cursor",
    release: release_cursor,
};

static TREE_FINALIZER: Finalizer = Finalizer {
    name: "tree-sitter-tree",
    release: release_tree,
};

static NODE_FINALIZER: Finalizer = Finalizer {
    name: "tree-sitter-node",
    release: release_node,
};

/// Wrap `payload` in a user pointer and package it with the host constructor.
///
/// If the host signals while building the record, the payload is released
/// before the error is returned.
pub fn wrap<T: Any>(env: &mut Env, ctx: &Context, kind: HandleKind, payload: T) -> Result<Value> {
    let ptr = env.make_user_ptr(kind.finalizer(), Box::new(payload));
    let constructor = kind.constructor(ctx).clone();
    wrap_with(env, &constructor, ptr)
}

fn wrap_with(env: &mut Env, constructor: &Symbol, ptr: Value) -> Result<Value> {
    match env.funcall(constructor, std::slice::from_ref(&ptr)) {
        Ok(record) => Ok(record),
        Err(signal) => {
            if let Some(user_ptr) = ptr.as_user_ptr() {
                user_ptr.release();
            }
            Err(Error::Init(format!("{} failed: {}", constructor, signal)))
        }
    }
}

/// Structural check: a record of `type_tag` with exactly `fields` fields
pub fn check_record_type<'a>(value: &'a Value, type_tag: &Symbol, fields: usize) -> Option<&'a Record> {
    value
        .as_record()
        .filter(|record| record.type_tag() == type_tag && record.fields().len() == fields)
}

/// Return the user pointer inside `value` if it is a live handle of `kind`
pub fn validate(ctx: &Context, value: &Value, kind: HandleKind) -> Option<UserPtr> {
    let record = check_record_type(value, kind.type_symbol(ctx), 1)?;
    let ptr = record.field(0)?.as_user_ptr()?;
    if !ptr.finalizer().is(kind.finalizer()) {
        return None;
    }
    Some(ptr.clone())
}

/// Whether `value` is a handle of `kind`
pub fn is_handle(ctx: &Context, value: &Value, kind: HandleKind) -> bool {
    validate(ctx, value, kind).is_some_and(|ptr| !ptr.is_released())
}

/// Like [`validate`], but failing with a wrong-type error
pub fn extract(ctx: &Context, value: &Value, kind: HandleKind) -> Result<UserPtr> {
    validate(ctx, value, kind).ok_or_else(|| wrong_type(kind, value))
}

/// Release the native resource behind `value` now.
///
/// Returns `false` if it had already been released.
pub fn release_now(ctx: &Context, value: &Value, kind: HandleKind) -> Result<bool> {
    Ok(extract(ctx, value, kind)?.release())
}

/// Borrow the payload of a validated pointer
pub fn borrow<'a, T: Any>(ptr: &'a UserPtr, value: &Value, kind: HandleKind) -> Result<Ref<'a, T>> {
    ptr.borrow::<T>().map_err(|err| borrow_error(err, value, kind))
}

/// Mutably borrow the payload of a validated pointer
pub fn borrow_mut<'a, T: Any>(ptr: &'a UserPtr, value: &Value, kind: HandleKind) -> Result<RefMut<'a, T>> {
    ptr.borrow_mut::<T>().map_err(|err| borrow_error(err, value, kind))
}

fn borrow_error(err: BorrowError, value: &Value, kind: HandleKind) -> Error {
    match err {
        BorrowError::Released => Error::Released(kind.record_name()),
        BorrowError::Busy => Error::Busy(kind.record_name()),
        BorrowError::Mismatch => wrong_type(kind, value),
    }
}

pub(crate) fn wrong_type(kind: HandleKind, value: &Value) -> Error {
    Error::WrongType {
        predicate: kind.predicate(),
        value: value.clone(),
    }
}
