//! Query handles
//!
//! A query is compiled once against a language and then shared by any number
//! of cursor executions. The handle is the only strong owner of the compiled
//! query; cursors keep a weak reference, so a cursor whose query was
//! reclaimed fails with an error instead of matching against freed state.

use super::handle::{self, HandleKind};
use super::literals::string_literals;
use super::{Context, SubrSpec, language, marshal};
use crate::host::{Env, Value};
use crate::{Error, Result};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// Why a query failed to compile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    None,
    Syntax,
    NodeType,
    Field,
    Capture,
    Structure,
    Predicate,
    Language,
}

impl QueryErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryErrorKind::None => "None",
            QueryErrorKind::Syntax => "Syntax",
            QueryErrorKind::NodeType => "NodeType",
            QueryErrorKind::Field => "Field",
            QueryErrorKind::Capture => "Capture",
            QueryErrorKind::Structure => "Structure",
            QueryErrorKind::Predicate => "Predicate",
            QueryErrorKind::Language => "Language",
        }
    }
}

impl From<tree_sitter::QueryErrorKind> for QueryErrorKind {
    fn from(kind: tree_sitter::QueryErrorKind) -> Self {
        match kind {
            tree_sitter::QueryErrorKind::Syntax => QueryErrorKind::Syntax,
            tree_sitter::QueryErrorKind::NodeType => QueryErrorKind::NodeType,
            tree_sitter::QueryErrorKind::Field => QueryErrorKind::Field,
            tree_sitter::QueryErrorKind::Capture => QueryErrorKind::Capture,
            tree_sitter::QueryErrorKind::Structure => QueryErrorKind::Structure,
            tree_sitter::QueryErrorKind::Predicate => QueryErrorKind::Predicate,
            tree_sitter::QueryErrorKind::Language => QueryErrorKind::Language,
            #[allow(unreachable_patterns)]
            _ => QueryErrorKind::None,
        }
    }
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled query plus the metadata the native binding does not expose
pub struct CompiledQuery {
    query: RefCell<tree_sitter::Query>,
    literals: Vec<String>,
    language: String,
}

impl CompiledQuery {
    /// Compile `source` against `language`
    pub fn compile(language: &tree_sitter::Language, language_name: &str, source: &str) -> Result<Self> {
        let query = tree_sitter::Query::new(language, source).map_err(|e| {
            tracing::warn!(
                "Query for {} failed at offset {} ({:?}): {}",
                language_name,
                e.offset,
                e.kind,
                e.message
            );
            Error::Query {
                kind: e.kind.into(),
                offset: e.offset,
                message: e.message,
            }
        })?;
        tracing::debug!(
            "Compiled query for {} with {} patterns",
            language_name,
            query.pattern_count()
        );
        Ok(Self {
            query: RefCell::new(query),
            literals: string_literals(source),
            language: language_name.to_string(),
        })
    }

    /// Name of the language the query was compiled for
    pub fn language(&self) -> &str {
        &self.language
    }

    pub(crate) fn native(&self) -> Result<Ref<'_, tree_sitter::Query>> {
        self.query.try_borrow().map_err(|_| Error::Busy("tree-sitter-query"))
    }

    pub fn capture_count(&self) -> Result<usize> {
        Ok(self.native()?.capture_names().len())
    }

    pub fn capture_name_for_id(&self, id: usize) -> Result<String> {
        let query = self.native()?;
        query
            .capture_names()
            .get(id)
            .map(|name| name.to_string())
            .ok_or_else(|| Error::ArgsOutOfRange(format!("capture id {}", id)))
    }

    pub fn string_count(&self) -> usize {
        self.literals.len()
    }

    pub fn string_value_for_id(&self, id: usize) -> Result<&str> {
        self.literals
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| Error::ArgsOutOfRange(format!("string id {}", id)))
    }

    pub fn pattern_count(&self) -> Result<usize> {
        Ok(self.native()?.pattern_count())
    }

    /// 0-based byte offset where pattern `id` starts in the query source
    pub fn start_byte_for_pattern(&self, id: usize) -> Result<usize> {
        let query = self.native()?;
        if id >= query.pattern_count() {
            return Err(Error::ArgsOutOfRange(format!("pattern id {}", id)));
        }
        Ok(query.start_byte_for_pattern(id))
    }

    /// Stop reporting the capture called `name`; unknown names are ignored
    pub fn disable_capture(&self, name: &str) -> Result<()> {
        let mut query = self
            .query
            .try_borrow_mut()
            .map_err(|_| Error::Busy("tree-sitter-query"))?;
        query.disable_capture(name);
        Ok(())
    }
}

/// Payload of a `tree-sitter-query` handle
pub struct QueryHandle {
    inner: Rc<CompiledQuery>,
}

impl QueryHandle {
    pub fn new(query: CompiledQuery) -> Self {
        Self { inner: Rc::new(query) }
    }

    pub fn inner(&self) -> &Rc<CompiledQuery> {
        &self.inner
    }
}

/// Extract the compiled query behind a query handle
pub fn extract(ctx: &Context, value: &Value) -> Result<Rc<CompiledQuery>> {
    let ptr = handle::extract(ctx, value, HandleKind::Query)?;
    let query = handle::borrow::<QueryHandle>(&ptr, value, HandleKind::Query)?;
    Ok(Rc::clone(query.inner()))
}

fn query_new(env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let (name, lang) = language::extract(ctx, &args[0])?;
    let source = marshal::string(&args[1])?;
    let compiled = CompiledQuery::compile(&lang, &name, source)?;
    handle::wrap(env, ctx, HandleKind::Query, QueryHandle::new(compiled))
}

fn query_p(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    Ok(Value::boolean(handle::is_handle(ctx, &args[0], HandleKind::Query)))
}

fn capture_count(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let query = extract(ctx, &args[0])?;
    Ok(Value::count(query.capture_count()?))
}

fn capture_name_for_id(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let query = extract(ctx, &args[0])?;
    let id = marshal::index(&args[1], query.capture_count()?)?;
    Ok(Value::from(query.capture_name_for_id(id)?))
}

fn string_count(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let query = extract(ctx, &args[0])?;
    Ok(Value::count(query.string_count()))
}

fn string_value_for_id(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let query = extract(ctx, &args[0])?;
    let id = marshal::index(&args[1], query.string_count())?;
    Ok(Value::from(query.string_value_for_id(id)?))
}

fn pattern_count(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let query = extract(ctx, &args[0])?;
    Ok(Value::count(query.pattern_count()?))
}

fn start_byte_for_pattern(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let query = extract(ctx, &args[0])?;
    let id = marshal::index(&args[1], query.pattern_count()?)?;
    Ok(marshal::make_position(query.start_byte_for_pattern(id)?))
}

fn disable_capture(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let query = extract(ctx, &args[0])?;
    let name = marshal::string(&args[1])?;
    query.disable_capture(name)?;
    Ok(Value::Nil)
}

pub(crate) const FUNCTIONS: &[SubrSpec] = &[
    SubrSpec {
        name: "tree-sitter-query-new",
        min_args: 2,
        max_args: 2,
        doc: "Create a new QUERY\nLANG is a `tree-sitter-language-p' object.\n\n(fn LANG SOURCE)",
        body: query_new,
    },
    SubrSpec {
        name: "tree-sitter-query-p",
        min_args: 1,
        max_args: 1,
        doc: "Return t if OBJECT is a tree-sitter-query.\n\n(fn OBJECT)",
        body: query_p,
    },
    SubrSpec {
        name: "tree-sitter-query-capture-count",
        min_args: 1,
        max_args: 1,
        doc: "Get the number of captures in the query.\n\n(fn QUERY)",
        body: capture_count,
    },
    SubrSpec {
        name: "tree-sitter-query-capture-name-for-id",
        min_args: 2,
        max_args: 2,
        doc: "Get the name of one of the QUERY's captures.\n\n(fn QUERY CAPTURE-ID)",
        body: capture_name_for_id,
    },
    SubrSpec {
        name: "tree-sitter-query-string-count",
        min_args: 1,
        max_args: 1,
        doc: "Get the number of string literals in the query.\n\n(fn QUERY)",
        body: string_count,
    },
    SubrSpec {
        name: "tree-sitter-query-string-value-for-id",
        min_args: 2,
        max_args: 2,
        doc: "Get the value of one of the query's string literals.\n\n(fn QUERY ID)",
        body: string_value_for_id,
    },
    SubrSpec {
        name: "tree-sitter-query-pattern-count",
        min_args: 1,
        max_args: 1,
        doc: "Get the number of patterns in the query.\n\n(fn QUERY)",
        body: pattern_count,
    },
    SubrSpec {
        name: "tree-sitter-query-start-byte-for-pattern",
        min_args: 2,
        max_args: 2,
        doc: "Get the position where the given pattern starts in the query's source.\n\n(fn QUERY ID)",
        body: start_byte_for_pattern,
    },
    SubrSpec {
        name: "tree-sitter-disable-capture",
        min_args: 2,
        max_args: 2,
        doc: "Disable a certain capture within a query.\n\n(fn QUERY NAME)",
        body: disable_capture,
    },
];
