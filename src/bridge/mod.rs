//! The tree-sitter bridge
//!
//! Installs the `tree-sitter-*` function surface into a host [`Env`]. Every
//! function is described by a [`SubrSpec`] and goes through the same
//! calling convention: arguments are validated and extracted before any
//! native work, and a failure is converted to a host signal at the boundary.

pub mod cursor;
pub mod grammar;
pub mod handle;
pub mod language;
pub mod literals;
pub mod marshal;
pub mod node;
pub mod query;
pub mod symbols;

pub use cursor::{Cursor, CursorState, MatchResult};
pub use handle::HandleKind;
pub use query::{CompiledQuery, QueryErrorKind};
pub use symbols::SymbolCache;

use crate::config::BridgeConfig;
use crate::host::{Env, Signal, Value};
use crate::{Error, Result};
use std::rc::Rc;

/// State shared by every installed function
pub struct Context {
    pub symbols: SymbolCache,
    pub config: BridgeConfig,
}

impl Context {
    /// Convert a bridge error into the signal the host sees
    pub fn signal(&self, env: &mut Env, err: Error) -> Signal {
        err.into_signal(env, &self.symbols)
    }
}

impl Error {
    /// Convert to a host signal.
    ///
    /// Host signals pass through untouched; type and range errors use the
    /// host's standard error symbols; everything else is a `tree-sitter-error`.
    pub fn into_signal(self, env: &mut Env, symbols: &SymbolCache) -> Signal {
        match self {
            Error::Host(signal) => signal,
            Error::WrongType { predicate, value } => {
                let predicate = symbols
                    .predicate(predicate)
                    .cloned()
                    .unwrap_or_else(|| env.intern(predicate));
                Signal {
                    symbol: symbols.wrong_type_argument.clone(),
                    data: vec![Value::Symbol(predicate), value],
                }
            }
            Error::ArgsOutOfRange(message) => Signal {
                symbol: symbols.args_out_of_range.clone(),
                data: vec![Value::from(message)],
            },
            Error::Query { kind, offset, message } => Signal {
                symbol: symbols.query_error.clone(),
                data: vec![Value::from(kind.as_str()), Value::count(offset), Value::from(message)],
            },
            other => Signal {
                symbol: symbols.tree_sitter_error.clone(),
                data: vec![Value::from(other.to_string())],
            },
        }
    }
}

/// A host function provided by the bridge
pub(crate) struct SubrSpec {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub doc: &'static str,
    pub body: fn(&mut Env, &Context, &[Value]) -> Result<Value>,
}

fn all_functions() -> impl Iterator<Item = &'static SubrSpec> {
    [
        language::FUNCTIONS,
        grammar::FUNCTIONS,
        query::FUNCTIONS,
        cursor::FUNCTIONS,
        node::FUNCTIONS,
    ]
    .into_iter()
    .flatten()
}

/// Names of every function the bridge installs
pub fn function_names() -> Vec<&'static str> {
    all_functions().map(|spec| spec.name).collect()
}

/// A loaded bridge
pub struct Module {
    context: Rc<Context>,
}

impl Module {
    /// Declare the record types and install every bridge function in `env`
    pub fn load(env: &mut Env, config: BridgeConfig) -> Self {
        let symbols = SymbolCache::intern_all(env);
        let context = Rc::new(Context { symbols, config });

        for kind in HandleKind::all() {
            env.define_record(kind.record_name(), symbols::HANDLE_FIELDS);
        }
        env.define_record(symbols::MATCH_RECORD, symbols::MATCH_FIELDS);

        let mut installed = 0;
        for spec in all_functions() {
            let ctx = Rc::clone(&context);
            let body = spec.body;
            env.define_function(spec.name, spec.min_args, spec.max_args, spec.doc, move |env, args| {
                body(env, &ctx, args).map_err(|err| ctx.signal(env, err))
            });
            installed += 1;
        }

        tracing::debug!("Loaded tree-sitter bridge ({} functions)", installed);
        Self { context }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Remove every function and record type the bridge installed.
    ///
    /// Handles already held by the host stay valid until reclaimed.
    pub fn unload(self, env: &mut Env) {
        for spec in all_functions() {
            env.undefine_function(spec.name);
        }
        for kind in HandleKind::all() {
            env.undefine_record(kind.record_name());
        }
        env.undefine_record(symbols::MATCH_RECORD);
        tracing::debug!("Unloaded tree-sitter bridge");
    }
}
