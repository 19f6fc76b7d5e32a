//! Interned host symbols
//!
//! Every bridge function needs a few well-known symbols (record types,
//! constructors, error symbols, predicates). They are interned once when the
//! module loads and shared by all installed functions; unloading the module
//! drops the cache with the functions that captured it.

use crate::host::{Env, Symbol};

/// Well-known symbols, interned at module load
#[derive(Debug, Clone)]
pub struct SymbolCache {
    // Record types
    pub language_type: Symbol,
    pub query_type: Symbol,
    pub cursor_type: Symbol,
    pub tree_type: Symbol,
    pub node_type: Symbol,
    pub match_type: Symbol,

    // Record constructors
    pub language_create: Symbol,
    pub query_create: Symbol,
    pub cursor_create: Symbol,
    pub tree_create: Symbol,
    pub node_create: Symbol,
    pub match_create: Symbol,

    // Error symbols
    pub wrong_type_argument: Symbol,
    pub args_out_of_range: Symbol,
    pub tree_sitter_error: Symbol,
    pub query_error: Symbol,

    // Predicates named in wrong-type-argument signals
    pub predicates: Vec<(&'static str, Symbol)>,
}

/// Record type names and their fields
pub const LANGUAGE_RECORD: &str = "tree-sitter-language";
pub const QUERY_RECORD: &str = "tree-sitter-query";
pub const CURSOR_RECORD: &str = "tree-sitter-query-cursor";
pub const TREE_RECORD: &str = "tree-sitter-tree";
pub const NODE_RECORD: &str = "tree-sitter-node";
pub const MATCH_RECORD: &str = "tree-sitter-query-match";

pub const HANDLE_FIELDS: &[&str] = &["ptr"];
pub const MATCH_FIELDS: &[&str] = &["capture-count", "node", "id", "pattern-index"];

/// Predicates that may appear in a `wrong-type-argument` signal
const PREDICATES: &[&str] = &[
    "tree-sitter-language-p",
    "tree-sitter-query-p",
    "tree-sitter-query-cursor-p",
    "tree-sitter-tree-p",
    "tree-sitter-node-p",
    "tree-sitter-point-p",
    "integerp",
    "natnump",
    "stringp",
];

impl SymbolCache {
    /// Intern every well-known symbol in `env`
    pub fn intern_all(env: &mut Env) -> Self {
        let create = |env: &mut Env, record: &str| env.intern(&format!("{}--create", record));
        Self {
            language_type: env.intern(LANGUAGE_RECORD),
            query_type: env.intern(QUERY_RECORD),
            cursor_type: env.intern(CURSOR_RECORD),
            tree_type: env.intern(TREE_RECORD),
            node_type: env.intern(NODE_RECORD),
            match_type: env.intern(MATCH_RECORD),

            language_create: create(env, LANGUAGE_RECORD),
            query_create: create(env, QUERY_RECORD),
            cursor_create: create(env, CURSOR_RECORD),
            tree_create: create(env, TREE_RECORD),
            node_create: create(env, NODE_RECORD),
            match_create: create(env, MATCH_RECORD),

            wrong_type_argument: env.intern("wrong-type-argument"),
            args_out_of_range: env.intern("args-out-of-range"),
            tree_sitter_error: env.intern("tree-sitter-error"),
            query_error: env.intern("tree-sitter-query-error"),

            predicates: PREDICATES.iter().map(|name| (*name, env.intern(name))).collect(),
        }
    }

    /// The interned symbol for a predicate name
    pub fn predicate(&self, name: &str) -> Option<&Symbol> {
        self.predicates
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, symbol)| symbol)
    }
}
