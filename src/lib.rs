//! # tsbridge - tree-sitter objects as host handles
//!
//! Exposes tree-sitter languages, queries, query cursors, trees and nodes to a
//! dynamically-typed host as opaque, type-checked handles.
//!
//! tsbridge provides:
//! - A host runtime model (values, records, user pointers, function table)
//! - A handle protocol that tags, validates and finalizes native objects
//! - Query compilation and introspection
//! - A pull-based query cursor streaming matches and captures to the host
//! - Built-in grammars and a string parser for producing trees to query

pub mod bridge;
pub mod config;
pub mod host;

// Re-exports for convenient access
pub use bridge::{Module, QueryErrorKind};
pub use config::BridgeConfig;
pub use host::{Env, Signal, Value};

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bridge operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Wrong type argument: {predicate}, {value}")]
    WrongType { predicate: &'static str, value: Value },

    #[error("Args out of range: {0}")]
    ArgsOutOfRange(String),

    #[error("Initialization failed: {0}")]
    Init(String),

    #[error("Query error: {kind} at offset {offset}: {message}")]
    Query {
        kind: QueryErrorKind,
        offset: usize,
        message: String,
    },

    #[error("{0} has been released")]
    Released(&'static str),

    #[error("{0} is in use by another operation")]
    Busy(&'static str),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Host signal: {0}")]
    Host(#[from] Signal),
}
