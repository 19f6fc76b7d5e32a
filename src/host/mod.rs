//! Host runtime model
//!
//! The bridge never owns the host's object system; it consumes a handful of
//! services from it. This module provides those services in-process:
//! - `Env`: obarray, function table, record types, calling convention
//! - `Value`: the dynamically-typed values passed across the boundary
//! - `UserPtr`: native payloads released by a finalizer on reclamation

pub mod env;
pub mod user_ptr;
pub mod value;

pub use env::{Env, Function, RecordType, Signal, Subr};
pub use user_ptr::{BorrowError, Finalizer, UserPtr};
pub use value::{Record, Symbol, Value};
