//! Host values
//!
//! The dynamically-typed values the embedding runtime hands to the bridge:
//! - immediates (`nil`, `t`, integers, strings, symbols)
//! - cons cells, used for `(ROW . COLUMN)` points
//! - records, the `#s(TYPE FIELD...)` shape every handle takes
//! - user pointers, the only values that carry native payloads

use super::user_ptr::UserPtr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// An interned symbol.
///
/// Symbols are only created through [`Env::intern`](super::Env::intern), so
/// two symbols with the same name share one allocation and compare by
/// identity, the way `eq` compares them in the host.
#[derive(Clone)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub(super) fn new(name: &str) -> Self {
        Self(Rc::from(name))
    }

    /// The symbol's print name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.0) as *const u8, state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A host record: a type symbol followed by positional fields.
pub struct Record {
    type_tag: Symbol,
    fields: Vec<Value>,
}

impl Record {
    pub(super) fn new(type_tag: Symbol, fields: Vec<Value>) -> Self {
        Self { type_tag, fields }
    }

    /// The record type symbol (slot 0 in the host's layout)
    pub fn type_tag(&self) -> &Symbol {
        &self.type_tag
    }

    /// The fields after the type slot
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// Field by 0-based position after the type slot
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }
}

/// A value owned by the host runtime.
#[derive(Clone)]
pub enum Value {
    Nil,
    T,
    Int(i64),
    Str(Rc<str>),
    Symbol(Symbol),
    Cons(Rc<(Value, Value)>),
    Record(Rc<Record>),
    UserPtr(UserPtr),
}

impl Value {
    /// Build a cons cell
    pub fn cons(car: Value, cdr: Value) -> Self {
        Value::Cons(Rc::new((car, cdr)))
    }

    /// Build a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    /// Build an integer from an unsigned native count or offset
    pub fn count(n: usize) -> Self {
        Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }

    /// `t` for true, `nil` for false
    pub fn boolean(b: bool) -> Self {
        if b { Value::T } else { Value::Nil }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_cons(&self) -> Option<(&Value, &Value)> {
        match self {
            Value::Cons(cell) => Some((&cell.0, &cell.1)),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_user_ptr(&self) -> Option<&UserPtr> {
        match self {
            Value::UserPtr(ptr) => Some(ptr),
            _ => None,
        }
    }

    /// Identity comparison, like `eq` in the host.
    ///
    /// Immediates compare by value; heap objects by allocation.
    pub fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::T, Value::T) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Cons(a), Value::Cons(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            (Value::UserPtr(a), Value::UserPtr(b)) => a.same(b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::T => f.write_str("t"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Symbol(s) => f.write_str(s.name()),
            Value::Cons(cell) => write!(f, "({} . {})", cell.0, cell.1),
            Value::Record(record) => {
                write!(f, "#s({}", record.type_tag)?;
                for field in &record.fields {
                    write!(f, " {}", field)?;
                }
                f.write_str(")")
            }
            Value::UserPtr(ptr) => write!(f, "#<user-ptr {}>", ptr.finalizer().name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
