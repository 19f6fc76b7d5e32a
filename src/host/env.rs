//! The host environment
//!
//! Holds the obarray, the function table and the declared record types, and
//! implements the calling convention every bridge function goes through.

use super::user_ptr::{Finalizer, UserPtr};
use super::value::{Record, Symbol, Value};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A non-local exit: an error symbol plus its data.
///
/// Every call into the host returns `Result<_, Signal>`; callers propagate the
/// signal with `?` before doing any further native work.
#[derive(Clone, thiserror::Error)]
#[error("({symbol}{})", .data.iter().map(|v| format!(" {}", v)).collect::<String>())]
pub struct Signal {
    pub symbol: Symbol,
    pub data: Vec<Value>,
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Body of a host function
pub type Subr = Rc<dyn Fn(&mut Env, &[Value]) -> Result<Value, Signal>>;

/// A function installed in the host
#[derive(Clone)]
pub struct Function {
    pub min_args: usize,
    pub max_args: usize,
    pub doc: String,
    body: Subr,
}

/// A record type declared with [`Env::define_record`]
#[derive(Debug, Clone)]
pub struct RecordType {
    pub name: Symbol,
    pub fields: Vec<String>,
}

/// The embedding runtime.
pub struct Env {
    obarray: HashMap<String, Symbol>,
    functions: HashMap<Symbol, Function>,
    records: HashMap<Symbol, RecordType>,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    /// Create an empty environment
    pub fn new() -> Self {
        Self {
            obarray: HashMap::new(),
            functions: HashMap::new(),
            records: HashMap::new(),
        }
    }

    /// Intern a symbol
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(symbol) = self.obarray.get(name) {
            return symbol.clone();
        }
        let symbol = Symbol::new(name);
        self.obarray.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Build a signal from an error symbol name and data
    pub fn signal(&mut self, name: &str, data: Vec<Value>) -> Signal {
        Signal {
            symbol: self.intern(name),
            data,
        }
    }

    /// Install a function, replacing any previous definition
    pub fn define_function(
        &mut self,
        name: &str,
        min_args: usize,
        max_args: usize,
        doc: &str,
        body: impl Fn(&mut Env, &[Value]) -> Result<Value, Signal> + 'static,
    ) {
        let symbol = self.intern(name);
        self.functions.insert(
            symbol,
            Function {
                min_args,
                max_args,
                doc: doc.to_string(),
                body: Rc::new(body),
            },
        );
    }

    /// Remove a function definition; returns whether one existed
    pub fn undefine_function(&mut self, name: &str) -> bool {
        let symbol = self.intern(name);
        self.functions.remove(&symbol).is_some()
    }

    /// Whether `name` has a function definition
    pub fn is_fbound(&self, name: &str) -> bool {
        self.obarray
            .get(name)
            .is_some_and(|symbol| self.functions.contains_key(symbol))
    }

    /// All installed functions, sorted by name
    pub fn functions(&self) -> Vec<(&str, &Function)> {
        let mut all: Vec<_> = self
            .functions
            .iter()
            .map(|(symbol, function)| (symbol.name(), function))
            .collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }

    /// Call the function bound to `function`
    pub fn funcall(&mut self, function: &Symbol, args: &[Value]) -> Result<Value, Signal> {
        let Some(definition) = self.functions.get(function).cloned() else {
            return Err(Signal {
                symbol: self.intern("void-function"),
                data: vec![Value::Symbol(function.clone())],
            });
        };
        if args.len() < definition.min_args || args.len() > definition.max_args {
            let arity = Value::cons(
                Value::count(definition.min_args),
                Value::count(definition.max_args),
            );
            return Err(Signal {
                symbol: self.intern("wrong-number-of-arguments"),
                data: vec![Value::Symbol(function.clone()), arity, Value::count(args.len())],
            });
        }
        (definition.body)(self, args)
    }

    /// Intern `name` and call it
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, Signal> {
        let symbol = self.intern(name);
        self.funcall(&symbol, args)
    }

    /// Declare a record type the way `cl-defstruct` would.
    ///
    /// Installs the constructor `NAME--create` taking one argument per field
    /// and one accessor `NAME-FIELD` per field.
    pub fn define_record(&mut self, name: &str, fields: &[&str]) {
        let type_tag = self.intern(name);
        let count = fields.len();

        let tag = type_tag.clone();
        self.define_function(
            &format!("{}--create", name),
            count,
            count,
            &format!("Construct a `{}' record.", name),
            move |_, args| Ok(Value::Record(Rc::new(Record::new(tag.clone(), args.to_vec())))),
        );

        for (index, field) in fields.iter().enumerate() {
            let tag = type_tag.clone();
            let accessor = format!("{}-{}", name, field);
            let predicate = format!("{}-p", name);
            self.define_function(
                &accessor,
                1,
                1,
                &format!("Access the `{}' slot of a `{}' record.", field, name),
                move |env, args| match args[0].as_record() {
                    Some(record) if record.type_tag() == &tag => {
                        Ok(record.field(index).cloned().unwrap_or(Value::Nil))
                    }
                    _ => {
                        let predicate = env.intern(&predicate);
                        Err(Signal {
                            symbol: env.intern("wrong-type-argument"),
                            data: vec![Value::Symbol(predicate), args[0].clone()],
                        })
                    }
                },
            );
        }

        self.records.insert(
            type_tag.clone(),
            RecordType {
                name: type_tag,
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
        );
    }

    /// Remove a record type and its constructor and accessors
    pub fn undefine_record(&mut self, name: &str) {
        let symbol = self.intern(name);
        if let Some(record) = self.records.remove(&symbol) {
            self.undefine_function(&format!("{}--create", name));
            for field in &record.fields {
                self.undefine_function(&format!("{}-{}", name, field));
            }
        }
    }

    /// Look up a declared record type
    pub fn record_type(&self, name: &Symbol) -> Option<&RecordType> {
        self.records.get(name)
    }

    /// Wrap a native payload in a user pointer
    pub fn make_user_ptr(&mut self, finalizer: &'static Finalizer, payload: Box<dyn std::any::Any>) -> Value {
        Value::UserPtr(UserPtr::new(finalizer, payload))
    }
}
