use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::Block,
    diagnostics::NativeError,
    runtime::{ModuleId, Runtime},
};

/// The dynamic runtime value union.
///
/// Lists and maps are reference types: cloning a `Value` clones the handle,
/// not the storage, so mutation through any alias is visible to all holders.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<IndexMap<String, Value>>>),
    Function(Rc<ScriptFn>),
    Native(Rc<NativeFn>),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::Str(Rc::from(value.into()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    /// `null`, `false`, numeric zero, the empty string, and empty
    /// containers are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Map(entries) => !entries.borrow().is_empty(),
            Value::Function(_) | Value::Native(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Function(_) | Value::Native(_) => "Function",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Structural equality over any value pair. `Int` and `Float` compare
    /// as numbers; lists and maps compare element-wise.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(l, r)| l.equals(r))
            }
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, value)| b.get(key).map(|rhs| value.equals(rhs)).unwrap_or(false))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Render a float so its textual form always carries a decimal point,
/// keeping `num(str(x))` type-faithful.
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in entries.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Function(fun) => write!(f, "<fn {}>", fun.name),
            Value::Native(fun) => write!(f, "<native fn {}>", fun.name),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{s}\""),
            other => write!(f, "{other}"),
        }
    }
}

/// A user-declared function. Its only captured scope is the namespace of
/// the module that defined it, held as an arena handle rather than an
/// owning reference, so mutually importing modules never form a cycle.
pub struct ScriptFn {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub module: ModuleId,
    pub file: Rc<str>,
}

pub type NativeCallback = fn(&mut Runtime, &[Value]) -> std::result::Result<Value, NativeError>;

/// A host-provided function. `arity` of `None` means unconstrained.
pub struct NativeFn {
    pub name: &'static str,
    pub arity: Option<usize>,
    pub callback: NativeCallback,
}

impl NativeFn {
    pub fn check_arity(&self, args: &[Value]) -> std::result::Result<(), NativeError> {
        if let Some(arity) = self.arity {
            if args.len() != arity {
                return Err(NativeError::new(
                    crate::diagnostics::ErrorKind::Range,
                    format!("{} expects {} args, got {}", self.name, arity, args.len()),
                ));
            }
        }
        Ok(())
    }
}

/// A record appended by `emit_event`, drained by the host between turns.
#[derive(Debug, Clone)]
pub struct Event {
    pub tag: String,
    pub payload: Value,
}
