//! The dynamic value model shared by fulfillments and rejection reasons.

use std::fmt;
use std::sync::Arc;

use crate::promise::Promise;
use crate::Error;

/// Callback handed to a foreign thenable's `then`.
///
/// Deliberately `Fn` rather than `FnOnce`: a misbehaving thenable may call
/// either callback any number of times, and the resolution procedure's
/// once-guard is what keeps the target promise from settling twice.
pub type ThenCallback = Box<dyn Fn(Value) + Send + Sync>;

/// A foreign deferred-value implementation this crate can interoperate
/// with. Anything exposing a callable `then` qualifies.
pub trait Thenable: Send + Sync {
    /// Invoke the thenable's `then`, handing it a fulfillment callback and
    /// a rejection callback. Returning `Err` models a `then` that throws.
    fn then(&self, on_fulfilled: ThenCallback, on_rejected: ThenCallback) -> Result<(), Value>;
}

/// A fulfillment value or rejection reason.
///
/// The resolution procedure branches on shape: `Promise` and `Thenable` are
/// unwrapped, everything else passes through as-is.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// An error raised by the library itself, such as cycle detection.
    Error(Arc<Error>),
    /// One of our own promises; supports referential cycle detection.
    Promise(Promise),
    /// A foreign thenable.
    Thenable(Arc<dyn Thenable>),
    /// A per-input record produced by `Promise::all_settled`.
    Outcome(Box<Outcome>),
}

/// How a promise settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Fulfilled(Value),
    Rejected(Value),
}

impl Outcome {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Outcome::Fulfilled(_))
    }

    /// The fulfillment value or rejection reason, whichever this is.
    pub fn into_value(self) -> Value {
        match self {
            Outcome::Fulfilled(value) => value,
            Outcome::Rejected(reason) => reason,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            // Identity, not structure: two promises are equal only when
            // they are the same promise.
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            (Value::Thenable(a), Value::Thenable(b)) => Arc::ptr_eq(a, b),
            (Value::Outcome(a), Value::Outcome(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Error(e) => write!(f, "error({e})"),
            Value::Promise(p) => write!(f, "{p:?}"),
            Value::Thenable(_) => write!(f, "thenable"),
            Value::Outcome(o) => write!(f, "{o:?}"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Value {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::List(v)
    }
}

impl From<Error> for Value {
    fn from(e: Error) -> Value {
        Value::Error(Arc::new(e))
    }
}

impl From<Promise> for Value {
    fn from(p: Promise) -> Value {
        Value::Promise(p)
    }
}

impl From<Outcome> for Value {
    fn from(o: Outcome) -> Value {
        Value::Outcome(Box::new(o))
    }
}
