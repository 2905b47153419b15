//! The dynamic value type seen by script callers.
//!
//! [`ScriptValue`] is the loosely-typed currency of every facade call:
//! argument lists are `Vec<ScriptValue>`, completion payloads are
//! `ScriptValue`. Numbers are always `f64` (script semantics); a string that
//! happens to look numeric is still a string, and overload resolution treats
//! it as one.

use crate::error::NativeError;
use crate::handle::Proxy;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome delivered to a script callback: exactly one of success (possibly
/// carrying a null payload) or a native failure.
///
/// A successful "not found" is `Ok(ScriptValue::Null)` and is structurally
/// distinct from the failure branch.
pub type Completion = std::result::Result<ScriptValue, NativeError>;

/// A dynamically-typed value crossing the script boundary
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// Null / absent value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (f64 for script compatibility)
    Number(f64),
    /// String value
    String(String),
    /// Raw byte payload
    Bytes(Vec<u8>),
    /// Ordered sequence of values
    Array(Vec<ScriptValue>),
    /// String-keyed record with unique keys
    Object(HashMap<String, ScriptValue>),
    /// A wrapped native handle (carries the proxy's delegate marker)
    Handle(Proxy),
    /// A callable supplied by the script caller
    Callback(Callback),
    /// A value with no structural mapping, carried opaquely
    Opaque(OpaqueValue),
}

impl ScriptValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, ScriptValue::Null)
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as byte slice
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ScriptValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&Vec<ScriptValue>> {
        match self {
            ScriptValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get as object
    pub fn as_object(&self) -> Option<&HashMap<String, ScriptValue>> {
        match self {
            ScriptValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get as a wrapped handle
    pub fn as_handle(&self) -> Option<&Proxy> {
        match self {
            ScriptValue::Handle(p) => Some(p),
            _ => None,
        }
    }

    /// Get as a callback
    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            ScriptValue::Callback(c) => Some(c),
            _ => None,
        }
    }

    /// A short name for the value's runtime shape, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Bytes(_) => "bytes",
            ScriptValue::Array(_) => "array",
            ScriptValue::Object(_) => "object",
            ScriptValue::Handle(_) => "handle",
            ScriptValue::Callback(_) => "callback",
            ScriptValue::Opaque(_) => "opaque",
        }
    }
}

impl Default for ScriptValue {
    fn default() -> Self {
        ScriptValue::Null
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

impl From<f64> for ScriptValue {
    fn from(n: f64) -> Self {
        ScriptValue::Number(n)
    }
}

impl From<i64> for ScriptValue {
    fn from(n: i64) -> Self {
        ScriptValue::Number(n as f64)
    }
}

impl From<u64> for ScriptValue {
    fn from(n: u64) -> Self {
        ScriptValue::Number(n as f64)
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::String(s)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::String(s.to_string())
    }
}

impl From<Vec<u8>> for ScriptValue {
    fn from(b: Vec<u8>) -> Self {
        ScriptValue::Bytes(b)
    }
}

impl From<Proxy> for ScriptValue {
    fn from(p: Proxy) -> Self {
        ScriptValue::Handle(p)
    }
}

impl From<Callback> for ScriptValue {
    fn from(c: Callback) -> Self {
        ScriptValue::Callback(c)
    }
}

enum Slot {
    /// Completion handler: invocable exactly once, then spent
    Once(Option<Box<dyn FnOnce(Completion) + Send>>),
    /// Event handler: invocable any number of times
    Repeating(Box<dyn FnMut(Completion) + Send>),
}

/// A callable supplied by the script caller.
///
/// Completion handlers are built with [`Callback::once`]: the underlying
/// closure can fire at most one time, so the never-twice half of the
/// exactly-once delivery contract holds structurally. Event handlers
/// (packet handlers, timer fires, bus consumers) are built with
/// [`Callback::repeating`].
///
/// Clones share the same slot; identity is by slot, which is also how two
/// callbacks compare equal.
#[derive(Clone)]
pub struct Callback {
    slot: Arc<Mutex<Slot>>,
}

impl Callback {
    /// Create a completion handler that may fire at most once
    pub fn once(f: impl FnOnce(Completion) + Send + 'static) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Once(Some(Box::new(f))))),
        }
    }

    /// Create an event handler that may fire repeatedly
    pub fn repeating(f: impl FnMut(Completion) + Send + 'static) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Repeating(Box::new(f)))),
        }
    }

    /// Invoke the callback with an outcome.
    ///
    /// Returns `false` if a once-slot has already fired; the outcome is
    /// dropped in that case.
    pub fn invoke(&self, outcome: Completion) -> bool {
        let mut slot = self.slot.lock();
        match &mut *slot {
            Slot::Once(inner) => match inner.take() {
                Some(f) => {
                    f(outcome);
                    true
                }
                None => false,
            },
            Slot::Repeating(f) => {
                f(outcome);
                true
            }
        }
    }

    /// Whether a once-slot has already fired. Repeating slots never spend.
    pub fn is_spent(&self) -> bool {
        matches!(&*self.slot.lock(), Slot::Once(None))
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.slot.lock() {
            Slot::Once(Some(_)) => "pending",
            Slot::Once(None) => "spent",
            Slot::Repeating(_) => "repeating",
        };
        write!(f, "Callback({state})")
    }
}

struct OpaqueInner {
    tag: String,
    payload: Box<dyn Any + Send + Sync>,
}

/// A value with no structural mapping across the boundary.
///
/// Carried by reference and compared by identity; the payload is only
/// accessible to code that knows the concrete type behind the tag (usually
/// a conversion hook registered for it). Round-tripping an opaque value
/// returns the identical value.
#[derive(Clone)]
pub struct OpaqueValue {
    inner: Arc<OpaqueInner>,
}

impl OpaqueValue {
    /// Wrap a payload under a conversion tag
    pub fn new(tag: impl Into<String>, payload: impl Any + Send + Sync) -> Self {
        Self {
            inner: Arc::new(OpaqueInner {
                tag: tag.into(),
                payload: Box::new(payload),
            }),
        }
    }

    /// The conversion tag this value was wrapped under
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    /// Borrow the payload if it is a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.payload.downcast_ref::<T>()
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OpaqueValue({})", self.inner.tag)
    }
}
