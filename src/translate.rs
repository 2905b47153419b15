//! Bidirectional value translation across the boundary.
//!
//! Translation is total and never errors. Primitive scalars pass through,
//! structured records go through a canonical `serde_json::Value`
//! intermediate, collections convert element-wise (order preserved for
//! lists, key uniqueness for maps), handles wrap into proxies on the way
//! out and unwrap on the way in.
//!
//! Values with no structural mapping are the *TranslationGap* class: they
//! degrade to opaque pass-through rather than erroring, by design — a
//! caller that only round-trips such a value never notices. An embedder
//! that wants a real mapping registers a [`ConversionHook`] for the
//! opaque tag.

use crate::engine::NativeValue;
use crate::handle::Proxy;
use crate::value::{OpaqueValue, ScriptValue};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A value whose schema is unknown at binding time: the closed set of forms
/// it can take when crossing the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum UnknownValue {
    /// A primitive scalar or byte payload
    Primitive(Primitive),
    /// Plain structured data in canonical serialized form
    Record(serde_json::Value),
    /// No structural mapping; carried by identity
    Opaque(OpaqueValue),
}

/// The primitive subset of [`UnknownValue`]
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Null
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// String
    String(String),
    /// Bytes
    Bytes(Vec<u8>),
}

/// Explicit conversion for one opaque tag.
///
/// Hooks are consulted by tag in both directions; returning `None` falls
/// back to opaque pass-through.
pub trait ConversionHook: Send + Sync {
    /// Convert an engine opaque into a script value
    fn to_script(&self, value: &OpaqueValue) -> Option<ScriptValue>;

    /// Convert a script opaque back into an engine value
    fn to_native(&self, value: &OpaqueValue) -> Option<NativeValue>;
}

#[derive(Default)]
struct Registry {
    hooks: RwLock<HashMap<String, Arc<dyn ConversionHook>>>,
}

/// Converts values crossing the boundary in both directions.
///
/// Cheap to clone; clones share the conversion registry.
#[derive(Clone, Default)]
pub struct Translator {
    registry: Arc<Registry>,
}

impl Translator {
    /// Create a translator with an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversion hook for an opaque tag
    pub fn register_hook(&self, tag: impl Into<String>, hook: Arc<dyn ConversionHook>) {
        let tag = tag.into();
        debug!(tag = %tag, "registered conversion hook");
        self.registry.hooks.write().insert(tag, hook);
    }

    fn hook_for(&self, tag: &str) -> Option<Arc<dyn ConversionHook>> {
        self.registry.hooks.read().get(tag).cloned()
    }

    /// Convert an engine value into its script representation
    pub fn to_script(&self, value: NativeValue) -> ScriptValue {
        match value {
            NativeValue::Null => ScriptValue::Null,
            NativeValue::Bool(b) => ScriptValue::Bool(b),
            NativeValue::Int(n) => ScriptValue::Number(n as f64),
            NativeValue::Double(n) => ScriptValue::Number(n),
            NativeValue::String(s) => ScriptValue::String(s),
            NativeValue::Bytes(b) => ScriptValue::Bytes(b),
            NativeValue::Record(json) => record_to_script(&json),
            NativeValue::List(items) => {
                ScriptValue::Array(items.into_iter().map(|v| self.to_script(v)).collect())
            }
            NativeValue::Map(entries) => ScriptValue::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, self.to_script(v)))
                    .collect(),
            ),
            NativeValue::Handle(h) => ScriptValue::Handle(Proxy::wrap(h)),
            NativeValue::Opaque(o) => match self.hook_for(o.tag()) {
                Some(hook) => hook.to_script(&o).unwrap_or(ScriptValue::Opaque(o)),
                None => ScriptValue::Opaque(o),
            },
        }
    }

    /// Convert a script value into its engine representation
    pub fn to_native(&self, value: ScriptValue) -> NativeValue {
        match value {
            ScriptValue::Null => NativeValue::Null,
            ScriptValue::Bool(b) => NativeValue::Bool(b),
            ScriptValue::Number(n) => NativeValue::Double(n),
            ScriptValue::String(s) => NativeValue::String(s),
            ScriptValue::Bytes(b) => NativeValue::Bytes(b),
            ScriptValue::Array(items) => {
                NativeValue::List(items.into_iter().map(|v| self.to_native(v)).collect())
            }
            ScriptValue::Object(entries) => NativeValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, self.to_native(v)))
                    .collect(),
            ),
            ScriptValue::Handle(p) => NativeValue::Handle(p.delegate().clone()),
            // Callbacks are not data; the resolver keeps them out of data
            // positions, and a forced translation carries them opaquely.
            ScriptValue::Callback(c) => {
                NativeValue::Opaque(OpaqueValue::new("bridge.callback", c))
            }
            ScriptValue::Opaque(o) => match self.hook_for(o.tag()) {
                Some(hook) => hook.to_native(&o).unwrap_or(NativeValue::Opaque(o)),
                None => NativeValue::Opaque(o),
            },
        }
    }

    /// Classify a script value into the unknown-value sum
    pub fn classify_unknown(&self, value: ScriptValue) -> UnknownValue {
        match value {
            ScriptValue::Null => UnknownValue::Primitive(Primitive::Null),
            ScriptValue::Bool(b) => UnknownValue::Primitive(Primitive::Bool(b)),
            ScriptValue::Number(n) => UnknownValue::Primitive(Primitive::Number(n)),
            ScriptValue::String(s) => UnknownValue::Primitive(Primitive::String(s)),
            ScriptValue::Bytes(b) => UnknownValue::Primitive(Primitive::Bytes(b)),
            v @ (ScriptValue::Array(_) | ScriptValue::Object(_)) => {
                UnknownValue::Record(script_to_record(&v))
            }
            ScriptValue::Opaque(o) => UnknownValue::Opaque(o),
            v @ (ScriptValue::Handle(_) | ScriptValue::Callback(_)) => {
                UnknownValue::Opaque(OpaqueValue::new("bridge.unmapped", v))
            }
        }
    }
}

/// Convert a canonical record into script structure
pub fn record_to_script(json: &serde_json::Value) -> ScriptValue {
    match json {
        serde_json::Value::Null => ScriptValue::Null,
        serde_json::Value::Bool(b) => ScriptValue::Bool(*b),
        serde_json::Value::Number(n) => ScriptValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => ScriptValue::String(s.clone()),
        serde_json::Value::Array(items) => {
            ScriptValue::Array(items.iter().map(record_to_script).collect())
        }
        serde_json::Value::Object(entries) => ScriptValue::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), record_to_script(v)))
                .collect(),
        ),
    }
}

/// Encode a script number as JSON. Script numbers are all `f64`, but an
/// integral value must come out as a JSON integer so that record fields
/// deserialize into integer-typed option fields.
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        serde_json::Value::Number(serde_json::Number::from(n as i64))
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Convert plain script data into the canonical record form.
///
/// Handles, callbacks and opaques have no record representation and become
/// null, matching what serializing them through the original boundary did.
pub fn script_to_record(value: &ScriptValue) -> serde_json::Value {
    match value {
        ScriptValue::Null => serde_json::Value::Null,
        ScriptValue::Bool(b) => serde_json::Value::Bool(*b),
        ScriptValue::Number(n) => number_to_json(*n),
        ScriptValue::String(s) => serde_json::Value::String(s.clone()),
        ScriptValue::Bytes(b) => {
            serde_json::Value::Array(b.iter().map(|byte| (*byte).into()).collect())
        }
        ScriptValue::Array(items) => {
            serde_json::Value::Array(items.iter().map(script_to_record).collect())
        }
        ScriptValue::Object(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), script_to_record(v)))
                .collect(),
        ),
        ScriptValue::Handle(_) | ScriptValue::Callback(_) | ScriptValue::Opaque(_) => {
            serde_json::Value::Null
        }
    }
}
