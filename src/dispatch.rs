//! Overload resolution over loosely-typed argument lists.
//!
//! Each facade operation declares an [`OverloadTable`]: an ordered list of
//! [`OverloadSignature`]s, one per accepted call form. Resolution walks the
//! table in declaration order and the first signature whose arity and
//! per-position shape tests all hold wins. Tables are written so that no two
//! signatures match the same feasible input, but first match is
//! authoritative either way.
//!
//! Resolution is total: either exactly one signature matches, or the call
//! fails with [`BridgeError::InvalidArguments`] before anything native runs.
//! The matched index selects a variant of the operation's closed call-form
//! enum, so code past this point switches on a tagged union and never
//! re-inspects shapes.
//!
//! Two rules keep dispatch predictable:
//! - a callback argument matches only [`ShapeTest::Handler`], and
//!   `Handler` matches only callbacks — a trailing function is always a
//!   completion handler, never data (even [`ShapeTest::Any`] excludes it);
//! - numbers and strings are discriminated by runtime kind; `"1234"` is a
//!   string.

use crate::error::{BridgeError, Result};
use crate::value::ScriptValue;
use tracing::debug;

/// A per-position shape predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeTest {
    /// Any data value (everything except a callback)
    Any,
    /// A boolean
    Bool,
    /// A number (by runtime kind, not by parseability)
    Number,
    /// A string
    Str,
    /// A plain record object
    Object,
    /// A byte payload
    Bytes,
    /// An object carrying the proxy delegate marker
    Wrapped,
    /// A callable; always a completion/event handler, never data
    Handler,
}

impl ShapeTest {
    /// Whether `value` satisfies this predicate
    pub fn matches(self, value: &ScriptValue) -> bool {
        match self {
            ShapeTest::Any => !matches!(value, ScriptValue::Callback(_)),
            ShapeTest::Bool => matches!(value, ScriptValue::Bool(_)),
            ShapeTest::Number => matches!(value, ScriptValue::Number(_)),
            ShapeTest::Str => matches!(value, ScriptValue::String(_)),
            ShapeTest::Object => matches!(value, ScriptValue::Object(_)),
            ShapeTest::Bytes => matches!(value, ScriptValue::Bytes(_)),
            ShapeTest::Wrapped => matches!(value, ScriptValue::Handle(_)),
            ShapeTest::Handler => matches!(value, ScriptValue::Callback(_)),
        }
    }
}

/// One accepted call form: arity is the shape list's length
#[derive(Debug, Clone, Copy)]
pub struct OverloadSignature {
    /// Per-position predicates, in order
    pub shape: &'static [ShapeTest],
}

impl OverloadSignature {
    /// Whether the argument list satisfies arity and every position
    pub fn matches(&self, args: &[ScriptValue]) -> bool {
        args.len() == self.shape.len()
            && self.shape.iter().zip(args).all(|(test, arg)| test.matches(arg))
    }
}

/// The ordered signature set for one facade operation
#[derive(Debug, Clone, Copy)]
pub struct OverloadTable {
    /// The operation's name, for diagnostics
    pub operation: &'static str,
    /// Signatures in declaration order; first match wins
    pub signatures: &'static [OverloadSignature],
}

impl OverloadTable {
    /// Build a table
    pub const fn new(
        operation: &'static str,
        signatures: &'static [OverloadSignature],
    ) -> Self {
        Self {
            operation,
            signatures,
        }
    }

    /// Resolve an argument list to the index of the matching signature.
    ///
    /// Runs before any native call; on failure nothing has executed.
    pub fn resolve(&self, args: &[ScriptValue]) -> Result<usize> {
        for (index, signature) in self.signatures.iter().enumerate() {
            if signature.matches(args) {
                return Ok(index);
            }
        }
        debug!(
            operation = self.operation,
            shapes = %shape_summary(args),
            "no overload matched"
        );
        Err(BridgeError::invalid_arguments(self.operation, args))
    }
}

/// Shorthand for writing signature tables
#[macro_export]
macro_rules! signatures {
    ($([$($test:ident),*]),* $(,)?) => {
        &[$($crate::dispatch::OverloadSignature {
            shape: &[$($crate::dispatch::ShapeTest::$test),*],
        }),*]
    };
}

/// Render an argument list's runtime shapes, e.g. `(string, number, callback)`
pub fn shape_summary(args: &[ScriptValue]) -> String {
    let kinds: Vec<&str> = args.iter().map(ScriptValue::kind_name).collect();
    format!("({})", kinds.join(", "))
}

/// Ordered consumption of an argument list after resolution.
///
/// Extractors fail with invalid-arguments rather than panicking, but a
/// mismatch past a successful [`OverloadTable::resolve`] means the table
/// and the call-form constructor disagree — a bridge bug, not caller input.
pub struct ArgCursor {
    operation: &'static str,
    args: std::vec::IntoIter<ScriptValue>,
}

impl ArgCursor {
    /// Start consuming `args` for `operation`
    pub fn new(operation: &'static str, args: Vec<ScriptValue>) -> Self {
        Self {
            operation,
            args: args.into_iter(),
        }
    }

    fn next(&mut self) -> Result<ScriptValue> {
        self.args.next().ok_or(BridgeError::InvalidArguments {
            operation: self.operation,
            shapes: "(exhausted argument list)".into(),
        })
    }

    fn mismatch(&self, value: &ScriptValue) -> BridgeError {
        BridgeError::InvalidArguments {
            operation: self.operation,
            shapes: format!("(unexpected {})", value.kind_name()),
        }
    }

    /// Take any data value
    pub fn value(&mut self) -> Result<ScriptValue> {
        self.next()
    }

    /// Take a string
    pub fn string(&mut self) -> Result<String> {
        match self.next()? {
            ScriptValue::String(s) => Ok(s),
            other => Err(self.mismatch(&other)),
        }
    }

    /// Take a number
    pub fn number(&mut self) -> Result<f64> {
        match self.next()? {
            ScriptValue::Number(n) => Ok(n),
            other => Err(self.mismatch(&other)),
        }
    }

    fn integral(&mut self) -> Result<i64> {
        let n = self.number()?;
        if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
            Ok(n as i64)
        } else {
            Err(BridgeError::InvalidArguments {
                operation: self.operation,
                shapes: format!("(non-integral number {n})"),
            })
        }
    }

    /// Take a number and narrow it to a port.
    ///
    /// Narrowing never clamps: a fractional or out-of-range value is an
    /// invalid-arguments error, not a different port.
    pub fn port(&mut self) -> Result<u16> {
        let n = self.integral()?;
        u16::try_from(n).map_err(|_| BridgeError::InvalidArguments {
            operation: self.operation,
            shapes: format!("(port {n} out of range)"),
        })
    }

    /// Take a number that must be a whole, non-negative value (delays,
    /// timer ids). Same rule as [`ArgCursor::port`]: no clamping.
    pub fn unsigned(&mut self) -> Result<u64> {
        let n = self.integral()?;
        u64::try_from(n).map_err(|_| BridgeError::InvalidArguments {
            operation: self.operation,
            shapes: format!("(negative number {n})"),
        })
    }

    /// Take a boolean
    pub fn boolean(&mut self) -> Result<bool> {
        match self.next()? {
            ScriptValue::Bool(b) => Ok(b),
            other => Err(self.mismatch(&other)),
        }
    }

    /// Take a byte payload
    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        match self.next()? {
            ScriptValue::Bytes(b) => Ok(b),
            other => Err(self.mismatch(&other)),
        }
    }

    /// Take a plain record object
    pub fn object(&mut self) -> Result<ScriptValue> {
        match self.next()? {
            v @ ScriptValue::Object(_) => Ok(v),
            other => Err(self.mismatch(&other)),
        }
    }

    /// Take a wrapped handle
    pub fn handle(&mut self) -> Result<crate::handle::Proxy> {
        match self.next()? {
            ScriptValue::Handle(p) => Ok(p),
            other => Err(self.mismatch(&other)),
        }
    }

    /// Take a callback
    pub fn callback(&mut self) -> Result<crate::value::Callback> {
        match self.next()? {
            ScriptValue::Callback(c) => Ok(c),
            other => Err(self.mismatch(&other)),
        }
    }
}
