//! Error types for the script bridge.
//!
//! Two kinds of failure cross this layer. [`BridgeError`] is raised by the
//! bridge itself, synchronously, before anything native has run (a call that
//! matches no overload, a proxy of the wrong kind). [`NativeError`] is
//! reported by the native engine and is passed through to the caller
//! untranslated, preserving whatever diagnostics the engine attached.
//!
//! Values that cannot be represented on one side of the boundary are *not*
//! an error: they degrade to opaque pass-through in the translator. See the
//! notes on [`crate::translate`].

use serde::{Deserialize, Serialize};

/// Error codes attached to native engine failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The operation failed inside the engine
    OperationFailed,
    /// The named resource does not exist
    NotFound,
    /// The resource has been closed
    Closed,
    /// The engine does not provide this capability
    Unsupported,
    /// The operation timed out inside the engine
    Timeout,
    /// Internal engine error (bug)
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::OperationFailed => write!(f, "OPERATION_FAILED"),
            ErrorCode::NotFound => write!(f, "NOT_FOUND"),
            ErrorCode::Closed => write!(f, "CLOSED"),
            ErrorCode::Unsupported => write!(f, "UNSUPPORTED"),
            ErrorCode::Timeout => write!(f, "TIMEOUT"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// A failure reported by the native engine.
///
/// Delivered through the failure branch of a completion, or returned
/// synchronously from blocking variants. The bridge never rewraps or
/// retries these; retry policy belongs to the caller or the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeError {
    /// Error code
    pub code: ErrorCode,

    /// Human-readable message
    pub message: String,

    /// Additional engine diagnostics, carried verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl NativeError {
    /// Create a new native error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create an operation failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::OperationFailed, message)
    }

    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found", what.into()))
    }

    /// Create a closed-resource error
    pub fn closed(what: impl Into<String>) -> Self {
        Self::new(ErrorCode::Closed, format!("{} is closed", what.into()))
    }

    /// Create an unsupported-capability error
    pub fn unsupported(capability: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::Unsupported,
            format!("engine does not provide capability '{}'", capability.into()),
        )
    }

    /// Attach engine diagnostics
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for NativeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for NativeError {}

/// Main error type for bridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// No registered overload matched the supplied argument list.
    ///
    /// Raised synchronously, before any native call executes. Indicates a
    /// caller bug; never retried.
    #[error("no overload of `{operation}` accepts {shapes}")]
    InvalidArguments {
        /// The facade operation that was invoked
        operation: &'static str,
        /// A shape summary of the actual arguments, e.g. `(string, callback)`
        shapes: String,
    },

    /// The native engine reported a failure
    #[error("native operation failed: {0}")]
    Native(#[from] NativeError),

    /// A proxy of one kind was used where another was expected
    #[error("handle kind mismatch: expected {expected}, got {actual}")]
    HandleType {
        /// The kind the operation requires
        expected: &'static str,
        /// The kind the proxy actually wraps
        actual: &'static str,
    },

    /// The issuing execution context has shut down
    #[error("execution context is closed")]
    ContextClosed,
}

impl BridgeError {
    /// Build an invalid-arguments error for `operation` against `args`.
    pub(crate) fn invalid_arguments(
        operation: &'static str,
        args: &[crate::value::ScriptValue],
    ) -> Self {
        BridgeError::InvalidArguments {
            operation,
            shapes: crate::dispatch::shape_summary(args),
        }
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
