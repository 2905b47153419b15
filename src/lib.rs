//! # Harbor Script Bridge
//!
//! This library is the facade layer between loosely-typed script callers
//! and a strongly-typed native engine: overload resolution over dynamic
//! argument lists, completion bridging back onto the issuing context,
//! identity-stable proxy wrapping, and bidirectional value translation.
//!
//! ## Architecture
//!
//! ```text
//! Script caller
//!     │
//!     │ Vec<ScriptValue> per call
//!     ▼
//! Facades (this crate)
//!     │  overload tables → closed call forms
//!     │  callbacks → bridged completions
//!     ▼
//! Native engine (RootOps and friends)
//! ```
//!
//! ## Guarantees
//!
//! - **Total dispatch**: a call either matches exactly one overload or
//!   fails before anything native runs
//! - **Exactly-once completions**: success or failure, never both, never
//!   twice, always on the issuing context and never inline
//! - **Stable identity**: singleton resources wrap into one proxy per
//!   owner; wrapping is the only way a handle reaches script code
//! - **Total translation**: values with no structural mapping degrade to
//!   opaque pass-through instead of erroring

#![deny(missing_docs)]

pub mod bridge;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod facade;
pub mod handle;
pub mod translate;
pub mod value;

// Re-export commonly used types
pub use bridge::{bridge, bridge_channel, bridge_unit};
pub use context::{ContextHandle, ContextKind};
pub use dispatch::{ArgCursor, OverloadSignature, OverloadTable, ShapeTest};
pub use error::{BridgeError, ErrorCode, NativeError, Result};
pub use facade::Runtime;
pub use handle::{HandleKind, NativeHandle, Proxy, ProxyCache, SingletonKind};
pub use translate::{ConversionHook, Translator, UnknownValue};
pub use value::{Callback, Completion, ScriptValue};

use once_cell::sync::OnceCell;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static TRACING: OnceCell<()> = OnceCell::new();

/// Install the global tracing subscriber, reading `RUST_LOG` for filter
/// directives. Safe to call more than once; only the first call installs.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        use tracing_subscriber::EnvFilter;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    });
}
