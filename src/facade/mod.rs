//! The script-facing API surface.
//!
//! One facade type per engine capability. Every operation takes its
//! arguments as a `Vec<ScriptValue>`, resolves them against the operation's
//! overload table, and only then reaches the engine. After resolution the
//! call is a value of a closed per-operation enum; nothing downstream
//! re-inspects argument shapes.
//!
//! Facades are thin: argument plumbing, completion bridging, and proxy
//! bookkeeping. All feature semantics stay native-side.

pub mod datagram;
pub mod event_bus;
pub mod file_system;
pub mod http_client;
pub mod net_server;
pub mod runtime;
pub mod shared_data;

pub use datagram::DatagramSocket;
pub use event_bus::{Consumer, EventBus, Message};
pub use file_system::FileSystem;
pub use http_client::{HttpClient, HttpRequest, HttpResponse};
pub use net_server::{ConnectStream, NetServer};
pub use runtime::Runtime;
pub use shared_data::{AsyncMap, SharedData};

use crate::engine::NativeValue;
use crate::error::{BridgeError, NativeError, Result};
use crate::handle::{HandleKind, Proxy};

/// Check that a proxy wraps the expected capability before building a
/// facade over it.
pub(crate) fn expect_kind(proxy: &Proxy, kind: HandleKind) -> Result<()> {
    if proxy.kind() == kind {
        Ok(())
    } else {
        Err(BridgeError::HandleType {
            expected: kind.name(),
            actual: proxy.kind().name(),
        })
    }
}

/// Recover an error record from an exception event's payload.
///
/// Engines report exception events with a serialized error record where
/// they can; anything else is wrapped as a plain failure.
pub(crate) fn event_error(value: NativeValue) -> NativeError {
    match value {
        NativeValue::Record(json) => serde_json::from_value(json.clone())
            .unwrap_or_else(|_| NativeError::failed(json.to_string())),
        NativeValue::String(message) => NativeError::failed(message),
        other => NativeError::failed(format!("{other:?}")),
    }
}
