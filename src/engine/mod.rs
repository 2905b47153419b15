//! The native engine boundary.
//!
//! The engine owns all feature semantics — what `send` does on the wire,
//! what `copy` does on disk. The bridge reaches it through the trait
//! catalogue in this module: every operation is either synchronous-returning
//! or takes a single [`NativeCompletion`] that the engine fires exactly once
//! with a [`CompletionResult`].
//!
//! Option records arrive pre-converted into the typed structs from
//! [`crate::config`]; the engine receives no raw script values.

pub mod local;

use crate::config::{DatagramOptions, DeployOptions, HttpClientOptions, NetServerOptions};
use crate::error::NativeError;
use crate::handle::NativeHandle;
use crate::value::OpaqueValue;
use std::collections::HashMap;

/// The single outcome of an asynchronous native operation.
///
/// Produced exactly once; the branches are mutually exclusive.
#[derive(Debug)]
pub enum CompletionResult<T> {
    /// The operation completed with a value
    Success(T),
    /// The operation failed; the error is passed through untranslated
    Failure(NativeError),
}

impl<T> CompletionResult<T> {
    /// Whether this is the success branch
    pub fn succeeded(&self) -> bool {
        matches!(self, CompletionResult::Success(_))
    }

    /// Map the success value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CompletionResult<U> {
        match self {
            CompletionResult::Success(v) => CompletionResult::Success(f(v)),
            CompletionResult::Failure(e) => CompletionResult::Failure(e),
        }
    }

    /// Convert into a plain `Result`
    pub fn into_result(self) -> Result<T, NativeError> {
        match self {
            CompletionResult::Success(v) => Ok(v),
            CompletionResult::Failure(e) => Err(e),
        }
    }
}

impl<T> From<Result<T, NativeError>> for CompletionResult<T> {
    fn from(r: Result<T, NativeError>) -> Self {
        match r {
            Ok(v) => CompletionResult::Success(v),
            Err(e) => CompletionResult::Failure(e),
        }
    }
}

/// A value in the engine's representation
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// Null / absent
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Double(f64),
    /// String
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// A strongly-typed record, in its canonical serialized form
    Record(serde_json::Value),
    /// Ordered list
    List(Vec<NativeValue>),
    /// String-keyed map
    Map(HashMap<String, NativeValue>),
    /// A reference to another engine resource
    Handle(NativeHandle),
    /// A value with no structural mapping
    Opaque(OpaqueValue),
}

/// Completion callback handed to the engine: fired exactly once, on any
/// thread the engine likes. Context affinity is the bridge's job.
pub type NativeCompletion = Box<dyn FnOnce(CompletionResult<NativeValue>) + Send + 'static>;

/// Sink for a stream of engine events (packets, connections, messages).
///
/// Installing a sink replaces any previously installed one: each event
/// source has zero or one active subscriber.
pub type EventSink = Box<dyn FnMut(NativeValue) + Send + 'static>;

/// Timer fire callback; receives the timer id, repeatedly for periodic timers
pub type TimerFire = Box<dyn FnMut(u64) + Send + 'static>;

/// Payload forms accepted by a datagram send
#[derive(Debug)]
pub enum DatagramPayload {
    /// Raw bytes
    Bytes(Vec<u8>),
    /// A previously wrapped engine buffer, unwrapped from its proxy
    Buffer(NativeHandle),
    /// Text, optionally with an explicit charset
    Text {
        /// The text to send
        text: String,
        /// Charset name; engine default when absent
        encoding: Option<String>,
    },
}

/// HTTP request methods accepted over the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
}

impl std::str::FromStr for HttpMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(()),
        }
    }
}

/// Root engine operations: resource creation, singleton accessors, timers,
/// unit deployment, shutdown
pub trait RootOps: Send + Sync {
    /// Create a datagram socket
    fn create_datagram_socket(&self, options: DatagramOptions) -> Result<NativeHandle, NativeError>;

    /// Create a TCP server
    fn create_net_server(&self, options: NetServerOptions) -> Result<NativeHandle, NativeError>;

    /// Create an HTTP client
    fn create_http_client(&self, options: HttpClientOptions) -> Result<NativeHandle, NativeError>;

    /// The engine's file system accessor
    fn file_system(&self) -> NativeHandle;

    /// The engine's event bus accessor
    fn event_bus(&self) -> NativeHandle;

    /// The engine's shared data accessor
    fn shared_data(&self) -> NativeHandle;

    /// Arm a timer; `fire` receives the returned id on every fire
    fn set_timer(&self, delay_ms: u64, periodic: bool, fire: TimerFire) -> u64;

    /// Cancel a timer. Returns `false` when the id is unknown or already
    /// fired; cancelling twice is safe.
    fn cancel_timer(&self, id: u64) -> bool;

    /// Deploy a named unit; success carries the deployment id string
    fn deploy_unit(&self, name: &str, options: DeployOptions, done: Option<NativeCompletion>);

    /// Undeploy by deployment id
    fn undeploy_unit(&self, deployment_id: &str, done: Option<NativeCompletion>);

    /// Shut the engine down
    fn close(&self, done: Option<NativeCompletion>);
}

/// Datagram socket operations
pub trait DatagramOps: Send + Sync {
    /// Send a payload; success carries a reference back to this socket
    fn send(&self, payload: DatagramPayload, port: u16, host: String, done: NativeCompletion);

    /// Bind and start receiving; success carries a reference to this socket
    fn listen(&self, port: u16, host: String, done: NativeCompletion);

    /// The bound local address, if bound
    fn local_address(&self) -> Option<NativeHandle>;

    /// Install the packet subscriber
    fn subscribe_packets(&self, sink: EventSink);

    /// Install the error subscriber
    fn subscribe_exceptions(&self, sink: EventSink);

    /// Close the socket
    fn close(&self, done: Option<NativeCompletion>);
}

/// TCP server operations
pub trait NetServerOps: Send + Sync {
    /// Start listening; port/host fall back to the creation options when
    /// absent. Success carries a reference to this server.
    fn listen(&self, port: Option<u16>, host: Option<String>, done: Option<NativeCompletion>);

    /// Install the connection subscriber; events carry accepted socket handles
    fn subscribe_connections(&self, sink: EventSink);

    /// The port actually bound (significant when 0 was requested)
    fn actual_port(&self) -> u16;

    /// Stop the server
    fn close(&self, done: Option<NativeCompletion>);
}

/// File system operations. Every async operation has a blocking variant
/// that runs on the calling thread; callers must only use those from worker
/// contexts.
pub trait FileSystemOps: Send + Sync {
    /// Copy a file
    fn copy(&self, from: String, to: String, done: NativeCompletion);
    /// Blocking [`FileSystemOps::copy`]
    fn copy_blocking(&self, from: &str, to: &str) -> Result<(), NativeError>;

    /// Delete a file or directory
    fn delete(&self, path: String, recursive: bool, done: NativeCompletion);
    /// Blocking [`FileSystemOps::delete`]
    fn delete_blocking(&self, path: &str, recursive: bool) -> Result<(), NativeError>;

    /// Create a directory, optionally with a permission string
    fn mkdir(&self, path: String, perms: Option<String>, done: NativeCompletion);
    /// Blocking [`FileSystemOps::mkdir`]
    fn mkdir_blocking(&self, path: &str, perms: Option<&str>) -> Result<(), NativeError>;

    /// Read a whole file; success carries bytes
    fn read_file(&self, path: String, done: NativeCompletion);
    /// Blocking [`FileSystemOps::read_file`]
    fn read_file_blocking(&self, path: &str) -> Result<Vec<u8>, NativeError>;

    /// Write a whole file
    fn write_file(&self, path: String, data: Vec<u8>, done: NativeCompletion);
    /// Blocking [`FileSystemOps::write_file`]
    fn write_file_blocking(&self, path: &str, data: &[u8]) -> Result<(), NativeError>;

    /// Whether a path exists; success carries a boolean
    fn exists(&self, path: String, done: NativeCompletion);
    /// Blocking [`FileSystemOps::exists`]
    fn exists_blocking(&self, path: &str) -> Result<bool, NativeError>;
}

/// Shared data accessor operations
pub trait SharedDataOps: Send + Sync {
    /// Resolve the named async map; success carries its handle
    fn get_map(&self, name: String, done: NativeCompletion);
}

/// Asynchronous shared map operations
pub trait MapOps: Send + Sync {
    /// Get a value; success carries the value or null when absent
    fn get(&self, key: NativeValue, done: NativeCompletion);

    /// Put a value, optionally expiring after `ttl_ms`
    fn put(&self, key: NativeValue, value: NativeValue, ttl_ms: Option<u64>, done: NativeCompletion);

    /// Put unless present; success carries the prior value or null
    fn put_if_absent(
        &self,
        key: NativeValue,
        value: NativeValue,
        ttl_ms: Option<u64>,
        done: NativeCompletion,
    );

    /// Remove a key; success carries the removed value or null
    fn remove(&self, key: NativeValue, done: NativeCompletion);

    /// Number of entries; success carries an integer
    fn size(&self, done: NativeCompletion);

    /// Remove all entries
    fn clear(&self, done: NativeCompletion);
}

/// Event bus operations
pub trait BusOps: Send + Sync {
    /// Point-to-point send; `reply` fires when the receiver replies
    fn send(&self, address: String, body: NativeValue, reply: Option<NativeCompletion>);

    /// Broadcast to every consumer on the address
    fn publish(&self, address: String, body: NativeValue);

    /// Register a consumer; events carry message handles. Returns the
    /// consumer's own handle.
    fn consumer(&self, address: String, sink: EventSink) -> NativeHandle;
}

/// A registered consumer's operations
pub trait ConsumerOps: Send + Sync {
    /// Remove the consumer from its address
    fn unregister(&self, done: Option<NativeCompletion>);
}

/// A delivered message's operations
pub trait MessageOps: Send + Sync {
    /// The message body
    fn body(&self) -> NativeValue;

    /// The address it was sent to
    fn address(&self) -> String;

    /// Reply to a point-to-point message. No-op when the sender did not
    /// ask for a reply or the message was published.
    fn reply(&self, body: NativeValue);
}

/// HTTP client operations
pub trait HttpOps: Send + Sync {
    /// Open a request. The request handle is returned immediately, before
    /// and independently of the response completion.
    fn request(
        &self,
        method: HttpMethod,
        port: u16,
        host: String,
        uri: String,
        on_response: Option<NativeCompletion>,
    ) -> NativeHandle;

    /// Close the client
    fn close(&self);
}

/// In-flight HTTP request operations
pub trait HttpRequestOps: Send + Sync {
    /// Append body data
    fn write(&self, data: Vec<u8>);

    /// Finish the request, optionally with trailing data
    fn end(&self, data: Option<Vec<u8>>);
}

/// HTTP response operations
pub trait HttpResponseOps: Send + Sync {
    /// The response status code
    fn status_code(&self) -> u16;

    /// Deliver the full body; success carries bytes
    fn body(&self, done: NativeCompletion);
}
