//! Native handles, script-visible proxies, and the per-owner singleton cache.
//!
//! A [`NativeHandle`] is a non-owning, type-erased reference to a resource
//! living inside the native engine. A [`Proxy`] wraps exactly one handle and
//! is the object the script caller sees; [`Proxy::wrap`] is the only place
//! proxies are minted. Resources declared singleton-per-owner go through a
//! [`ProxyCache`] so repeated access returns the identical proxy.

use crate::error::{BridgeError, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// The capability a native handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// The engine root
    Root,
    /// A datagram socket
    DatagramSocket,
    /// A TCP server
    NetServer,
    /// An accepted TCP connection
    NetSocket,
    /// An HTTP client
    HttpClient,
    /// An in-flight HTTP request
    HttpRequest,
    /// An HTTP response
    HttpResponse,
    /// The file system accessor
    FileSystem,
    /// The shared-data accessor
    SharedData,
    /// An asynchronous shared map
    AsyncMap,
    /// The event bus accessor
    EventBus,
    /// A registered bus consumer
    Consumer,
    /// A delivered bus message
    Message,
    /// A resolved socket address
    SocketAddress,
}

impl HandleKind {
    /// Stable name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            HandleKind::Root => "root",
            HandleKind::DatagramSocket => "datagram-socket",
            HandleKind::NetServer => "net-server",
            HandleKind::NetSocket => "net-socket",
            HandleKind::HttpClient => "http-client",
            HandleKind::HttpRequest => "http-request",
            HandleKind::HttpResponse => "http-response",
            HandleKind::FileSystem => "file-system",
            HandleKind::SharedData => "shared-data",
            HandleKind::AsyncMap => "async-map",
            HandleKind::EventBus => "event-bus",
            HandleKind::Consumer => "consumer",
            HandleKind::Message => "message",
            HandleKind::SocketAddress => "socket-address",
        }
    }
}

/// An opaque reference to a resource owned by the native engine.
///
/// The engine owns the resource's lifecycle; this is a shared, non-owning
/// view from the bridge's perspective. Identity is pointer identity of the
/// underlying object.
#[derive(Clone)]
pub struct NativeHandle {
    kind: HandleKind,
    object: Arc<dyn Any + Send + Sync>,
}

impl NativeHandle {
    /// Create a handle around an engine-side object.
    ///
    /// Capability objects are conventionally stored as `Arc<dyn SomeOps>`
    /// so that [`NativeHandle::downcast_ref`] can recover the trait object.
    pub fn new<T: Any + Send + Sync>(kind: HandleKind, object: T) -> Self {
        Self {
            kind,
            object: Arc::new(object),
        }
    }

    /// The capability this handle refers to
    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Borrow the engine-side object if it is a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    /// Whether two handles refer to the same engine-side object
    pub fn same_object(&self, other: &NativeHandle) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }

    /// A stable identifier for the underlying object, for diagnostics
    pub fn raw_id(&self) -> usize {
        Arc::as_ptr(&self.object) as *const () as usize
    }
}

impl PartialEq for NativeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_object(other)
    }
}

impl std::fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeHandle({}#{:x})", self.kind.name(), self.raw_id())
    }
}

struct ProxyInner {
    handle: NativeHandle,
}

/// A script-visible wrapper around exactly one native handle.
///
/// The wrapped handle never changes after construction. Proxies are minted
/// only by [`Proxy::wrap`] (or the cache, which calls it); clones share the
/// same identity, and equality is reference equality.
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

impl Proxy {
    /// Wrap a native handle in a fresh proxy.
    ///
    /// Every call mints a new proxy instance; identity-stable singletons go
    /// through [`ProxyCache::get_or_wrap`] instead.
    pub fn wrap(handle: NativeHandle) -> Proxy {
        Proxy {
            inner: Arc::new(ProxyInner { handle }),
        }
    }

    /// The wrapped native handle.
    ///
    /// NOTE: this is an internal accessor used to unwrap proxies passed back
    /// into native calls. It is not a stable API and user code must not rely
    /// on it.
    pub fn delegate(&self) -> &NativeHandle {
        &self.inner.handle
    }

    /// The capability the wrapped handle refers to
    pub fn kind(&self) -> HandleKind {
        self.inner.handle.kind()
    }

    /// Whether two proxies are the same instance (reference equality)
    pub fn same_instance(&self, other: &Proxy) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Recover the engine-side trait object behind this proxy, failing with
    /// a kind-mismatch error when the proxy wraps something else.
    pub(crate) fn ops<T: Any>(&self, expected: &'static str) -> Result<&T> {
        self.inner
            .handle
            .downcast_ref::<T>()
            .ok_or(BridgeError::HandleType {
                expected,
                actual: self.kind().name(),
            })
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other)
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Proxy({})", self.inner.handle.kind().name())
    }
}

/// Resources declared singleton-per-owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SingletonKind {
    /// The owner's file system accessor
    FileSystem,
    /// The owner's event bus accessor
    EventBus,
    /// The owner's shared data accessor
    SharedData,
    /// A socket's bound local address
    LocalAddress,
}

/// Per-owner cache of singleton proxies.
///
/// The cache is mutated only by [`ProxyCache::get_or_wrap`]; the whole
/// check-then-insert runs under one lock, so concurrent first accesses
/// agree on a single winning proxy.
pub struct ProxyCache {
    entries: Mutex<HashMap<SingletonKind, Proxy>>,
}

impl ProxyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached proxy for `kind`, minting it from `make` on first
    /// access. All callers observe the same winning proxy.
    pub fn get_or_wrap(&self, kind: SingletonKind, make: impl FnOnce() -> NativeHandle) -> Proxy {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&kind) {
            return existing.clone();
        }
        let proxy = Proxy::wrap(make());
        debug!(kind = ?kind, "minted singleton proxy");
        entries.insert(kind, proxy.clone());
        proxy
    }

    /// Look up a cached proxy without minting
    pub fn peek(&self, kind: SingletonKind) -> Option<Proxy> {
        self.entries.lock().get(&kind).cloned()
    }
}

impl Default for ProxyCache {
    fn default() -> Self {
        Self::new()
    }
}
