//! An in-process engine.
//!
//! `LocalEngine` backs the facade layer without touching the network: the
//! file system lives in memory, shared maps are process-local, and the
//! event bus is a loopback between consumers in the same process. Timers
//! and deployments are real. Socket and HTTP creation report unsupported;
//! those facades are exercised against purpose-built engines in their own
//! tests.

use crate::config::{DatagramOptions, DeployOptions, HttpClientOptions, NetServerOptions};
use crate::engine::{
    BusOps, CompletionResult, ConsumerOps, EventSink, FileSystemOps, MapOps, MessageOps,
    NativeCompletion, NativeValue, RootOps, SharedDataOps, TimerFire,
};
use crate::error::NativeError;
use crate::handle::{HandleKind, NativeHandle};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Process-local engine.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct LocalEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    next_timer_id: AtomicU64,
    timers: DashMap<u64, tokio::task::JoinHandle<()>>,
    deployments: DashMap<String, Deployment>,
    file_system: NativeHandle,
    event_bus: NativeHandle,
    shared_data: NativeHandle,
}

#[allow(dead_code)]
struct Deployment {
    name: String,
    options: DeployOptions,
}

impl LocalEngine {
    /// Create an engine with empty state.
    pub fn new() -> Self {
        let fs: Arc<dyn FileSystemOps> = Arc::new(LocalFileSystem::new());
        let bus: Arc<dyn BusOps> = Arc::new(LocalBus::new());
        let shared: Arc<dyn SharedDataOps> = Arc::new(LocalSharedData::new());
        Self {
            inner: Arc::new(EngineInner {
                next_timer_id: AtomicU64::new(1),
                timers: DashMap::new(),
                deployments: DashMap::new(),
                file_system: NativeHandle::new(HandleKind::FileSystem, fs),
                event_bus: NativeHandle::new(HandleKind::EventBus, bus),
                shared_data: NativeHandle::new(HandleKind::SharedData, shared),
            }),
        }
    }

    /// The engine as a root handle, ready for a facade to wrap.
    pub fn root_handle(&self) -> NativeHandle {
        let root: Arc<dyn RootOps> = Arc::new(self.clone());
        NativeHandle::new(HandleKind::Root, root)
    }

    /// Number of live deployments, for diagnostics.
    pub fn deployment_count(&self) -> usize {
        self.inner.deployments.len()
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RootOps for LocalEngine {
    fn create_datagram_socket(&self, _options: DatagramOptions) -> Result<NativeHandle, NativeError> {
        Err(NativeError::unsupported(
            "datagram sockets are not available in the local engine",
        ))
    }

    fn create_net_server(&self, _options: NetServerOptions) -> Result<NativeHandle, NativeError> {
        Err(NativeError::unsupported(
            "net servers are not available in the local engine",
        ))
    }

    fn create_http_client(&self, _options: HttpClientOptions) -> Result<NativeHandle, NativeError> {
        Err(NativeError::unsupported(
            "http clients are not available in the local engine",
        ))
    }

    fn file_system(&self) -> NativeHandle {
        self.inner.file_system.clone()
    }

    fn event_bus(&self) -> NativeHandle {
        self.inner.event_bus.clone()
    }

    fn shared_data(&self) -> NativeHandle {
        self.inner.shared_data.clone()
    }

    fn set_timer(&self, delay_ms: u64, periodic: bool, mut fire: TimerFire) -> u64 {
        let id = self.inner.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            if periodic {
                let mut tick = tokio::time::interval(Duration::from_millis(delay_ms.max(1)));
                // The first interval tick is immediate; skip it.
                tick.tick().await;
                loop {
                    tick.tick().await;
                    fire(id);
                }
            } else {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                fire(id);
                inner.timers.remove(&id);
            }
        });
        self.inner.timers.insert(id, task);
        debug!(timer_id = id, delay_ms, periodic, "timer armed");
        id
    }

    fn cancel_timer(&self, id: u64) -> bool {
        match self.inner.timers.remove(&id) {
            Some((_, task)) => {
                task.abort();
                debug!(timer_id = id, "timer cancelled");
                true
            }
            None => false,
        }
    }

    fn deploy_unit(&self, name: &str, options: DeployOptions, done: Option<NativeCompletion>) {
        if options.instances == 0 {
            if let Some(done) = done {
                done(CompletionResult::Failure(NativeError::failed(
                    "cannot deploy zero instances",
                )));
            }
            return;
        }
        let deployment_id = uuid::Uuid::new_v4().to_string();
        self.inner.deployments.insert(
            deployment_id.clone(),
            Deployment {
                name: name.to_string(),
                options,
            },
        );
        info!(unit = name, deployment_id = %deployment_id, "unit deployed");
        if let Some(done) = done {
            done(CompletionResult::Success(NativeValue::String(deployment_id)));
        }
    }

    fn undeploy_unit(&self, deployment_id: &str, done: Option<NativeCompletion>) {
        let outcome = if self.inner.deployments.remove(deployment_id).is_some() {
            info!(deployment_id, "unit undeployed");
            CompletionResult::Success(NativeValue::Null)
        } else {
            CompletionResult::Failure(NativeError::not_found(format!(
                "deployment {deployment_id}"
            )))
        };
        if let Some(done) = done {
            done(outcome);
        }
    }

    fn close(&self, done: Option<NativeCompletion>) {
        let ids: Vec<u64> = self.inner.timers.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.cancel_timer(id);
        }
        self.inner.deployments.clear();
        info!("local engine closed");
        if let Some(done) = done {
            done(CompletionResult::Success(NativeValue::Null));
        }
    }
}

/// In-memory file system: whole files and flat directory markers.
struct LocalFileSystem {
    files: DashMap<String, Vec<u8>>,
    dirs: DashMap<String, ()>,
}

impl LocalFileSystem {
    fn new() -> Self {
        Self {
            files: DashMap::new(),
            dirs: DashMap::new(),
        }
    }
}

impl FileSystemOps for LocalFileSystem {
    fn copy(&self, from: String, to: String, done: NativeCompletion) {
        done(self.copy_blocking(&from, &to).map(|_| NativeValue::Null).into());
    }

    fn copy_blocking(&self, from: &str, to: &str) -> Result<(), NativeError> {
        let data = self
            .files
            .get(from)
            .map(|e| e.value().clone())
            .ok_or_else(|| NativeError::not_found(format!("file {from}")))?;
        if self.files.contains_key(to) {
            return Err(NativeError::failed(format!("destination exists: {to}")));
        }
        self.files.insert(to.to_string(), data);
        Ok(())
    }

    fn delete(&self, path: String, recursive: bool, done: NativeCompletion) {
        done(
            self.delete_blocking(&path, recursive)
                .map(|_| NativeValue::Null)
                .into(),
        );
    }

    fn delete_blocking(&self, path: &str, recursive: bool) -> Result<(), NativeError> {
        if self.files.remove(path).is_some() {
            return Ok(());
        }
        if self.dirs.remove(path).is_some() {
            if recursive {
                let prefix = format!("{path}/");
                self.files.retain(|k, _| !k.starts_with(&prefix));
                self.dirs.retain(|k, _| !k.starts_with(&prefix));
            }
            return Ok(());
        }
        Err(NativeError::not_found(format!("path {path}")))
    }

    fn mkdir(&self, path: String, perms: Option<String>, done: NativeCompletion) {
        done(
            self.mkdir_blocking(&path, perms.as_deref())
                .map(|_| NativeValue::Null)
                .into(),
        );
    }

    fn mkdir_blocking(&self, path: &str, _perms: Option<&str>) -> Result<(), NativeError> {
        if self.dirs.contains_key(path) || self.files.contains_key(path) {
            return Err(NativeError::failed(format!("path exists: {path}")));
        }
        self.dirs.insert(path.to_string(), ());
        Ok(())
    }

    fn read_file(&self, path: String, done: NativeCompletion) {
        done(self.read_file_blocking(&path).map(NativeValue::Bytes).into());
    }

    fn read_file_blocking(&self, path: &str) -> Result<Vec<u8>, NativeError> {
        self.files
            .get(path)
            .map(|e| e.value().clone())
            .ok_or_else(|| NativeError::not_found(format!("file {path}")))
    }

    fn write_file(&self, path: String, data: Vec<u8>, done: NativeCompletion) {
        done(
            self.write_file_blocking(&path, &data)
                .map(|_| NativeValue::Null)
                .into(),
        );
    }

    fn write_file_blocking(&self, path: &str, data: &[u8]) -> Result<(), NativeError> {
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn exists(&self, path: String, done: NativeCompletion) {
        done(self.exists_blocking(&path).map(NativeValue::Bool).into());
    }

    fn exists_blocking(&self, path: &str) -> Result<bool, NativeError> {
        Ok(self.files.contains_key(path) || self.dirs.contains_key(path))
    }
}

/// Process-local shared data: one lazily created map per name.
struct LocalSharedData {
    maps: DashMap<String, NativeHandle>,
}

impl LocalSharedData {
    fn new() -> Self {
        Self {
            maps: DashMap::new(),
        }
    }
}

impl SharedDataOps for LocalSharedData {
    fn get_map(&self, name: String, done: NativeCompletion) {
        let handle = self
            .maps
            .entry(name)
            .or_insert_with(|| {
                let map: Arc<dyn MapOps> = Arc::new(LocalMap::new());
                NativeHandle::new(HandleKind::AsyncMap, map)
            })
            .clone();
        done(CompletionResult::Success(NativeValue::Handle(handle)));
    }
}

struct MapEntry {
    value: NativeValue,
    expires_at: Option<Instant>,
}

impl MapEntry {
    fn live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// An async map over an in-process table. Expiry is lazy: entries past
/// their deadline are dropped when next observed.
struct LocalMap {
    entries: Mutex<HashMap<String, MapEntry>>,
}

impl LocalMap {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

/// Canonical string form of a key; only scalar keys are accepted.
fn map_key(key: &NativeValue) -> Result<String, NativeError> {
    match key {
        NativeValue::Null => Ok("n:".to_string()),
        NativeValue::Bool(b) => Ok(format!("b:{b}")),
        NativeValue::Int(i) => Ok(format!("i:{i}")),
        NativeValue::Double(d) => Ok(format!("d:{d}")),
        NativeValue::String(s) => Ok(format!("s:{s}")),
        other => Err(NativeError::unsupported(format!(
            "unsupported map key: {other:?}"
        ))),
    }
}

impl MapOps for LocalMap {
    fn get(&self, key: NativeValue, done: NativeCompletion) {
        let outcome = map_key(&key).map(|k| {
            let mut entries = self.entries.lock();
            match entries.get(&k) {
                Some(entry) if entry.live() => entry.value.clone(),
                Some(_) => {
                    entries.remove(&k);
                    NativeValue::Null
                }
                None => NativeValue::Null,
            }
        });
        done(outcome.into());
    }

    fn put(&self, key: NativeValue, value: NativeValue, ttl_ms: Option<u64>, done: NativeCompletion) {
        let outcome = map_key(&key).map(|k| {
            let expires_at = ttl_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
            self.entries.lock().insert(k, MapEntry { value, expires_at });
            NativeValue::Null
        });
        done(outcome.into());
    }

    fn put_if_absent(
        &self,
        key: NativeValue,
        value: NativeValue,
        ttl_ms: Option<u64>,
        done: NativeCompletion,
    ) {
        let outcome = map_key(&key).map(|k| {
            let mut entries = self.entries.lock();
            match entries.get(&k) {
                Some(entry) if entry.live() => entry.value.clone(),
                _ => {
                    let expires_at = ttl_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
                    entries.insert(k, MapEntry { value, expires_at });
                    NativeValue::Null
                }
            }
        });
        done(outcome.into());
    }

    fn remove(&self, key: NativeValue, done: NativeCompletion) {
        let outcome = map_key(&key).map(|k| {
            match self.entries.lock().remove(&k) {
                Some(entry) if entry.live() => entry.value,
                _ => NativeValue::Null,
            }
        });
        done(outcome.into());
    }

    fn size(&self, done: NativeCompletion) {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.live());
        done(CompletionResult::Success(NativeValue::Int(
            entries.len() as i64
        )));
    }

    fn clear(&self, done: NativeCompletion) {
        self.entries.lock().clear();
        done(CompletionResult::Success(NativeValue::Null));
    }
}

/// Loopback event bus: consumers in this process, point-to-point picks the
/// longest-registered consumer on the address.
#[derive(Clone)]
struct LocalBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    next_consumer_id: AtomicU64,
    consumers: DashMap<String, Vec<ConsumerEntry>>,
}

struct ConsumerEntry {
    id: u64,
    sink: Arc<Mutex<EventSink>>,
}

impl LocalBus {
    fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next_consumer_id: AtomicU64::new(1),
                consumers: DashMap::new(),
            }),
        }
    }

    fn deliver(&self, address: &str, message: Arc<LocalMessage>, publish: bool) -> bool {
        let sinks: Vec<Arc<Mutex<EventSink>>> = match self.inner.consumers.get(address) {
            Some(entries) if !entries.is_empty() => {
                if publish {
                    entries.iter().map(|e| e.sink.clone()).collect()
                } else {
                    vec![entries[0].sink.clone()]
                }
            }
            _ => return false,
        };
        for sink in sinks {
            let ops: Arc<dyn MessageOps> = message.clone();
            let handle = NativeHandle::new(HandleKind::Message, ops);
            (sink.lock())(NativeValue::Handle(handle));
        }
        true
    }
}

impl BusOps for LocalBus {
    fn send(&self, address: String, body: NativeValue, reply: Option<NativeCompletion>) {
        let message = Arc::new(LocalMessage {
            address: address.clone(),
            body,
            reply_slot: Mutex::new(reply),
        });
        if !self.deliver(&address, message.clone(), false) {
            if let Some(reply) = message.reply_slot.lock().take() {
                reply(CompletionResult::Failure(NativeError::not_found(format!(
                    "consumer on address {address}"
                ))));
            }
            debug!(address = %address, "send with no consumers; dropped");
        }
    }

    fn publish(&self, address: String, body: NativeValue) {
        let message = Arc::new(LocalMessage {
            address: address.clone(),
            body,
            reply_slot: Mutex::new(None),
        });
        self.deliver(&address, message, true);
    }

    fn consumer(&self, address: String, sink: EventSink) -> NativeHandle {
        let id = self.inner.next_consumer_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .consumers
            .entry(address.clone())
            .or_default()
            .push(ConsumerEntry {
                id,
                sink: Arc::new(Mutex::new(sink)),
            });
        debug!(address = %address, consumer_id = id, "consumer registered");
        let ops: Arc<dyn ConsumerOps> = Arc::new(LocalConsumer {
            bus: self.clone(),
            address,
            id,
        });
        NativeHandle::new(HandleKind::Consumer, ops)
    }
}

struct LocalConsumer {
    bus: LocalBus,
    address: String,
    id: u64,
}

impl ConsumerOps for LocalConsumer {
    fn unregister(&self, done: Option<NativeCompletion>) {
        if let Some(mut entries) = self.bus.inner.consumers.get_mut(&self.address) {
            entries.retain(|e| e.id != self.id);
        }
        if let Some(done) = done {
            done(CompletionResult::Success(NativeValue::Null));
        }
    }
}

/// A message in flight on the loopback bus.
///
/// The reply slot is consumed by the first reply; later replies are no-ops,
/// as are replies to published messages.
struct LocalMessage {
    address: String,
    body: NativeValue,
    reply_slot: Mutex<Option<NativeCompletion>>,
}

impl MessageOps for LocalMessage {
    fn body(&self) -> NativeValue {
        self.body.clone()
    }

    fn address(&self) -> String {
        self.address.clone()
    }

    fn reply(&self, body: NativeValue) {
        if let Some(reply) = self.reply_slot.lock().take() {
            let response: Arc<dyn MessageOps> = Arc::new(LocalMessage {
                address: self.address.clone(),
                body,
                reply_slot: Mutex::new(None),
            });
            reply(CompletionResult::Success(NativeValue::Handle(
                NativeHandle::new(HandleKind::Message, response),
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn expect<T>(
        rx: &mpsc::Receiver<CompletionResult<NativeValue>>,
        f: impl FnOnce(CompletionResult<NativeValue>) -> T,
    ) -> T {
        f(rx.recv().unwrap())
    }

    fn completion() -> (NativeCompletion, mpsc::Receiver<CompletionResult<NativeValue>>) {
        let (tx, rx) = mpsc::channel();
        (Box::new(move |outcome| tx.send(outcome).unwrap()), rx)
    }

    #[test]
    fn test_file_system_write_read_exists() {
        let fs = LocalFileSystem::new();
        fs.write_file_blocking("/tmp/a", b"hello").unwrap();
        assert_eq!(fs.read_file_blocking("/tmp/a").unwrap(), b"hello");
        assert!(fs.exists_blocking("/tmp/a").unwrap());
        assert!(!fs.exists_blocking("/tmp/b").unwrap());
    }

    #[test]
    fn test_file_system_copy_refuses_overwrite() {
        let fs = LocalFileSystem::new();
        fs.write_file_blocking("/a", b"x").unwrap();
        fs.copy_blocking("/a", "/b").unwrap();
        assert_eq!(fs.read_file_blocking("/b").unwrap(), b"x");
        assert!(fs.copy_blocking("/a", "/b").is_err());
    }

    #[test]
    fn test_file_system_recursive_delete() {
        let fs = LocalFileSystem::new();
        fs.mkdir_blocking("/dir", None).unwrap();
        fs.write_file_blocking("/dir/a", b"1").unwrap();
        fs.write_file_blocking("/dir/b", b"2").unwrap();
        fs.delete_blocking("/dir", true).unwrap();
        assert!(!fs.exists_blocking("/dir/a").unwrap());
        assert!(fs.delete_blocking("/dir", false).is_err());
    }

    #[test]
    fn test_map_get_missing_is_success_null() {
        let map = LocalMap::new();
        let (done, rx) = completion();
        map.get(NativeValue::String("missing".into()), done);
        expect(&rx, |o| {
            assert_eq!(o.into_result().unwrap(), NativeValue::Null);
        });
    }

    #[test]
    fn test_map_put_if_absent_reports_prior() {
        let map = LocalMap::new();
        let key = || NativeValue::String("k".into());

        let (done, rx) = completion();
        map.put_if_absent(key(), NativeValue::Int(1), None, done);
        expect(&rx, |o| assert_eq!(o.into_result().unwrap(), NativeValue::Null));

        let (done, rx) = completion();
        map.put_if_absent(key(), NativeValue::Int(2), None, done);
        expect(&rx, |o| assert_eq!(o.into_result().unwrap(), NativeValue::Int(1)));

        let (done, rx) = completion();
        map.get(key(), done);
        expect(&rx, |o| assert_eq!(o.into_result().unwrap(), NativeValue::Int(1)));
    }

    #[test]
    fn test_map_ttl_expires_lazily() {
        let map = LocalMap::new();
        let (done, rx) = completion();
        map.put(NativeValue::Int(1), NativeValue::Bool(true), Some(0), done);
        expect(&rx, |o| assert!(o.succeeded()));

        std::thread::sleep(Duration::from_millis(5));
        let (done, rx) = completion();
        map.get(NativeValue::Int(1), done);
        expect(&rx, |o| assert_eq!(o.into_result().unwrap(), NativeValue::Null));

        let (done, rx) = completion();
        map.size(done);
        expect(&rx, |o| assert_eq!(o.into_result().unwrap(), NativeValue::Int(0)));
    }

    #[test]
    fn test_map_rejects_structured_keys() {
        let map = LocalMap::new();
        let (done, rx) = completion();
        map.get(NativeValue::List(vec![]), done);
        expect(&rx, |o| assert!(!o.succeeded()));
    }

    #[test]
    fn test_bus_send_reaches_one_consumer_publish_reaches_all() {
        let bus = LocalBus::new();
        let counts = [Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0))];

        for count in &counts {
            let count = count.clone();
            bus.consumer(
                "addr".into(),
                Box::new(move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        bus.send("addr".into(), NativeValue::Int(1), None);
        assert_eq!(counts[0].load(Ordering::SeqCst), 1);
        assert_eq!(counts[1].load(Ordering::SeqCst), 0);

        bus.publish("addr".into(), NativeValue::Int(2));
        assert_eq!(counts[0].load(Ordering::SeqCst), 2);
        assert_eq!(counts[1].load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bus_reply_round_trip() {
        let bus = LocalBus::new();
        bus.consumer(
            "echo".into(),
            Box::new(move |event| {
                if let NativeValue::Handle(h) = event {
                    let msg = h.downcast_ref::<Arc<dyn MessageOps>>().unwrap();
                    let body = msg.body();
                    msg.reply(body);
                }
            }),
        );

        let (done, rx) = completion();
        bus.send("echo".into(), NativeValue::String("ping".into()), Some(done));
        expect(&rx, |o| {
            let value = o.into_result().unwrap();
            let NativeValue::Handle(h) = value else {
                panic!("expected a message handle");
            };
            let msg = h.downcast_ref::<Arc<dyn MessageOps>>().unwrap();
            assert_eq!(msg.body(), NativeValue::String("ping".into()));
        });
    }

    #[test]
    fn test_bus_send_without_consumers_fails_reply() {
        let bus = LocalBus::new();
        let (done, rx) = completion();
        bus.send("nowhere".into(), NativeValue::Null, Some(done));
        expect(&rx, |o| assert!(!o.succeeded()));
    }

    #[test]
    fn test_consumer_unregister_stops_delivery() {
        let bus = LocalBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = bus.consumer(
            "addr".into(),
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish("addr".into(), NativeValue::Int(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let consumer = handle.downcast_ref::<Arc<dyn ConsumerOps>>().unwrap();
        consumer.unregister(None);
        bus.publish("addr".into(), NativeValue::Int(2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timer_fires_and_cancel_after_fire_is_false() {
        let engine = LocalEngine::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<u64>();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let id = engine.set_timer(
            1,
            false,
            Box::new(move |fired_id| {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(fired_id);
                }
            }),
        );
        assert_eq!(rx.await.unwrap(), id);
        // The one-shot already fired and retired its id.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!engine.cancel_timer(id));
    }

    #[tokio::test]
    async fn test_periodic_timer_cancelled() {
        let engine = LocalEngine::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = engine.set_timer(
            1,
            true,
            Box::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(engine.cancel_timer(id));
        assert!(count.load(Ordering::SeqCst) >= 2);
        assert!(!engine.cancel_timer(id));
    }

    #[test]
    fn test_deploy_and_undeploy() {
        let engine = LocalEngine::new();
        let (done, rx) = completion();
        engine.deploy_unit("worker.unit", DeployOptions::new(), Some(done));
        let id = expect(&rx, |o| match o.into_result().unwrap() {
            NativeValue::String(id) => id,
            other => panic!("expected id, got {other:?}"),
        });
        assert_eq!(engine.deployment_count(), 1);

        let (done, rx) = completion();
        engine.undeploy_unit(&id, Some(done));
        expect(&rx, |o| assert!(o.succeeded()));
        assert_eq!(engine.deployment_count(), 0);

        let (done, rx) = completion();
        engine.undeploy_unit(&id, Some(done));
        expect(&rx, |o| assert!(!o.succeeded()));
    }

    #[test]
    fn test_singleton_accessors_are_stable() {
        let engine = LocalEngine::new();
        assert!(engine.file_system().same_object(&engine.file_system()));
        assert!(engine.event_bus().same_object(&engine.event_bus()));
        assert!(engine.shared_data().same_object(&engine.shared_data()));
    }
}
