//! The root facade: resource creation, singleton accessors, timers and
//! unit deployment.

use crate::bridge::{bridge, bridge_unit};
use crate::config::{options_from_script, DatagramOptions, DeployOptions, HttpClientOptions, NetServerOptions};
use crate::context::ContextHandle;
use crate::dispatch::{ArgCursor, OverloadTable};
use crate::engine::RootOps;
use crate::error::Result;
use crate::facade::{DatagramSocket, EventBus, FileSystem, HttpClient, NetServer, SharedData};
use crate::handle::{HandleKind, NativeHandle, Proxy, ProxyCache, SingletonKind};
use crate::signatures;
use crate::translate::Translator;
use crate::value::{Callback, ScriptValue};
use std::sync::Arc;

const CREATE_DATAGRAM_SOCKET: OverloadTable =
    OverloadTable::new("createDatagramSocket", signatures![[], [Object]]);
const CREATE_NET_SERVER: OverloadTable =
    OverloadTable::new("createNetServer", signatures![[], [Object]]);
const CREATE_HTTP_CLIENT: OverloadTable =
    OverloadTable::new("createHttpClient", signatures![[], [Object]]);
const SET_TIMER: OverloadTable = OverloadTable::new("setTimer", signatures![[Number, Handler]]);
const SET_PERIODIC: OverloadTable =
    OverloadTable::new("setPeriodic", signatures![[Number, Handler]]);
const CANCEL_TIMER: OverloadTable = OverloadTable::new("cancelTimer", signatures![[Number]]);
const RUN_ON_CONTEXT: OverloadTable = OverloadTable::new("runOnContext", signatures![[Handler]]);
const DEPLOY_UNIT: OverloadTable = OverloadTable::new(
    "deployUnit",
    signatures![[Str], [Str, Handler], [Str, Object], [Str, Object, Handler]],
);
const UNDEPLOY: OverloadTable = OverloadTable::new("undeploy", signatures![[Str], [Str, Handler]]);
const CLOSE: OverloadTable = OverloadTable::new("close", signatures![[], [Handler]]);

/// Resolved form of a `deployUnit` call
enum DeployCall {
    /// `deployUnit(name)` and `deployUnit(name, handler)`
    Bare(String, Option<Callback>),
    /// `deployUnit(name, options)` and `deployUnit(name, options, handler)`
    WithOptions(String, DeployOptions, Option<Callback>),
}

/// The root facade over a native engine.
///
/// Owns the singleton proxy cache: `file_system`, `event_bus` and
/// `shared_data` return the same proxy instance on every call.
pub struct Runtime {
    proxy: Proxy,
    ctx: ContextHandle,
    translator: Translator,
    singletons: ProxyCache,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").field("proxy", &self.proxy).finish()
    }
}

impl Runtime {
    /// Build the root facade over `root`, issuing calls from `ctx`.
    pub fn new(root: NativeHandle, ctx: ContextHandle, translator: Translator) -> Result<Runtime> {
        let proxy = Proxy::wrap(root);
        super::expect_kind(&proxy, HandleKind::Root)?;
        Ok(Runtime {
            proxy,
            ctx,
            translator,
            singletons: ProxyCache::new(),
        })
    }

    /// A runtime over the in-process engine, on a fresh event-loop context.
    pub fn local() -> Result<Runtime> {
        let engine = crate::engine::local::LocalEngine::new();
        Runtime::new(
            engine.root_handle(),
            ContextHandle::spawn(crate::context::ContextKind::EventLoop),
            Translator::new(),
        )
    }

    fn ops(&self) -> Result<&Arc<dyn RootOps>> {
        self.proxy.ops::<Arc<dyn RootOps>>(HandleKind::Root.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// The context this facade issues calls from
    pub fn context(&self) -> &ContextHandle {
        &self.ctx
    }

    /// The translator used on this facade's boundary
    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// `createDatagramSocket()` / `createDatagramSocket(options)`
    pub fn create_datagram_socket(&self, args: Vec<ScriptValue>) -> Result<DatagramSocket> {
        let index = CREATE_DATAGRAM_SOCKET.resolve(&args)?;
        let mut cur = ArgCursor::new(CREATE_DATAGRAM_SOCKET.operation, args);
        let options: DatagramOptions = match index {
            0 => DatagramOptions::default(),
            _ => options_from_script(CREATE_DATAGRAM_SOCKET.operation, &cur.object()?)?,
        };
        let handle = self.ops()?.create_datagram_socket(options)?;
        DatagramSocket::from_proxy(Proxy::wrap(handle), self.ctx.clone(), self.translator.clone())
    }

    /// `createNetServer()` / `createNetServer(options)`
    pub fn create_net_server(&self, args: Vec<ScriptValue>) -> Result<NetServer> {
        let index = CREATE_NET_SERVER.resolve(&args)?;
        let mut cur = ArgCursor::new(CREATE_NET_SERVER.operation, args);
        let options: NetServerOptions = match index {
            0 => NetServerOptions::default(),
            _ => options_from_script(CREATE_NET_SERVER.operation, &cur.object()?)?,
        };
        let handle = self.ops()?.create_net_server(options)?;
        NetServer::from_proxy(Proxy::wrap(handle), self.ctx.clone(), self.translator.clone())
    }

    /// `createHttpClient()` / `createHttpClient(options)`
    pub fn create_http_client(&self, args: Vec<ScriptValue>) -> Result<HttpClient> {
        let index = CREATE_HTTP_CLIENT.resolve(&args)?;
        let mut cur = ArgCursor::new(CREATE_HTTP_CLIENT.operation, args);
        let options: HttpClientOptions = match index {
            0 => HttpClientOptions::default(),
            _ => options_from_script(CREATE_HTTP_CLIENT.operation, &cur.object()?)?,
        };
        let handle = self.ops()?.create_http_client(options)?;
        HttpClient::from_proxy(Proxy::wrap(handle), self.ctx.clone(), self.translator.clone())
    }

    /// The file system accessor; one proxy per runtime.
    pub fn file_system(&self) -> Result<FileSystem> {
        let ops = self.ops()?;
        let proxy = self
            .singletons
            .get_or_wrap(SingletonKind::FileSystem, || ops.file_system());
        FileSystem::from_proxy(proxy, self.ctx.clone(), self.translator.clone())
    }

    /// The event bus accessor; one proxy per runtime.
    pub fn event_bus(&self) -> Result<EventBus> {
        let ops = self.ops()?;
        let proxy = self
            .singletons
            .get_or_wrap(SingletonKind::EventBus, || ops.event_bus());
        EventBus::from_proxy(proxy, self.ctx.clone(), self.translator.clone())
    }

    /// The shared data accessor; one proxy per runtime.
    pub fn shared_data(&self) -> Result<SharedData> {
        let ops = self.ops()?;
        let proxy = self
            .singletons
            .get_or_wrap(SingletonKind::SharedData, || ops.shared_data());
        SharedData::from_proxy(proxy, self.ctx.clone(), self.translator.clone())
    }

    /// `setTimer(delayMs, handler)`; the handler receives the timer id.
    pub fn set_timer(&self, args: Vec<ScriptValue>) -> Result<f64> {
        SET_TIMER.resolve(&args)?;
        let mut cur = ArgCursor::new(SET_TIMER.operation, args);
        let delay_ms = cur.unsigned()?;
        let callback = cur.callback()?;
        self.arm_timer(delay_ms, false, callback)
    }

    /// `setPeriodic(intervalMs, handler)`; fires until cancelled.
    pub fn set_periodic(&self, args: Vec<ScriptValue>) -> Result<f64> {
        SET_PERIODIC.resolve(&args)?;
        let mut cur = ArgCursor::new(SET_PERIODIC.operation, args);
        let interval_ms = cur.unsigned()?;
        let callback = cur.callback()?;
        self.arm_timer(interval_ms, true, callback)
    }

    fn arm_timer(&self, delay_ms: u64, periodic: bool, callback: Callback) -> Result<f64> {
        let ctx = self.ctx.clone();
        let id = self.ops()?.set_timer(
            delay_ms,
            periodic,
            Box::new(move |id| {
                let callback = callback.clone();
                ctx.post_or_discard(Box::new(move || {
                    if !callback.invoke(Ok(ScriptValue::Number(id as f64))) {
                        tracing::warn!(timer = id, "timer fired into a spent callback; dropped");
                    }
                }));
            }),
        );
        Ok(id as f64)
    }

    /// `cancelTimer(id)`; `false` when the id is unknown or already fired.
    pub fn cancel_timer(&self, args: Vec<ScriptValue>) -> Result<bool> {
        CANCEL_TIMER.resolve(&args)?;
        let mut cur = ArgCursor::new(CANCEL_TIMER.operation, args);
        let id = cur.unsigned()?;
        Ok(self.ops()?.cancel_timer(id))
    }

    /// `runOnContext(handler)`: queue the handler on this runtime's
    /// context, never running it inline.
    pub fn run_on_context(&self, args: Vec<ScriptValue>) -> Result<()> {
        RUN_ON_CONTEXT.resolve(&args)?;
        let mut cur = ArgCursor::new(RUN_ON_CONTEXT.operation, args);
        let callback = cur.callback()?;
        self.ctx.post(Box::new(move || {
            callback.invoke(Ok(ScriptValue::Null));
        }))
    }

    /// `deployUnit(name[, options][, handler])`; success carries the
    /// deployment id.
    pub fn deploy_unit(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = DEPLOY_UNIT.resolve(&args)?;
        let mut cur = ArgCursor::new(DEPLOY_UNIT.operation, args);
        let call = match index {
            0 => DeployCall::Bare(cur.string()?, None),
            1 => DeployCall::Bare(cur.string()?, Some(cur.callback()?)),
            2 => {
                let name = cur.string()?;
                let options = options_from_script(DEPLOY_UNIT.operation, &cur.object()?)?;
                DeployCall::WithOptions(name, options, None)
            }
            _ => {
                let name = cur.string()?;
                let options = options_from_script(DEPLOY_UNIT.operation, &cur.object()?)?;
                DeployCall::WithOptions(name, options, Some(cur.callback()?))
            }
        };
        let (name, options, handler) = match call {
            DeployCall::Bare(name, handler) => (name, DeployOptions::default(), handler),
            DeployCall::WithOptions(name, options, handler) => (name, options, handler),
        };
        let translator = self.translator.clone();
        let done = handler.map(|cb| bridge(&self.ctx, cb, move |v| translator.to_script(v)));
        self.ops()?.deploy_unit(&name, options, done);
        Ok(self)
    }

    /// `undeploy(deploymentId[, handler])`
    pub fn undeploy(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = UNDEPLOY.resolve(&args)?;
        let mut cur = ArgCursor::new(UNDEPLOY.operation, args);
        let deployment_id = cur.string()?;
        let done = match index {
            0 => None,
            _ => Some(bridge_unit(&self.ctx, cur.callback()?)),
        };
        self.ops()?.undeploy_unit(&deployment_id, done);
        Ok(self)
    }

    /// `close([handler])`: shut the engine down.
    pub fn close(&self, args: Vec<ScriptValue>) -> Result<()> {
        let index = CLOSE.resolve(&args)?;
        let mut cur = ArgCursor::new(CLOSE.operation, args);
        let done = match index {
            0 => None,
            _ => Some(bridge_unit(&self.ctx, cur.callback()?)),
        };
        self.ops()?.close(done);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn capture() -> (Callback, Arc<Mutex<Vec<crate::value::Completion>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (Callback::once(move |o| sink.lock().push(o)), seen)
    }

    #[tokio::test]
    async fn test_facades_render_debug() {
        let rt = Runtime::local().unwrap();
        assert!(format!("{rt:?}").contains("Runtime"));
        assert!(format!("{:?}", rt.file_system().unwrap()).contains("FileSystem"));
        assert!(format!("{:?}", rt.event_bus().unwrap()).contains("EventBus"));
    }

    #[tokio::test]
    async fn test_singleton_accessors_return_same_proxy() {
        let rt = Runtime::local().unwrap();
        let a = rt.file_system().unwrap();
        let b = rt.file_system().unwrap();
        assert!(a.proxy().same_instance(b.proxy()));

        let bus = rt.event_bus().unwrap();
        assert!(!a.proxy().same_instance(bus.proxy()));
        assert!(bus.proxy().same_instance(rt.event_bus().unwrap().proxy()));
    }

    #[tokio::test]
    async fn test_deploy_then_undeploy() {
        let rt = Runtime::local().unwrap();
        let (cb, seen) = capture();
        rt.deploy_unit(vec![
            ScriptValue::String("worker.unit".into()),
            ScriptValue::Callback(cb),
        ])
        .unwrap();
        rt.context().flush().await.unwrap();

        let id = {
            let seen = seen.lock();
            assert_eq!(seen.len(), 1);
            seen[0].as_ref().unwrap().as_str().unwrap().to_string()
        };

        let (cb, seen) = capture();
        rt.undeploy(vec![ScriptValue::String(id), ScriptValue::Callback(cb)])
            .unwrap();
        rt.context().flush().await.unwrap();
        assert_eq!(seen.lock()[0], Ok(ScriptValue::Null));
    }

    #[tokio::test]
    async fn test_deploy_with_options_object() {
        let rt = Runtime::local().unwrap();
        let mut options = std::collections::HashMap::new();
        options.insert("instances".to_string(), ScriptValue::Number(2.0));
        let (cb, seen) = capture();
        rt.deploy_unit(vec![
            ScriptValue::String("worker.unit".into()),
            ScriptValue::Object(options),
            ScriptValue::Callback(cb),
        ])
        .unwrap();
        rt.context().flush().await.unwrap();
        assert!(seen.lock()[0].is_ok());
    }

    #[tokio::test]
    async fn test_undeploy_unknown_id_fails_through_callback() {
        let rt = Runtime::local().unwrap();
        let (cb, seen) = capture();
        rt.undeploy(vec![
            ScriptValue::String("no-such-id".into()),
            ScriptValue::Callback(cb),
        ])
        .unwrap();
        rt.context().flush().await.unwrap();
        assert!(seen.lock()[0].is_err());
    }

    #[tokio::test]
    async fn test_timer_fires_on_context_and_cancel_reports() {
        let rt = Runtime::local().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let ctx = rt.context().clone();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let id = rt
            .set_timer(vec![
                ScriptValue::Number(1.0),
                ScriptValue::Callback(Callback::once(move |outcome| {
                    if let Some(tx) = slot.lock().take() {
                        let _ = tx.send((outcome, ctx.is_current()));
                    }
                })),
            ])
            .unwrap();
        let (outcome, on_context) = rx.await.unwrap();
        assert_eq!(outcome, Ok(ScriptValue::Number(id)));
        assert!(on_context);

        // Already fired; cancellation reports false.
        assert!(!rt.cancel_timer(vec![ScriptValue::Number(id)]).unwrap());
    }

    #[tokio::test]
    async fn test_periodic_fires_repeatedly_until_cancelled() {
        let rt = Runtime::local().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = rt
            .set_periodic(vec![
                ScriptValue::Number(1.0),
                ScriptValue::Callback(Callback::repeating(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                })),
            ])
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        rt.context().flush().await.unwrap();
        assert!(count.load(Ordering::SeqCst) >= 2);
        assert!(rt.cancel_timer(vec![ScriptValue::Number(id)]).unwrap());
    }

    #[tokio::test]
    async fn test_negative_or_fractional_timer_numbers_rejected() {
        let rt = Runtime::local().unwrap();

        let (cb, _) = capture();
        let err = rt
            .set_timer(vec![ScriptValue::Number(-5.0), ScriptValue::Callback(cb)])
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments { .. }));

        let (cb, _) = capture();
        let err = rt
            .set_periodic(vec![ScriptValue::Number(1.5), ScriptValue::Callback(cb)])
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments { .. }));

        let err = rt.cancel_timer(vec![ScriptValue::Number(0.5)]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_periodic_into_once_callback_delivers_only_first_fire() {
        // A spent callback absorbs later fires without delivering again.
        let rt = Runtime::local().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = rt
            .set_periodic(vec![
                ScriptValue::Number(1.0),
                ScriptValue::Callback(Callback::once(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                })),
            ])
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        rt.context().flush().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(rt.cancel_timer(vec![ScriptValue::Number(id)]).unwrap());
    }

    #[tokio::test]
    async fn test_run_on_context_is_queued_not_inline() {
        let rt = Runtime::local().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        rt.run_on_context(vec![ScriptValue::Callback(Callback::once(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        }))])
        .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        rt.context().flush().await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wrong_arity_rejected_before_engine_runs() {
        let rt = Runtime::local().unwrap();
        let err = rt.deploy_unit(vec![]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments { .. }));
        // Name-first overloads reject a number where a string is required.
        let err = rt
            .deploy_unit(vec![ScriptValue::Number(1.0)])
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_create_socket_unsupported_by_local_engine() {
        let rt = Runtime::local().unwrap();
        let err = rt.create_datagram_socket(vec![]).unwrap_err();
        assert!(matches!(err, BridgeError::Native(_)));
    }

    #[tokio::test]
    async fn test_close_with_handler() {
        let rt = Runtime::local().unwrap();
        let (cb, seen) = capture();
        rt.close(vec![ScriptValue::Callback(cb)]).unwrap();
        rt.context().flush().await.unwrap();
        assert_eq!(seen.lock()[0], Ok(ScriptValue::Null));
    }
}
