//! TCP server facade.
//!
//! Accepted connections surface through two equivalent faces over the one
//! native source: [`NetServer::connect_handler`] installs a handler
//! directly, [`NetServer::connect_stream`] exposes the same installation
//! as a stream object. Either way the engine has zero or one subscriber;
//! installing through one face replaces whatever the other installed.

use crate::bridge::{bridge, bridge_unit};
use crate::context::ContextHandle;
use crate::dispatch::{ArgCursor, OverloadTable};
use crate::engine::NetServerOps;
use crate::error::Result;
use crate::handle::{HandleKind, Proxy};
use crate::signatures;
use crate::translate::Translator;
use crate::value::{Callback, ScriptValue};
use std::sync::Arc;

const LISTEN: OverloadTable = OverloadTable::new(
    "listen",
    signatures![
        [],
        [Handler],
        [Number],
        [Number, Handler],
        [Number, Str],
        [Number, Str, Handler],
    ],
);
const CONNECT_HANDLER: OverloadTable =
    OverloadTable::new("connectHandler", signatures![[Handler]]);
const CLOSE: OverloadTable = OverloadTable::new("close", signatures![[], [Handler]]);

/// Resolved form of a `listen` call: port and host fall back to creation
/// options when absent.
struct ListenCall {
    port: Option<u16>,
    host: Option<String>,
    handler: Option<Callback>,
}

/// Facade over a native TCP server.
pub struct NetServer {
    proxy: Proxy,
    ctx: ContextHandle,
    translator: Translator,
}

impl std::fmt::Debug for NetServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetServer").field("proxy", &self.proxy).finish()
    }
}

impl NetServer {
    /// Build the facade over an existing server proxy.
    pub fn from_proxy(proxy: Proxy, ctx: ContextHandle, translator: Translator) -> Result<NetServer> {
        super::expect_kind(&proxy, HandleKind::NetServer)?;
        Ok(NetServer {
            proxy,
            ctx,
            translator,
        })
    }

    fn ops(&self) -> Result<&Arc<dyn NetServerOps>> {
        self.proxy
            .ops::<Arc<dyn NetServerOps>>(HandleKind::NetServer.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// `listen([port[, host]][, handler])`
    pub fn listen(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = LISTEN.resolve(&args)?;
        let mut cur = ArgCursor::new(LISTEN.operation, args);
        let call = match index {
            0 => ListenCall {
                port: None,
                host: None,
                handler: None,
            },
            1 => ListenCall {
                port: None,
                host: None,
                handler: Some(cur.callback()?),
            },
            2 => ListenCall {
                port: Some(cur.port()?),
                host: None,
                handler: None,
            },
            3 => ListenCall {
                port: Some(cur.port()?),
                host: None,
                handler: Some(cur.callback()?),
            },
            4 => ListenCall {
                port: Some(cur.port()?),
                host: Some(cur.string()?),
                handler: None,
            },
            _ => ListenCall {
                port: Some(cur.port()?),
                host: Some(cur.string()?),
                handler: Some(cur.callback()?),
            },
        };

        let translator = self.translator.clone();
        let done = call
            .handler
            .map(|cb| bridge(&self.ctx, cb, move |v| translator.to_script(v)));
        self.ops()?.listen(call.port, call.host, done);
        Ok(self)
    }

    /// `connectHandler(handler)`: events carry wrapped accepted sockets.
    /// Installing replaces any previous subscriber.
    pub fn connect_handler(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        CONNECT_HANDLER.resolve(&args)?;
        let mut cur = ArgCursor::new(CONNECT_HANDLER.operation, args);
        self.install_connect(cur.callback()?)?;
        Ok(self)
    }

    /// The stream face of the connection source.
    pub fn connect_stream(&self) -> ConnectStream<'_> {
        ConnectStream { server: self }
    }

    fn install_connect(&self, callback: Callback) -> Result<()> {
        let ctx = self.ctx.clone();
        let translator = self.translator.clone();
        self.ops()?.subscribe_connections(Box::new(move |event| {
            let callback = callback.clone();
            let value = translator.to_script(event);
            ctx.post_or_discard(Box::new(move || {
                callback.invoke(Ok(value));
            }));
        }));
        Ok(())
    }

    /// The port actually bound; significant when 0 was requested.
    pub fn actual_port(&self) -> Result<f64> {
        Ok(self.ops()?.actual_port() as f64)
    }

    /// `close([handler])`
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

/// Stream view over a server's connection source.
///
/// `handler` installs into the same single subscriber slot as
/// [`NetServer::connect_handler`].
pub struct ConnectStream<'a> {
    server: &'a NetServer,
}

impl ConnectStream<'_> {
    /// `handler(handler)`: install the connection subscriber.
    pub fn handler(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        CONNECT_HANDLER.resolve(&args)?;
        let mut cur = ArgCursor::new(CONNECT_HANDLER.operation, args);
        self.server.install_connect(cur.callback()?)?;
        Ok(self)
    }
}
