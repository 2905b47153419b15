//! Datagram socket facade.
//!
//! `send` is the most overloaded operation on the surface: four call forms
//! over three payload kinds. Resolution happens once, against the table
//! below; the engine receives a [`DatagramPayload`] and never sees the
//! original argument shapes.

use crate::bridge::{bridge, bridge_unit};
use crate::context::ContextHandle;
use crate::dispatch::{ArgCursor, OverloadTable};
use crate::engine::{DatagramOps, DatagramPayload};
use crate::error::Result;
use crate::handle::{HandleKind, Proxy, ProxyCache, SingletonKind};
use crate::signatures;
use crate::translate::Translator;
use crate::value::{Callback, ScriptValue};
use std::sync::Arc;

const SEND: OverloadTable = OverloadTable::new(
    "send",
    signatures![
        [Bytes, Number, Str, Handler],
        [Wrapped, Number, Str, Handler],
        [Str, Number, Str, Handler],
        [Str, Str, Number, Str, Handler],
    ],
);
const LISTEN: OverloadTable = OverloadTable::new("listen", signatures![[Number, Str, Handler]]);
const PACKET_HANDLER: OverloadTable = OverloadTable::new("packetHandler", signatures![[Handler]]);
const EXCEPTION_HANDLER: OverloadTable =
    OverloadTable::new("exceptionHandler", signatures![[Handler]]);
const CLOSE: OverloadTable = OverloadTable::new("close", signatures![[], [Handler]]);

/// Resolved form of a `send` call
enum SendCall {
    /// `send(bytes, port, host, handler)`
    Bytes(Vec<u8>, u16, String, Callback),
    /// `send(buffer, port, host, handler)` with a wrapped engine buffer
    Buffer(Proxy, u16, String, Callback),
    /// `send(text[, encoding], port, host, handler)`
    Text(String, Option<String>, u16, String, Callback),
}

/// Facade over a native datagram socket.
pub struct DatagramSocket {
    proxy: Proxy,
    ctx: ContextHandle,
    translator: Translator,
    // Holds the localAddress proxy once minted.
    cache: ProxyCache,
}

impl std::fmt::Debug for DatagramSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramSocket").field("proxy", &self.proxy).finish()
    }
}

impl DatagramSocket {
    /// Build the facade over an existing socket proxy.
    pub fn from_proxy(
        proxy: Proxy,
        ctx: ContextHandle,
        translator: Translator,
    ) -> Result<DatagramSocket> {
        super::expect_kind(&proxy, HandleKind::DatagramSocket)?;
        Ok(DatagramSocket {
            proxy,
            ctx,
            translator,
            cache: ProxyCache::new(),
        })
    }

    fn ops(&self) -> Result<&Arc<dyn DatagramOps>> {
        self.proxy
            .ops::<Arc<dyn DatagramOps>>(HandleKind::DatagramSocket.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// `send(payload, [encoding,] port, host, handler)`.
    ///
    /// Success hands the handler a reference back to this socket, for
    /// chained sends.
    pub fn send(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = SEND.resolve(&args)?;
        let mut cur = ArgCursor::new(SEND.operation, args);
        let call = match index {
            0 => SendCall::Bytes(cur.bytes()?, cur.port()?, cur.string()?, cur.callback()?),
            1 => SendCall::Buffer(cur.handle()?, cur.port()?, cur.string()?, cur.callback()?),
            2 => SendCall::Text(cur.string()?, None, cur.port()?, cur.string()?, cur.callback()?),
            _ => {
                let text = cur.string()?;
                let encoding = cur.string()?;
                SendCall::Text(text, Some(encoding), cur.port()?, cur.string()?, cur.callback()?)
            }
        };

        let (payload, port, host, handler) = match call {
            SendCall::Bytes(data, port, host, handler) => {
                (DatagramPayload::Bytes(data), port, host, handler)
            }
            SendCall::Buffer(proxy, port, host, handler) => (
                DatagramPayload::Buffer(proxy.delegate().clone()),
                port,
                host,
                handler,
            ),
            SendCall::Text(text, encoding, port, host, handler) => {
                (DatagramPayload::Text { text, encoding }, port, host, handler)
            }
        };

        let translator = self.translator.clone();
        let done = bridge(&self.ctx, handler, move |v| translator.to_script(v));
        self.ops()?.send(payload, port, host, done);
        Ok(self)
    }

    /// `listen(port, host, handler)`
    pub fn listen(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        LISTEN.resolve(&args)?;
        let mut cur = ArgCursor::new(LISTEN.operation, args);
        let port = cur.port()?;
        let host = cur.string()?;
        let translator = self.translator.clone();
        let done = bridge(&self.ctx, cur.callback()?, move |v| translator.to_script(v));
        self.ops()?.listen(port, host, done);
        Ok(self)
    }

    /// The bound local address, or null before `listen`.
    ///
    /// The address proxy is minted once; repeated calls return the same
    /// instance.
    pub fn local_address(&self) -> Result<ScriptValue> {
        match self.ops()?.local_address() {
            Some(handle) => {
                let proxy = self
                    .cache
                    .get_or_wrap(SingletonKind::LocalAddress, || handle);
                Ok(ScriptValue::Handle(proxy))
            }
            None => Ok(ScriptValue::Null),
        }
    }

    /// `packetHandler(handler)`: install the packet subscriber. Installing
    /// replaces any previous subscriber.
    pub fn packet_handler(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        PACKET_HANDLER.resolve(&args)?;
        let mut cur = ArgCursor::new(PACKET_HANDLER.operation, args);
        let callback = cur.callback()?;
        let ctx = self.ctx.clone();
        let translator = self.translator.clone();
        self.ops()?.subscribe_packets(Box::new(move |event| {
            let callback = callback.clone();
            let value = translator.to_script(event);
            ctx.post_or_discard(Box::new(move || {
                callback.invoke(Ok(value));
            }));
        }));
        Ok(self)
    }

    /// `exceptionHandler(handler)`: the handler's completion takes the
    /// failure branch for every reported error.
    pub fn exception_handler(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        EXCEPTION_HANDLER.resolve(&args)?;
        let mut cur = ArgCursor::new(EXCEPTION_HANDLER.operation, args);
        let callback = cur.callback()?;
        let ctx = self.ctx.clone();
        self.ops()?.subscribe_exceptions(Box::new(move |event| {
            let callback = callback.clone();
            let error = super::event_error(event);
            ctx.post_or_discard(Box::new(move || {
                callback.invoke(Err(error));
            }));
        }));
        Ok(self)
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
