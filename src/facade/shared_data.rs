//! Shared data facade: the accessor and the async maps it resolves.
//!
//! Map values cross the boundary through the translator in both
//! directions; an absent key is a *successful* lookup whose value is null,
//! never a failure.

use crate::bridge::{bridge, bridge_unit};
use crate::context::ContextHandle;
use crate::dispatch::{ArgCursor, OverloadTable};
use crate::engine::{MapOps, SharedDataOps};
use crate::error::Result;
use crate::handle::{HandleKind, Proxy};
use crate::signatures;
use crate::translate::Translator;
use crate::value::{Callback, ScriptValue};
use std::sync::Arc;

const GET_MAP: OverloadTable = OverloadTable::new("getMap", signatures![[Str, Handler]]);
const GET: OverloadTable = OverloadTable::new("get", signatures![[Any, Handler]]);
const PUT: OverloadTable =
    OverloadTable::new("put", signatures![[Any, Any, Handler], [Any, Any, Number, Handler]]);
const PUT_IF_ABSENT: OverloadTable = OverloadTable::new(
    "putIfAbsent",
    signatures![[Any, Any, Handler], [Any, Any, Number, Handler]],
);
const REMOVE: OverloadTable = OverloadTable::new("remove", signatures![[Any, Handler]]);
const SIZE: OverloadTable = OverloadTable::new("size", signatures![[Handler]]);
const CLEAR: OverloadTable = OverloadTable::new("clear", signatures![[Handler]]);

/// Facade over the engine's shared data accessor.
pub struct SharedData {
    proxy: Proxy,
    ctx: ContextHandle,
    translator: Translator,
}

impl std::fmt::Debug for SharedData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedData").field("proxy", &self.proxy).finish()
    }
}

impl SharedData {
    /// Build the facade over an existing shared data proxy.
    pub fn from_proxy(
        proxy: Proxy,
        ctx: ContextHandle,
        translator: Translator,
    ) -> Result<SharedData> {
        super::expect_kind(&proxy, HandleKind::SharedData)?;
        Ok(SharedData {
            proxy,
            ctx,
            translator,
        })
    }

    fn ops(&self) -> Result<&Arc<dyn SharedDataOps>> {
        self.proxy
            .ops::<Arc<dyn SharedDataOps>>(HandleKind::SharedData.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// `getMap(name, handler)`; success carries the wrapped map.
    pub fn get_map(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        GET_MAP.resolve(&args)?;
        let mut cur = ArgCursor::new(GET_MAP.operation, args);
        let name = cur.string()?;
        let translator = self.translator.clone();
        let done = bridge(&self.ctx, cur.callback()?, move |v| translator.to_script(v));
        self.ops()?.get_map(name, done);
        Ok(self)
    }
}

/// Facade over one named async map.
pub struct AsyncMap {
    proxy: Proxy,
    ctx: ContextHandle,
    translator: Translator,
}

impl std::fmt::Debug for AsyncMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncMap").field("proxy", &self.proxy).finish()
    }
}

impl AsyncMap {
    /// Build the facade over a map proxy delivered by
    /// [`SharedData::get_map`].
    pub fn from_proxy(proxy: Proxy, ctx: ContextHandle, translator: Translator) -> Result<AsyncMap> {
        super::expect_kind(&proxy, HandleKind::AsyncMap)?;
        Ok(AsyncMap {
            proxy,
            ctx,
            translator,
        })
    }

    fn ops(&self) -> Result<&Arc<dyn MapOps>> {
        self.proxy.ops::<Arc<dyn MapOps>>(HandleKind::AsyncMap.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    fn bridged(&self, callback: Callback) -> crate::engine::NativeCompletion {
        let translator = self.translator.clone();
        bridge(&self.ctx, callback, move |v| translator.to_script(v))
    }

    /// `get(key, handler)`; an absent key succeeds with null.
    pub fn get(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        GET.resolve(&args)?;
        let mut cur = ArgCursor::new(GET.operation, args);
        let key = self.translator.to_native(cur.value()?);
        let done = self.bridged(cur.callback()?);
        self.ops()?.get(key, done);
        Ok(self)
    }

    /// `put(key, value[, ttlMs], handler)`
    pub fn put(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = PUT.resolve(&args)?;
        let mut cur = ArgCursor::new(PUT.operation, args);
        let key = self.translator.to_native(cur.value()?);
        let value = self.translator.to_native(cur.value()?);
        let ttl_ms = if index == 1 { Some(cur.unsigned()?) } else { None };
        let done = self.bridged(cur.callback()?);
        self.ops()?.put(key, value, ttl_ms, done);
        Ok(self)
    }

    /// `putIfAbsent(key, value[, ttlMs], handler)`; success carries the
    /// prior value or null.
    pub fn put_if_absent(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = PUT_IF_ABSENT.resolve(&args)?;
        let mut cur = ArgCursor::new(PUT_IF_ABSENT.operation, args);
        let key = self.translator.to_native(cur.value()?);
        let value = self.translator.to_native(cur.value()?);
        let ttl_ms = if index == 1 { Some(cur.unsigned()?) } else { None };
        let done = self.bridged(cur.callback()?);
        self.ops()?.put_if_absent(key, value, ttl_ms, done);
        Ok(self)
    }

    /// `remove(key, handler)`; success carries the removed value or null.
    pub fn remove(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        REMOVE.resolve(&args)?;
        let mut cur = ArgCursor::new(REMOVE.operation, args);
        let key = self.translator.to_native(cur.value()?);
        let done = self.bridged(cur.callback()?);
        self.ops()?.remove(key, done);
        Ok(self)
    }

    /// `size(handler)`
    pub fn size(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        SIZE.resolve(&args)?;
        let mut cur = ArgCursor::new(SIZE.operation, args);
        let done = self.bridged(cur.callback()?);
        self.ops()?.size(done);
        Ok(self)
    }

    /// `clear(handler)`
    pub fn clear(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        CLEAR.resolve(&args)?;
        let mut cur = ArgCursor::new(CLEAR.operation, args);
        let done = bridge_unit(&self.ctx, cur.callback()?);
        self.ops()?.clear(done);
        Ok(self)
    }
}
