//! File system facade.
//!
//! Each asynchronous operation has a `*_blocking` twin that runs on the
//! calling thread and returns its result directly. Blocking twins are only
//! legal from worker contexts; the facade does not police that.

use crate::bridge::{bridge, bridge_unit};
use crate::context::ContextHandle;
use crate::dispatch::{ArgCursor, OverloadTable};
use crate::engine::FileSystemOps;
use crate::error::Result;
use crate::handle::{HandleKind, Proxy};
use crate::signatures;
use crate::translate::Translator;
use crate::value::ScriptValue;
use std::sync::Arc;

const COPY: OverloadTable = OverloadTable::new("copy", signatures![[Str, Str, Handler]]);
const COPY_BLOCKING: OverloadTable = OverloadTable::new("copyBlocking", signatures![[Str, Str]]);
const DELETE: OverloadTable =
    OverloadTable::new("delete", signatures![[Str, Handler], [Str, Bool, Handler]]);
const DELETE_BLOCKING: OverloadTable =
    OverloadTable::new("deleteBlocking", signatures![[Str], [Str, Bool]]);
const MKDIR: OverloadTable =
    OverloadTable::new("mkdir", signatures![[Str, Handler], [Str, Str, Handler]]);
const MKDIR_BLOCKING: OverloadTable =
    OverloadTable::new("mkdirBlocking", signatures![[Str], [Str, Str]]);
const READ_FILE: OverloadTable = OverloadTable::new("readFile", signatures![[Str, Handler]]);
const READ_FILE_BLOCKING: OverloadTable =
    OverloadTable::new("readFileBlocking", signatures![[Str]]);
const WRITE_FILE: OverloadTable =
    OverloadTable::new("writeFile", signatures![[Str, Bytes, Handler]]);
const WRITE_FILE_BLOCKING: OverloadTable =
    OverloadTable::new("writeFileBlocking", signatures![[Str, Bytes]]);
const EXISTS: OverloadTable = OverloadTable::new("exists", signatures![[Str, Handler]]);
const EXISTS_BLOCKING: OverloadTable = OverloadTable::new("existsBlocking", signatures![[Str]]);

/// Facade over the engine's file system accessor.
pub struct FileSystem {
    proxy: Proxy,
    ctx: ContextHandle,
    translator: Translator,
}

impl std::fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystem").field("proxy", &self.proxy).finish()
    }
}

impl FileSystem {
    /// Build the facade over an existing file system proxy.
    pub fn from_proxy(
        proxy: Proxy,
        ctx: ContextHandle,
        translator: Translator,
    ) -> Result<FileSystem> {
        super::expect_kind(&proxy, HandleKind::FileSystem)?;
        Ok(FileSystem {
            proxy,
            ctx,
            translator,
        })
    }

    fn ops(&self) -> Result<&Arc<dyn FileSystemOps>> {
        self.proxy
            .ops::<Arc<dyn FileSystemOps>>(HandleKind::FileSystem.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// `copy(from, to, handler)`
    pub fn copy(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        COPY.resolve(&args)?;
        let mut cur = ArgCursor::new(COPY.operation, args);
        let from = cur.string()?;
        let to = cur.string()?;
        let done = bridge_unit(&self.ctx, cur.callback()?);
        self.ops()?.copy(from, to, done);
        Ok(self)
    }

    /// `copyBlocking(from, to)`
    pub fn copy_blocking(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        COPY_BLOCKING.resolve(&args)?;
        let mut cur = ArgCursor::new(COPY_BLOCKING.operation, args);
        let from = cur.string()?;
        let to = cur.string()?;
        self.ops()?.copy_blocking(&from, &to)?;
        Ok(self)
    }

    /// `delete(path[, recursive], handler)`
    pub fn delete(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = DELETE.resolve(&args)?;
        let mut cur = ArgCursor::new(DELETE.operation, args);
        let path = cur.string()?;
        let recursive = if index == 1 { cur.boolean()? } else { false };
        let done = bridge_unit(&self.ctx, cur.callback()?);
        self.ops()?.delete(path, recursive, done);
        Ok(self)
    }

    /// `deleteBlocking(path[, recursive])`
    pub fn delete_blocking(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = DELETE_BLOCKING.resolve(&args)?;
        let mut cur = ArgCursor::new(DELETE_BLOCKING.operation, args);
        let path = cur.string()?;
        let recursive = if index == 1 { cur.boolean()? } else { false };
        self.ops()?.delete_blocking(&path, recursive)?;
        Ok(self)
    }

    /// `mkdir(path[, perms], handler)`
    pub fn mkdir(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = MKDIR.resolve(&args)?;
        let mut cur = ArgCursor::new(MKDIR.operation, args);
        let path = cur.string()?;
        let perms = if index == 1 { Some(cur.string()?) } else { None };
        let done = bridge_unit(&self.ctx, cur.callback()?);
        self.ops()?.mkdir(path, perms, done);
        Ok(self)
    }

    /// `mkdirBlocking(path[, perms])`
    pub fn mkdir_blocking(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = MKDIR_BLOCKING.resolve(&args)?;
        let mut cur = ArgCursor::new(MKDIR_BLOCKING.operation, args);
        let path = cur.string()?;
        let perms = if index == 1 { Some(cur.string()?) } else { None };
        self.ops()?.mkdir_blocking(&path, perms.as_deref())?;
        Ok(self)
    }

    /// `readFile(path, handler)`; success carries the bytes.
    pub fn read_file(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        READ_FILE.resolve(&args)?;
        let mut cur = ArgCursor::new(READ_FILE.operation, args);
        let path = cur.string()?;
        let translator = self.translator.clone();
        let done = bridge(&self.ctx, cur.callback()?, move |v| translator.to_script(v));
        self.ops()?.read_file(path, done);
        Ok(self)
    }

    /// `readFileBlocking(path)`
    pub fn read_file_blocking(&self, args: Vec<ScriptValue>) -> Result<ScriptValue> {
        READ_FILE_BLOCKING.resolve(&args)?;
        let mut cur = ArgCursor::new(READ_FILE_BLOCKING.operation, args);
        let path = cur.string()?;
        let data = self.ops()?.read_file_blocking(&path)?;
        Ok(ScriptValue::Bytes(data))
    }

    /// `writeFile(path, data, handler)`
    pub fn write_file(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        WRITE_FILE.resolve(&args)?;
        let mut cur = ArgCursor::new(WRITE_FILE.operation, args);
        let path = cur.string()?;
        let data = cur.bytes()?;
        let done = bridge_unit(&self.ctx, cur.callback()?);
        self.ops()?.write_file(path, data, done);
        Ok(self)
    }

    /// `writeFileBlocking(path, data)`
    pub fn write_file_blocking(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        WRITE_FILE_BLOCKING.resolve(&args)?;
        let mut cur = ArgCursor::new(WRITE_FILE_BLOCKING.operation, args);
        let path = cur.string()?;
        let data = cur.bytes()?;
        self.ops()?.write_file_blocking(&path, &data)?;
        Ok(self)
    }

    /// `exists(path, handler)`; success carries a boolean.
    pub fn exists(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        EXISTS.resolve(&args)?;
        let mut cur = ArgCursor::new(EXISTS.operation, args);
        let path = cur.string()?;
        let translator = self.translator.clone();
        let done = bridge(&self.ctx, cur.callback()?, move |v| translator.to_script(v));
        self.ops()?.exists(path, done);
        Ok(self)
    }

    /// `existsBlocking(path)`
    pub fn exists_blocking(&self, args: Vec<ScriptValue>) -> Result<ScriptValue> {
        EXISTS_BLOCKING.resolve(&args)?;
        let mut cur = ArgCursor::new(EXISTS_BLOCKING.operation, args);
        let path = cur.string()?;
        Ok(ScriptValue::Bool(self.ops()?.exists_blocking(&path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::facade::Runtime;
    use crate::value::Callback;
    use parking_lot::Mutex;

    fn capture() -> (Callback, Arc<Mutex<Vec<crate::value::Completion>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (Callback::once(move |o| sink.lock().push(o)), seen)
    }

    fn s(v: &str) -> ScriptValue {
        ScriptValue::String(v.into())
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let rt = Runtime::local().unwrap();
        let fs = rt.file_system().unwrap();

        let (cb, seen) = capture();
        fs.write_file(vec![
            s("/data/greeting"),
            ScriptValue::Bytes(b"hello".to_vec()),
            ScriptValue::Callback(cb),
        ])
        .unwrap();
        rt.context().flush().await.unwrap();
        assert_eq!(seen.lock()[0], Ok(ScriptValue::Null));

        let (cb, seen) = capture();
        fs.read_file(vec![s("/data/greeting"), ScriptValue::Callback(cb)])
            .unwrap();
        rt.context().flush().await.unwrap();
        assert_eq!(seen.lock()[0], Ok(ScriptValue::Bytes(b"hello".to_vec())));
    }

    #[tokio::test]
    async fn test_read_missing_file_fails_through_callback() {
        let rt = Runtime::local().unwrap();
        let fs = rt.file_system().unwrap();
        let (cb, seen) = capture();
        fs.read_file(vec![s("/missing"), ScriptValue::Callback(cb)])
            .unwrap();
        rt.context().flush().await.unwrap();
        assert!(seen.lock()[0].is_err());
    }

    #[tokio::test]
    async fn test_blocking_variants_return_directly() {
        let rt = Runtime::local().unwrap();
        let fs = rt.file_system().unwrap();

        fs.write_file_blocking(vec![s("/a"), ScriptValue::Bytes(vec![1])])
            .unwrap();
        fs.copy_blocking(vec![s("/a"), s("/b")]).unwrap();
        assert_eq!(
            fs.read_file_blocking(vec![s("/b")]).unwrap(),
            ScriptValue::Bytes(vec![1])
        );
        assert_eq!(
            fs.exists_blocking(vec![s("/b")]).unwrap(),
            ScriptValue::Bool(true)
        );

        let err = fs.read_file_blocking(vec![s("/missing")]).unwrap_err();
        assert!(matches!(err, BridgeError::Native(_)));
    }

    #[tokio::test]
    async fn test_mkdir_and_recursive_delete() {
        let rt = Runtime::local().unwrap();
        let fs = rt.file_system().unwrap();

        fs.mkdir_blocking(vec![s("/dir")]).unwrap();
        fs.write_file_blocking(vec![s("/dir/a"), ScriptValue::Bytes(vec![0])])
            .unwrap();

        let (cb, seen) = capture();
        fs.delete(vec![s("/dir"), ScriptValue::Bool(true), ScriptValue::Callback(cb)])
            .unwrap();
        rt.context().flush().await.unwrap();
        assert_eq!(seen.lock()[0], Ok(ScriptValue::Null));
        assert_eq!(
            fs.exists_blocking(vec![s("/dir/a")]).unwrap(),
            ScriptValue::Bool(false)
        );
    }

    #[tokio::test]
    async fn test_exists_async_carries_boolean() {
        let rt = Runtime::local().unwrap();
        let fs = rt.file_system().unwrap();
        let (cb, seen) = capture();
        fs.exists(vec![s("/nope"), ScriptValue::Callback(cb)]).unwrap();
        rt.context().flush().await.unwrap();
        assert_eq!(seen.lock()[0], Ok(ScriptValue::Bool(false)));
    }

    #[tokio::test]
    async fn test_missing_handler_is_invalid() {
        let rt = Runtime::local().unwrap();
        let fs = rt.file_system().unwrap();
        let err = fs.copy(vec![s("/a"), s("/b")]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments { .. }));
    }
}
