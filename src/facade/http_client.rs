//! HTTP client facade.
//!
//! `request` returns the wrapped in-flight request synchronously; the
//! response arrives later through the handler, after `end`. The two are
//! independent by construction: the request proxy exists before the engine
//! can possibly have completed anything.

use crate::bridge::bridge;
use crate::context::ContextHandle;
use crate::dispatch::{ArgCursor, OverloadTable};
use crate::engine::{HttpMethod, HttpOps, HttpRequestOps, HttpResponseOps};
use crate::error::{BridgeError, Result};
use crate::handle::{HandleKind, Proxy};
use crate::signatures;
use crate::translate::Translator;
use crate::value::ScriptValue;
use std::sync::Arc;

const REQUEST: OverloadTable = OverloadTable::new(
    "request",
    signatures![
        [Str, Number, Str, Str],
        [Str, Number, Str, Str, Handler],
    ],
);
const GET_NOW: OverloadTable =
    OverloadTable::new("getNow", signatures![[Number, Str, Str, Handler]]);
const WRITE: OverloadTable = OverloadTable::new("write", signatures![[Bytes], [Str]]);
const END: OverloadTable = OverloadTable::new("end", signatures![[], [Bytes], [Str]]);
const BODY_HANDLER: OverloadTable = OverloadTable::new("bodyHandler", signatures![[Handler]]);

/// Facade over a native HTTP client.
pub struct HttpClient {
    proxy: Proxy,
    ctx: ContextHandle,
    translator: Translator,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").field("proxy", &self.proxy).finish()
    }
}

impl HttpClient {
    /// Build the facade over an existing client proxy.
    pub fn from_proxy(
        proxy: Proxy,
        ctx: ContextHandle,
        translator: Translator,
    ) -> Result<HttpClient> {
        super::expect_kind(&proxy, HandleKind::HttpClient)?;
        Ok(HttpClient {
            proxy,
            ctx,
            translator,
        })
    }

    fn ops(&self) -> Result<&Arc<dyn HttpOps>> {
        self.proxy
            .ops::<Arc<dyn HttpOps>>(HandleKind::HttpClient.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// `request(method, port, host, uri[, responseHandler])`: open a
    /// request and return its wrapped facade immediately.
    pub fn request(&self, args: Vec<ScriptValue>) -> Result<HttpRequest> {
        let index = REQUEST.resolve(&args)?;
        let mut cur = ArgCursor::new(REQUEST.operation, args);
        let method_name = cur.string()?;
        let method: HttpMethod =
            method_name
                .parse()
                .map_err(|_| BridgeError::InvalidArguments {
                    operation: REQUEST.operation,
                    shapes: format!("unknown method `{method_name}`"),
                })?;
        let port = cur.port()?;
        let host = cur.string()?;
        let uri = cur.string()?;
        let on_response = match index {
            0 => None,
            _ => {
                let translator = self.translator.clone();
                Some(bridge(&self.ctx, cur.callback()?, move |v| {
                    translator.to_script(v)
                }))
            }
        };
        let handle = self.ops()?.request(method, port, host, uri, on_response);
        HttpRequest::from_proxy(Proxy::wrap(handle))
    }

    /// `getNow(port, host, uri, responseHandler)`: open a GET and finish
    /// it in one step.
    pub fn get_now(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        GET_NOW.resolve(&args)?;
        let mut cur = ArgCursor::new(GET_NOW.operation, args);
        let port = cur.port()?;
        let host = cur.string()?;
        let uri = cur.string()?;
        let translator = self.translator.clone();
        let on_response = bridge(&self.ctx, cur.callback()?, move |v| translator.to_script(v));
        let handle = self
            .ops()?
            .request(HttpMethod::Get, port, host, uri, Some(on_response));
        let request = HttpRequest::from_proxy(Proxy::wrap(handle))?;
        request.end(vec![])?;
        Ok(self)
    }

    /// Close the client.
    pub fn close(&self) -> Result<()> {
        self.ops()?.close();
        Ok(())
    }
}

/// Facade over an in-flight HTTP request.
///
/// Carries no context of its own: `write` and `end` are synchronous, and
/// the response completion was bound to the client's context at `request`
/// time.
pub struct HttpRequest {
    proxy: Proxy,
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest").field("proxy", &self.proxy).finish()
    }
}

impl HttpRequest {
    /// Build the facade over a request proxy.
    pub fn from_proxy(proxy: Proxy) -> Result<HttpRequest> {
        super::expect_kind(&proxy, HandleKind::HttpRequest)?;
        Ok(HttpRequest { proxy })
    }

    fn ops(&self) -> Result<&Arc<dyn HttpRequestOps>> {
        self.proxy
            .ops::<Arc<dyn HttpRequestOps>>(HandleKind::HttpRequest.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// `write(data)`: append body data; text is sent as UTF-8.
    pub fn write(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = WRITE.resolve(&args)?;
        let mut cur = ArgCursor::new(WRITE.operation, args);
        let data = match index {
            0 => cur.bytes()?,
            _ => cur.string()?.into_bytes(),
        };
        self.ops()?.write(data);
        Ok(self)
    }

    /// `end([data])`: finish the request; the response handler fires after
    /// this.
    pub fn end(&self, args: Vec<ScriptValue>) -> Result<()> {
        let index = END.resolve(&args)?;
        let mut cur = ArgCursor::new(END.operation, args);
        let data = match index {
            0 => None,
            1 => Some(cur.bytes()?),
            _ => Some(cur.string()?.into_bytes()),
        };
        self.ops()?.end(data);
        Ok(())
    }
}

/// Facade over a received HTTP response.
pub struct HttpResponse {
    proxy: Proxy,
    ctx: ContextHandle,
    translator: Translator,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse").field("proxy", &self.proxy).finish()
    }
}

impl HttpResponse {
    /// Build the facade over a response proxy delivered to a response
    /// handler.
    pub fn from_proxy(
        proxy: Proxy,
        ctx: ContextHandle,
        translator: Translator,
    ) -> Result<HttpResponse> {
        super::expect_kind(&proxy, HandleKind::HttpResponse)?;
        Ok(HttpResponse {
            proxy,
            ctx,
            translator,
        })
    }

    fn ops(&self) -> Result<&Arc<dyn HttpResponseOps>> {
        self.proxy
            .ops::<Arc<dyn HttpResponseOps>>(HandleKind::HttpResponse.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// The response status code.
    pub fn status_code(&self) -> Result<f64> {
        Ok(self.ops()?.status_code() as f64)
    }

    /// `bodyHandler(handler)`: deliver the full body; success carries the
    /// bytes.
    pub fn body_handler(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        BODY_HANDLER.resolve(&args)?;
        let mut cur = ArgCursor::new(BODY_HANDLER.operation, args);
        let translator = self.translator.clone();
        let done = bridge(&self.ctx, cur.callback()?, move |v| translator.to_script(v));
        self.ops()?.body(done);
        Ok(self)
    }
}
