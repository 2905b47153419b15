//! Event bus facade: send, publish, consumers and delivered messages.
//!
//! Message bodies cross through the translator both ways. Delivered
//! messages arrive as wrapped handles; [`Message::from_proxy`] builds the
//! typed face over one.

use crate::bridge::{bridge, bridge_unit};
use crate::context::ContextHandle;
use crate::dispatch::{ArgCursor, OverloadTable};
use crate::engine::{BusOps, ConsumerOps, MessageOps};
use crate::error::Result;
use crate::handle::{HandleKind, Proxy};
use crate::signatures;
use crate::translate::Translator;
use crate::value::ScriptValue;
use std::sync::Arc;

const SEND: OverloadTable =
    OverloadTable::new("send", signatures![[Str, Any], [Str, Any, Handler]]);
const PUBLISH: OverloadTable = OverloadTable::new("publish", signatures![[Str, Any]]);
const CONSUMER: OverloadTable = OverloadTable::new("consumer", signatures![[Str, Handler]]);
const UNREGISTER: OverloadTable =
    OverloadTable::new("unregister", signatures![[], [Handler]]);
const REPLY: OverloadTable = OverloadTable::new("reply", signatures![[Any]]);

/// Facade over the engine's event bus accessor.
pub struct EventBus {
    proxy: Proxy,
    ctx: ContextHandle,
    translator: Translator,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("proxy", &self.proxy).finish()
    }
}

impl EventBus {
    /// Build the facade over an existing event bus proxy.
    pub fn from_proxy(proxy: Proxy, ctx: ContextHandle, translator: Translator) -> Result<EventBus> {
        super::expect_kind(&proxy, HandleKind::EventBus)?;
        Ok(EventBus {
            proxy,
            ctx,
            translator,
        })
    }

    fn ops(&self) -> Result<&Arc<dyn BusOps>> {
        self.proxy.ops::<Arc<dyn BusOps>>(HandleKind::EventBus.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// `send(address, body[, replyHandler])`; the reply handler receives a
    /// wrapped reply message, or the failure branch when nothing consumes
    /// the address.
    pub fn send(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        let index = SEND.resolve(&args)?;
        let mut cur = ArgCursor::new(SEND.operation, args);
        let address = cur.string()?;
        let body = self.translator.to_native(cur.value()?);
        let reply = match index {
            0 => None,
            _ => {
                let translator = self.translator.clone();
                Some(bridge(&self.ctx, cur.callback()?, move |v| {
                    translator.to_script(v)
                }))
            }
        };
        self.ops()?.send(address, body, reply);
        Ok(self)
    }

    /// `publish(address, body)`: broadcast to every consumer.
    pub fn publish(&self, args: Vec<ScriptValue>) -> Result<&Self> {
        PUBLISH.resolve(&args)?;
        let mut cur = ArgCursor::new(PUBLISH.operation, args);
        let address = cur.string()?;
        let body = self.translator.to_native(cur.value()?);
        self.ops()?.publish(address, body);
        Ok(self)
    }

    /// `consumer(address, handler)`: register a consumer; the handler
    /// receives a wrapped message per delivery.
    pub fn consumer(&self, args: Vec<ScriptValue>) -> Result<Consumer> {
        CONSUMER.resolve(&args)?;
        let mut cur = ArgCursor::new(CONSUMER.operation, args);
        let address = cur.string()?;
        let callback = cur.callback()?;
        let ctx = self.ctx.clone();
        let translator = self.translator.clone();
        let handle = self.ops()?.consumer(
            address,
            Box::new(move |event| {
                let callback = callback.clone();
                let value = translator.to_script(event);
                ctx.post_or_discard(Box::new(move || {
                    callback.invoke(Ok(value));
                }));
            }),
        );
        Consumer::from_proxy(Proxy::wrap(handle), self.ctx.clone())
    }
}

/// Facade over a registered consumer.
pub struct Consumer {
    proxy: Proxy,
    ctx: ContextHandle,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer").field("proxy", &self.proxy).finish()
    }
}

impl Consumer {
    /// Build the facade over a consumer proxy.
    pub fn from_proxy(proxy: Proxy, ctx: ContextHandle) -> Result<Consumer> {
        super::expect_kind(&proxy, HandleKind::Consumer)?;
        Ok(Consumer { proxy, ctx })
    }

    fn ops(&self) -> Result<&Arc<dyn ConsumerOps>> {
        self.proxy
            .ops::<Arc<dyn ConsumerOps>>(HandleKind::Consumer.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// `unregister([handler])`
    pub fn unregister(&self, args: Vec<ScriptValue>) -> Result<()> {
        let index = UNREGISTER.resolve(&args)?;
        let mut cur = ArgCursor::new(UNREGISTER.operation, args);
        let done = match index {
            0 => None,
            _ => Some(bridge_unit(&self.ctx, cur.callback()?)),
        };
        self.ops()?.unregister(done);
        Ok(())
    }
}

/// Facade over one delivered message.
pub struct Message {
    proxy: Proxy,
    translator: Translator,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message").field("proxy", &self.proxy).finish()
    }
}

impl Message {
    /// Build the facade over a message proxy delivered to a consumer or a
    /// reply handler.
    pub fn from_proxy(proxy: Proxy, translator: Translator) -> Result<Message> {
        super::expect_kind(&proxy, HandleKind::Message)?;
        Ok(Message { proxy, translator })
    }

    fn ops(&self) -> Result<&Arc<dyn MessageOps>> {
        self.proxy
            .ops::<Arc<dyn MessageOps>>(HandleKind::Message.name())
    }

    /// The proxy this facade wraps
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// The message body, translated.
    pub fn body(&self) -> Result<ScriptValue> {
        Ok(self.translator.to_script(self.ops()?.body()))
    }

    /// The address the message was sent to.
    pub fn address(&self) -> Result<String> {
        Ok(self.ops()?.address())
    }

    /// `reply(body)`: answer a point-to-point message. A no-op for
    /// published messages and for messages already replied to.
    pub fn reply(&self, args: Vec<ScriptValue>) -> Result<()> {
        REPLY.resolve(&args)?;
        let mut cur = ArgCursor::new(REPLY.operation, args);
        let body = self.translator.to_native(cur.value()?);
        self.ops()?.reply(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::Runtime;
    use crate::value::Callback;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn capture() -> (Callback, Arc<Mutex<Vec<crate::value::Completion>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (Callback::repeating(move |o| sink.lock().push(o)), seen)
    }

    #[tokio::test]
    async fn test_send_delivers_wrapped_message() {
        let rt = Runtime::local().unwrap();
        let bus = rt.event_bus().unwrap();

        let (cb, seen) = capture();
        bus.consumer(vec![
            ScriptValue::String("orders".into()),
            ScriptValue::Callback(cb),
        ])
        .unwrap();
        bus.send(vec![
            ScriptValue::String("orders".into()),
            ScriptValue::Number(7.0),
        ])
        .unwrap();
        rt.context().flush().await.unwrap();

        let proxy = {
            let seen = seen.lock();
            assert_eq!(seen.len(), 1);
            seen[0].as_ref().unwrap().as_handle().unwrap().clone()
        };
        let message = Message::from_proxy(proxy, rt.translator().clone()).unwrap();
        assert_eq!(message.body().unwrap(), ScriptValue::Number(7.0));
        assert_eq!(message.address().unwrap(), "orders");
    }

    #[tokio::test]
    async fn test_reply_reaches_sender_once() {
        let rt = Runtime::local().unwrap();
        let bus = rt.event_bus().unwrap();
        let translator = rt.translator().clone();

        let echo = Callback::repeating(move |outcome| {
            if let Ok(value) = outcome {
                let proxy = value.as_handle().unwrap().clone();
                let message = Message::from_proxy(proxy, translator.clone()).unwrap();
                let body = message.body().unwrap();
                message.reply(vec![body.clone()]).unwrap();
                // Second reply on the same message is a no-op.
                message.reply(vec![body]).unwrap();
            }
        });
        bus.consumer(vec![
            ScriptValue::String("echo".into()),
            ScriptValue::Callback(echo),
        ])
        .unwrap();

        let (reply_cb, replies) = capture();
        bus.send(vec![
            ScriptValue::String("echo".into()),
            ScriptValue::String("ping".into()),
            ScriptValue::Callback(reply_cb),
        ])
        .unwrap();
        rt.context().flush().await.unwrap();
        rt.context().flush().await.unwrap();

        let replies = replies.lock();
        assert_eq!(replies.len(), 1);
        let proxy = replies[0].as_ref().unwrap().as_handle().unwrap().clone();
        let message = Message::from_proxy(proxy, rt.translator().clone()).unwrap();
        assert_eq!(message.body().unwrap(), ScriptValue::String("ping".into()));
    }

    #[tokio::test]
    async fn test_send_without_consumer_fails_reply_handler() {
        let rt = Runtime::local().unwrap();
        let bus = rt.event_bus().unwrap();
        let (cb, seen) = capture();
        bus.send(vec![
            ScriptValue::String("nowhere".into()),
            ScriptValue::Null,
            ScriptValue::Callback(cb),
        ])
        .unwrap();
        rt.context().flush().await.unwrap();
        assert!(seen.lock()[0].is_err());
    }

    #[tokio::test]
    async fn test_publish_reaches_every_consumer() {
        let rt = Runtime::local().unwrap();
        let bus = rt.event_bus().unwrap();
        let counts = [Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0))];

        for count in &counts {
            let c = count.clone();
            bus.consumer(vec![
                ScriptValue::String("news".into()),
                ScriptValue::Callback(Callback::repeating(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                })),
            ])
            .unwrap();
        }
        bus.publish(vec![ScriptValue::String("news".into()), ScriptValue::Null])
            .unwrap();
        rt.context().flush().await.unwrap();

        assert_eq!(counts[0].load(Ordering::SeqCst), 1);
        assert_eq!(counts[1].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unregistered_consumer_stops_receiving() {
        let rt = Runtime::local().unwrap();
        let bus = rt.event_bus().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let consumer = bus
            .consumer(vec![
                ScriptValue::String("addr".into()),
                ScriptValue::Callback(Callback::repeating(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                })),
            ])
            .unwrap();

        bus.publish(vec![ScriptValue::String("addr".into()), ScriptValue::Null])
            .unwrap();
        rt.context().flush().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        consumer.unregister(vec![]).unwrap();
        bus.publish(vec![ScriptValue::String("addr".into()), ScriptValue::Null])
            .unwrap();
        rt.context().flush().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_structured_body_round_trips() {
        let rt = Runtime::local().unwrap();
        let bus = rt.event_bus().unwrap();
        let (cb, seen) = capture();
        bus.consumer(vec![
            ScriptValue::String("records".into()),
            ScriptValue::Callback(cb),
        ])
        .unwrap();

        let mut body = std::collections::HashMap::new();
        body.insert("id".to_string(), ScriptValue::Number(1.0));
        body.insert("name".to_string(), ScriptValue::String("ada".into()));
        bus.send(vec![
            ScriptValue::String("records".into()),
            ScriptValue::Object(body),
        ])
        .unwrap();
        rt.context().flush().await.unwrap();

        let proxy = {
            let seen = seen.lock();
            seen[0].as_ref().unwrap().as_handle().unwrap().clone()
        };
        let message = Message::from_proxy(proxy, rt.translator().clone()).unwrap();
        let body = message.body().unwrap();
        let object = body.as_object().unwrap();
        assert_eq!(object.get("name"), Some(&ScriptValue::String("ada".into())));
        assert_eq!(object.get("id"), Some(&ScriptValue::Number(1.0)));
    }
}
