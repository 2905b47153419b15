//! Bridging native completions into script callbacks.
//!
//! The engine notifies every asynchronous operation exactly once, with a
//! success-or-failure [`CompletionResult`], on whatever thread it likes.
//! [`bridge`] adapts that into the caller's convention: the script callback
//! receives `Ok(translated)` or `Err(native_error)` — exactly once, on the
//! context the call was issued from, and never inline with the issuing call.
//!
//! Failure objects cross untranslated; whatever diagnostics the engine
//! attached reach the caller as-is.
//!
//! Operations that return a chaining handle do so synchronously from the
//! facade, before the engine can possibly deliver: the completion is queued
//! behind the issuing call by construction.

use crate::context::ContextHandle;
use crate::engine::{CompletionResult, NativeCompletion, NativeValue};
use crate::value::{Callback, Completion, ScriptValue};
use tokio::sync::oneshot;
use tracing::warn;

/// Build the engine-side completion for an asynchronous call.
///
/// `translate` converts the success payload; it runs on the issuing
/// context, not on the engine's thread. A spent callback (one that already
/// fired for this operation) drops the outcome with a warning rather than
/// delivering twice.
pub fn bridge<F>(ctx: &ContextHandle, callback: Callback, translate: F) -> NativeCompletion
where
    F: FnOnce(NativeValue) -> ScriptValue + Send + 'static,
{
    let ctx = ctx.clone();
    Box::new(move |outcome: CompletionResult<NativeValue>| {
        ctx.post_or_discard(Box::new(move || {
            let delivered = match outcome {
                CompletionResult::Success(value) => callback.invoke(Ok(translate(value))),
                CompletionResult::Failure(error) => callback.invoke(Err(error)),
            };
            if !delivered {
                warn!("completion arrived for a spent callback; dropped");
            }
        }));
    })
}

/// Like [`bridge`], for operations whose completion carries no payload the
/// caller cares about: success always delivers `Ok(Null)`.
pub fn bridge_unit(ctx: &ContextHandle, callback: Callback) -> NativeCompletion {
    bridge(ctx, callback, |_| ScriptValue::Null)
}

/// Channel-style variant for callers that prefer to await.
///
/// The returned receiver resolves with the translated outcome; dropping it
/// cancels nothing, the native operation still runs to completion.
pub fn bridge_channel<F>(translate: F) -> (NativeCompletion, oneshot::Receiver<Completion>)
where
    F: FnOnce(NativeValue) -> ScriptValue + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let completion: NativeCompletion = Box::new(move |outcome: CompletionResult<NativeValue>| {
        let delivered = match outcome {
            CompletionResult::Success(value) => tx.send(Ok(translate(value))),
            CompletionResult::Failure(error) => tx.send(Err(error)),
        };
        if delivered.is_err() {
            warn!("completion receiver dropped before delivery");
        }
    });
    (completion, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextKind;
    use crate::error::NativeError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_success_delivers_translated_once() {
        let ctx = ContextHandle::spawn(ContextKind::EventLoop);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let done = bridge(
            &ctx,
            Callback::once(move |outcome| sink.lock().push(outcome)),
            |v| match v {
                NativeValue::Int(n) => ScriptValue::Number(n as f64 * 10.0),
                _ => ScriptValue::Null,
            },
        );

        done(CompletionResult::Success(NativeValue::Int(4)));
        ctx.flush().await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], Ok(ScriptValue::Number(40.0)));
    }

    #[tokio::test]
    async fn test_failure_passes_error_through_untranslated() {
        let ctx = ContextHandle::spawn(ContextKind::EventLoop);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let done = bridge_unit(&ctx, Callback::once(move |outcome| sink.lock().push(outcome)));

        let original =
            NativeError::failed("socket reset").with_details(serde_json::json!({ "errno": 104 }));
        done(CompletionResult::Failure(original.clone()));
        ctx.flush().await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let err = seen[0].as_ref().unwrap_err();
        assert_eq!(err.message, original.message);
        assert_eq!(err.details, original.details);
    }

    #[tokio::test]
    async fn test_success_with_null_is_not_a_failure() {
        // Successful "not found": Ok(Null), strictly distinct from Err.
        let ctx = ContextHandle::spawn(ContextKind::EventLoop);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let done = bridge(
            &ctx,
            Callback::once(move |outcome| sink.lock().push(outcome)),
            |_| ScriptValue::Null,
        );
        done(CompletionResult::Success(NativeValue::Null));
        ctx.flush().await.unwrap();

        assert_eq!(*seen.lock(), vec![Ok(ScriptValue::Null)]);
    }

    #[tokio::test]
    async fn test_delivery_is_never_inline() {
        let ctx = ContextHandle::spawn(ContextKind::EventLoop);
        let fired = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        let done = bridge_unit(
            &ctx,
            Callback::once(move |_| flag.store(true, Ordering::SeqCst)),
        );

        done(CompletionResult::Success(NativeValue::Null));
        // The engine-side call returned; the handler has not run yet.
        assert!(!fired.load(Ordering::SeqCst));

        ctx.flush().await.unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_delivery_runs_on_issuing_context() {
        let ctx = ContextHandle::spawn(ContextKind::EventLoop);
        let (tx, rx) = oneshot::channel();

        let probe = ctx.clone();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let done = bridge_unit(
            &ctx,
            Callback::once(move |_| {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(probe.is_current());
                }
            }),
        );

        // Complete from a foreign thread, the way an engine would.
        std::thread::spawn(move || {
            done(CompletionResult::Success(NativeValue::Null));
        });

        assert!(rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_spent_callback_drops_second_operation_outcome() {
        // One callback mistakenly registered for two operations: the second
        // completion is dropped, not delivered twice.
        let ctx = ContextHandle::spawn(ContextKind::EventLoop);
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let callback = Callback::once(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let first = bridge_unit(&ctx, callback.clone());
        let second = bridge_unit(&ctx, callback);
        first(CompletionResult::Success(NativeValue::Null));
        second(CompletionResult::Success(NativeValue::Null));
        ctx.flush().await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_channel_variant() {
        let (done, rx) = bridge_channel(|v| match v {
            NativeValue::String(s) => ScriptValue::String(s),
            _ => ScriptValue::Null,
        });
        done(CompletionResult::Success(NativeValue::String("ok".into())));
        assert_eq!(rx.await.unwrap(), Ok(ScriptValue::String("ok".into())));
    }
}
