//! Script execution contexts.
//!
//! Every facade call is issued from a context, and every completion for that
//! call is delivered back on the same context — the engine may finish work
//! on any thread, but handlers always run serially on the context's own
//! queue. Ordinary callback forwarding does not give this guarantee, so the
//! bridge posts deliveries through [`ContextHandle::post`] explicitly.
//!
//! A context is realized as a dedicated tokio task draining an unbounded
//! queue of jobs. Posting never blocks; jobs run strictly after the posting
//! call has returned, which is what makes completion delivery "at least one
//! scheduler turn later" by construction.

use crate::error::{BridgeError, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static CURRENT_CONTEXT: u64;
}

/// Job queued onto a context
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// What a context is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// The primary non-blocking context; blocking facade variants are
    /// illegal here (misuse is a caller responsibility, not detected)
    EventLoop,
    /// A context permitted to block
    Worker,
}

struct ContextInner {
    id: u64,
    kind: ContextKind,
    queue: mpsc::UnboundedSender<Job>,
    closed: AtomicBool,
}

/// Handle to a script execution context.
///
/// Cheap to clone; all clones refer to the same queue.
#[derive(Clone)]
pub struct ContextHandle {
    inner: Arc<ContextInner>,
}

impl ContextHandle {
    /// Spawn a new context and its pump task on the current tokio runtime
    pub fn spawn(kind: ContextKind) -> ContextHandle {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(CURRENT_CONTEXT.scope(id, async move {
            while let Some(job) = rx.recv().await {
                job();
            }
            debug!(context = id, "context pump stopped");
        }));

        debug!(context = id, kind = ?kind, "spawned context");
        ContextHandle {
            inner: Arc::new(ContextInner {
                id,
                kind,
                queue: tx,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// The context's identifier
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether this context may run blocking operations
    pub fn kind(&self) -> ContextKind {
        self.inner.kind
    }

    /// Queue a job to run on this context.
    ///
    /// The job runs after all previously queued jobs, never inline with the
    /// caller. Fails once the context has been closed.
    pub fn post(&self, job: Job) -> Result<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(BridgeError::ContextClosed);
        }
        self.inner
            .queue
            .send(job)
            .map_err(|_| BridgeError::ContextClosed)
    }

    /// Whether the calling task is running on this context
    pub fn is_current(&self) -> bool {
        CURRENT_CONTEXT
            .try_with(|current| *current == self.inner.id)
            .unwrap_or(false)
    }

    /// Wait until every job queued before this call has run
    pub async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.post(Box::new(move || {
            let _ = tx.send(());
        }))?;
        rx.await.map_err(|_| BridgeError::ContextClosed)
    }

    /// Stop accepting jobs. Jobs already queued still run.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!(context = self.inner.id, "context closed");
        }
    }

    /// Post a job, logging instead of failing when the context is gone.
    ///
    /// Used on delivery paths where the issuing context may have shut down
    /// while a native operation was in flight; the completion is dropped.
    pub(crate) fn post_or_discard(&self, job: Job) {
        if self.post(job).is_err() {
            warn!(context = self.inner.id, "context closed; delivery dropped");
        }
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContextHandle({}, {:?})", self.inner.id, self.inner.kind)
    }
}
