//! ---
//! sds_section: "02-emission-core"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Debounce gate coalescing bursts of triggers into one flush."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Latest not-yet-flushed snapshot and the single timer that will flush it.
struct PendingDispatch<T> {
    generation: u64,
    snapshot: T,
    handle: JoinHandle<()>,
}

struct GateInner<T> {
    generation: u64,
    pending: Option<PendingDispatch<T>>,
}

/// Coalesces rapid triggers: only the most recent snapshot is flushed, once
/// the gate has been quiet for `window`.
///
/// Every trigger replaces the pending snapshot wholesale and restarts the
/// timer. Must be used inside a tokio runtime.
pub struct DebounceGate<T> {
    window: Duration,
    flush: Arc<dyn Fn(T) + Send + Sync>,
    inner: Arc<Mutex<GateInner<T>>>,
}

impl<T> std::fmt::Debug for DebounceGate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceGate")
            .field("window", &self.window)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl<T: Send + 'static> DebounceGate<T> {
    pub fn new<F>(window: Duration, flush: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            window,
            flush: Arc::new(flush),
            inner: Arc::new(Mutex::new(GateInner {
                generation: 0,
                pending: None,
            })),
        }
    }

    /// Store `snapshot` and (re)arm the flush timer. Returns whether a
    /// pending snapshot was replaced.
    pub fn trigger(&self, snapshot: T) -> bool {
        let mut inner = self.inner.lock();
        let replaced = match inner.pending.take() {
            Some(previous) => {
                previous.handle.abort();
                true
            }
            None => false,
        };
        inner.generation += 1;
        let generation = inner.generation;
        let deadline = Instant::now() + self.window;
        let shared = Arc::clone(&self.inner);
        let flush = Arc::clone(&self.flush);
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            let snapshot = {
                let mut guard = shared.lock();
                if guard.pending.as_ref().map(|p| p.generation) != Some(generation) {
                    return;
                }
                guard.pending.take().map(|p| p.snapshot)
            };
            if let Some(snapshot) = snapshot {
                trace!(generation, "debounce window elapsed, flushing");
                flush(snapshot);
            }
        });
        inner.pending = Some(PendingDispatch {
            generation,
            snapshot,
            handle,
        });
        trace!(generation, replaced, "debounce gate armed");
        replaced
    }
}

impl<T> DebounceGate<T> {
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Drop the pending snapshot without flushing it.
    pub fn cancel(&self) -> bool {
        match self.inner.lock().pending.take() {
            Some(pending) => {
                pending.handle.abort();
                trace!(generation = pending.generation, "debounce gate cleared");
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().pending.is_some()
    }
}

impl<T: Clone> DebounceGate<T> {
    pub fn pending_snapshot(&self) -> Option<T> {
        self.inner.lock().pending.as_ref().map(|p| p.snapshot.clone())
    }
}

impl<T> Drop for DebounceGate<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.inner.lock().pending.take() {
            pending.handle.abort();
        }
    }
}
