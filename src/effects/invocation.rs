//! One call of an effect: its callbacks, its reply channel and its busy
//! guard.
//!
//! A [`Ticket`] travels through the pipeline next to the parameter. It is
//! settled exactly once with the invocation's own result; if the pipeline
//! drops it instead (superseded by `Switch`, refused by `Exhaust`, or torn
//! down), its `Drop` impl tells the caller why and releases the busy flag.

use crate::core::lock;
use crate::lifecycle::Lifecycle;
use crate::registry::{EffectId, LoadingRegistry};
use futures::future::FusedFuture;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;

/// Why an invocation did not produce a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvokeError<E> {
    /// The trigger ran and failed.
    #[error("Effect failed: {0}")]
    Failed(E),

    /// The concurrency policy discarded the invocation before it settled.
    #[error("Invocation was dropped by the effect's concurrency policy")]
    Dropped,

    /// The store was destroyed before the invocation settled.
    #[error("Store was destroyed before the invocation settled")]
    Destroyed,

    /// `invoke` was called outside of a tokio runtime.
    #[error("No tokio runtime available to run the effect")]
    NoRuntime,
}

impl<E> InvokeError<E> {
    /// The trigger's error, if the invocation actually failed.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

pub type InvokeResult<T, E> = Result<T, InvokeError<E>>;

/// Run a user callback, logging a panic instead of unwinding into the
/// pipeline.
pub(crate) fn isolated(what: &str, token: u64, callback: impl FnOnce()) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(callback)) {
        tracing::error!(token, panic = panic_message(&*panic), "{} panicked", what);
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
}

type SuccessCallback<T> = Box<dyn FnOnce(T) + Send>;
type ErrorCallback<E> = Box<dyn FnOnce(E) + Send>;

/// Optional one-shot callbacks for a single invocation.
pub struct Callbacks<T, E> {
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback<E>>,
}

impl<T, E> Callbacks<T, E> {
    pub fn new() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }

    /// Called with the value if this invocation succeeds.
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Called with the error if this invocation fails.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(E) + Send + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl<T, E> Default for Callbacks<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts in-flight invocations of one effect and drives its loading entry.
///
/// The entry is busy from the first acquire until the last guard is
/// dropped, so overlapping `Merge` invocations keep it busy throughout.
pub(crate) struct BusyTracker {
    in_flight: Mutex<usize>,
    loading: Arc<LoadingRegistry>,
    id: EffectId,
    enabled: bool,
}

impl BusyTracker {
    pub(crate) fn new(loading: Arc<LoadingRegistry>, id: EffectId, enabled: bool) -> Self {
        Self {
            in_flight: Mutex::new(0),
            loading,
            id,
            enabled,
        }
    }

    pub(crate) fn acquire(self: &Arc<Self>) -> BusyGuard {
        let mut in_flight = lock(&self.in_flight);
        *in_flight += 1;
        if *in_flight == 1 && self.enabled {
            self.loading.start(self.id);
        }
        BusyGuard(Arc::clone(self))
    }

    pub(crate) fn in_flight(&self) -> usize {
        *lock(&self.in_flight)
    }

    fn release(&self) {
        let mut in_flight = lock(&self.in_flight);
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 && self.enabled {
            self.loading.stop(self.id);
        }
    }
}

pub(crate) struct BusyGuard(Arc<BusyTracker>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Per-invocation delivery slot.
pub(crate) struct Ticket<T, E> {
    token: u64,
    reply: Option<oneshot::Sender<InvokeResult<T, E>>>,
    callbacks: Callbacks<T, E>,
    busy: Option<BusyGuard>,
    lifecycle: Lifecycle,
}

impl<T: Clone, E: Clone> Ticket<T, E> {
    pub(crate) fn new(
        token: u64,
        callbacks: Callbacks<T, E>,
        busy: Option<BusyGuard>,
        lifecycle: Lifecycle,
    ) -> (Self, EffectHandle<T, E>) {
        let (tx, rx) = oneshot::channel();
        let ticket = Self {
            token,
            reply: Some(tx),
            callbacks,
            busy,
            lifecycle,
        };
        (
            ticket,
            EffectHandle {
                token,
                rx: Some(rx),
            },
        )
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }

    /// Mark the invocation idle ahead of settling it.
    pub(crate) fn release_busy(&mut self) {
        self.busy.take();
    }

    /// Deliver this invocation's own result to its listeners.
    pub(crate) fn settle(mut self, result: Result<T, E>) {
        // Idle before listeners run, so they observe the settled state.
        self.busy.take();

        let delivered = match result {
            Ok(value) => {
                if let Some(callback) = self.callbacks.on_success.take() {
                    let value = value.clone();
                    isolated("on_success callback", self.token, move || callback(value));
                }
                Ok(value)
            }
            Err(error) => {
                if let Some(callback) = self.callbacks.on_error.take() {
                    let error = error.clone();
                    isolated("on_error callback", self.token, move || callback(error));
                }
                Err(InvokeError::Failed(error))
            }
        };

        if let Some(reply) = self.reply.take() {
            // The caller may have dropped its handle; that is fine.
            let _ = reply.send(delivered);
        }
    }

    /// Resolve without running the trigger or any callback.
    pub(crate) fn reject(mut self, reason: InvokeError<E>) {
        self.busy.take();
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(Err(reason));
        }
    }
}

impl<T, E> Drop for Ticket<T, E> {
    fn drop(&mut self) {
        let Some(reply) = self.reply.take() else {
            return;
        };

        let (reason, label) = if self.lifecycle.is_destroyed() {
            (InvokeError::Destroyed, "destroyed")
        } else {
            (InvokeError::Dropped, "dropped")
        };
        tracing::debug!(token = self.token, reason = label, "invocation discarded");
        let _ = reply.send(Err(reason));
    }
}

/// Caller-side handle of one invocation. Resolves exactly once.
///
/// Awaiting it is optional: the invocation runs whether or not the handle
/// is polled or kept.
///
/// A call that `Switch` supersedes or `Exhaust` refuses never runs its
/// callbacks, but its handle still resolves, with [`InvokeError::Dropped`],
/// so awaiting a handle always terminates.
///
/// Once the result has been taken, by `try_result` or by awaiting, the
/// handle is terminated: `try_result` returns `None` and polling again
/// stays pending.
pub struct EffectHandle<T, E> {
    token: u64,
    rx: Option<oneshot::Receiver<InvokeResult<T, E>>>,
}

impl<T, E> EffectHandle<T, E> {
    /// Correlation token of the invocation behind this handle.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Result if the invocation already settled, without waiting.
    ///
    /// Returns `None` while pending and after the result was taken.
    pub fn try_result(&mut self) -> Option<InvokeResult<T, E>> {
        let result = match self.rx.as_mut()?.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => Err(InvokeError::Dropped),
        };
        self.rx = None;
        Some(result)
    }
}

impl<T, E> Future for EffectHandle<T, E> {
    type Output = InvokeResult<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Pending;
        };
        let result = match Pin::new(rx).poll(cx) {
            Poll::Ready(received) => received.unwrap_or(Err(InvokeError::Dropped)),
            Poll::Pending => return Poll::Pending,
        };
        this.rx = None;
        Poll::Ready(result)
    }
}

impl<T, E> FusedFuture for EffectHandle<T, E> {
    fn is_terminated(&self) -> bool {
        self.rx.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tracker(enabled: bool) -> (Arc<LoadingRegistry>, EffectId, Arc<BusyTracker>) {
        let loading = Arc::new(LoadingRegistry::new());
        let id = loading.register();
        let tracker = Arc::new(BusyTracker::new(Arc::clone(&loading), id, enabled));
        (loading, id, tracker)
    }

    #[test]
    fn busy_until_last_guard_drops() {
        let (loading, id, tracker) = tracker(true);

        let first = tracker.acquire();
        let second = tracker.acquire();
        assert_eq!(loading.is_busy(id), Some(true));
        assert_eq!(tracker.in_flight(), 2);

        drop(first);
        assert_eq!(loading.is_busy(id), Some(true));
        drop(second);
        assert_eq!(loading.is_busy(id), Some(false));
    }

    #[test]
    fn disabled_tracker_leaves_loading_alone() {
        let (loading, id, tracker) = tracker(false);

        let guard = tracker.acquire();
        assert_eq!(loading.is_busy(id), Some(false));
        assert_eq!(tracker.in_flight(), 1);
        drop(guard);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn settle_runs_matching_callback_once() {
        let successes = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&successes);
        let f = Arc::clone(&failures);
        let callbacks = Callbacks::new()
            .on_success(move |value: u32| {
                assert_eq!(value, 7);
                s.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |_: String| {
                f.fetch_add(1, Ordering::SeqCst);
            });

        let (ticket, mut handle) = Ticket::new(1, callbacks, None, Lifecycle::new());
        assert!(handle.try_result().is_none());
        ticket.settle(Ok(7));

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(failures.load(Ordering::SeqCst), 0);
        assert_eq!(handle.try_result(), Some(Ok(7)));
    }

    #[test]
    fn settle_with_error_reports_failure() {
        let (ticket, mut handle) =
            Ticket::<u32, String>::new(2, Callbacks::new(), None, Lifecycle::new());
        ticket.settle(Err("boom".to_string()));

        assert_eq!(
            handle.try_result(),
            Some(Err(InvokeError::Failed("boom".to_string())))
        );
    }

    #[test]
    fn dropped_ticket_resolves_as_dropped_without_callbacks() {
        let called = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&called);
        let callbacks = Callbacks::new().on_success(move |_: u32| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let (_loading, _, tracker) = tracker(true);

        let (ticket, mut handle) =
            Ticket::<u32, String>::new(3, callbacks, Some(tracker.acquire()), Lifecycle::new());
        drop(ticket);

        assert_eq!(handle.try_result(), Some(Err(InvokeError::Dropped)));
        assert_eq!(called.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn dropped_ticket_after_destroy_resolves_as_destroyed() {
        let lifecycle = Lifecycle::new();
        let (ticket, mut handle) =
            Ticket::<u32, String>::new(4, Callbacks::new(), None, lifecycle.clone());

        lifecycle.destroy();
        drop(ticket);

        assert_eq!(handle.try_result(), Some(Err(InvokeError::Destroyed)));
    }

    #[test]
    fn reject_skips_callbacks_and_releases_busy() {
        let called = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&called);
        let callbacks = Callbacks::new().on_error(move |_: String| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let (_loading, _, tracker) = tracker(true);

        let (ticket, mut handle) =
            Ticket::<u32, String>::new(6, callbacks, Some(tracker.acquire()), Lifecycle::new());
        ticket.reject(InvokeError::NoRuntime);

        assert_eq!(handle.try_result(), Some(Err(InvokeError::NoRuntime)));
        assert_eq!(called.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn handle_gives_up_its_result_once() {
        let (ticket, mut handle) =
            Ticket::<u32, String>::new(7, Callbacks::new(), None, Lifecycle::new());
        ticket.settle(Ok(7));

        assert!(!handle.is_terminated());
        assert_eq!(handle.try_result(), Some(Ok(7)));
        assert_eq!(handle.try_result(), None);
        assert!(handle.is_terminated());
        assert_eq!((&mut handle).now_or_never(), None);
    }

    #[tokio::test]
    async fn awaited_handle_is_terminated() {
        let (ticket, mut handle) =
            Ticket::<u32, String>::new(8, Callbacks::new(), None, Lifecycle::new());
        ticket.settle(Err("late".to_string()));

        assert_eq!(
            (&mut handle).await,
            Err(InvokeError::Failed("late".to_string()))
        );
        assert!(handle.is_terminated());
        assert_eq!(handle.try_result(), None);
    }

    #[test]
    fn panicking_callback_still_resolves_handle() {
        let (_loading, _, tracker) = tracker(true);
        let callbacks = Callbacks::new().on_success(|_: u32| panic!("listener blew up"));

        let (ticket, mut handle) =
            Ticket::<u32, String>::new(9, callbacks, Some(tracker.acquire()), Lifecycle::new());
        ticket.settle(Ok(3));

        assert_eq!(handle.try_result(), Some(Ok(3)));
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn panic_message_reads_common_payloads() {
        let literal = panic::catch_unwind(|| panic!("static")).unwrap_err();
        let formatted = panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();

        assert_eq!(panic_message(&*literal), "static");
        assert_eq!(panic_message(&*formatted), "code 7");
    }

    #[tokio::test]
    async fn handle_resolves_as_future() {
        let (ticket, handle) =
            Ticket::<&str, String>::new(5, Callbacks::new(), None, Lifecycle::new());
        assert_eq!(handle.token(), 5);
        assert_eq!(ticket.token(), 5);

        ticket.settle(Ok("done"));
        assert_eq!(handle.await, Ok("done"));
    }

    #[test]
    fn into_failure_extracts_only_trigger_errors() {
        assert_eq!(InvokeError::Failed(3).into_failure(), Some(3));
        assert_eq!(InvokeError::<i32>::Dropped.into_failure(), None);
    }
}
