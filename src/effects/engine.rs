//! Binding triggers to long-lived pipelines.
//!
//! Every bound effect owns one spawned task. The task reads invocations from
//! an unbounded channel, runs the trigger under the effect's
//! [`ConcurrencyPolicy`] and settles each result: busy flag, error slot,
//! hooks, multicast streams, then the invocation's own ticket. A panic in a
//! trigger or a listener is contained to the invocation that raised it.

use super::invocation::{
    isolated, panic_message, BusyTracker, Callbacks, EffectHandle, InvokeError, Ticket,
};
use super::policy::ConcurrencyPolicy;
use crate::core::{lock, Notifications, Subject};
use crate::lifecycle::{Lifecycle, Teardown};
use crate::registry::{EffectId, ErrorRegistry, LoadingRegistry, SharedError};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Type-erased async transformation run by an effect.
pub type Trigger<P, T, E> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

pub(crate) type Hook<P, X> = Arc<dyn Fn(&P, &X) + Send + Sync>;

/// Per-effect listeners called for every settled invocation.
pub(crate) struct Hooks<P, T, E> {
    pub(crate) on_success: Option<Hook<P, T>>,
    pub(crate) on_error: Option<Hook<P, E>>,
}

impl<P, T, E> Default for Hooks<P, T, E> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

struct Invocation<P, T, E> {
    param: P,
    ticket: Ticket<T, E>,
}

struct Pipeline<P, T, E> {
    tx: mpsc::UnboundedSender<Invocation<P, T, E>>,
    task: JoinHandle<()>,
}

/// Everything the pipeline task needs once a result is in.
struct Settler<P, T, E> {
    name: String,
    index: usize,
    errors: Arc<ErrorRegistry>,
    successes: Subject<T>,
    failures: Subject<E>,
    hooks: Hooks<P, T, E>,
}

impl<P, T, E> Settler<P, T, E>
where
    P: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Error + Clone + Send + Sync + 'static,
{
    fn settle(&self, param: P, mut ticket: Ticket<T, E>, result: Result<T, E>) {
        let token = ticket.token();
        ticket.release_busy();
        match &result {
            Ok(value) => {
                tracing::debug!(effect = %self.name, token, "effect succeeded");
                self.errors.clear(self.index);
                if let Some(hook) = &self.hooks.on_success {
                    isolated("on_success hook", token, || hook(&param, value));
                }
                self.successes.next(value.clone());
            }
            Err(error) => {
                tracing::warn!(effect = %self.name, token, %error, "effect failed");
                let shared: SharedError = Arc::new(error.clone());
                self.errors.set(self.index, Some(shared));
                if let Some(hook) = &self.hooks.on_error {
                    isolated("on_error hook", token, || hook(&param, error));
                }
                self.failures.next(error.clone());
            }
        }
        ticket.settle(result);
    }
}

struct Inner<P, T, E> {
    id: EffectId,
    policy: ConcurrencyPolicy,
    trigger: Trigger<P, T, E>,
    settler: Arc<Settler<P, T, E>>,
    busy: Arc<BusyTracker>,
    pipeline: Mutex<Option<Pipeline<P, T, E>>>,
    next_token: AtomicU64,
    lifecycle: Lifecycle,
}

impl<P, T, E> Inner<P, T, E>
where
    P: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Error + Clone + Send + Sync + 'static,
{
    fn spawn(&self, runtime: &Handle) -> Pipeline<P, T, E> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Invocation<P, T, E>>();
        let invocations = stream::poll_fn(move |cx| rx.poll_recv(cx));

        let trigger = Arc::clone(&self.trigger);
        let mut settled = self
            .policy
            .flatten(invocations, move |Invocation { param, ticket }| {
                let trigger = Arc::clone(&trigger);
                let input = param.clone();
                async move {
                    let run = AssertUnwindSafe(async move { trigger(input).await })
                        .catch_unwind()
                        .await;
                    (param, ticket, run)
                }
            });

        let settler = Arc::clone(&self.settler);
        let task = runtime.spawn(async move {
            while let Some((param, ticket, run)) = settled.next().await {
                match run {
                    Ok(result) => settler.settle(param, ticket, result),
                    Err(panic) => {
                        // Dropping the ticket resolves the call as dropped.
                        tracing::error!(
                            effect = %settler.name,
                            token = ticket.token(),
                            panic = panic_message(&*panic),
                            "trigger panicked"
                        );
                    }
                }
            }
            tracing::trace!(effect = %settler.name, "pipeline finished");
        });

        tracing::debug!(effect = %self.settler.name, policy = %self.policy, "pipeline started");
        Pipeline { tx, task }
    }
}

impl<P, T, E> Teardown for Inner<P, T, E>
where
    P: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Error + Clone + Send + Sync + 'static,
{
    fn teardown(&self) {
        if let Some(pipeline) = lock(&self.pipeline).take() {
            pipeline.task.abort();
        }
        self.settler.successes.complete();
        self.settler.failures.complete();
    }
}

/// A bound effect. Cheap to clone; clones share one pipeline.
pub struct Effect<P, T, E> {
    inner: Arc<Inner<P, T, E>>,
}

impl<P, T, E> Clone for Effect<P, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, T, E> Effect<P, T, E>
where
    P: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Error + Clone + Send + Sync + 'static,
{
    /// Feed `param` into the pipeline.
    ///
    /// Must be called from within a tokio runtime; the pipeline task is
    /// spawned on first use and respawned if it ever died.
    pub fn invoke(&self, param: P) -> EffectHandle<T, E> {
        self.invoke_with(param, Callbacks::new())
    }

    /// Like [`invoke`](Self::invoke), with callbacks that fire only for this
    /// call's own outcome.
    pub fn invoke_with(&self, param: P, callbacks: Callbacks<T, E>) -> EffectHandle<T, E> {
        let inner = &self.inner;
        let token = inner.next_token.fetch_add(1, Ordering::Relaxed);
        let mut pipeline = lock(&inner.pipeline);

        if inner.lifecycle.is_destroyed() {
            tracing::debug!(effect = %inner.settler.name, token, "invoked after destroy");
            let (ticket, handle) = Ticket::new(token, callbacks, None, inner.lifecycle.clone());
            ticket.reject(InvokeError::Destroyed);
            return handle;
        }

        let (ticket, handle) = Ticket::new(
            token,
            callbacks,
            Some(inner.busy.acquire()),
            inner.lifecycle.clone(),
        );

        let alive = pipeline
            .as_ref()
            .is_some_and(|running| !running.task.is_finished());
        if !alive {
            let Ok(runtime) = Handle::try_current() else {
                tracing::warn!(effect = %inner.settler.name, token, "no runtime to run effect");
                ticket.reject(InvokeError::NoRuntime);
                return handle;
            };
            if pipeline.is_some() {
                tracing::warn!(effect = %inner.settler.name, "pipeline died, restarting");
            }
            *pipeline = Some(inner.spawn(&runtime));
        }

        tracing::debug!(effect = %inner.settler.name, token, "effect invoked");
        if let Some(running) = pipeline.as_ref() {
            // A closed channel drops the invocation, which resolves its handle.
            let _ = running.tx.send(Invocation { param, ticket });
        }
        handle
    }

    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Slot of this effect in the error registry.
    pub fn index(&self) -> usize {
        self.inner.settler.index
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.inner.policy
    }

    pub fn name(&self) -> &str {
        &self.inner.settler.name
    }

    /// `true` while any invocation of this effect is pending.
    pub fn is_busy(&self) -> bool {
        self.in_flight() > 0
    }

    pub fn in_flight(&self) -> usize {
        self.inner.busy.in_flight()
    }

    /// Every successful value, in settlement order.
    pub fn successes(&self) -> Notifications<T> {
        self.inner.settler.successes.subscribe()
    }

    /// Every failure, in settlement order.
    pub fn failures(&self) -> Notifications<E> {
        self.inner.settler.failures.subscribe()
    }

    /// Last error recorded for this effect.
    pub fn error(&self) -> Option<SharedError> {
        self.inner.settler.errors.get(self.index())
    }
}

/// Registers effects against one set of registries and one lifecycle.
#[derive(Clone)]
pub struct EffectEngine {
    loading: Arc<LoadingRegistry>,
    errors: Arc<ErrorRegistry>,
    lifecycle: Lifecycle,
    auto_loading: bool,
}

impl EffectEngine {
    pub fn new(
        loading: Arc<LoadingRegistry>,
        errors: Arc<ErrorRegistry>,
        lifecycle: Lifecycle,
        auto_loading: bool,
    ) -> Self {
        Self {
            loading,
            errors,
            lifecycle,
            auto_loading,
        }
    }

    /// Bind `trigger` under `policy`.
    ///
    /// # Example
    ///
    /// ```
    /// use effect_store::effects::{ConcurrencyPolicy, EffectEngine};
    /// use effect_store::lifecycle::Lifecycle;
    /// use effect_store::registry::{ErrorRegistry, LoadingRegistry};
    /// use std::sync::Arc;
    ///
    /// #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    /// #[error("lookup failed")]
    /// struct LookupError;
    ///
    /// # let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    /// # runtime.block_on(async {
    /// let engine = EffectEngine::new(
    ///     Arc::new(LoadingRegistry::new()),
    ///     Arc::new(ErrorRegistry::new()),
    ///     Lifecycle::new(),
    ///     true,
    /// );
    /// let double = engine.bind(
    ///     |n: u32| async move { Ok::<_, LookupError>(n * 2) },
    ///     ConcurrencyPolicy::Merge,
    /// );
    ///
    /// assert_eq!(double.invoke(21).await, Ok(42));
    /// # });
    /// ```
    pub fn bind<P, T, E, F, Fut>(&self, trigger: F, policy: ConcurrencyPolicy) -> Effect<P, T, E>
    where
        P: Clone + Send + 'static,
        T: Clone + Send + Sync + 'static,
        E: Error + Clone + Send + Sync + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let trigger: Trigger<P, T, E> = Arc::new(move |param| trigger(param).boxed());
        self.register(None, policy, trigger, Hooks::default())
    }

    pub(crate) fn register<P, T, E>(
        &self,
        name: Option<String>,
        policy: ConcurrencyPolicy,
        trigger: Trigger<P, T, E>,
        hooks: Hooks<P, T, E>,
    ) -> Effect<P, T, E>
    where
        P: Clone + Send + 'static,
        T: Clone + Send + Sync + 'static,
        E: Error + Clone + Send + Sync + 'static,
    {
        let id = self.loading.register();
        let index = self.errors.register();
        let name = name.unwrap_or_else(|| format!("effect-{}", index));

        let inner = Arc::new(Inner {
            id,
            policy,
            trigger,
            settler: Arc::new(Settler {
                name: name.clone(),
                index,
                errors: Arc::clone(&self.errors),
                successes: Subject::new(),
                failures: Subject::new(),
                hooks,
            }),
            busy: Arc::new(BusyTracker::new(
                Arc::clone(&self.loading),
                id,
                self.auto_loading,
            )),
            pipeline: Mutex::new(None),
            next_token: AtomicU64::new(0),
            lifecycle: self.lifecycle.clone(),
        });
        self.lifecycle.track(format!("effect {}", name), &inner);

        tracing::debug!(effect = %name, %id, index, %policy, "effect registered");
        Effect { inner }
    }

    pub fn loading(&self) -> &Arc<LoadingRegistry> {
        &self.loading
    }

    pub fn errors(&self) -> &Arc<ErrorRegistry> {
        &self.errors
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}
