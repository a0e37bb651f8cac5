//! Concurrency policies: how overlapping invocations are flattened.
//!
//! Each policy turns a stream of inputs and a function producing one future
//! per input into a stream of settled outputs. The policy is picked once when
//! an effect is bound; the resulting stream is driven for the life of the
//! effect's pipeline.
//!
//! | Policy | Input arriving while a future is pending |
//! |---|---|
//! | `Switch` | the pending future is dropped, the new one starts |
//! | `Merge` | both run; outputs arrive in completion order |
//! | `Concat` | the new one waits until everything before it settled |
//! | `Exhaust` | the new input is dropped without starting anything |
//!
//! Dropping a future or an input is the only form of cancellation, so any
//! cleanup tied to an invocation belongs in a `Drop` impl of the value that
//! travels through the stream.

use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Strategy for resolving overlapping invocations of one effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    /// Cancel the pending invocation and start the new one.
    #[default]
    Switch,

    /// Run every invocation concurrently.
    Merge,

    /// Queue invocations and run them one after another.
    Concat,

    /// Ignore new invocations while one is pending.
    #[serde(alias = "reject")]
    Exhaust,
}

impl ConcurrencyPolicy {
    /// Flatten `inputs` through `f` according to this policy.
    pub fn flatten<I, F, Fut>(self, inputs: I, f: F) -> BoxStream<'static, Fut::Output>
    where
        I: Stream + Send + 'static,
        I::Item: Send + 'static,
        F: FnMut(I::Item) -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send,
    {
        match self {
            Self::Switch => SingleFlight::new(inputs.boxed(), f, OnBusy::Replace).boxed(),
            Self::Exhaust => SingleFlight::new(inputs.boxed(), f, OnBusy::Ignore).boxed(),
            Self::Concat => inputs.then(f).boxed(),
            Self::Merge => inputs.map(f).buffer_unordered(usize::MAX).boxed(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Merge => "merge",
            Self::Concat => "concat",
            Self::Exhaust => "exhaust",
        }
    }
}

impl std::fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum OnBusy {
    Replace,
    Ignore,
}

/// At most one future in flight; `Switch` and `Exhaust` differ only in what
/// happens to an input that arrives while it runs.
struct SingleFlight<T, F, Fut> {
    inputs: BoxStream<'static, T>,
    f: F,
    in_flight: Option<Pin<Box<Fut>>>,
    inputs_done: bool,
    on_busy: OnBusy,
}

impl<T, F, Fut> SingleFlight<T, F, Fut>
where
    F: FnMut(T) -> Fut,
    Fut: Future,
{
    fn new(inputs: BoxStream<'static, T>, f: F, on_busy: OnBusy) -> Self {
        Self {
            inputs,
            f,
            in_flight: None,
            inputs_done: false,
            on_busy,
        }
    }
}

// Nothing is pinned in place: the future is boxed and the input stream is a
// `BoxStream`, so the combinator itself can move.
impl<T, F, Fut> Unpin for SingleFlight<T, F, Fut> {}

impl<T, F, Fut> Stream for SingleFlight<T, F, Fut>
where
    F: FnMut(T) -> Fut,
    Fut: Future,
{
    type Item = Fut::Output;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        while !this.inputs_done {
            match this.inputs.poll_next_unpin(cx) {
                Poll::Ready(Some(input)) => {
                    if this.in_flight.is_none() || this.on_busy == OnBusy::Replace {
                        // Replacing drops the superseded future.
                        this.in_flight = Some(Box::pin((this.f)(input)));
                    } else {
                        drop(input);
                    }
                }
                Poll::Ready(None) => this.inputs_done = true,
                Poll::Pending => break,
            }
        }

        if let Some(fut) = this.in_flight.as_mut() {
            if let Poll::Ready(output) = fut.as_mut().poll(cx) {
                this.in_flight = None;
                return Poll::Ready(Some(output));
            }
            return Poll::Pending;
        }

        if this.inputs_done {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}
