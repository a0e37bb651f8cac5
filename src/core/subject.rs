//! Multicast notification channel.
//!
//! A `Subject` pushes every value into one unbounded queue per subscriber.
//! Delivery happens synchronously inside [`Subject::next`], in subscription
//! order, so a value is already queued for every live subscriber when `next`
//! returns. Subscribers read their queue as a `Stream`.

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Stream of values delivered by a [`Subject`].
///
/// Ends once the subject is completed and the queued values are drained.
pub type Notifications<T> = UnboundedReceiver<T>;

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner<T> {
    latest: Option<T>,
    replay: bool,
    subscribers: Vec<UnboundedSender<T>>,
    closed: bool,
}

/// Multicast channel with optional replay of the latest value.
pub struct Subject<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: Clone + Send + 'static> Subject<T> {
    /// A subject that only delivers values sent after subscription.
    pub fn new() -> Self {
        Self::build(None, false)
    }

    /// A subject that hands its latest value to every new subscriber.
    pub fn with_value(initial: T) -> Self {
        Self::build(Some(initial), true)
    }

    fn build(latest: Option<T>, replay: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                latest,
                replay,
                subscribers: Vec::new(),
                closed: false,
            })),
        }
    }

    /// Broadcast a value. Returns `false` once the subject is completed.
    pub fn next(&self, value: T) -> bool {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return false;
        }

        let before = inner.subscribers.len();
        inner
            .subscribers
            .retain(|tx| tx.unbounded_send(value.clone()).is_ok());
        let pruned = before - inner.subscribers.len();
        if pruned > 0 {
            tracing::trace!(pruned, "dropped closed subscribers");
        }

        if inner.replay {
            inner.latest = Some(value);
        }
        true
    }

    /// Subscribe to future values, preceded by the latest one for replaying
    /// subjects. Subscribing to a completed subject yields an ended stream.
    pub fn subscribe(&self) -> Notifications<T> {
        let (tx, rx) = unbounded();
        let mut inner = lock(&self.inner);
        if inner.closed {
            return rx;
        }

        if let Some(latest) = inner.latest.as_ref().filter(|_| inner.replay) {
            // The receiver is alive, the send cannot fail.
            let _ = tx.unbounded_send(latest.clone());
        }
        inner.subscribers.push(tx);
        rx
    }

    /// Latest value of a replaying subject.
    pub fn value(&self) -> Option<T> {
        lock(&self.inner).latest.clone()
    }

    /// End every subscription. Later values are ignored.
    pub fn complete(&self) {
        let mut inner = lock(&self.inner);
        inner.closed = true;
        inner.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    /// Number of live subscriptions, counting those not yet pruned.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

impl<T: Clone + Send + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{FutureExt, StreamExt};

    fn drain<T>(rx: &mut Notifications<T>) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(Some(value)) = rx.next().now_or_never() {
            values.push(value);
        }
        values
    }

    #[test]
    fn plain_subject_does_not_replay() {
        let subject = Subject::new();
        subject.next(1);

        let mut rx = subject.subscribe();
        subject.next(2);
        subject.next(3);

        assert_eq!(drain(&mut rx), vec![2, 3]);
    }

    #[test]
    fn replaying_subject_starts_with_latest() {
        let subject = Subject::with_value("a");
        subject.next("b");

        let mut rx = subject.subscribe();
        subject.next("c");

        assert_eq!(drain(&mut rx), vec!["b", "c"]);
        assert_eq!(subject.value(), Some("c"));
    }

    #[test]
    fn delivery_is_synchronous_for_every_subscriber() {
        let subject = Subject::new();
        let mut first = subject.subscribe();
        let mut second = subject.subscribe();

        subject.next(7);

        assert_eq!(first.next().now_or_never(), Some(Some(7)));
        assert_eq!(second.next().now_or_never(), Some(Some(7)));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let subject = Subject::new();
        let rx = subject.subscribe();
        let _kept = subject.subscribe();
        assert_eq!(subject.subscriber_count(), 2);

        drop(rx);
        subject.next(1);
        assert_eq!(subject.subscriber_count(), 1);
    }

    #[test]
    fn complete_ends_streams_and_ignores_later_values() {
        let subject = Subject::with_value(0);
        let mut rx = subject.subscribe();

        subject.complete();
        assert!(!subject.next(1));
        assert!(subject.is_closed());

        assert_eq!(rx.next().now_or_never(), Some(Some(0)));
        assert_eq!(rx.next().now_or_never(), Some(None));

        let mut late = subject.subscribe();
        assert_eq!(late.next().now_or_never(), Some(None));
    }
}
