//! Teardown of every channel and pipeline a store created.

use crate::core::lock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Something that holds channels or tasks which must be released on
/// teardown.
pub trait Teardown: Send + Sync {
    fn teardown(&self);
}

struct Tracked {
    label: String,
    resource: Weak<dyn Teardown>,
}

#[derive(Default)]
struct Inner {
    destroyed: AtomicBool,
    tracked: Mutex<Vec<Tracked>>,
}

/// Tracks resources and releases all of them exactly once.
///
/// Resources are held weakly: dropping one early is fine, it is simply
/// skipped at teardown and pruned the next time something is tracked. Resources tracked after `destroy` are released
/// immediately.
#[derive(Clone, Default)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track<R>(&self, label: impl Into<String>, resource: &Arc<R>)
    where
        R: Teardown + 'static,
    {
        let label = label.into();
        if self.is_destroyed() {
            tracing::debug!(%label, "tracked after destroy, releasing now");
            resource.teardown();
            return;
        }

        let resource: Arc<dyn Teardown> = Arc::clone(resource) as Arc<dyn Teardown>;
        let mut tracked = lock(&self.inner.tracked);
        tracked.retain(|entry| entry.resource.strong_count() > 0);
        tracked.push(Tracked {
            label,
            resource: Arc::downgrade(&resource),
        });
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Number of tracked resources that are still alive.
    pub fn live(&self) -> usize {
        lock(&self.inner.tracked)
            .iter()
            .filter(|tracked| tracked.resource.strong_count() > 0)
            .count()
    }

    /// Release every tracked resource. Later calls do nothing.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let tracked = std::mem::take(&mut *lock(&self.inner.tracked));
        let mut released = 0;
        for Tracked { label, resource } in tracked {
            if let Some(resource) = resource.upgrade() {
                tracing::trace!(%label, "releasing");
                resource.teardown();
                released += 1;
            }
        }
        tracing::debug!(released, "lifecycle destroyed");
    }
}
