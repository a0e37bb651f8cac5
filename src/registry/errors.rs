//! Per-effect "last error" slots.

use crate::core::{lock, Notifications, Subject};
use crate::lifecycle::Teardown;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// Type-erased effect error as stored in the registry.
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// Snapshot of every slot, indexed by registration order.
pub type ErrorSlots = Vec<Option<SharedError>>;

/// Ordered list of error slots, one per registered effect.
///
/// Slots are only ever appended, so index `i` keeps pointing at the `i`-th
/// registered effect. Every mutation broadcasts the full snapshot.
pub struct ErrorRegistry {
    slots: Mutex<ErrorSlots>,
    changes: Subject<ErrorSlots>,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            changes: Subject::with_value(Vec::new()),
        }
    }

    /// Append an empty slot and return its index.
    pub fn register(&self) -> usize {
        let mut slots = lock(&self.slots);
        slots.push(None);
        self.changes.next(slots.clone());
        slots.len() - 1
    }

    /// Overwrite a slot. Out-of-range indices are ignored.
    pub fn set(&self, index: usize, error: Option<SharedError>) {
        let mut slots = lock(&self.slots);
        let Some(slot) = slots.get_mut(index) else {
            tracing::warn!(index, "ignoring unknown error slot");
            return;
        };
        *slot = error;
        self.changes.next(slots.clone());
    }

    pub fn clear(&self, index: usize) {
        self.set(index, None);
    }

    /// Empty every slot with a single broadcast.
    pub fn clear_all(&self) {
        let mut slots = lock(&self.slots);
        slots.iter_mut().for_each(|slot| *slot = None);
        self.changes.next(slots.clone());
    }

    pub fn get(&self, index: usize) -> Option<SharedError> {
        lock(&self.slots).get(index).cloned().flatten()
    }

    pub fn snapshot(&self) -> ErrorSlots {
        lock(&self.slots).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots, starting with the current one.
    pub fn errors(&self) -> Notifications<ErrorSlots> {
        self.changes.subscribe()
    }

    pub fn destroy(&self) {
        self.changes.complete();
    }
}

impl Default for ErrorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Teardown for ErrorRegistry {
    fn teardown(&self) {
        self.destroy();
    }
}
