//! Current-value cell with a fixed key-set.

use super::state::{FieldSet, State};
use super::subject::{lock, Notifications, Subject};
use crate::error::StoreError;
use crate::lifecycle::Teardown;
use serde_json::{Map, Value};
use std::sync::Mutex;

struct Slot<S> {
    current: S,
    version: u64,
}

/// Holds the current snapshot and notifies subscribers of every write.
///
/// Writes to dynamic records are checked against the key-set captured at
/// construction; `patch` rejects unknown keys for every record. The
/// updater runs without any lock held, so it may read the cell; if another
/// write lands in between, the updater is re-run against the newer value.
pub struct ValueCell<S: State> {
    slot: Mutex<Slot<S>>,
    fields: FieldSet,
    changes: Subject<S>,
}

impl<S: State> ValueCell<S> {
    pub fn new(initial: S) -> Result<Self, StoreError> {
        let fields = FieldSet::of(&initial)?;
        Ok(Self {
            changes: Subject::with_value(initial.clone()),
            slot: Mutex::new(Slot {
                current: initial,
                version: 0,
            }),
            fields,
        })
    }

    /// Current snapshot.
    pub fn read(&self) -> S {
        lock(&self.slot).current.clone()
    }

    /// The key-set every write must preserve.
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Replace the snapshot with `updater(current)`.
    ///
    /// For dynamic records, fails with [`StoreError::ShapeViolation`] when the
    /// new snapshot adds or removes fields; the cell is left untouched in
    /// that case.
    pub fn write<F>(&self, mut updater: F) -> Result<S, StoreError>
    where
        F: FnMut(&S) -> S,
    {
        self.try_write(|current| Ok(updater(current)))
    }

    /// Merge a partial record into the current snapshot.
    ///
    /// Fields absent from the key-set are rejected before anything is
    /// written.
    pub fn patch(&self, partial: Map<String, Value>) -> Result<S, StoreError> {
        let unexpected: Vec<String> = partial
            .keys()
            .filter(|key| !self.fields.contains(key))
            .cloned()
            .collect();
        if !unexpected.is_empty() {
            return Err(StoreError::ShapeViolation {
                unexpected,
                missing: Vec::new(),
            });
        }

        self.try_write(|current| {
            let mut record = current.to_record()?;
            record.extend(partial.clone());
            Ok(serde_json::from_value(Value::Object(record))?)
        })
    }

    fn try_write<F>(&self, mut updater: F) -> Result<S, StoreError>
    where
        F: FnMut(&S) -> Result<S, StoreError>,
    {
        loop {
            let (base, version) = {
                let slot = lock(&self.slot);
                (slot.current.clone(), slot.version)
            };

            let next = updater(&base)?;
            if S::DYNAMIC_SHAPE {
                self.fields.check(&FieldSet::of(&next)?)?;
            }

            let mut slot = lock(&self.slot);
            if slot.version != version {
                tracing::trace!("concurrent write detected, re-running updater");
                continue;
            }
            slot.current = next.clone();
            slot.version += 1;
            self.changes.next(next.clone());
            return Ok(next);
        }
    }

    /// Subscribe to snapshots, starting with the current one.
    pub fn subscribe(&self) -> Notifications<S> {
        self.changes.subscribe()
    }

    /// Stop notifying subscribers. The snapshot stays readable.
    pub fn complete(&self) {
        self.changes.complete();
    }

    pub fn is_completed(&self) -> bool {
        self.changes.is_closed()
    }
}

impl<S: State> Teardown for ValueCell<S> {
    fn teardown(&self) {
        self.complete();
    }
}
