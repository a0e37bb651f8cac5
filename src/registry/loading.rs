//! Busy/idle tracking across effect instances.

use crate::core::{lock, Notifications, Subject};
use crate::lifecycle::Teardown;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

/// Opaque identifier of a loading entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectId(Uuid);

impl EffectId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Default)]
struct Flags {
    entries: HashMap<EffectId, bool>,
    aggregate: bool,
    destroyed: bool,
}

/// Map of per-effect busy flags with one aggregated "any busy" signal.
///
/// The aggregate is recomputed on every `start`/`stop` and broadcast only
/// when it changes, so it stays `true` for as long as any entry is busy no
/// matter in which order entries start and stop.
pub struct LoadingRegistry {
    flags: Mutex<Flags>,
    busy: Subject<bool>,
}

impl LoadingRegistry {
    pub fn new() -> Self {
        Self {
            flags: Mutex::new(Flags::default()),
            busy: Subject::with_value(false),
        }
    }

    /// Create a new idle entry.
    pub fn register(&self) -> EffectId {
        let id = EffectId::generate();
        let mut flags = lock(&self.flags);
        if !flags.destroyed {
            flags.entries.insert(id, false);
        }
        tracing::trace!(%id, "registered loading entry");
        id
    }

    pub fn start(&self, id: EffectId) {
        self.set(id, true);
    }

    pub fn stop(&self, id: EffectId) {
        self.set(id, false);
    }

    fn set(&self, id: EffectId, busy: bool) {
        let mut flags = lock(&self.flags);
        match flags.entries.get_mut(&id) {
            Some(flag) => *flag = busy,
            None => {
                tracing::trace!(%id, "ignoring unknown loading entry");
                return;
            }
        }

        let aggregate = flags.entries.values().any(|flag| *flag);
        if aggregate != flags.aggregate {
            flags.aggregate = aggregate;
            tracing::debug!(loading = aggregate, "loading changed");
            self.busy.next(aggregate);
        }
    }

    /// Flag of a single entry; `None` for unknown entries.
    pub fn is_busy(&self, id: EffectId) -> Option<bool> {
        lock(&self.flags).entries.get(&id).copied()
    }

    /// `true` while any entry is busy.
    pub fn is_loading(&self) -> bool {
        lock(&self.flags).aggregate
    }

    /// Aggregated signal, starting with its current value.
    pub fn loading(&self) -> Notifications<bool> {
        self.busy.subscribe()
    }

    pub fn len(&self) -> usize {
        lock(&self.flags).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and end the aggregated signal.
    pub fn destroy(&self) {
        let mut flags = lock(&self.flags);
        flags.destroyed = true;
        flags.entries.clear();
        self.busy.complete();
    }
}

impl Default for LoadingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Teardown for LoadingRegistry {
    fn teardown(&self) {
        self.destroy();
    }
}
