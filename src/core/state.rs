//! Core State trait for store snapshots.
//!
//! A state is a record: it serializes to a JSON object whose field names
//! form the store's key-set. The key-set is captured once when the store is
//! created. Typed records cannot gain or lose fields, so only dynamic
//! records have their writes checked against it.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt::{self, Debug};

/// Trait for store state snapshots.
///
/// # Required Traits
///
/// - `Clone`: snapshots are handed to every subscriber
/// - `PartialEq`: projections suppress consecutive duplicates
/// - `Debug`: snapshots appear in diagnostics
/// - `Serialize` + `Deserialize`: the key-set check and `patch` work on the
///   serialized record
///
/// # Example
///
/// ```rust
/// use effect_store::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// struct Profile {
///     name: String,
///     age: u32,
/// }
///
/// impl State for Profile {}
///
/// let profile = Profile { name: "John".into(), age: 20 };
/// let record = profile.to_record().unwrap();
/// assert!(record.contains_key("name"));
/// assert!(record.contains_key("age"));
/// ```
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Whether the shape can change at runtime, so writes must be checked
    /// against the captured key-set.
    ///
    /// Off for typed records: serde attributes such as
    /// `skip_serializing_if` legitimately change which keys are emitted.
    const DYNAMIC_SHAPE: bool = false;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Serialize this snapshot into its record form.
    fn to_record(&self) -> Result<Map<String, Value>, StoreError> {
        match serde_json::to_value(self)? {
            Value::Object(record) => Ok(record),
            other => Err(StoreError::NotARecord(kind_of(&other))),
        }
    }
}

/// Dynamic records, for stores whose shape is only known at runtime.
impl State for Value {
    const DYNAMIC_SHAPE: bool = true;

    fn name(&self) -> &str {
        "record"
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The set of field names of a state record.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FieldSet(BTreeSet<String>);

impl FieldSet {
    /// Capture the field names of a snapshot.
    pub fn of<S: State>(state: &S) -> Result<Self, StoreError> {
        Ok(Self::from_record(&state.to_record()?))
    }

    pub fn from_record(record: &Map<String, Value>) -> Self {
        Self(record.keys().cloned().collect())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Verify that `next` has exactly these fields.
    ///
    /// Collects every added and every removed field instead of stopping at
    /// the first one.
    pub fn check(&self, next: &FieldSet) -> Result<(), StoreError> {
        let unexpected: Vec<String> = next.0.difference(&self.0).cloned().collect();
        let missing: Vec<String> = self.0.difference(&next.0).cloned().collect();

        if unexpected.is_empty() && missing.is_empty() {
            Ok(())
        } else {
            Err(StoreError::ShapeViolation {
                unexpected,
                missing,
            })
        }
    }
}

impl Debug for FieldSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}
