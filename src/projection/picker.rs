//! Field-name index of single-field projections.

use super::Projection;
use crate::core::{State, ValueCell};
use crate::error::StoreError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One deduplicating projection per state field, built once.
pub struct Picker<S: State> {
    fields: BTreeMap<String, Projection<S, Value>>,
}

impl<S: State> Picker<S> {
    pub fn new(cell: &Arc<ValueCell<S>>) -> Result<Self, StoreError> {
        let fields: BTreeMap<String, Projection<S, Value>> = cell
            .fields()
            .iter()
            .map(|field| Ok((field.to_string(), Projection::field(Arc::clone(cell), field)?)))
            .collect::<Result<_, StoreError>>()?;
        Ok(Self { fields })
    }

    /// Projection of a single field, if the state has it.
    pub fn get(&self, field: &str) -> Option<&Projection<S, Value>> {
        self.fields.get(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Projection<S, Value>)> {
        self.fields.iter().map(|(name, projection)| (name.as_str(), projection))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{FutureExt, StreamExt};
    use serde_json::json;

    #[test]
    fn picker_has_one_projection_per_field() {
        let cell = Arc::new(ValueCell::new(json!({"name": "John", "age": 20})).unwrap());
        let picker = Picker::new(&cell).unwrap();

        assert_eq!(picker.len(), 2);
        assert_eq!(picker.field_names().collect::<Vec<_>>(), vec!["age", "name"]);
        assert!(picker.get("email").is_none());
    }

    #[test]
    fn picker_projection_follows_writes() {
        let cell = Arc::new(ValueCell::new(json!({"name": "John", "age": 20})).unwrap());
        let picker = Picker::new(&cell).unwrap();
        let mut names = picker.get("name").unwrap().subscribe();

        cell.write(|_| json!({"name": "Jane", "age": 20})).unwrap();

        assert_eq!(names.next().now_or_never(), Some(Some(json!("John"))));
        assert_eq!(names.next().now_or_never(), Some(Some(json!("Jane"))));
    }
}
