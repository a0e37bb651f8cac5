//! Read-only views derived from the value cell.
//!
//! A [`Projection`] maps every snapshot through a projector. Each call to
//! [`Projection::subscribe`] starts a fresh stream that opens with the
//! current projected value; deduplicating projections then stay silent until
//! the projected value actually changes.

mod picker;

pub use picker::Picker;

use crate::core::{State, ValueCell};
use crate::error::StoreError;
use futures::future;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;

type Projector<S, R> = Arc<dyn Fn(&S) -> R + Send + Sync>;

/// A restartable view over the store state.
pub struct Projection<S: State, R> {
    cell: Arc<ValueCell<S>>,
    projector: Projector<S, R>,
    distinct: bool,
}

impl<S, R> Projection<S, R>
where
    S: State,
    R: Clone + PartialEq + Send + 'static,
{
    /// View that only re-emits when the projected value changes.
    pub fn distinct<F>(cell: Arc<ValueCell<S>>, projector: F) -> Self
    where
        F: Fn(&S) -> R + Send + Sync + 'static,
    {
        Self {
            cell,
            projector: Arc::new(projector),
            distinct: true,
        }
    }

    /// View that emits once per state notification, duplicates included.
    pub fn every<F>(cell: Arc<ValueCell<S>>, projector: F) -> Self
    where
        F: Fn(&S) -> R + Send + Sync + 'static,
    {
        Self {
            cell,
            projector: Arc::new(projector),
            distinct: false,
        }
    }

    /// Projected value of the current snapshot.
    pub fn current(&self) -> R {
        (self.projector)(&self.cell.read())
    }

    /// Start a new stream of projected values.
    pub fn subscribe(&self) -> BoxStream<'static, R> {
        let projector = Arc::clone(&self.projector);
        let projected = self.cell.subscribe().map(move |state| projector(&state));

        if self.distinct {
            distinct_until_changed(projected).boxed()
        } else {
            projected.boxed()
        }
    }
}

impl<S: State> Projection<S, Value> {
    /// Single-field view of a record.
    pub fn field(cell: Arc<ValueCell<S>>, field: &str) -> Result<Self, StoreError> {
        if !cell.fields().contains(field) {
            return Err(StoreError::UnknownField(field.to_string()));
        }

        let field = field.to_string();
        Ok(Self::distinct(cell, move |state: &S| {
            state
                .to_record()
                .ok()
                .and_then(|mut record| record.remove(&field))
                .unwrap_or(Value::Null)
        }))
    }
}

impl<S: State, R> Clone for Projection<S, R> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            projector: Arc::clone(&self.projector),
            distinct: self.distinct,
        }
    }
}

/// Drop items equal to the one emitted just before them.
pub fn distinct_until_changed<St>(stream: St) -> impl Stream<Item = St::Item>
where
    St: Stream,
    St::Item: Clone + PartialEq,
{
    let mut last: Option<St::Item> = None;
    stream.filter_map(move |item| {
        let fresh = last.as_ref() != Some(&item);
        if fresh {
            last = Some(item.clone());
        }
        future::ready(fresh.then_some(item))
    })
}
