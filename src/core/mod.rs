//! Core store types.
//!
//! This module contains the building blocks every other part of the store
//! sits on:
//! - State definitions via the `State` trait and its key-set (`FieldSet`)
//! - The multicast `Subject` used for every notification sequence
//! - The `ValueCell` holding the current snapshot

mod cell;
mod state;
mod subject;

pub use cell::ValueCell;
pub use state::{FieldSet, State};
pub use subject::{Notifications, Subject};

pub(crate) use state::kind_of;
pub(crate) use subject::lock;
