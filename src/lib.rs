//! Effect Store: a reactive state container with a policy-driven effect
//! engine.
//!
//! The store keeps one record-shaped state value. Reads are projections that
//! stream derived values; writes go through a single entry point that keeps
//! the record's field set fixed. Async work runs in effects: each effect
//! owns a long-lived pipeline that applies one of four concurrency policies
//! to overlapping calls and reports busy state and errors to shared
//! registries.
//!
//! # Core Concepts
//!
//! - **State**: record types implementing the `State` trait
//! - **Projections**: restartable, optionally deduplicated views of the state
//! - **Effects**: async triggers bound to a `ConcurrencyPolicy`
//! - **Registries**: aggregated loading flag and per-effect error slots
//! - **Lifecycle**: one `destroy()` that ends every stream and pipeline
//!
//! # Example
//!
//! ```rust
//! use effect_store::{state_record, ConcurrencyPolicy, Store};
//!
//! state_record! {
//!     pub struct Profile {
//!         pub name: String,
//!         pub age: u32,
//!     }
//! }
//!
//! #[derive(Debug, Clone, thiserror::Error)]
//! #[error("profile service unavailable")]
//! struct Unavailable;
//!
//! # let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # runtime.block_on(async {
//! let store = Store::new(Profile { name: String::new(), age: 0 }).unwrap();
//! let age = store.pick(|profile| profile.age);
//!
//! let cell = store.cell();
//! let birthday = store.effect(
//!     move |years: u32| {
//!         let cell = cell.clone();
//!         async move {
//!             cell.write(|p| Profile { age: p.age + years, ..p.clone() })
//!                 .map_err(|_| Unavailable)
//!         }
//!     },
//!     ConcurrencyPolicy::Concat,
//! );
//!
//! birthday.invoke(1).await.unwrap();
//! assert_eq!(age.current(), 1);
//! assert!(!store.is_loading());
//!
//! store.destroy();
//! # });
//! ```

pub mod builder;
pub mod core;
pub mod effects;
pub mod error;
pub mod lifecycle;
pub mod projection;
pub mod registry;
pub mod store;

// Re-export commonly used types
pub use builder::{BuildError, EffectBuilder};
pub use crate::core::{State, ValueCell};
pub use effects::{
    from_effect, Callbacks, ConcurrencyPolicy, Effect, EffectHandle, InvokeError, InvokeResult,
};
pub use error::StoreError;
pub use lifecycle::Lifecycle;
pub use projection::{Picker, Projection};
pub use registry::{EffectId, ErrorSlots, SharedError};
pub use store::{Store, StoreConfig};
