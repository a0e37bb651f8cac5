//! Async effects bound to concurrency policies.
//!
//! This module is the "imperative shell" around the store: user-supplied
//! async work runs here, never inside the value cell.
//!
//! # Key Concepts
//!
//! - **Trigger**: the async transformation `P -> Result<T, E>` an effect runs
//! - **Policy**: how overlapping invocations are resolved
//!   (`Switch`, `Merge`, `Concat`, `Exhaust`)
//! - **Pipeline**: one spawned task per effect that survives failures
//! - **Handle**: the per-call future that resolves with that call's result
//!
//! Triggers can be plain async closures or Stillwater effects adapted with
//! [`from_effect`].

mod engine;
mod invocation;
mod policy;
mod trigger;

pub(crate) use engine::{Hook, Hooks};
pub use engine::{Effect, EffectEngine, Trigger};
pub use invocation::{Callbacks, EffectHandle, InvokeError, InvokeResult};
pub use policy::ConcurrencyPolicy;
pub use trigger::from_effect;
