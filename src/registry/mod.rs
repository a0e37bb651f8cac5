//! Shared bookkeeping for effect instances.
//!
//! Every effect instance owns exactly one entry in each registry, allocated
//! when it is bound and kept for the lifetime of the store:
//! - [`LoadingRegistry`]: busy flag per effect, aggregated into "any busy"
//! - [`ErrorRegistry`]: last error per effect, addressed by index

mod errors;
mod loading;

pub use errors::{ErrorRegistry, ErrorSlots, SharedError};
pub use loading::{EffectId, LoadingRegistry};
