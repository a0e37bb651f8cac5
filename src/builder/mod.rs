//! Builder API for ergonomic effect and state construction.
//!
//! This module provides a fluent builder for effects and a macro for
//! declaring record states with minimal boilerplate.

pub mod effect;
pub mod error;
pub mod macros;

pub use effect::EffectBuilder;
pub use error::BuildError;
