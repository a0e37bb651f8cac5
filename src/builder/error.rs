//! Build errors for the effect builder.

use thiserror::Error;

/// Errors that can occur when building effects.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Effect trigger not specified. Call .trigger(f) or .effect(env, factory) before .build()")]
    MissingTrigger,
}
