//! Builder for constructing effects.

use crate::builder::error::BuildError;
use crate::effects::{from_effect, ConcurrencyPolicy, Effect, EffectEngine, Hook, Hooks, Trigger};
use futures::future::FutureExt;
use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use stillwater::effect::BoxedEffect;

/// Builder for binding effects with a fluent API.
///
/// Unlike [`EffectEngine::bind`], the builder can name the effect and attach
/// hooks that observe every settled invocation together with its parameter.
pub struct EffectBuilder<'a, P, T, E> {
    engine: &'a EffectEngine,
    name: Option<String>,
    policy: ConcurrencyPolicy,
    trigger: Option<Trigger<P, T, E>>,
    hooks: Hooks<P, T, E>,
}

impl<'a, P, T, E> EffectBuilder<'a, P, T, E>
where
    P: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Error + Clone + Send + Sync + 'static,
{
    /// Create a new builder registering against `engine`.
    pub fn new(engine: &'a EffectEngine) -> Self {
        Self {
            engine,
            name: None,
            policy: ConcurrencyPolicy::default(),
            trigger: None,
            hooks: Hooks::default(),
        }
    }

    /// Name used in diagnostics (optional).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Concurrency policy (optional, defaults to `Switch`).
    pub fn policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the async transformation (required).
    pub fn trigger<F, Fut>(mut self, trigger: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.trigger = Some(Arc::new(move |param| trigger(param).boxed()));
        self
    }

    /// Set the transformation as a Stillwater effect factory run against
    /// `env`.
    pub fn effect<Env, F>(self, env: Env, factory: F) -> Self
    where
        Env: Clone + Send + Sync + 'static,
        F: Fn(P) -> BoxedEffect<T, E, Env> + Send + Sync + 'static,
    {
        self.trigger(from_effect(env, factory))
    }

    /// Called with the parameter and value of every successful invocation.
    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&P, &T) + Send + Sync + 'static,
    {
        let hook: Hook<P, T> = Arc::new(hook);
        self.hooks.on_success = Some(hook);
        self
    }

    /// Called with the parameter and error of every failed invocation.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&P, &E) + Send + Sync + 'static,
    {
        let hook: Hook<P, E> = Arc::new(hook);
        self.hooks.on_error = Some(hook);
        self
    }

    /// Register the effect.
    pub fn build(self) -> Result<Effect<P, T, E>, BuildError> {
        let trigger = self.trigger.ok_or(BuildError::MissingTrigger)?;
        Ok(self
            .engine
            .register(self.name, self.policy, trigger, self.hooks))
    }
}
