//! Triggers built from Stillwater effects.
//!
//! A factory turns each parameter into a fresh `BoxedEffect`, which is then
//! run against a clone of the environment. The environment is where effect
//! bodies find their dependencies (clients, the store itself, config).

use futures::future::{BoxFuture, FutureExt};
use stillwater::effect::{BoxedEffect, Effect as _};

/// Adapt a `BoxedEffect` factory into a trigger for
/// [`EffectEngine::bind`](super::EffectEngine::bind).
///
/// # Example
///
/// ```
/// use effect_store::effects::{from_effect, ConcurrencyPolicy};
/// use effect_store::Store;
/// use serde_json::json;
/// use stillwater::prelude::*;
///
/// #[derive(Clone)]
/// struct Env {
///     greeting: String,
/// }
///
/// #[derive(Debug, Clone, PartialEq, thiserror::Error)]
/// #[error("greeting failed")]
/// struct GreetError;
///
/// # let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # runtime.block_on(async {
/// let store = Store::new(json!({ "name": "" })).unwrap();
/// let env = Env { greeting: "Hello".into() };
///
/// let greet = store.effect(
///     from_effect(env, |name: String| {
///         from_fn(move |env: &Env| Ok::<_, GreetError>(format!("{}, {}", env.greeting, name)))
///             .boxed()
///     }),
///     ConcurrencyPolicy::Switch,
/// );
///
/// assert_eq!(greet.invoke("John".into()).await, Ok("Hello, John".to_string()));
/// # });
/// ```
pub fn from_effect<P, T, E, Env, F>(
    env: Env,
    factory: F,
) -> impl Fn(P) -> BoxFuture<'static, Result<T, E>> + Send + Sync + 'static
where
    P: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    Env: Clone + Send + Sync + 'static,
    F: Fn(P) -> BoxedEffect<T, E, Env> + Send + Sync + 'static,
{
    move |param| {
        let effect = factory(param);
        let env = env.clone();
        async move { effect.run(&env).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stillwater::prelude::*;

    #[derive(Clone)]
    struct Env {
        base: u32,
    }

    #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    #[error("refused {0}")]
    struct Refused(u32);

    #[tokio::test]
    async fn pure_effects_ignore_the_environment() {
        let trigger = from_effect(Env { base: 0 }, |n: u32| -> BoxedEffect<u32, Refused, Env> {
            pure(n * 3).boxed()
        });

        assert_eq!(trigger(4).await, Ok(12));
    }

    #[tokio::test]
    async fn effects_read_the_environment() {
        let trigger = from_effect(Env { base: 100 }, |n: u32| {
            from_fn(move |env: &Env| -> Result<u32, Refused> {
                if n < env.base {
                    Ok(env.base + n)
                } else {
                    Err(Refused(n))
                }
            })
            .boxed()
        });

        assert_eq!(trigger(5).await, Ok(105));
        assert_eq!(trigger(500).await, Err(Refused(500)));
    }

    #[tokio::test]
    async fn failing_effects_surface_their_error() {
        let trigger = from_effect(Env { base: 0 }, |n: u32| -> BoxedEffect<u32, Refused, Env> {
            fail(Refused(n)).boxed()
        });

        assert_eq!(trigger(9).await, Err(Refused(9)));
    }
}
