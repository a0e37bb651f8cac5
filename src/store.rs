//! The store: one value cell, its projections, and the effects bound to it.

use crate::builder::EffectBuilder;
use crate::core::{kind_of, Notifications, State, ValueCell};
use crate::effects::{ConcurrencyPolicy, Effect, EffectEngine};
use crate::error::StoreError;
use crate::lifecycle::Lifecycle;
use crate::projection::{Picker, Projection};
use crate::registry::{EffectId, ErrorRegistry, ErrorSlots, LoadingRegistry, SharedError};
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;
use std::future::Future;
use std::sync::Arc;

/// Store diagnostics go to `debug` when [`StoreConfig::log`] is set and to
/// `trace` otherwise.
macro_rules! store_event {
    ($config:expr, $($arg:tt)+) => {
        if $config.log {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    };
}

/// Store behavior switches.
///
/// Deserializes from partial documents; missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Effects drive the loading registry.
    pub auto_loading: bool,
    /// Log store activity at `debug` instead of `trace`.
    pub log: bool,
}

impl StoreConfig {
    pub fn auto_loading(mut self, enabled: bool) -> Self {
        self.auto_loading = enabled;
        self
    }

    pub fn log(mut self, enabled: bool) -> Self {
        self.log = enabled;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            auto_loading: true,
            log: false,
        }
    }
}

/// Reactive container for a record state.
///
/// # Example
///
/// ```rust
/// use effect_store::{ConcurrencyPolicy, Store};
/// use serde_json::json;
///
/// #[derive(Debug, Clone, thiserror::Error)]
/// #[error("rename failed: {0}")]
/// struct RenameError(String);
///
/// # let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # runtime.block_on(async {
/// let store = Store::new(json!({ "name": "", "age": 0 })).unwrap();
/// let name = store.pluck("name").unwrap();
///
/// let cell = store.cell();
/// let rename = store.effect(
///     move |to: String| {
///         let cell = cell.clone();
///         async move {
///             let mut partial = serde_json::Map::new();
///             partial.insert("name".into(), json!(to));
///             cell.patch(partial).map_err(|e| RenameError(e.to_string()))
///         }
///     },
///     ConcurrencyPolicy::Switch,
/// );
///
/// rename.invoke("John".to_string()).await.unwrap();
/// assert_eq!(name.current(), json!("John"));
/// # });
/// ```
pub struct Store<S: State> {
    cell: Arc<ValueCell<S>>,
    picker: Picker<S>,
    engine: EffectEngine,
    manual_loading: EffectId,
    config: StoreConfig,
}

impl<S: State> Store<S> {
    /// Create a store with the default configuration.
    ///
    /// Fails with [`StoreError::NotARecord`] if `initial` does not serialize
    /// to a record.
    pub fn new(initial: S) -> Result<Self, StoreError> {
        Self::with_config(initial, StoreConfig::default())
    }

    pub fn with_config(initial: S, config: StoreConfig) -> Result<Self, StoreError> {
        let name = initial.name().to_string();
        let cell = Arc::new(ValueCell::new(initial)?);
        let picker = Picker::new(&cell)?;

        let loading = Arc::new(LoadingRegistry::new());
        let errors = Arc::new(ErrorRegistry::new());
        let lifecycle = Lifecycle::new();
        lifecycle.track("value cell", &cell);
        lifecycle.track("loading registry", &loading);
        lifecycle.track("error registry", &errors);

        let manual_loading = loading.register();
        let engine = EffectEngine::new(loading, errors, lifecycle, config.auto_loading);

        store_event!(
            config,
            state = %name,
            fields = ?cell.fields(),
            auto_loading = config.auto_loading,
            "store created"
        );

        Ok(Self {
            cell,
            picker,
            engine,
            manual_loading,
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The underlying cell, for effect bodies that write state.
    pub fn cell(&self) -> Arc<ValueCell<S>> {
        Arc::clone(&self.cell)
    }

    /// Current snapshot.
    pub fn value(&self) -> S {
        self.cell.read()
    }

    /// Every snapshot, starting with the current one.
    pub fn state(&self) -> Notifications<S> {
        self.cell.subscribe()
    }

    /// Replace the state with `updater(current)`.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShapeViolation`] if a dynamic record gains or loses
    /// fields.
    pub fn update<F>(&self, updater: F) -> Result<S, StoreError>
    where
        F: FnMut(&S) -> S,
    {
        let result = self.cell.write(updater);
        self.log_write("update", &result);
        result
    }

    /// Merge a partial record into the state.
    ///
    /// ```rust
    /// use effect_store::Store;
    /// use serde_json::json;
    ///
    /// let store = Store::new(json!({ "name": "", "age": 0 })).unwrap();
    /// store.patch(json!({ "age": 20 })).unwrap();
    /// assert_eq!(store.value(), json!({ "name": "", "age": 20 }));
    ///
    /// assert!(store.patch(json!({ "email": "john@example.com" })).is_err());
    /// ```
    pub fn patch(&self, partial: Value) -> Result<S, StoreError> {
        let result = match partial {
            Value::Object(partial) => self.cell.patch(partial),
            other => Err(StoreError::NotARecord(kind_of(&other))),
        };
        self.log_write("patch", &result);
        result
    }

    fn log_write(&self, operation: &str, result: &Result<S, StoreError>) {
        match result {
            Ok(next) => store_event!(self.config, operation, state = ?next, "state written"),
            Err(error) => tracing::warn!(operation, %error, "state write rejected"),
        }
    }

    /// Deduplicating projection of the state.
    pub fn pick<R, F>(&self, projector: F) -> Projection<S, R>
    where
        R: Clone + PartialEq + Send + 'static,
        F: Fn(&S) -> R + Send + Sync + 'static,
    {
        Projection::distinct(Arc::clone(&self.cell), projector)
    }

    /// Projection that emits on every state notification, duplicates
    /// included.
    pub fn event<R, F>(&self, projector: F) -> Projection<S, R>
    where
        R: Clone + PartialEq + Send + 'static,
        F: Fn(&S) -> R + Send + Sync + 'static,
    {
        Projection::every(Arc::clone(&self.cell), projector)
    }

    /// Deduplicating projection of one field.
    pub fn pluck(&self, field: &str) -> Result<Projection<S, Value>, StoreError> {
        self.picker
            .get(field)
            .cloned()
            .ok_or_else(|| StoreError::UnknownField(field.to_string()))
    }

    /// Per-field projections, one for every state field.
    pub fn picker(&self) -> &Picker<S> {
        &self.picker
    }

    /// Bind an async trigger under `policy`.
    pub fn effect<P, T, E, F, Fut>(&self, trigger: F, policy: ConcurrencyPolicy) -> Effect<P, T, E>
    where
        P: Clone + Send + 'static,
        T: Clone + Send + Sync + 'static,
        E: Error + Clone + Send + Sync + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.engine.bind(trigger, policy)
    }

    /// Builder for effects with a name or hooks.
    pub fn effect_builder<P, T, E>(&self) -> EffectBuilder<'_, P, T, E>
    where
        P: Clone + Send + 'static,
        T: Clone + Send + Sync + 'static,
        E: Error + Clone + Send + Sync + 'static,
    {
        EffectBuilder::new(&self.engine)
    }

    pub fn engine(&self) -> &EffectEngine {
        &self.engine
    }

    /// `true` while any effect (or the manual entry) is busy, deduplicated.
    pub fn loading(&self) -> Notifications<bool> {
        self.engine.loading().loading()
    }

    pub fn is_loading(&self) -> bool {
        self.engine.loading().is_loading()
    }

    /// Mark the store busy outside of any effect.
    pub fn start_loading(&self) {
        store_event!(self.config, "manual loading started");
        self.engine.loading().start(self.manual_loading);
    }

    pub fn stop_loading(&self) {
        store_event!(self.config, "manual loading stopped");
        self.engine.loading().stop(self.manual_loading);
    }

    /// Error slots of every effect, starting with the current snapshot.
    pub fn errors(&self) -> Notifications<ErrorSlots> {
        self.engine.errors().errors()
    }

    pub fn errors_snapshot(&self) -> ErrorSlots {
        self.engine.errors().snapshot()
    }

    /// Last error of the effect registered at `index`.
    pub fn error(&self, index: usize) -> Option<SharedError> {
        self.engine.errors().get(index)
    }

    pub fn clear_error(&self, index: usize) {
        self.engine.errors().clear(index);
    }

    pub fn clear_all_errors(&self) {
        self.engine.errors().clear_all();
    }

    /// Complete every stream, stop every pipeline and resolve pending
    /// invocations with [`InvokeError::Destroyed`](crate::effects::InvokeError::Destroyed).
    ///
    /// Calling it again does nothing.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            return;
        }
        store_event!(self.config, "destroying store");
        self.engine.lifecycle().destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.engine.lifecycle().is_destroyed()
    }
}
