//! The scoped configuration service.

use crate::core::{Field, FieldRegistry, Origin, Path, ScopeType, ServiceBuilder, Value};
use crate::error::{ConfigError, Result};
use crate::observer::{Configurations, Event, Observer, ObserverFactories, ObserverRegistry};
use crate::storage::Storager;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves configuration values across scopes and runs the observer pipeline.
///
/// Reads walk the path's fallback scopes (store, website, default) and return
/// the first stored value, after running the `after_get` observers. When no
/// scope holds a value the field's declared default is returned as is.
///
/// Writes are checked against the field's permitted scopes, run through the
/// `before_set` observers and land at exactly the requested scope.
///
/// Cloning is cheap and clones share storage, observers and fields.
///
/// # Examples
///
/// ```rust
/// use scoped_config::prelude::*;
///
/// # async fn example() -> Result<()> {
/// let service = Service::builder()
///     .with_field(Field::new("web/unsecure/base_url")?.with_default("{{base_url}}"))
///     .with_store_website(4, 1)
///     .build()?;
///
/// let path: Path = "stores/4/web/unsecure/base_url".parse()?;
/// assert_eq!(service.get(&path).await?.as_str()?, "{{base_url}}");
///
/// service.set(&path.bind_website(1), "http://cs.io").await?;
/// assert_eq!(service.get(&path).await?.as_str()?, "http://cs.io");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Service {
    storage: Arc<dyn Storager>,
    observers: Arc<ObserverRegistry>,
    factories: Arc<ObserverFactories>,
    fields: Arc<FieldRegistry>,
    store_websites: Arc<HashMap<u32, u32>>,
    strict_fields: bool,
}

impl Service {
    /// Create a new builder for constructing a service.
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    pub(crate) fn from_parts(
        storage: Arc<dyn Storager>,
        observers: Arc<ObserverRegistry>,
        factories: Arc<ObserverFactories>,
        fields: Arc<FieldRegistry>,
        store_websites: HashMap<u32, u32>,
        strict_fields: bool,
    ) -> Self {
        Self {
            storage,
            observers,
            factories,
            fields,
            store_websites: Arc::new(store_websites),
            strict_fields,
        }
    }

    /// Read a value, falling back to less specific scopes and then to the
    /// declared default.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NotFound`] when nothing is stored and no default is declared
    /// - any error of a `before_get` or `after_get` observer
    /// - backend errors, which are never downgraded to a fallback scope
    pub async fn get(&self, path: &Path) -> Result<Value> {
        self.lookup(path)
            .await?
            .ok_or_else(|| ConfigError::NotFound(format!("no value for {}", path)))
    }

    /// Like [`Service::get`], but absence is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns observer and backend errors.
    pub async fn lookup(&self, path: &Path) -> Result<Option<Value>> {
        self.observers
            .dispatch(Event::BeforeGet, path, Vec::new(), false)?;

        let path = self.with_parent_website(path);
        for scope in path.fallback_scopes() {
            let candidate = path.bind_scope(scope);
            let Some(raw) = self.storage.get(&candidate).await? else {
                continue;
            };
            tracing::debug!(path = %path, resolved = %candidate, "config value found");
            let data = self
                .observers
                .dispatch(Event::AfterGet, &candidate, raw, true)?;
            return Ok(Some(Value::new(data, Origin::Stored(scope))));
        }

        let default = self.fields.default_for(path.route());
        if default.is_some() {
            tracing::debug!(path = %path, "using declared default");
        }
        Ok(default.map(|data| Value::new(data, Origin::Default)))
    }

    /// Write a value at exactly the path's scope.
    ///
    /// An `after_set` observer error is returned, but the value stays written.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::PermissionDenied`] when the field does not permit the scope
    /// - [`ConfigError::NotFound`] for undeclared routes when strict fields are on
    /// - any observer or backend error
    pub async fn set(&self, path: &Path, value: impl AsRef<[u8]>) -> Result<()> {
        self.check_permission(path)?;

        let data = self
            .observers
            .dispatch(Event::BeforeSet, path, value.as_ref().to_vec(), true)?;
        self.storage.set(path, &data).await?;
        tracing::debug!(path = %path, "config value written");

        if let Err(err) = self.observers.dispatch(Event::AfterSet, path, data, true) {
            tracing::warn!(path = %path, error = %err, "after_set observer failed, value is already written");
            return Err(err);
        }
        Ok(())
    }

    fn check_permission(&self, path: &Path) -> Result<()> {
        match self.fields.get(path.route()) {
            Some(field) if !field.permits(path.scope_type()) => {
                tracing::warn!(path = %path, "write to a scope the field does not permit");
                Err(ConfigError::PermissionDenied {
                    route: path.route().to_string(),
                    scope: path.scope_type().to_string(),
                })
            }
            Some(_) => Ok(()),
            None if self.strict_fields => Err(ConfigError::NotFound(format!(
                "field {} is not declared",
                path.route()
            ))),
            None => Ok(()),
        }
    }

    fn with_parent_website(&self, path: &Path) -> Path {
        match (path.scope_type(), path.website()) {
            (ScopeType::Store, None) => match self.store_websites.get(&path.scope_id()) {
                Some(&website) => path.clone().in_website(website),
                None => path.clone(),
            },
            _ => path.clone(),
        }
    }

    /// Append an observer for `(event, route)`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotValid`] for malformed routes.
    pub fn register_observer(
        &self,
        event: Event,
        route: &str,
        observer: Arc<dyn Observer>,
    ) -> Result<()> {
        self.observers.register(event, route, observer)
    }

    /// Remove the observers of `(event, route)`, returning how many were removed.
    pub fn deregister_observer(&self, event: Event, route: &str) -> usize {
        self.observers.deregister(event, route)
    }

    /// Register a declarative batch using this service's factories.
    ///
    /// # Errors
    ///
    /// Returns the first validation or construction error; nothing is
    /// registered in that case.
    pub fn register_configurations(&self, batch: &Configurations) -> Result<usize> {
        batch.register_observers(&self.observers, &self.factories)
    }

    /// Declare (or redeclare) a field.
    pub fn declare_field(&self, field: Field) {
        self.fields.insert(field);
    }

    /// The observer registry.
    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }

    /// The observer type registry.
    pub fn factories(&self) -> &ObserverFactories {
        &self.factories
    }

    /// The declared fields.
    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    /// The storage backend.
    pub fn storage(&self) -> &Arc<dyn Storager> {
        &self.storage
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("storage", &self.storage.name())
            .field("observers", &self.observers.len())
            .field("fields", &self.fields.len())
            .field("strict_fields", &self.strict_fields)
            .finish()
    }
}
