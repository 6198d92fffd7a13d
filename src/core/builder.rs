//! Builder for constructing Service instances.

use crate::core::{Field, FieldRegistry, Service};
use crate::error::Result;
use crate::observer::{Configurations, ObserverFactories, ObserverRegistry};
use crate::storage::{MapStorage, Multi, Storager};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Builder for constructing a [`Service`].
///
/// Without any storage the service keeps values in a [`MapStorage`].
///
/// # Examples
///
/// ```rust
/// use scoped_config::prelude::*;
/// use scoped_config::storage::{LruStorage, MapStorage};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<()> {
/// let service = Service::builder()
///     .with_backends(vec![
///         Arc::new(LruStorage::new(10_000)?),
///         Arc::new(MapStorage::new()),
///     ])
///     .with_write_timeout(Duration::from_secs(2))
///     .with_field(Field::new("web/secure/use_in_frontend")?.with_default("0"))
///     .with_store_website(1, 1)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ServiceBuilder {
    storage: Option<Arc<dyn Storager>>,
    backends: Vec<Arc<dyn Storager>>,
    write_timeout: Option<Duration>,
    observers: Option<Arc<ObserverRegistry>>,
    factories: Option<Arc<ObserverFactories>>,
    configurations: Vec<Configurations>,
    fields: Vec<Field>,
    store_websites: HashMap<u32, u32>,
    strict_fields: bool,
}

impl ServiceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            storage: None,
            backends: Vec::new(),
            write_timeout: None,
            observers: None,
            factories: None,
            configurations: Vec::new(),
            fields: Vec::new(),
            store_websites: HashMap::new(),
            strict_fields: false,
        }
    }

    /// Use a storage backend.
    pub fn with_storage<S: Storager + 'static>(self, storage: S) -> Self {
        self.with_shared_storage(Arc::new(storage))
    }

    /// Use a storage backend that is also held elsewhere.
    pub fn with_shared_storage(mut self, storage: Arc<dyn Storager>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Compose backends into a [`Multi`]: writes go to all of them, reads
    /// return the first hit in order.
    ///
    /// A storage set with [`ServiceBuilder::with_storage`] comes first.
    pub fn with_backends(mut self, backends: Vec<Arc<dyn Storager>>) -> Self {
        self.backends.extend(backends);
        self
    }

    /// Bound fan-out writes. Applies to the composed backends.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Share an observer registry with other services.
    pub fn with_observers(mut self, observers: Arc<ObserverRegistry>) -> Self {
        self.observers = Some(observers);
        self
    }

    /// Use an observer type registry, e.g. one with custom validators.
    pub fn with_factories(mut self, factories: Arc<ObserverFactories>) -> Self {
        self.factories = Some(factories);
        self
    }

    /// Register a declarative observer batch during [`ServiceBuilder::build`].
    pub fn with_observer_configurations(mut self, batch: Configurations) -> Self {
        self.configurations.push(batch);
        self
    }

    /// Declare a field.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare several fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Record that `store` belongs to `website`, enabling store → website fallback
    /// for store paths that do not carry their website.
    pub fn with_store_website(mut self, store: u32, website: u32) -> Self {
        self.store_websites.insert(store, website);
        self
    }

    /// Reject writes to undeclared routes.
    pub fn with_strict_fields(mut self, strict: bool) -> Self {
        self.strict_fields = strict;
        self
    }

    /// Build the service.
    ///
    /// # Errors
    ///
    /// Returns an error if a declarative observer batch does not validate.
    pub fn build(self) -> Result<Service> {
        let mut backends: Vec<Arc<dyn Storager>> = self.storage.into_iter().collect();
        backends.extend(self.backends);

        let storage: Arc<dyn Storager> = match (backends.len(), self.write_timeout) {
            (0, _) => Arc::new(MapStorage::new()),
            (1, None) => backends.remove(0),
            (_, timeout) => {
                let multi = Multi::new(backends);
                match timeout {
                    Some(timeout) => Arc::new(multi.with_timeout(timeout)),
                    None => Arc::new(multi),
                }
            }
        };

        let observers = self.observers.unwrap_or_default();
        let factories = self.factories.unwrap_or_default();
        for batch in &self.configurations {
            batch.register_observers(&observers, &factories)?;
        }

        let fields: FieldRegistry = self.fields.into_iter().collect();
        tracing::debug!(
            storage = %storage.name(),
            fields = fields.len(),
            observers = observers.len(),
            "built config service"
        );

        Ok(Service::from_parts(
            storage,
            observers,
            factories,
            Arc::new(fields),
            self.store_websites,
            self.strict_fields,
        ))
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Path;
    use crate::observer::{Configuration, Event};
    use crate::storage::LruStorage;

    #[test]
    fn test_default_storage_is_map() {
        let service = ServiceBuilder::new().build().unwrap();
        assert_eq!(service.storage().name(), "map");
    }

    #[test]
    fn test_backends_compose_into_multi() {
        let service = Service::builder()
            .with_storage(LruStorage::new(8).unwrap())
            .with_backends(vec![Arc::new(MapStorage::new())])
            .build()
            .unwrap();
        assert_eq!(service.storage().name(), "multi[lru:8,map]");

        let single = Service::builder()
            .with_storage(MapStorage::new())
            .with_write_timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        assert_eq!(single.storage().name(), "multi[map]");
    }

    #[test]
    fn test_observer_configurations_registered_on_build() {
        let shared = Arc::new(ObserverRegistry::new());
        let batch = Configurations::new(vec![Configuration::new(
            "web/unsecure",
            Event::BeforeSet,
            "modifier",
            serde_json::json!({"funcs": ["trim"]}),
        )]);

        let service = Service::builder()
            .with_observers(Arc::clone(&shared))
            .with_observer_configurations(batch)
            .build()
            .unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(service.observers().len(), 1);

        let bad = Configurations::new(vec![Configuration::new(
            "web/unsecure",
            Event::BeforeSet,
            "nope",
            serde_json::json!({"a": 1}),
        )]);
        assert!(Service::builder().with_observer_configurations(bad).build().is_err());
    }

    #[tokio::test]
    async fn test_fields_declared() {
        let service = Service::builder()
            .with_fields(vec![
                Field::new("aa/bb/cc").unwrap().with_default("1"),
                Field::new("aa/bb/dd").unwrap(),
            ])
            .build()
            .unwrap();
        assert_eq!(service.fields().len(), 2);
        let value = service.get(&Path::new("aa/bb/cc").unwrap()).await.unwrap();
        assert!(value.as_bool().unwrap());
    }
}
