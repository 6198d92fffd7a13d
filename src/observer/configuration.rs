//! Declarative observer registration.
//!
//! A batch looks like this:
//!
//! ```json
//! {
//!   "collection": [
//!     {"route": "general/locale/code", "event": "before_set", "type": "validator",
//!      "condition": {"funcs": ["locale"]}},
//!     {"route": "catalog/frontend", "event": "before_set", "type": "ValidateMinMaxInt",
//!      "condition": {"conditions": [1, 100]}}
//!   ]
//! }
//! ```

use super::{Event, ObserverFactories, ObserverRegistry, ObserverSpec};
use crate::core::validate_route;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;

/// One observer declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Route prefix with at least two segments.
    pub route: String,
    /// Event name, e.g. `before_set`.
    pub event: String,
    /// Observer type name, e.g. `validator`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Type-specific condition.
    #[serde(default)]
    pub condition: serde_json::Value,
}

impl Configuration {
    /// Create a declaration.
    pub fn new(
        route: impl Into<String>,
        event: Event,
        type_name: impl Into<String>,
        condition: serde_json::Value,
    ) -> Self {
        Self {
            route: route.into(),
            event: event.as_str().to_string(),
            type_name: type_name.into(),
            condition,
        }
    }

    /// Check the declaration and parse its condition, without side effects.
    ///
    /// # Errors
    ///
    /// Returns the first problem with the route, event, condition or type.
    pub fn validate(&self, factories: &ObserverFactories) -> Result<(Event, ObserverSpec)> {
        validate_route(&self.route)?;
        let event: Event = self.event.parse()?;
        let condition = match &self.condition {
            serde_json::Value::Null => Vec::new(),
            value => serde_json::to_vec(value)
                .map_err(|e| ConfigError::NotValid(format!("condition: {}", e)))?,
        };
        let spec = factories.resolve(&self.type_name, &condition)?;
        Ok((event, spec))
    }
}

/// A batch of observer declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configurations {
    /// The declarations, registered in order.
    pub collection: Vec<Configuration>,
}

impl Configurations {
    /// Create a batch.
    pub fn new(collection: Vec<Configuration>) -> Self {
        Self { collection }
    }

    /// Parse a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DeserializationError`] for malformed payloads.
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| {
            ConfigError::DeserializationError(format!("observer configuration: {}", e))
        })
    }

    /// Parse a YAML payload.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DeserializationError`] for malformed payloads.
    #[cfg(feature = "yaml")]
    pub fn from_yaml(payload: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(payload).map_err(|e| {
            ConfigError::DeserializationError(format!("observer configuration: {}", e))
        })
    }

    /// Read a `.json` (or, with the `yaml` feature, `.yaml`/`.yml`) file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unsupported
    /// extension or does not parse.
    pub fn from_file(path: impl AsRef<FsPath>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        let payload = std::fs::read(path)?;
        match extension {
            "json" => Self::from_json(&payload),
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Self::from_yaml(&payload),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported observer configuration file: {}",
                path.display()
            ))),
        }
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.collection.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Validate, build and register every declaration.
    ///
    /// Nothing is registered unless every declaration validates and every
    /// observer could be constructed.
    ///
    /// # Errors
    ///
    /// Returns the first validation or construction error.
    pub fn register_observers(
        &self,
        registry: &ObserverRegistry,
        factories: &ObserverFactories,
    ) -> Result<usize> {
        let specs = self
            .collection
            .iter()
            .enumerate()
            .map(|(index, config)| {
                config.validate(factories).inspect_err(|err| {
                    tracing::warn!(index, route = %config.route, error = %err, "rejected observer configuration");
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let observers = specs
            .iter()
            .map(|(_, spec)| factories.build(spec))
            .collect::<Result<Vec<_>>>()?;

        for (config, ((event, _), observer)) in self.collection.iter().zip(specs.into_iter().zip(observers)) {
            registry.register(event, &config.route, observer)?;
        }
        tracing::info!(count = self.collection.len(), "registered observer configurations");
        Ok(self.collection.len())
    }

    /// Remove the observers of every `(event, route)` in the batch.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotValid`] for unknown event names; nothing is
    /// removed in that case.
    pub fn deregister_observers(&self, registry: &ObserverRegistry) -> Result<usize> {
        let keys = self
            .collection
            .iter()
            .map(|config| Ok((config.event.parse::<Event>()?, config.route.as_str())))
            .collect::<Result<Vec<_>>>()?;
        Ok(keys
            .into_iter()
            .map(|(event, route)| registry.deregister(event, route))
            .sum())
    }
}
