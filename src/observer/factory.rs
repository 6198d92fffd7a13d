//! Resolution of observer type names and conditions into observers.

use super::{
    MinMaxInt, ModifierArg, ModifierRegistry, ModifyData, Observer, ValidateData, ValidatorArg,
    ValidatorRegistry,
};
use crate::error::{ConfigError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Constructor of a custom observer type from its raw JSON condition.
pub type ObserverFactory = Arc<dyn Fn(&[u8]) -> Result<Arc<dyn Observer>> + Send + Sync>;

/// An observer type together with its parsed condition.
///
/// Produced by [`ObserverFactories::resolve`] without side effects and turned
/// into an observer by [`ObserverFactories::build`].
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverSpec {
    /// `validator`
    Validator(ValidatorArg),
    /// `modifier`
    Modifier(ModifierArg),
    /// `ValidateMinMaxInt`
    MinMaxInt(MinMaxInt),
    /// A type registered with [`ObserverFactories::register_factory`].
    Custom {
        /// Registered type name
        type_name: String,
        /// Raw JSON condition passed to the factory
        condition: Vec<u8>,
    },
}

impl ObserverSpec {
    /// The type name as used in declarative configurations.
    pub fn type_name(&self) -> &str {
        match self {
            ObserverSpec::Validator(_) => ObserverFactories::VALIDATOR,
            ObserverSpec::Modifier(_) => ObserverFactories::MODIFIER,
            ObserverSpec::MinMaxInt(_) => ObserverFactories::MIN_MAX_INT,
            ObserverSpec::Custom { type_name, .. } => type_name,
        }
    }
}

/// Registry of observer types: the validator and modifier function registries
/// plus custom observer factories.
///
/// Create one per service (or share one through an `Arc`); nothing here is global.
///
/// # Examples
///
/// ```rust
/// use scoped_config::observer::{ObserverFactories, ObserverSpec};
///
/// let factories = ObserverFactories::new();
/// factories.validators().register("even", |raw: &[u8]| {
///     std::str::from_utf8(raw)
///         .ok()
///         .and_then(|s| s.parse::<i64>().ok())
///         .is_some_and(|n| n % 2 == 0)
/// });
///
/// let spec = factories.resolve("validator", br#"{"funcs":["even"]}"#).unwrap();
/// assert!(matches!(spec, ObserverSpec::Validator(_)));
/// let observer = factories.build(&spec).unwrap();
/// ```
pub struct ObserverFactories {
    validators: ValidatorRegistry,
    modifiers: ModifierRegistry,
    custom: RwLock<HashMap<String, ObserverFactory>>,
}

impl ObserverFactories {
    /// Type name of [`ValidateData`] observers.
    pub const VALIDATOR: &'static str = "validator";
    /// Type name of [`ModifyData`] observers.
    pub const MODIFIER: &'static str = "modifier";
    /// Type name of [`MinMaxInt`] observers.
    pub const MIN_MAX_INT: &'static str = "ValidateMinMaxInt";

    /// Create factories with the built-in validators and modifiers.
    pub fn new() -> Self {
        Self {
            validators: ValidatorRegistry::new(),
            modifiers: ModifierRegistry::new(),
            custom: RwLock::new(HashMap::new()),
        }
    }

    /// Validator predicates available to `validator` observers.
    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    /// Modifier functions available to `modifier` observers.
    pub fn modifiers(&self) -> &ModifierRegistry {
        &self.modifiers
    }

    /// Register a custom observer type. Last registration wins.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotValid`] when `type_name` is empty or names a
    /// built-in type.
    pub fn register_factory<F>(&self, type_name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&[u8]) -> Result<Arc<dyn Observer>> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if type_name.is_empty() || Self::is_builtin(&type_name) {
            return Err(ConfigError::NotValid(format!(
                "observer type name '{}' is reserved",
                type_name
            )));
        }
        if self
            .custom
            .write()
            .insert(type_name.clone(), Arc::new(factory))
            .is_some()
        {
            tracing::debug!(type_name = %type_name, "replaced observer factory");
        }
        Ok(())
    }

    /// Whether `type_name` resolves to a built-in or custom type.
    pub fn has_type(&self, type_name: &str) -> bool {
        Self::is_builtin(type_name) || self.custom.read().contains_key(type_name)
    }

    fn is_builtin(type_name: &str) -> bool {
        matches!(
            type_name,
            Self::VALIDATOR | Self::MODIFIER | Self::MIN_MAX_INT
        )
    }

    /// Parse and check a condition without constructing anything.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Empty`] for an empty condition
    /// - [`ConfigError::NotSupported`] for unknown types and function names
    /// - [`ConfigError::NotValid`] for malformed conditions
    /// - [`ConfigError::NotAcceptable`] for unusable min/max ranges
    pub fn resolve(&self, type_name: &str, condition: &[u8]) -> Result<ObserverSpec> {
        if condition.iter().all(u8::is_ascii_whitespace) {
            return Err(ConfigError::Empty(format!(
                "condition of observer type '{}'",
                type_name
            )));
        }
        let malformed =
            |e: serde_json::Error| ConfigError::NotValid(format!("{} condition: {}", type_name, e));

        match type_name {
            Self::VALIDATOR => {
                let arg: ValidatorArg = serde_json::from_slice(condition).map_err(malformed)?;
                self.validators.check_names(&arg.funcs)?;
                Ok(ObserverSpec::Validator(arg))
            }
            Self::MODIFIER => {
                let arg: ModifierArg = serde_json::from_slice(condition).map_err(malformed)?;
                self.modifiers.check_names(&arg.funcs)?;
                Ok(ObserverSpec::Modifier(arg))
            }
            Self::MIN_MAX_INT => {
                // Surface NotAcceptable from the range checks instead of a serde error.
                let raw: serde_json::Value =
                    serde_json::from_slice(condition).map_err(malformed)?;
                let conditions: Vec<i64> = raw
                    .get("conditions")
                    .cloned()
                    .map(serde_json::from_value)
                    .transpose()
                    .map_err(malformed)?
                    .unwrap_or_default();
                let partial = raw
                    .get("partial_validation")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                Ok(ObserverSpec::MinMaxInt(MinMaxInt::new(&conditions, partial)?))
            }
            custom if self.custom.read().contains_key(custom) => Ok(ObserverSpec::Custom {
                type_name: custom.to_string(),
                condition: condition.to_vec(),
            }),
            unknown => Err(ConfigError::NotSupported(format!(
                "observer type '{}'",
                unknown
            ))),
        }
    }

    /// Construct the observer described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns the construction error of the observer type or custom factory.
    pub fn build(&self, spec: &ObserverSpec) -> Result<Arc<dyn Observer>> {
        match spec {
            ObserverSpec::Validator(arg) => {
                Ok(Arc::new(ValidateData::new(arg.clone(), &self.validators)?))
            }
            ObserverSpec::Modifier(arg) => {
                Ok(Arc::new(ModifyData::new(arg.clone(), &self.modifiers)?))
            }
            ObserverSpec::MinMaxInt(check) => Ok(Arc::new(check.clone())),
            ObserverSpec::Custom {
                type_name,
                condition,
            } => {
                let factory = self.custom.read().get(type_name).cloned().ok_or_else(|| {
                    ConfigError::NotSupported(format!("observer type '{}'", type_name))
                })?;
                factory(condition.as_slice())
            }
        }
    }
}

impl Default for ObserverFactories {
    fn default() -> Self {
        Self::new()
    }
}
