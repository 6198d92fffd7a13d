//! Minimal field declarations: default values and permitted scopes per route.

use crate::core::path::validate_route;
use crate::core::scope::{ScopePerm, ScopeType};
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

/// A declared configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    route: String,
    default: Option<Vec<u8>>,
    scopes: ScopePerm,
}

impl Field {
    /// Declare a field writable at every scope, without default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotValid`](crate::error::ConfigError::NotValid) for malformed routes.
    pub fn new(route: &str) -> Result<Self> {
        validate_route(route)?;
        Ok(Self {
            route: route.to_string(),
            default: None,
            scopes: ScopePerm::all(),
        })
    }

    /// Set the value returned when nothing is stored at any scope.
    pub fn with_default(mut self, default: impl Into<Vec<u8>>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Restrict the scopes this field may be written at.
    pub fn with_scopes(mut self, scopes: ScopePerm) -> Self {
        self.scopes = scopes;
        self
    }

    /// The field's route.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// The declared default.
    pub fn default_value(&self) -> Option<&[u8]> {
        self.default.as_deref()
    }

    /// The permitted scopes.
    pub fn scopes(&self) -> ScopePerm {
        self.scopes
    }

    /// Whether the field may be written at `scope`.
    pub fn permits(&self, scope: ScopeType) -> bool {
        self.scopes.contains(scope)
    }
}

/// Thread-safe registry of declared fields keyed by route.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    fields: RwLock<HashMap<String, Field>>,
}

impl FieldRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field declaration.
    pub fn insert(&self, field: Field) {
        self.fields.write().insert(field.route.clone(), field);
    }

    /// Look up a field by route.
    pub fn get(&self, route: &str) -> Option<Field> {
        self.fields.read().get(route).cloned()
    }

    /// Declared default of a route.
    pub fn default_for(&self, route: &str) -> Option<Vec<u8>> {
        self.fields
            .read()
            .get(route)
            .and_then(|f| f.default.clone())
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    /// Whether no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }
}

impl FromIterator<Field> for FieldRegistry {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let registry = Self::new();
        for field in iter {
            registry.insert(field);
        }
        registry
    }
}
