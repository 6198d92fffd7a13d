//! Observers: validation and modification hooks around reads and writes.
//!
//! An [`Observer`] is registered for an [`Event`] and a route prefix. When a
//! value under that prefix is read or written, the observers run in order and
//! may reject the value or replace it.
//!
//! Built-in observer types:
//! - [`ValidateData`] (`validator`): named predicates such as `int`, `url`, `locale`
//! - [`ModifyData`] (`modifier`): named transforms such as `trim`, `base64_encode`, `sha256`
//! - [`MinMaxInt`] (`ValidateMinMaxInt`): inclusive integer ranges
//!
//! Further types are added through [`ObserverFactories::register_factory`].

mod configuration;
mod factory;
mod iso;
mod minmax;
mod modifiers;
mod registry;
mod validators;

pub use configuration::{Configuration, Configurations};
pub use factory::{ObserverFactories, ObserverFactory, ObserverSpec};
pub use minmax::MinMaxInt;
pub use modifiers::{ModifierArg, ModifierFn, ModifierRegistry, ModifyData};
pub use registry::ObserverRegistry;
pub use validators::{ValidateData, ValidatorArg, ValidatorFn, ValidatorRegistry};

use crate::core::Path;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle point at which observers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// Before a value is written. Observers may reject or rewrite it.
    BeforeSet,
    /// After a value was written.
    AfterSet,
    /// Before storage is queried. Observers receive an empty payload.
    BeforeGet,
    /// After a stored value was found.
    AfterGet,
}

impl Event {
    /// All events.
    pub const ALL: [Event; 4] = [
        Event::BeforeSet,
        Event::AfterSet,
        Event::BeforeGet,
        Event::AfterGet,
    ];

    /// The snake case name used in declarative configurations.
    pub fn as_str(self) -> &'static str {
        match self {
            Event::BeforeSet => "before_set",
            Event::AfterSet => "after_set",
            Event::BeforeGet => "before_get",
            Event::AfterGet => "after_get",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Event::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| ConfigError::NotValid(format!("unknown observer event '{}'", s)))
    }
}

/// A hook invoked with a value at a lifecycle event.
///
/// Receives the payload by value and returns the (possibly replaced) payload.
/// `found` is false for `before_get`, where no value has been read yet.
///
/// One observer instance may be called concurrently for different paths, so
/// any state must be immutable after construction or synchronized.
///
/// Closures with the matching signature implement this trait:
///
/// ```rust
/// use scoped_config::core::Path;
/// use scoped_config::error::{ConfigError, Result};
/// use scoped_config::observer::{Event, ObserverRegistry};
/// use std::sync::Arc;
///
/// let registry = ObserverRegistry::new();
/// registry
///     .register(
///         Event::BeforeSet,
///         "web/cookie",
///         Arc::new(|_path: &Path, raw: Vec<u8>, _found: bool| -> Result<Vec<u8>> {
///             if raw.len() > 64 {
///                 return Err(ConfigError::NotValid("cookie setting too long".to_string()));
///             }
///             Ok(raw)
///         }),
///     )
///     .unwrap();
/// ```
pub trait Observer: Send + Sync {
    /// Inspect or transform a value.
    ///
    /// # Errors
    ///
    /// Any error aborts the surrounding read or write.
    fn observe(&self, path: &Path, raw: Vec<u8>, found: bool) -> Result<Vec<u8>>;
}

impl<F> Observer for F
where
    F: Fn(&Path, Vec<u8>, bool) -> Result<Vec<u8>> + Send + Sync,
{
    fn observe(&self, path: &Path, raw: Vec<u8>, found: bool) -> Result<Vec<u8>> {
        self(path, raw, found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_round_trip() {
        for event in Event::ALL {
            assert_eq!(event.as_str().parse::<Event>().unwrap(), event);
            assert_eq!(
                serde_json::to_string(&event).unwrap(),
                format!("\"{}\"", event)
            );
        }
        assert!("beforeSet".parse::<Event>().unwrap_err().is_not_valid());
    }

    #[test]
    fn test_event_indices_are_distinct() {
        let indices: Vec<usize> = Event::ALL.iter().map(|e| e.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }
}
