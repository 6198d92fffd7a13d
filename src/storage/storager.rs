//! Storage backend trait.

use crate::core::Path;
use crate::error::Result;
use crate::storage::Multi;
use async_trait::async_trait;

/// Trait for configuration storage backends.
///
/// Implement this trait to plug a key/value store (memory, database, external KV)
/// into the configuration service. Entries are addressed by the path's scope and
/// route, see [`Path::scope_route`].
///
/// `get` returns `Ok(None)` when the key is absent. An `Err` always signals a
/// backend fault (I/O, connection, serialization) and must never stand in for
/// absence.
#[async_trait]
pub trait Storager: Send + Sync {
    /// Write a value at exactly the path's scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot persist the value.
    async fn set(&self, path: &Path, value: &[u8]) -> Result<()>;

    /// Read the value stored at exactly the path's scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    async fn get(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Get a human-readable name for this backend (for logging/debugging).
    fn name(&self) -> String;

    /// Downcast hook used by [`Multi`] to flatten nested composers.
    fn as_multi(&self) -> Option<&Multi> {
        None
    }
}
