//! In-memory hash map backend.

use super::Storager;
use crate::core::{Path, ScopeTypeID};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

type Entries = HashMap<ScopeTypeID, HashMap<String, Vec<u8>>>;

/// Unbounded in-memory backend.
///
/// Entries are grouped by scope first so that reads look up the route by `&str`
/// without allocating.
///
/// # Examples
///
/// ```rust
/// use scoped_config::core::Path;
/// use scoped_config::storage::{MapStorage, Storager};
///
/// # async fn example() -> scoped_config::error::Result<()> {
/// let storage = MapStorage::new();
/// let path = Path::new("web/unsecure/base_url")?.bind_store(4);
/// storage.set(&path, b"http://cs.io").await?;
/// assert_eq!(storage.get(&path).await?, Some(b"http://cs.io".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MapStorage {
    entries: RwLock<Entries>,
}

impl MapStorage {
    /// Create an empty map backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all entries.
    pub fn flush(&self) {
        self.entries.write().clear();
    }

    /// All stored paths, sorted by scope and route.
    pub fn keys(&self) -> Vec<Path> {
        let entries = self.entries.read();
        let mut keys: Vec<Path> = entries
            .iter()
            .flat_map(|(scope, routes)| {
                routes
                    .keys()
                    .filter_map(move |route| Path::from_scope_route(*scope, route).ok())
            })
            .collect();
        keys.sort();
        keys
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(HashMap::len).sum()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_sync(&self, path: &Path, value: &[u8]) {
        let (scope, route) = path.scope_route();
        let mut entries = self.entries.write();
        let routes = entries.entry(scope).or_default();
        match routes.get_mut(route) {
            Some(existing) => {
                existing.clear();
                existing.extend_from_slice(value);
            }
            None => {
                routes.insert(route.to_string(), value.to_vec());
            }
        }
    }

    fn get_sync(&self, path: &Path) -> Option<Vec<u8>> {
        let (scope, route) = path.scope_route();
        self.entries
            .read()
            .get(&scope)
            .and_then(|routes| routes.get(route))
            .cloned()
    }
}

#[async_trait]
impl Storager for MapStorage {
    async fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        self.set_sync(path, value);
        Ok(())
    }

    async fn get(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self.get_sync(path))
    }

    fn name(&self) -> String {
        "map".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_set_get_scoped() {
        let storage = MapStorage::new();
        storage
            .set(&path("stores/4/aa/bb/cc"), b"store")
            .await
            .unwrap();
        storage.set(&path("aa/bb/cc"), b"default").await.unwrap();

        assert_eq!(
            storage.get(&path("stores/4/aa/bb/cc")).await.unwrap(),
            Some(b"store".to_vec())
        );
        assert_eq!(
            storage.get(&path("aa/bb/cc")).await.unwrap(),
            Some(b"default".to_vec())
        );
        assert_eq!(storage.get(&path("stores/5/aa/bb/cc")).await.unwrap(), None);
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let storage = MapStorage::new();
        let p = path("aa/bb/cc");
        storage.set(&p, b"one").await.unwrap();
        storage.set(&p, b"two").await.unwrap();
        assert_eq!(storage.get(&p).await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_and_flush() {
        let storage = MapStorage::new();
        storage.set(&path("websites/1/aa/bb/cc"), b"w").await.unwrap();
        storage.set(&path("aa/bb/dd"), b"d").await.unwrap();
        storage.set(&path("aa/bb/cc"), b"d").await.unwrap();

        let keys: Vec<String> = storage.keys().iter().map(Path::to_string).collect();
        assert_eq!(
            keys,
            vec![
                "default/0/aa/bb/cc",
                "default/0/aa/bb/dd",
                "websites/1/aa/bb/cc"
            ]
        );

        storage.flush();
        assert!(storage.is_empty());
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let storage = Arc::new(MapStorage::new());
        let mut handles = Vec::new();
        for i in 0..16u32 {
            let storage = Arc::clone(&storage);
            handles.push(tokio::spawn(async move {
                let p = Path::new("aa/bb/cc").unwrap().bind_store(i);
                storage.set(&p, i.to_string().as_bytes()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(storage.len(), 16);
    }
}
