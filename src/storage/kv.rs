//! External key/value store backends (etcd, Redis, ...).

use super::Storager;
use crate::core::Path;
use crate::error::{BoxError, ConfigError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Errors reported by a [`KvClient`].
///
/// `EmptyKey`, `Canceled` and `DeadlineExceeded` mean "the key could not be
/// seen" and read paths translate them into absence.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// The store reported an empty or missing key.
    #[error("empty key")]
    EmptyKey,

    /// The request was canceled.
    #[error("request canceled")]
    Canceled,

    /// The request deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Any other client failure.
    #[error(transparent)]
    Other(BoxError),
}

impl KvError {
    /// Whether a read failing with this error should be treated as "not found".
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::EmptyKey | Self::Canceled | Self::DeadlineExceeded)
    }
}

/// Minimal client of an external key/value store.
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Read a key. `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, KvError>;

    /// Write a key.
    async fn put(&self, key: &str, value: &[u8]) -> std::result::Result<(), KvError>;

    /// Name of the store for logging.
    fn name(&self) -> String;
}

/// [`Storager`] over a [`KvClient`].
///
/// Keys are the fully-qualified path behind an optional prefix, e.g.
/// `shop/stores/4/web/unsecure/base_url`.
pub struct KvStorage<C> {
    client: C,
    prefix: String,
    timeout: Duration,
}

impl<C: KvClient> KvStorage<C> {
    /// Wrap a client with an empty key prefix and a 5 second operation timeout.
    pub fn new(client: C) -> Self {
        Self {
            client,
            prefix: String::new(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Prefix every key, e.g. with an application namespace.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Bound each read and write.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The wrapped client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The key a path is stored under.
    pub fn key(&self, path: &Path) -> String {
        format!("{}{}", self.prefix, path)
    }
}

#[async_trait]
impl<C: KvClient> Storager for KvStorage<C> {
    async fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        let key = self.key(path);
        match tokio::time::timeout(self.timeout, self.client.put(&key, value)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ConfigError::backend(self.client.name(), path, err)),
            Err(_) => Err(ConfigError::Timeout {
                operation: "set",
                path: path.to_string(),
                after: self.timeout,
            }),
        }
    }

    async fn get(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let key = self.key(path);
        match tokio::time::timeout(self.timeout, self.client.get(&key)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) if err.is_absent() => {
                tracing::debug!(backend = %self.client.name(), key = %key, reason = %err, "treating key as absent");
                Ok(None)
            }
            Ok(Err(err)) => Err(ConfigError::backend(self.client.name(), path, err)),
            Err(_) => {
                tracing::debug!(backend = %self.client.name(), key = %key, "read deadline passed, treating key as absent");
                Ok(None)
            }
        }
    }

    fn name(&self) -> String {
        format!("kv:{}", self.client.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryKv {
        data: Mutex<HashMap<String, Vec<u8>>>,
        fail_with: Mutex<Option<fn() -> KvError>>,
        stall: bool,
    }

    #[async_trait]
    impl KvClient for MemoryKv {
        async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, KvError> {
            if self.stall {
                std::future::pending::<()>().await;
            }
            if let Some(make) = *self.fail_with.lock() {
                return Err(make());
            }
            Ok(self.data.lock().get(key).cloned())
        }

        async fn put(&self, key: &str, value: &[u8]) -> std::result::Result<(), KvError> {
            if self.stall {
                std::future::pending::<()>().await;
            }
            if let Some(make) = *self.fail_with.lock() {
                return Err(make());
            }
            self.data.lock().insert(key.to_string(), value.to_vec());
            Ok(())
        }

        fn name(&self) -> String {
            "memory".to_string()
        }
    }

    fn path() -> Path {
        Path::parse("stores/4/web/unsecure/base_url").unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_with_prefix() {
        let storage = KvStorage::new(MemoryKv::default()).with_prefix("shop/");
        storage.set(&path(), b"http://cs.io").await.unwrap();
        assert!(
            storage
                .client()
                .data
                .lock()
                .contains_key("shop/stores/4/web/unsecure/base_url")
        );
        assert_eq!(
            storage.get(&path()).await.unwrap(),
            Some(b"http://cs.io".to_vec())
        );
        assert_eq!(storage.get(&path().bind_store(5)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_absent_errors_translate_to_none() {
        for make in [
            (|| KvError::EmptyKey) as fn() -> KvError,
            || KvError::Canceled,
            || KvError::DeadlineExceeded,
        ] {
            let client = MemoryKv::default();
            *client.fail_with.lock() = Some(make);
            let storage = KvStorage::new(client);
            assert_eq!(storage.get(&path()).await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_other_errors_propagate() {
        let client = MemoryKv::default();
        *client.fail_with.lock() = Some(|| KvError::Other("connection reset".into()));
        let storage = KvStorage::new(client);

        let err = storage.get(&path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Backend { ref backend, .. } if backend == "memory"));
        assert!(storage.set(&path(), b"v").await.is_err());
    }

    #[tokio::test]
    async fn test_write_errors_are_never_absence() {
        let client = MemoryKv::default();
        *client.fail_with.lock() = Some(|| KvError::DeadlineExceeded);
        let storage = KvStorage::new(client);
        assert!(storage.set(&path(), b"v").await.is_err());
    }

    #[tokio::test]
    async fn test_timeouts() {
        let client = MemoryKv {
            stall: true,
            ..Default::default()
        };
        let storage = KvStorage::new(client).with_timeout(Duration::from_millis(10));
        assert_eq!(storage.get(&path()).await.unwrap(), None);
        assert!(storage.set(&path(), b"v").await.unwrap_err().is_timeout());
    }
}
