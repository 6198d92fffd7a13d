//! Composition of several backends into one.

use super::Storager;
use crate::core::Path;
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Presents several backends as one [`Storager`].
///
/// Writes fan out concurrently to every backend; reads try the backends in
/// order and return the first hit.
///
/// # Cancellation
///
/// Cancellation of writes is at most best effort. When the optional timeout fires
/// or a backend fails, the remaining workers receive a stop signal and abandon
/// their backend call at its next await point. A call that already completed
/// stays completed and nothing is rolled back, so a failed `set` may have
/// written to some of the backends.
///
/// # Examples
///
/// ```rust
/// use scoped_config::core::Path;
/// use scoped_config::storage::{LruStorage, MapStorage, Multi, Storager};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> scoped_config::error::Result<()> {
/// let multi = Multi::new(vec![
///     Arc::new(LruStorage::new(1000)?),
///     Arc::new(MapStorage::new()),
/// ])
/// .with_timeout(Duration::from_secs(2));
///
/// let path = Path::new("web/secure/base_url")?;
/// multi.set(&path, b"https://cs.io").await?;
/// assert!(multi.get(&path).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Multi {
    backends: Vec<Arc<dyn Storager>>,
    timeout: Option<Duration>,
}

impl Multi {
    /// Compose backends. Nested `Multi`s are flattened into a single list.
    ///
    /// A nested `Multi`'s write timeout is kept; with several, the shortest wins.
    pub fn new(backends: Vec<Arc<dyn Storager>>) -> Self {
        let mut flat = Vec::with_capacity(backends.len());
        let mut timeout = None;
        for backend in backends {
            match backend.as_multi() {
                Some(inner) => {
                    flat.extend(inner.backends.iter().cloned());
                    timeout = shortest(timeout, inner.timeout);
                }
                None => flat.push(backend),
            }
        }
        Self {
            backends: flat,
            timeout,
        }
    }

    /// Bound the total duration of a fan-out write.
    ///
    /// A shorter timeout inherited from a nested `Multi` stays in force.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = shortest(self.timeout, Some(timeout));
        self
    }

    /// The write timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The flattened backend list.
    pub fn backends(&self) -> &[Arc<dyn Storager>] {
        &self.backends
    }

    /// Number of backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backend is configured.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    fn wrap(index: usize, path: &Path, source: ConfigError) -> ConfigError {
        ConfigError::MultiBackend {
            index,
            path: path.to_string(),
            source: Box::new(source),
        }
    }
}

fn shortest(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[async_trait]
impl Storager for Multi {
    async fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        if self.backends.is_empty() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let value: Arc<[u8]> = Arc::from(value);
        let mut workers = JoinSet::new();

        for (index, backend) in self.backends.iter().enumerate() {
            let backend = Arc::clone(backend);
            let path = path.clone();
            let value = Arc::clone(&value);
            let mut stop = stop_rx.clone();
            workers.spawn(async move {
                let result = tokio::select! {
                    biased;
                    result = backend.set(&path, &value) => result,
                    _ = stop.changed() => {
                        Err(ConfigError::Canceled(path.to_string()))
                    }
                };
                (index, result)
            });
        }

        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut first_error: Option<ConfigError> = None;

        loop {
            let joined = match deadline {
                Some(deadline) if first_error.is_none() => {
                    match tokio::time::timeout_at(deadline, workers.join_next()).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            first_error = Some(ConfigError::Timeout {
                                operation: "set",
                                path: path.to_string(),
                                after: self.timeout.unwrap_or_default(),
                            });
                            stop_tx.send_replace(true);
                            continue;
                        }
                    }
                }
                _ => workers.join_next().await,
            };

            let Some(joined) = joined else { break };
            let error = match joined {
                Ok((_, Ok(()))) => continue,
                Ok((index, Err(err))) => Self::wrap(index, path, err),
                Err(join_err) => ConfigError::Other(format!("backend writer panicked: {}", join_err)),
            };

            if first_error.is_none() {
                tracing::warn!(path = %path, error = %error, "multi backend write failed, stopping remaining writers");
                first_error = Some(error);
                stop_tx.send_replace(true);
            } else {
                tracing::debug!(path = %path, error = %error, "multi backend writer stopped");
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn get(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        for (index, backend) in self.backends.iter().enumerate() {
            match backend.get(path).await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => continue,
                Err(err) => return Err(Self::wrap(index, path, err)),
            }
        }
        Ok(None)
    }

    fn name(&self) -> String {
        let names: Vec<String> = self.backends.iter().map(|b| b.name()).collect();
        format!("multi[{}]", names.join(","))
    }

    fn as_multi(&self) -> Option<&Multi> {
        Some(self)
    }
}
