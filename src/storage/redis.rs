//! Redis-backed [`KvClient`] implementation.
//!
//! Values are stored as plain Redis strings under the key produced by
//! [`KvStorage::key`](super::KvStorage::key).

use super::kv::{KvClient, KvError, KvStorage};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

/// Redis storage: a [`KvStorage`] over a multiplexed connection.
pub type RedisStorage = KvStorage<RedisClient>;

/// Client over one multiplexed Redis connection shared by all callers.
#[derive(Clone)]
pub struct RedisClient {
    conn: MultiplexedConnection,
}

impl RedisClient {
    /// Connect to `url`, e.g. `redis://127.0.0.1/`.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| ConfigError::backend("redis", url, e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ConfigError::backend("redis", url, e))?;
        tracing::info!(url = %url, "connected to redis");
        Ok(Self { conn })
    }
}

fn map_error(err: redis::RedisError) -> KvError {
    if err.is_timeout() {
        KvError::DeadlineExceeded
    } else {
        KvError::Other(Box::new(err))
    }
}

#[async_trait]
impl KvClient for RedisClient {
    async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, KvError> {
        if key.is_empty() {
            return Err(KvError::EmptyKey);
        }
        let mut conn = self.conn.clone();
        conn.get::<_, Option<Vec<u8>>>(key).await.map_err(map_error)
    }

    async fn put(&self, key: &str, value: &[u8]) -> std::result::Result<(), KvError> {
        if key.is_empty() {
            return Err(KvError::EmptyKey);
        }
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(map_error)
    }

    fn name(&self) -> String {
        "redis".to_string()
    }
}
