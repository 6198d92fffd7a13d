//! Storage backend implementations.

mod kv;
mod lru;
mod map;
mod multi;
mod storager;

#[cfg(feature = "sqlite")]
mod database;

#[cfg(feature = "redis")]
mod redis;

pub use kv::{KvClient, KvError, KvStorage};
pub use lru::LruStorage;
pub use map::MapStorage;
pub use multi::Multi;
pub use storager::Storager;

#[cfg(feature = "sqlite")]
pub use database::{DatabaseStorage, DatabaseStorageBuilder, StatementKind};

#[cfg(feature = "redis")]
pub use self::redis::{RedisClient, RedisStorage};
