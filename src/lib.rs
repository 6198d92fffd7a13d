//! # scoped-config
//!
//! Scope-resolving configuration store with pluggable storage backends and an
//! observer pipeline that validates and rewrites values on their way in and out.
//!
//! ## Overview
//!
//! Every value lives at a [`Path`](core::Path): a route such as
//! `web/unsecure/base_url` bound to a scope (`default`, a website or a store).
//! `scoped-config` combines:
//! - Fallback reads from store to website to default, then to declared defaults
//! - Per-field scope permissions on writes
//! - Observers for `before_set`, `after_set`, `before_get` and `after_get`,
//!   registered by route prefix in code or from JSON/YAML batches
//! - Backends behind one async [`Storager`](storage::Storager) trait: in-memory
//!   map, LRU cache, SQL database, Redis, and a fan-out composer
//! - Import from environment variables and YAML/TOML/JSON files
//!
//! ## Quick Start
//!
//! ```rust
//! use scoped_config::prelude::*;
//! use scoped_config::observer::{Configuration, Configurations, Event};
//!
//! # async fn example() -> Result<()> {
//! let service = Service::builder()
//!     .with_field(Field::new("catalog/frontend/grid_per_page")?.with_default("12"))
//!     .with_store_website(1, 1)
//!     .with_observer_configurations(Configurations::new(vec![Configuration::new(
//!         "catalog/frontend",
//!         Event::BeforeSet,
//!         "ValidateMinMaxInt",
//!         serde_json::json!({"conditions": [1, 100]}),
//!     )]))
//!     .build()?;
//!
//! let path: Path = "stores/1/catalog/frontend/grid_per_page".parse()?;
//! assert_eq!(service.get(&path).await?.as_i64()?, 12);
//!
//! service.set(&path.bind_website(1), "24").await?;
//! assert_eq!(service.get(&path).await?.as_i64()?, 24);
//! assert!(service.set(&path, "500").await.is_err());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `yaml` (default): YAML observer batches
//! - `sqlite`: [`DatabaseStorage`](storage::DatabaseStorage) on `sqlx`
//! - `redis`: [`RedisStorage`](storage::RedisStorage)
//! - `all-backends`: both backends

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod loaders;
pub mod observer;
pub mod storage;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{Field, Path, ScopePerm, ScopeType, Service, ServiceBuilder, Value};
    pub use crate::error::{ConfigError, Result, ValidationError};
    pub use crate::observer::{Event, Observer};
    pub use crate::storage::Storager;
}
