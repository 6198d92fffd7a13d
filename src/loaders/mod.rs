//! Bulk import of configuration values into a storage backend.
//!
//! Both loaders collect their input through the `config` crate and write
//! straight to a [`Storager`](crate::storage::Storager), bypassing observers
//! and scope permissions.

mod env;
mod file;

pub use env::{EnvLoader, from_env_var, to_env_var};
pub use file::FileLoader;
