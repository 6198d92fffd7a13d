//! Bulk import from YAML, TOML or JSON files.

use crate::core::{Path, SEPARATOR, ScopeType};
use crate::error::{ConfigError, Result};
use crate::storage::Storager;
use config::{File, Map, Value, ValueKind};
use std::collections::HashMap;
use std::path::PathBuf;

/// Imports a configuration file into a storage backend.
///
/// The file nests routes below their scope:
///
/// ```yaml
/// default:
///   web:
///     unsecure:
///       base_url: http://cs.io
/// websites:
///   "2":
///     general:
///       locale:
///         code: de_CH
/// stores:
///   "4":
///     catalog:
///       frontend:
///         list_allow_all: true
///         grid_per_page_values: [9, 15, 30]
/// ```
///
/// Booleans import as `1` and `0`, arrays as comma-joined values and nulls as
/// empty values.
///
/// # Examples
///
/// ```rust,no_run
/// use scoped_config::loaders::FileLoader;
/// use scoped_config::storage::MapStorage;
///
/// # async fn example() -> scoped_config::error::Result<()> {
/// let storage = MapStorage::new();
/// let written = FileLoader::new("config/store.yaml").load(&storage).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileLoader {
    path: PathBuf,
}

impl FileLoader {
    /// Create a loader for `path`. The format follows the file extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Validate that the file extension is supported.
    fn validate_extension(&self) -> Result<()> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ConfigError::LoadError(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })?;

        match extension {
            "yaml" | "yml" | "toml" | "json" => Ok(()),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
                extension
            ))),
        }
    }

    /// Read the file and flatten it into `(path, value)` pairs, ordered by path.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::LoadError`] if the file is missing, unreadable or has an
    ///   unsupported extension
    /// - [`ConfigError::NotValid`] for unknown top-level keys, bad scope IDs,
    ///   malformed routes and nested arrays
    pub fn entries(&self) -> Result<Vec<(Path, String)>> {
        self.validate_extension()?;
        if !self.path.exists() {
            return Err(ConfigError::LoadError(format!(
                "Configuration file not found: {}",
                self.path.display()
            )));
        }

        let document = config::Config::builder()
            .add_source(File::from(self.path.clone()).required(true))
            .build()
            .map_err(|e| ConfigError::LoadError(format!("Failed to load file: {}", e)))?
            .try_deserialize::<HashMap<String, Value>>()
            .map_err(|e| {
                ConfigError::DeserializationError(format!("Failed to parse file: {}", e))
            })?;

        let mut entries = Vec::new();
        for (key, value) in document {
            match ScopeType::from_literal(&key) {
                Some(ScopeType::Default) => {
                    flatten(ScopeType::Default, 0, String::new(), value, &mut entries)?
                }
                Some(scope) => {
                    for (id, tree) in table(value, &key)? {
                        let id = id.parse::<u32>().map_err(|_| {
                            ConfigError::NotValid(format!("{}: invalid scope ID '{}'", key, id))
                        })?;
                        flatten(scope, id, String::new(), tree, &mut entries)?;
                    }
                }
                None => {
                    return Err(ConfigError::NotValid(format!(
                        "unknown top-level key '{}', expected default, websites or stores",
                        key
                    )));
                }
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// Write every entry to `storage`, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns the first read or storage error. Entries written before the
    /// failure stay written.
    pub async fn load(&self, storage: &dyn Storager) -> Result<usize> {
        let entries = self.entries()?;
        for (path, value) in &entries {
            storage.set(path, value.as_bytes()).await?;
        }
        tracing::info!(
            file = %self.path.display(),
            count = entries.len(),
            backend = %storage.name(),
            "imported configuration file"
        );
        Ok(entries.len())
    }
}

fn table(value: Value, at: &str) -> Result<Map<String, Value>> {
    match value.kind {
        ValueKind::Table(table) => Ok(table),
        _ => Err(ConfigError::NotValid(format!("expected a table at '{}'", at))),
    }
}

fn flatten(
    scope: ScopeType,
    id: u32,
    route: String,
    value: Value,
    out: &mut Vec<(Path, String)>,
) -> Result<()> {
    match value.kind {
        ValueKind::Table(children) => {
            for (segment, child) in children {
                let child_route = if route.is_empty() {
                    segment
                } else {
                    format!("{}{}{}", route, SEPARATOR, segment)
                };
                flatten(scope, id, child_route, child, out)?;
            }
            Ok(())
        }
        ValueKind::Array(items) => {
            let items = items
                .into_iter()
                .map(|item| scalar(item.kind, &route))
                .collect::<Result<Vec<_>>>()?;
            out.push((Path::new(&route)?.bind(scope, id), items.join(",")));
            Ok(())
        }
        kind => {
            let leaf = scalar(kind, &route)?;
            out.push((Path::new(&route)?.bind(scope, id), leaf));
            Ok(())
        }
    }
}

fn scalar(kind: ValueKind, route: &str) -> Result<String> {
    match kind {
        ValueKind::Nil => Ok(String::new()),
        ValueKind::Boolean(b) => Ok(if b { "1" } else { "0" }.to_string()),
        ValueKind::I64(n) => Ok(n.to_string()),
        ValueKind::I128(n) => Ok(n.to_string()),
        ValueKind::U64(n) => Ok(n.to_string()),
        ValueKind::U128(n) => Ok(n.to_string()),
        ValueKind::Float(n) => Ok(n.to_string()),
        ValueKind::String(s) => Ok(s),
        ValueKind::Table(_) | ValueKind::Array(_) => Err(ConfigError::NotValid(format!(
            "nested collections are not supported at '{}'",
            route
        ))),
    }
}
