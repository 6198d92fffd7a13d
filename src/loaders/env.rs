//! Environment variable mapping and import.
//!
//! A path maps to `PREFIX__{SCOPE}__{ID}__{SEGMENTS}` with every part in upper
//! case and segments joined by `__`. Default-scope paths omit the scope and ID:
//!
//! | Path                                 | Variable (prefix `CONFIG`)                  |
//! |--------------------------------------|---------------------------------------------|
//! | `web/unsecure/base_url`              | `CONFIG__WEB__UNSECURE__BASE_URL`           |
//! | `websites/2/web/unsecure/base_url`   | `CONFIG__WEBSITES__2__WEB__UNSECURE__BASE_URL` |
//! | `stores/4/web/unsecure/base_url`     | `CONFIG__STORES__4__WEB__UNSECURE__BASE_URL`   |

use crate::core::{Path, ScopeType};
use crate::error::{ConfigError, Result};
use crate::storage::Storager;
use config::{Environment, Source};
use std::collections::HashMap;

const ENV_SEPARATOR: &str = "__";

/// Map a path to its environment variable name.
///
/// # Examples
///
/// ```rust
/// use scoped_config::core::Path;
/// use scoped_config::loaders::{from_env_var, to_env_var};
///
/// let path = Path::new("web/unsecure/base_url").unwrap().bind_store(4);
/// let var = to_env_var("CONFIG", &path);
/// assert_eq!(var, "CONFIG__STORES__4__WEB__UNSECURE__BASE_URL");
/// assert_eq!(from_env_var("CONFIG", &var).unwrap(), path);
/// ```
pub fn to_env_var(prefix: &str, path: &Path) -> String {
    let mut parts: Vec<String> = vec![prefix.to_string()];
    if path.scope_type() != ScopeType::Default {
        parts.push(path.scope_type().as_str().to_ascii_uppercase());
        parts.push(path.scope_id().to_string());
    }
    parts.extend(path.segments().map(str::to_ascii_uppercase));
    parts.join(ENV_SEPARATOR)
}

/// Parse an environment variable name back into a path.
///
/// # Errors
///
/// Returns [`ConfigError::NotValid`] when the name lacks the prefix, contains
/// lower case letters, names the `DEFAULT` scope, carries a non-canonical scope
/// ID or does not hold a valid route.
pub fn from_env_var(prefix: &str, var: &str) -> Result<Path> {
    let invalid = |reason: &str| ConfigError::NotValid(format!("env var '{}': {}", var, reason));

    let rest = var
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(ENV_SEPARATOR))
        .ok_or_else(|| invalid("missing prefix"))?;
    if rest.bytes().any(|b| b.is_ascii_lowercase()) {
        return Err(invalid("must be upper case"));
    }

    let tokens: Vec<&str> = rest.split(ENV_SEPARATOR).collect();
    let scope = match tokens[0] {
        "DEFAULT" => return Err(invalid("the default scope is implied")),
        "WEBSITES" => Some(ScopeType::Website),
        "STORES" => Some(ScopeType::Store),
        _ => None,
    };

    match scope {
        None => Path::new(&tokens.join("/").to_ascii_lowercase()),
        Some(scope) => {
            let id = tokens
                .get(1)
                .copied()
                .and_then(parse_canonical_id)
                .ok_or_else(|| invalid("scope ID must be a canonical integer"))?;
            let route = tokens[2..].join("/").to_ascii_lowercase();
            Ok(Path::new(&route)?.bind(scope, id))
        }
    }
}

fn parse_canonical_id(token: &str) -> Option<u32> {
    let canonical = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    canonical.then(|| token.parse().ok()).flatten()
}

/// Imports `PREFIX__...` environment variables into a storage backend.
///
/// Variables that do not map back to a path (wrong case, malformed routes)
/// are skipped with a warning.
///
/// # Examples
///
/// ```rust
/// use scoped_config::loaders::EnvLoader;
/// use scoped_config::storage::MapStorage;
/// use std::collections::HashMap;
///
/// # async fn example() -> scoped_config::error::Result<()> {
/// let loader = EnvLoader::new("CONFIG").with_source(HashMap::from([(
///     "CONFIG__WEB__UNSECURE__BASE_URL".to_string(),
///     "http://cs.io".to_string(),
/// )]));
/// let storage = MapStorage::new();
/// assert_eq!(loader.load(&storage).await?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: String,
    source: Option<HashMap<String, String>>,
}

impl EnvLoader {
    /// Create a loader reading the process environment.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            source: None,
        }
    }

    /// Read variables from `source` instead of the process environment.
    pub fn with_source(mut self, source: HashMap<String, String>) -> Self {
        self.source = Some(source);
        self
    }

    /// The variable prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Collect the `(path, value)` pairs, ordered by path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::LoadError`] if the environment cannot be read.
    pub fn entries(&self) -> Result<Vec<(Path, String)>> {
        let raw: HashMap<String, String> = self
            .source
            .clone()
            .unwrap_or_else(|| std::env::vars().collect());

        let collected = Environment::with_prefix(&self.prefix)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .source(Some(raw.clone()))
            .collect()
            .map_err(|e| {
                ConfigError::LoadError(format!("Failed to read environment variables: {}", e))
            })?;

        let mut entries = Vec::with_capacity(collected.len());
        for (key, value) in collected {
            // Keys come back with `.` separators; rebuild the name to enforce exact case.
            let tokens: Vec<String> = key.split('.').map(str::to_ascii_uppercase).collect();
            let var = format!("{}{}{}", self.prefix, ENV_SEPARATOR, tokens.join(ENV_SEPARATOR));
            if !raw.contains_key(&var) {
                tracing::debug!(key = %key, "skipping env var with non-canonical case");
                continue;
            }
            let path = match from_env_var(&self.prefix, &var) {
                Ok(path) => path,
                Err(err) => {
                    tracing::warn!(var = %var, error = %err, "skipping env var");
                    continue;
                }
            };
            let value = value.into_string().map_err(|e| {
                ConfigError::DeserializationError(format!("env var '{}': {}", var, e))
            })?;
            entries.push((path, value));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// Write every mapped variable to `storage`, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns the first collection or storage error. Entries written before
    /// the failure stay written.
    pub async fn load(&self, storage: &dyn Storager) -> Result<usize> {
        let entries = self.entries()?;
        for (path, value) in &entries {
            storage.set(path, value.as_bytes()).await?;
        }
        tracing::info!(
            prefix = %self.prefix,
            count = entries.len(),
            backend = %storage.name(),
            "imported environment variables"
        );
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MapStorage;

    fn base_url() -> Path {
        Path::new("web/unsecure/base_url").unwrap()
    }

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("CONFIG", &base_url()), "CONFIG__WEB__UNSECURE__BASE_URL");
        assert_eq!(
            to_env_var("CONFIG", &base_url().bind_website(2)),
            "CONFIG__WEBSITES__2__WEB__UNSECURE__BASE_URL"
        );
    }

    #[test]
    fn test_from_env_var() {
        let path = from_env_var("CONFIG", "CONFIG__STORES__0__WEB__UNSECURE__BASE_URL").unwrap();
        assert_eq!(path, base_url().bind_store(0));
        assert_eq!(
            from_env_var("CONFIG", "CONFIG__PAYMENT__CHECKMO__ACTIVE").unwrap(),
            Path::new("payment/checkmo/active").unwrap()
        );
    }

    #[test]
    fn test_from_env_var_rejects() {
        for var in [
            "OTHER__WEB__UNSECURE__BASE_URL",
            "CONFIG_WEB__UNSECURE__BASE_URL",
            "CONFIG__web__unsecure__base_url",
            "CONFIG__DEFAULT__0__WEB__UNSECURE__BASE_URL",
            "CONFIG__STORES__04__WEB__UNSECURE__BASE_URL",
            "CONFIG__STORES__X__WEB__UNSECURE__BASE_URL",
            "CONFIG__STORES__4",
            "CONFIG__WEBSITES__99999999999__WEB__UNSECURE",
            "CONFIG__WEB",
            "CONFIG__WEB___UNSECURE",
            "CONFIG__",
        ] {
            assert!(from_env_var("CONFIG", var).unwrap_err().is_not_valid(), "{}", var);
        }
    }

    #[tokio::test]
    async fn test_load_from_injected_source() {
        let source = HashMap::from([
            ("APP__WEB__UNSECURE__BASE_URL".to_string(), "dflt".to_string()),
            ("APP__STORES__4__WEB__UNSECURE__BASE_URL".to_string(), "store".to_string()),
            ("APP__LOG_LEVEL".to_string(), "debug".to_string()),
            ("app__web__lower__case".to_string(), "x".to_string()),
            ("OTHER__WEB__UNSECURE__BASE_URL".to_string(), "x".to_string()),
        ]);
        let loader = EnvLoader::new("APP").with_source(source);
        let entries = loader.entries().unwrap();
        assert_eq!(
            entries,
            vec![
                (base_url(), "dflt".to_string()),
                (base_url().bind_store(4), "store".to_string()),
            ]
        );

        let storage = MapStorage::new();
        assert_eq!(loader.load(&storage).await.unwrap(), 2);
        assert_eq!(
            storage.get(&base_url().bind_store(4)).await.unwrap(),
            Some(b"store".to_vec())
        );
    }
}
