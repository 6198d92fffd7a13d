//! The `validator` observer type: named predicates that accept or reject a value.

use super::{Observer, iso};
use crate::core::Path;
use crate::core::parse_bool;
use crate::error::{ConfigError, Result, ValidationError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// A named predicate over a raw value.
pub type ValidatorFn = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// Condition of a `validator` observer.
///
/// ```json
/// {"funcs": ["locale"], "csv_comma_separator": ",", "additional_allowed_values": ["custom"]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorArg {
    /// Predicate names, checked in order.
    pub funcs: Vec<String>,
    /// Validate each field of a separated list independently.
    #[serde(alias = "csv_comma")]
    pub csv_comma_separator: Option<char>,
    /// Values accepted without running any predicate.
    pub additional_allowed_values: Vec<String>,
    /// Accept a value as soon as one predicate accepts it.
    pub partial_validation: bool,
}

/// Named validator predicates.
///
/// [`ValidatorRegistry::new`] comes with the built-ins; use
/// [`ValidatorRegistry::register`] to add or replace predicates.
pub struct ValidatorRegistry {
    funcs: RwLock<HashMap<String, ValidatorFn>>,
}

impl ValidatorRegistry {
    /// Create a registry holding the built-in predicates.
    pub fn new() -> Self {
        let registry = Self::empty();
        for &(name, func) in BUILTINS {
            registry.funcs.write().insert(name.to_string(), Arc::new(func));
        }
        registry
    }

    /// Create a registry without any predicate.
    pub fn empty() -> Self {
        Self {
            funcs: RwLock::new(HashMap::new()),
        }
    }

    /// Add or replace a predicate. Last registration wins.
    pub fn register<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.funcs.write().insert(name.into(), Arc::new(func));
    }

    /// Look up a predicate.
    pub fn get(&self, name: &str) -> Option<ValidatorFn> {
        self.funcs.read().get(name).cloned()
    }

    /// Whether a predicate is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.funcs.read().contains_key(name)
    }

    /// Registered names in alphabetical order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.funcs.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn check_names(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Err(ConfigError::Empty("validator funcs".to_string()));
        }
        let funcs = self.funcs.read();
        match names.iter().find(|name| !funcs.contains_key(name.as_str())) {
            Some(name) => Err(ConfigError::NotSupported(format!("validator '{}'", name))),
            None => Ok(()),
        }
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn text(raw: &[u8]) -> Option<&str> {
    std::str::from_utf8(raw).ok()
}

fn with_text(raw: &[u8], pred: impl Fn(&str) -> bool) -> bool {
    text(raw).is_some_and(pred)
}

fn uuid_version(raw: &[u8], version: usize) -> bool {
    with_text(raw, |s| {
        uuid::Uuid::parse_str(s).is_ok_and(|id| id.get_version_num() == version)
    })
}

fn hex_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

type Builtin = fn(&[u8]) -> bool;

const BUILTINS: &[(&str, Builtin)] = &[
    ("country_code", |v| with_text(v, iso::is_country)),
    ("currency", |v| with_text(v, iso::is_currency)),
    ("language", |v| with_text(v, iso::is_language)),
    ("locale", |v| with_text(v, iso::is_locale)),
    ("uuid", |v| with_text(v, |s| uuid::Uuid::parse_str(s).is_ok())),
    ("uuid3", |v| uuid_version(v, 3)),
    ("uuid4", |v| uuid_version(v, 4)),
    ("uuid5", |v| uuid_version(v, 5)),
    ("url", |v| {
        with_text(v, |s| url::Url::parse(s).is_ok_and(|u| u.has_host()))
    }),
    ("int", |v| with_text(v, |s| s.parse::<i64>().is_ok())),
    ("float", |v| {
        with_text(v, |s| s.parse::<f64>().is_ok_and(f64::is_finite))
    }),
    ("numeric", |v| !v.is_empty() && v.iter().all(u8::is_ascii_digit)),
    ("bool", |v| with_text(v, |s| parse_bool(s).is_some())),
    ("utf8", |v| text(v).is_some()),
    ("ascii", |v| v.is_ascii()),
    ("alpha", |v| !v.is_empty() && v.iter().all(u8::is_ascii_alphabetic)),
    ("alphanum", |v| {
        !v.is_empty() && v.iter().all(u8::is_ascii_alphanumeric)
    }),
    ("lowercase", |v| with_text(v, |s| s == s.to_lowercase())),
    ("uppercase", |v| with_text(v, |s| s == s.to_uppercase())),
    ("not_empty", |v| !v.is_empty()),
    ("not_empty_trim_space", |v| {
        with_text(v, |s| !s.trim().is_empty())
    }),
    ("hexadecimal", |v| with_text(v, hex_digits)),
    ("hex_color", |v| {
        with_text(v, |s| {
            let digits = s.strip_prefix('#').unwrap_or(s);
            matches!(digits.len(), 3 | 6) && hex_digits(digits)
        })
    }),
    ("json", |v| {
        serde_json::from_slice::<serde::de::IgnoredAny>(v).is_ok()
    }),
    ("ip", |v| with_text(v, |s| s.parse::<IpAddr>().is_ok())),
    ("ipv4", |v| with_text(v, |s| s.parse::<Ipv4Addr>().is_ok())),
    ("ipv6", |v| with_text(v, |s| s.parse::<Ipv6Addr>().is_ok())),
];

/// Observer checking values against named predicates. Never alters the value.
///
/// By default every predicate must accept; with `partial_validation` one is
/// enough. In CSV mode each field is checked on its own and empty fields at
/// either end of the list are skipped.
pub struct ValidateData {
    funcs: Vec<(String, ValidatorFn)>,
    csv_separator: Option<char>,
    allowed: HashSet<String>,
    partial: bool,
}

impl ValidateData {
    /// Resolve the predicate names of `arg` against `registry`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Empty`] without any predicate name,
    /// [`ConfigError::NotSupported`] for unknown names.
    pub fn new(arg: ValidatorArg, registry: &ValidatorRegistry) -> Result<Self> {
        registry.check_names(&arg.funcs)?;
        let funcs = arg
            .funcs
            .into_iter()
            .map(|name| {
                let func = registry
                    .get(&name)
                    .ok_or_else(|| ConfigError::NotSupported(format!("validator '{}'", name)))?;
                Ok((name, func))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            funcs,
            csv_separator: arg.csv_comma_separator,
            allowed: arg.additional_allowed_values.into_iter().collect(),
            partial: arg.partial_validation,
        })
    }

    fn check(&self, path: &Path, value: &[u8]) -> Result<()> {
        if text(value).is_some_and(|s| self.allowed.contains(s)) {
            return Ok(());
        }

        if self.partial {
            if self.funcs.iter().any(|(_, func)| func(value)) {
                return Ok(());
            }
            let names: Vec<&str> = self.funcs.iter().map(|(name, _)| name.as_str()).collect();
            return Err(ValidationError::invalid_field(
                path.to_string(),
                format!("no validator of [{}] accepts the value", names.join(", ")),
            )
            .into());
        }

        for (index, (name, func)) in self.funcs.iter().enumerate() {
            if !func(value) {
                return Err(ConfigError::Interrupted {
                    kind: "validator",
                    index,
                    name: name.clone(),
                    source: Box::new(
                        ValidationError::invalid_field(
                            path.to_string(),
                            format!("rejected by {}", name),
                        )
                        .into(),
                    ),
                });
            }
        }
        Ok(())
    }
}

impl Observer for ValidateData {
    fn observe(&self, path: &Path, raw: Vec<u8>, found: bool) -> Result<Vec<u8>> {
        if !found {
            return Ok(raw);
        }
        match self.csv_separator {
            None => self.check(path, &raw)?,
            Some(separator) => {
                let list = text(&raw).ok_or_else(|| {
                    ConfigError::NotValid(format!("list value at {} is not UTF-8", path))
                })?;
                let mut fields: Vec<&str> = list.split(separator).collect();
                while fields.first().is_some_and(|f| f.is_empty()) {
                    fields.remove(0);
                }
                while fields.last().is_some_and(|f| f.is_empty()) {
                    fields.pop();
                }
                for field in fields {
                    self.check(path, field.as_bytes())?;
                }
            }
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn validator(funcs: &[&str]) -> ValidatorArg {
        ValidatorArg {
            funcs: funcs.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn path() -> Path {
        Path::new("general/locale/code").unwrap()
    }

    fn accepts(name: &str, value: &str) -> bool {
        let registry = ValidatorRegistry::new();
        let func = registry.get(name).unwrap();
        func(value.as_bytes())
    }

    #[test]
    fn test_builtin_predicates() {
        let cases = [
            ("country_code", "CH", "XX"),
            ("currency", "CHF", "CHX"),
            ("language", "de", "zz"),
            ("locale", "de_CH", "de_XX"),
            ("uuid", "67e55044-10b1-426f-9247-bb680e5fe0c8", "67e55044"),
            ("uuid4", "67e55044-10b1-426f-9247-bb680e5fe0c8", "a3bb189e-8bf9-3888-9912-ace4e6543002"),
            ("uuid3", "a3bb189e-8bf9-3888-9912-ace4e6543002", "67e55044-10b1-426f-9247-bb680e5fe0c8"),
            ("url", "https://cs.io/path", "not a url"),
            ("int", "-42", "4.2"),
            ("float", "4.2", "NaN"),
            ("numeric", "0042", "-42"),
            ("bool", "yes", "maybe"),
            ("ascii", "abc", "äbc"),
            ("alpha", "abc", "ab1"),
            ("alphanum", "ab1", "ab-1"),
            ("lowercase", "abc", "aBc"),
            ("uppercase", "ABC", "aBc"),
            ("not_empty", " ", ""),
            ("not_empty_trim_space", " a ", "  "),
            ("hexadecimal", "deadBEEF", "xyz"),
            ("hex_color", "#ff00aa", "#ff00a"),
            ("json", r#"{"a":[1,2]}"#, "{a:1}"),
            ("ip", "::1", "256.0.0.1"),
            ("ipv4", "10.0.0.1", "::1"),
            ("ipv6", "fe80::1", "10.0.0.1"),
        ];
        for (name, good, bad) in cases {
            assert!(accepts(name, good), "{} should accept {:?}", name, good);
            assert!(!accepts(name, bad), "{} should reject {:?}", name, bad);
        }

        let registry = ValidatorRegistry::new();
        let utf8 = registry.get("utf8").unwrap();
        assert!(utf8("grüezi".as_bytes()));
        assert!(!utf8(&[0xff, 0xfe]));
    }

    #[test]
    fn test_partial_validation() {
        let registry = ValidatorRegistry::new();

        let strict = ValidateData::new(validator(&["int", "bool"]), &registry).unwrap();
        let err = strict.observe(&path(), b"true".to_vec(), true).unwrap_err();
        match err {
            ConfigError::Interrupted { index, name, .. } => {
                assert_eq!(index, 0);
                assert_eq!(name, "int");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let partial = ValidateData::new(
            ValidatorArg {
                partial_validation: true,
                ..validator(&["int", "bool"])
            },
            &registry,
        )
        .unwrap();
        assert_eq!(
            partial.observe(&path(), b"true".to_vec(), true).unwrap(),
            b"true"
        );
        assert!(matches!(
            partial.observe(&path(), b"maybe".to_vec(), true).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_first_rejection_stops_chain() {
        let registry = ValidatorRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&calls);
        registry.register("reject_all", |_: &[u8]| false);
        registry.register("probe", move |_: &[u8]| {
            probe.fetch_add(1, Ordering::SeqCst);
            true
        });

        let data = ValidateData::new(validator(&["reject_all", "probe"]), &registry).unwrap();
        let err = data.observe(&path(), b"v".to_vec(), true).unwrap_err();
        assert!(matches!(err, ConfigError::Interrupted { index: 0, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_csv_fields_and_allowed_values() {
        let registry = ValidatorRegistry::new();
        let data = ValidateData::new(
            ValidatorArg {
                csv_comma_separator: Some(','),
                additional_allowed_values: vec!["XX".to_string()],
                ..validator(&["country_code"])
            },
            &registry,
        )
        .unwrap();

        assert!(data.observe(&path(), b",DE,CH,XX,".to_vec(), true).is_ok());
        assert!(data.observe(&path(), b"DE,,CH".to_vec(), true).is_err());
        assert!(data.observe(&path(), b"DE,YY".to_vec(), true).is_err());
    }

    #[test]
    fn test_not_found_passes_through() {
        let registry = ValidatorRegistry::new();
        let data = ValidateData::new(validator(&["not_empty"]), &registry).unwrap();
        assert!(data.observe(&path(), Vec::new(), false).is_ok());
    }

    #[test]
    fn test_construction_errors() {
        let registry = ValidatorRegistry::new();
        assert!(matches!(
            ValidateData::new(validator(&[]), &registry).err().unwrap(),
            ConfigError::Empty(_)
        ));
        assert!(
            ValidateData::new(validator(&["int", "nope"]), &registry)
                .err()
                .unwrap()
                .is_not_supported()
        );
        assert!(ValidatorRegistry::empty().names().is_empty());
        assert!(registry.names().contains(&"hex_color".to_string()));
    }

    #[test]
    fn test_arg_from_json() {
        let arg: ValidatorArg =
            serde_json::from_str(r#"{"funcs":["int"],"csv_comma":"|","partial_validation":true}"#)
                .unwrap();
        assert_eq!(arg.csv_comma_separator, Some('|'));
        assert!(arg.partial_validation);
        assert!(arg.additional_allowed_values.is_empty());
    }
}
