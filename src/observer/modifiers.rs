//! The `modifier` observer type: named transforms applied in sequence.

use super::Observer;
use crate::core::Path;
use crate::error::{ConfigError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

/// A named transform. Receives the path being observed and the current payload.
pub type ModifierFn = Arc<dyn Fn(&Path, Vec<u8>) -> Result<Vec<u8>> + Send + Sync>;

/// Condition of a `modifier` observer.
///
/// ```json
/// {"funcs": ["trim", "lower"]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierArg {
    /// Transform names, applied in order.
    pub funcs: Vec<String>,
}

/// Named modifier functions.
pub struct ModifierRegistry {
    funcs: RwLock<HashMap<String, ModifierFn>>,
}

impl ModifierRegistry {
    /// Create a registry holding the built-in modifiers.
    pub fn new() -> Self {
        let registry = Self::empty();
        for &(name, func) in BUILTINS {
            registry.funcs.write().insert(name.to_string(), Arc::new(func));
        }
        registry
    }

    /// Create a registry without any modifier.
    pub fn empty() -> Self {
        Self {
            funcs: RwLock::new(HashMap::new()),
        }
    }

    /// Add or replace a modifier. Last registration wins.
    pub fn register<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(&Path, Vec<u8>) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.funcs.write().insert(name.into(), Arc::new(func));
    }

    /// Look up a modifier.
    pub fn get(&self, name: &str) -> Option<ModifierFn> {
        self.funcs.read().get(name).cloned()
    }

    /// Whether a modifier is registered under `name`.
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
            return Err(ConfigError::Empty("modifier funcs".to_string()));
        }
        let funcs = self.funcs.read();
        match names.iter().find(|name| !funcs.contains_key(name.as_str())) {
            Some(name) => Err(ConfigError::NotSupported(format!("modifier '{}'", name))),
            None => Ok(()),
        }
    }
}

impl Default for ModifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `text` to UTF-8 payloads and `bytes` to anything else.
fn map_text(raw: Vec<u8>, text: impl Fn(&str) -> String, bytes: impl Fn(&mut [u8])) -> Vec<u8> {
    match String::from_utf8(raw) {
        Ok(s) => text(&s).into_bytes(),
        Err(e) => {
            let mut raw = e.into_bytes();
            bytes(&mut raw);
            raw
        }
    }
}

fn title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    out
}

fn decode_error(what: &str, e: impl std::fmt::Display) -> ConfigError {
    ConfigError::NotValid(format!("{} decoding failed: {}", what, e))
}

type Builtin = fn(&Path, Vec<u8>) -> Result<Vec<u8>>;

const BUILTINS: &[(&str, Builtin)] = &[
    ("upper", |_, raw| {
        Ok(map_text(raw, str::to_uppercase, <[u8]>::make_ascii_uppercase))
    }),
    ("lower", |_, raw| {
        Ok(map_text(raw, str::to_lowercase, <[u8]>::make_ascii_lowercase))
    }),
    ("trim", |_, raw| match String::from_utf8(raw) {
        Ok(s) => Ok(s.trim().as_bytes().to_vec()),
        Err(e) => Ok(e.as_bytes().trim_ascii().to_vec()),
    }),
    ("title", |_, raw| Ok(map_text(raw, title, |_| {}))),
    ("base64_encode", |_, raw| Ok(STANDARD.encode(raw).into_bytes())),
    ("base64_decode", |_, raw| {
        STANDARD.decode(raw).map_err(|e| decode_error("base64", e))
    }),
    ("hex_encode", |_, raw| Ok(hex::encode(raw).into_bytes())),
    ("hex_decode", |_, raw| hex::decode(raw).map_err(|e| decode_error("hex", e))),
    ("gzip", |_, raw| {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }),
    ("gunzip", |_, raw| {
        let mut out = Vec::new();
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut out)
            .map_err(|e| decode_error("gzip", e))?;
        Ok(out)
    }),
    ("sha256", |path, raw| {
        let mut hasher = Sha256::new();
        hasher.update(path.to_string().as_bytes());
        hasher.update(&raw);
        Ok(hasher.finalize().to_vec())
    }),
];

/// Observer transforming values through a sequence of named modifiers.
pub struct ModifyData {
    funcs: Vec<(String, ModifierFn)>,
}

impl ModifyData {
    /// Resolve the modifier names of `arg` against `registry`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Empty`] without any modifier name,
    /// [`ConfigError::NotSupported`] for unknown names.
    pub fn new(arg: ModifierArg, registry: &ModifierRegistry) -> Result<Self> {
        registry.check_names(&arg.funcs)?;
        let funcs = arg
            .funcs
            .into_iter()
            .map(|name| {
                let func = registry
                    .get(&name)
                    .ok_or_else(|| ConfigError::NotSupported(format!("modifier '{}'", name)))?;
                Ok((name, func))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { funcs })
    }
}

impl Observer for ModifyData {
    fn observe(&self, path: &Path, raw: Vec<u8>, found: bool) -> Result<Vec<u8>> {
        if !found {
            return Ok(raw);
        }
        let mut data = raw;
        for (index, (name, func)) in self.funcs.iter().enumerate() {
            data = func(path, data).map_err(|source| ConfigError::Interrupted {
                kind: "modifier",
                index,
                name: name.clone(),
                source: Box::new(source),
            })?;
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> Path {
        Path::new("payment/checkmo/title").unwrap()
    }

    fn modify(funcs: &[&str], input: &[u8]) -> Result<Vec<u8>> {
        let registry = ModifierRegistry::new();
        let arg = ModifierArg {
            funcs: funcs.iter().map(|s| s.to_string()).collect(),
        };
        ModifyData::new(arg, &registry)?.observe(&path(), input.to_vec(), true)
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(modify(&["upper"], b"gr\xc3\xbcezi").unwrap(), "GRÜEZI".as_bytes());
        assert_eq!(modify(&["lower"], b"MiXeD").unwrap(), b"mixed");
        assert_eq!(modify(&["trim"], b"  padded \n").unwrap(), b"padded");
        assert_eq!(
            modify(&["title"], b"check money order").unwrap(),
            b"Check Money Order"
        );
        assert_eq!(modify(&["trim", "upper"], b" a ").unwrap(), b"A");
    }

    #[test]
    fn test_non_utf8_case_folding() {
        assert_eq!(modify(&["upper"], b"ab\xff").unwrap(), b"AB\xff");
        assert_eq!(modify(&["trim"], b" \xff ").unwrap(), b"\xff");
    }

    #[test]
    fn test_encodings_invert() {
        let raw = b"\x00binary\xff payload";
        for (enc, dec) in [
            ("base64_encode", "base64_decode"),
            ("hex_encode", "hex_decode"),
            ("gzip", "gunzip"),
        ] {
            assert_eq!(modify(&[enc, dec], raw).unwrap(), raw, "{} then {}", enc, dec);
        }
        assert_eq!(modify(&["hex_encode"], b"\x01\xab").unwrap(), b"01ab");
        assert_eq!(modify(&["base64_encode"], b"cs").unwrap(), b"Y3M=");
    }

    #[test]
    fn test_sha256_is_salted_with_path() {
        let registry = ModifierRegistry::new();
        let data = ModifyData::new(
            ModifierArg {
                funcs: vec!["sha256".to_string()],
            },
            &registry,
        )
        .unwrap();

        let a = data.observe(&path(), b"secret".to_vec(), true).unwrap();
        let b = data
            .observe(&path().bind_store(1), b"secret".to_vec(), true)
            .unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);

        let mut hasher = Sha256::new();
        hasher.update(b"default/0/payment/checkmo/titlesecret");
        assert_eq!(a, hasher.finalize().to_vec());
    }

    #[test]
    fn test_failing_modifier_interrupts_chain() {
        let err = modify(&["upper", "base64_decode"], b"not base64!").unwrap_err();
        match err {
            ConfigError::Interrupted {
                kind, index, name, ..
            } => {
                assert_eq!(kind, "modifier");
                assert_eq!(index, 1);
                assert_eq!(name, "base64_decode");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_custom_modifier() {
        let registry = ModifierRegistry::new();
        registry.register("reverse", |_: &Path, mut raw: Vec<u8>| -> Result<Vec<u8>> {
            raw.reverse();
            Ok(raw)
        });
        let data = ModifyData::new(
            ModifierArg {
                funcs: vec!["reverse".to_string(), "upper".to_string()],
            },
            &registry,
        )
        .unwrap();
        assert_eq!(data.observe(&path(), b"abc".to_vec(), true).unwrap(), b"CBA");
        assert_eq!(data.observe(&path(), b"abc".to_vec(), false).unwrap(), b"abc");
    }

    #[test]
    fn test_unknown_and_empty() {
        assert!(modify(&["rot13"], b"x").unwrap_err().is_not_supported());
        assert!(matches!(modify(&[], b"x").unwrap_err(), ConfigError::Empty(_)));
        assert!(ModifierRegistry::new().names().contains(&"gunzip".to_string()));
    }
}
