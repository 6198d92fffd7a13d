//! Values returned by the configuration service.

use crate::core::scope::ScopeTypeID;
use crate::error::{ConfigError, Result};
use std::str::FromStr;

/// Where a value returned by [`Service::get`](crate::core::Service::get) came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Read from storage at the given scope.
    Stored(ScopeTypeID),
    /// The field's declared default.
    Default,
}

/// A raw configuration value plus its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    data: Vec<u8>,
    origin: Origin,
}

impl Value {
    pub(crate) fn new(data: Vec<u8>, origin: Origin) -> Self {
        Self { data, origin }
    }

    /// Where this value came from.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// The scope the value was stored at, `None` for defaults.
    pub fn scope(&self) -> Option<ScopeTypeID> {
        match self.origin {
            Origin::Stored(scope) => Some(scope),
            Origin::Default => None,
        }
    }

    /// Whether this value is the declared default.
    pub fn is_default(&self) -> bool {
        self.origin == Origin::Default
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the value and return the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// The value as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotValid`] if the bytes are not UTF-8.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.data)
            .map_err(|e| ConfigError::NotValid(format!("value is not UTF-8: {}", e)))
    }

    /// Parse the trimmed text with `FromStr`.
    pub fn parse<T>(&self) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let text = self.as_str()?.trim();
        text.parse::<T>()
            .map_err(|e| ConfigError::NotValid(format!("cannot parse '{}': {}", text, e)))
    }

    /// Interpret the value as a boolean. Accepts `1/0`, `true/false`, `yes/no`, `on/off`.
    pub fn as_bool(&self) -> Result<bool> {
        let text = self.as_str()?.trim();
        parse_bool(text)
            .ok_or_else(|| ConfigError::NotValid(format!("cannot parse '{}' as bool", text)))
    }

    /// Interpret the value as a signed integer.
    pub fn as_i64(&self) -> Result<i64> {
        self.parse()
    }

    /// Interpret the value as a float.
    pub fn as_f64(&self) -> Result<f64> {
        self.parse()
    }

    /// Split the value on `separator`, dropping empty fields.
    pub fn as_csv(&self, separator: char) -> Result<Vec<&str>> {
        Ok(self
            .as_str()?
            .split(separator)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect())
    }
}

pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
