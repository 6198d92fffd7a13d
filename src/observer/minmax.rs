//! The `ValidateMinMaxInt` observer type.

use super::Observer;
use crate::core::Path;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct MinMaxCondition {
    conditions: Vec<i64>,
    #[serde(default)]
    partial_validation: bool,
}

impl TryFrom<MinMaxCondition> for MinMaxInt {
    type Error = ConfigError;

    fn try_from(condition: MinMaxCondition) -> Result<Self> {
        MinMaxInt::new(&condition.conditions, condition.partial_validation)
    }
}

/// Checks that a value is an integer inside inclusive ranges.
///
/// Conditions are a flat list of `min, max` pairs. The value must lie in every
/// range, or in at least one with `partial_validation`.
///
/// ```rust
/// use scoped_config::observer::MinMaxInt;
///
/// let check: MinMaxInt =
///     serde_json::from_str(r#"{"conditions":[1,2,5,6,7,8],"partial_validation":true}"#).unwrap();
/// assert_eq!(check.ranges(), &[(1, 2), (5, 6), (7, 8)]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MinMaxCondition", into = "MinMaxConditionOut")]
pub struct MinMaxInt {
    ranges: Vec<(i64, i64)>,
    partial_validation: bool,
}

#[derive(Serialize)]
struct MinMaxConditionOut {
    conditions: Vec<i64>,
    partial_validation: bool,
}

impl From<MinMaxInt> for MinMaxConditionOut {
    fn from(check: MinMaxInt) -> Self {
        Self {
            conditions: check.ranges.iter().flat_map(|&(min, max)| [min, max]).collect(),
            partial_validation: check.partial_validation,
        }
    }
}

impl MinMaxInt {
    /// Build from flat `min, max` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotAcceptable`] for empty or odd-length lists and
    /// for pairs whose minimum exceeds the maximum.
    pub fn new(conditions: &[i64], partial_validation: bool) -> Result<Self> {
        if conditions.is_empty() || conditions.len() % 2 != 0 {
            return Err(ConfigError::NotAcceptable(format!(
                "min/max conditions must be non-empty pairs, got {} values",
                conditions.len()
            )));
        }
        let ranges = conditions
            .chunks_exact(2)
            .map(|pair| match (pair[0], pair[1]) {
                (min, max) if min <= max => Ok((min, max)),
                (min, max) => Err(ConfigError::NotAcceptable(format!(
                    "min {} exceeds max {}",
                    min, max
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            ranges,
            partial_validation,
        })
    }

    /// The configured ranges.
    pub fn ranges(&self) -> &[(i64, i64)] {
        &self.ranges
    }

    /// Whether one matching range is enough.
    pub fn is_partial(&self) -> bool {
        self.partial_validation
    }

    /// Check a single integer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] when the value misses the ranges.
    pub fn check(&self, value: i64) -> Result<()> {
        let inside = |&(min, max): &(i64, i64)| (min..=max).contains(&value);
        let ok = if self.partial_validation {
            self.ranges.iter().any(inside)
        } else {
            self.ranges.iter().all(inside)
        };
        if ok {
            return Ok(());
        }
        let ranges: Vec<String> = self
            .ranges
            .iter()
            .map(|(min, max)| format!("[{}, {}]", min, max))
            .collect();
        Err(ConfigError::OutOfRange {
            value,
            reason: format!(
                "expected within {} of {}",
                if self.partial_validation { "any" } else { "all" },
                ranges.join(", ")
            ),
        })
    }
}

impl Observer for MinMaxInt {
    fn observe(&self, path: &Path, raw: Vec<u8>, found: bool) -> Result<Vec<u8>> {
        if !found {
            return Ok(raw);
        }
        let value = std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| ConfigError::NotValid(format!("value at {} is not an integer", path)))?;
        self.check(value)?;
        Ok(raw)
    }
}
