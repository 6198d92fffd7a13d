//! Scope kinds, packed scope identifiers and scope permission sets.

use crate::error::{ConfigError, Result};
use std::fmt;
use std::str::FromStr;

/// The administrative level at which a configuration value applies.
///
/// `Store` is the most specific scope, `Default` the least.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ScopeType {
    /// Global scope, always with ID 0.
    Default = 1,
    /// A website.
    Website = 2,
    /// A store view inside a website.
    Store = 3,
}

impl ScopeType {
    /// The literal used in fully-qualified paths (`default`, `websites`, `stores`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Website => "websites",
            Self::Store => "stores",
        }
    }

    /// Parse a fully-qualified path literal.
    pub fn from_literal(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "websites" => Some(Self::Website),
            "stores" => Some(Self::Store),
            _ => None,
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Default),
            2 => Some(Self::Website),
            3 => Some(Self::Store),
            _ => None,
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_literal(s)
            .ok_or_else(|| ConfigError::NotValid(format!("unknown scope literal '{}'", s)))
    }
}

/// A scope kind and a numeric ID packed into one comparable value.
///
/// The kind lives in the upper 32 bits, the ID in the lower 32 bits, so the
/// natural ordering groups all IDs of one kind together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeTypeID(u64);

impl ScopeTypeID {
    /// The default scope.
    pub const DEFAULT: ScopeTypeID = ScopeTypeID((ScopeType::Default as u64) << 32);

    /// Pack a scope kind and ID. The default scope always packs ID 0.
    pub fn new(scope: ScopeType, id: u32) -> Self {
        let id = match scope {
            ScopeType::Default => 0,
            _ => id,
        };
        Self(((scope as u64) << 32) | u64::from(id))
    }

    /// Scope ID for a website.
    pub fn website(id: u32) -> Self {
        Self::new(ScopeType::Website, id)
    }

    /// Scope ID for a store.
    pub fn store(id: u32) -> Self {
        Self::new(ScopeType::Store, id)
    }

    /// The scope kind.
    pub fn scope(self) -> ScopeType {
        // Only constructible through `new`, so the upper bits always hold a valid kind.
        ScopeType::from_u8((self.0 >> 32) as u8).unwrap_or(ScopeType::Default)
    }

    /// The numeric scope ID.
    pub fn id(self) -> u32 {
        self.0 as u32
    }

    /// The packed representation.
    pub fn to_u64(self) -> u64 {
        self.0
    }

    /// Unpack a value produced by [`ScopeTypeID::to_u64`].
    pub fn from_u64(raw: u64) -> Result<Self> {
        let scope = ScopeType::from_u8((raw >> 32) as u8)
            .filter(|_| raw >> 40 == 0)
            .ok_or_else(|| ConfigError::NotValid(format!("invalid packed scope {:#x}", raw)))?;
        Ok(Self::new(scope, raw as u32))
    }
}

impl Default for ScopeTypeID {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ScopeTypeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope(), self.id())
    }
}

/// Set of scopes a configuration field may be written at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopePerm(u8);

impl ScopePerm {
    /// Writable at the default scope.
    pub const DEFAULT: ScopePerm = ScopePerm(1 << 0);
    /// Writable at website scope.
    pub const WEBSITE: ScopePerm = ScopePerm(1 << 1);
    /// Writable at store scope.
    pub const STORE: ScopePerm = ScopePerm(1 << 2);

    /// No scope at all.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Default, website and store.
    pub const fn all() -> Self {
        Self(Self::DEFAULT.0 | Self::WEBSITE.0 | Self::STORE.0)
    }

    /// Default and website.
    pub const fn up_to_website() -> Self {
        Self(Self::DEFAULT.0 | Self::WEBSITE.0)
    }

    /// Whether `scope` is part of the set.
    pub fn contains(self, scope: ScopeType) -> bool {
        self.0 & Self::from(scope).0 != 0
    }

    /// Union of two sets.
    pub const fn union(self, other: ScopePerm) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for ScopePerm {
    fn default() -> Self {
        Self::all()
    }
}

impl From<ScopeType> for ScopePerm {
    fn from(scope: ScopeType) -> Self {
        match scope {
            ScopeType::Default => Self::DEFAULT,
            ScopeType::Website => Self::WEBSITE,
            ScopeType::Store => Self::STORE,
        }
    }
}

impl std::ops::BitOr for ScopePerm {
    type Output = ScopePerm;

    fn bitor(self, rhs: ScopePerm) -> ScopePerm {
        self.union(rhs)
    }
}
