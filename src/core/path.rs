//! Configuration paths: a route bound to a scope.

use crate::core::scope::{ScopeType, ScopeTypeID};
use crate::error::{ConfigError, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

/// Separator between route segments.
pub const SEPARATOR: char = '/';

/// Minimum number of segments a route must have.
pub const MIN_SEGMENTS: usize = 2;

/// Identifies a configuration entry: a slash-separated route bound to a scope.
///
/// Two paths are equal when their route and their scope (kind and ID) match.
/// The parent website of a store path only feeds fallback resolution and is
/// ignored by equality, hashing and the string form.
///
/// # Examples
///
/// ```rust
/// use scoped_config::core::{Path, ScopeTypeID};
///
/// let p: Path = "stores/4/web/unsecure/base_url".parse().unwrap();
/// assert_eq!(p.route(), "web/unsecure/base_url");
/// assert_eq!(p.scope(), ScopeTypeID::store(4));
/// assert_eq!(p.to_string(), "stores/4/web/unsecure/base_url");
/// ```
#[derive(Debug, Clone)]
pub struct Path {
    route: Arc<str>,
    scope: ScopeTypeID,
    website: Option<u32>,
}

impl Path {
    /// Create a default-scope path from a bare route.
    ///
    /// Route segments are lowercase (`payment/service_x`, not `payment/serviceX`)
    /// so that every path maps to exactly one environment variable name and back.
    /// See [`validate_route`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotValid`] when the route is malformed.
    pub fn new(route: &str) -> Result<Self> {
        validate_route(route)?;
        Ok(Self {
            route: Arc::from(route),
            scope: ScopeTypeID::DEFAULT,
            website: None,
        })
    }

    /// Create a path from an already packed scope and a route.
    pub fn from_scope_route(scope: ScopeTypeID, route: &str) -> Result<Self> {
        Ok(Self::new(route)?.bind_scope(scope))
    }

    /// Parse either a bare route (default scope) or `{scope}/{id}/{route}`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotValid`] for malformed scope literals, non-integer
    /// scope IDs, routes with fewer than two segments, empty segments and
    /// disallowed characters.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, SEPARATOR);
        let first = parts.next().unwrap_or_default();
        let second = parts.next();

        let scope = match ScopeType::from_literal(first) {
            Some(scope) => scope,
            None => {
                if second.is_some_and(is_digits) && parts.next().is_some() {
                    return Err(ConfigError::NotValid(format!(
                        "malformed scope literal '{}' in path '{}'",
                        first, s
                    )));
                }
                return Self::new(s);
            }
        };

        let id = second
            .filter(|id| is_digits(id))
            .and_then(|id| id.parse::<u32>().ok())
            .ok_or_else(|| ConfigError::NotValid(format!("invalid scope ID in path '{}'", s)))?;
        let route = parts
            .next()
            .ok_or_else(|| ConfigError::NotValid(format!("missing route in path '{}'", s)))?;

        Ok(Self::new(route)?.bind(scope, id))
    }

    /// Return a copy bound to another scope. Binding to default forces ID 0.
    pub fn bind(&self, scope: ScopeType, id: u32) -> Self {
        self.bind_scope(ScopeTypeID::new(scope, id))
    }

    /// Return a copy bound to an already packed scope.
    pub fn bind_scope(&self, scope: ScopeTypeID) -> Self {
        Self {
            route: Arc::clone(&self.route),
            scope,
            website: match scope.scope() {
                ScopeType::Store => self.website,
                _ => None,
            },
        }
    }

    /// Return a copy bound to the default scope.
    pub fn bind_default(&self) -> Self {
        self.bind_scope(ScopeTypeID::DEFAULT)
    }

    /// Return a copy bound to a website.
    pub fn bind_website(&self, id: u32) -> Self {
        self.bind_scope(ScopeTypeID::website(id))
    }

    /// Return a copy bound to a store.
    pub fn bind_store(&self, id: u32) -> Self {
        self.bind_scope(ScopeTypeID::store(id))
    }

    /// Record the website a store belongs to, enabling store → website fallback.
    ///
    /// Has no effect on paths that are not store scoped.
    pub fn in_website(mut self, website_id: u32) -> Self {
        if self.scope.scope() == ScopeType::Store {
            self.website = Some(website_id);
        }
        self
    }

    /// The route without scope.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// The packed scope.
    pub fn scope(&self) -> ScopeTypeID {
        self.scope
    }

    /// The scope kind.
    pub fn scope_type(&self) -> ScopeType {
        self.scope.scope()
    }

    /// The numeric scope ID.
    pub fn scope_id(&self) -> u32 {
        self.scope.id()
    }

    /// The parent website of a store path, if known.
    pub fn website(&self) -> Option<u32> {
        self.website
    }

    /// The canonical storage key decomposition.
    pub fn scope_route(&self) -> (ScopeTypeID, &str) {
        (self.scope, &self.route)
    }

    /// Iterate over the route segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.route.split(SEPARATOR)
    }

    /// Scopes to try during lookup, most specific first, ending with default.
    ///
    /// A store path falls back to its website only when the website is known.
    pub fn fallback_scopes(&self) -> impl Iterator<Item = ScopeTypeID> + use<> {
        let (own, parent) = match self.scope.scope() {
            ScopeType::Default => (None, None),
            ScopeType::Website => (Some(self.scope), None),
            ScopeType::Store => (Some(self.scope), self.website.map(ScopeTypeID::website)),
        };
        [own, parent, Some(ScopeTypeID::DEFAULT)].into_iter().flatten()
    }

    /// Route prefixes with at least two segments, shortest first.
    pub(crate) fn route_prefixes(&self) -> impl Iterator<Item = &str> {
        let route: &str = &self.route;
        route
            .match_indices(SEPARATOR)
            .skip(MIN_SEGMENTS - 1)
            .map(move |(i, _)| &route[..i])
            .chain(std::iter::once(route))
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.scope == other.scope && self.route == other.route
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scope.hash(state);
        self.route.hash(state);
    }
}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.scope
            .cmp(&other.scope)
            .then_with(|| self.route.cmp(&other.route))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.scope.scope(),
            self.scope.id(),
            self.route
        )
    }
}

impl FromStr for Path {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Check that a route has at least two well-formed segments.
///
/// Segments consist of lowercase ASCII letters, digits and single inner
/// underscores. The first segment must not be a scope literal.
///
/// Upper-case letters are rejected: environment variable names are upper-cased,
/// and `serviceX` and `servicex` would map to the same name.
pub fn validate_route(route: &str) -> Result<()> {
    let mut count = 0;
    for segment in route.split(SEPARATOR) {
        if !is_valid_segment(segment) {
            return Err(ConfigError::NotValid(format!(
                "invalid segment '{}' in route '{}'",
                segment, route
            )));
        }
        if count == 0 && ScopeType::from_literal(segment).is_some() {
            return Err(ConfigError::NotValid(format!(
                "route '{}' must not start with a scope literal",
                route
            )));
        }
        count += 1;
    }
    if count < MIN_SEGMENTS {
        return Err(ConfigError::NotValid(format!(
            "route '{}' needs at least {} segments",
            route, MIN_SEGMENTS
        )));
    }
    Ok(())
}

fn is_valid_segment(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    !bytes.is_empty()
        && bytes[0] != b'_'
        && bytes[bytes.len() - 1] != b'_'
        && !segment.contains("__")
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'_')
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
