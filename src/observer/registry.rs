//! Observer registry keyed by event and route prefix.

use super::{Event, Observer};
use crate::core::{Path, validate_route};
use crate::error::Result;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

type Chain = Vec<Arc<dyn Observer>>;
type Routes = HashMap<String, Chain>;

/// Registered observers, one route table per [`Event`].
///
/// Dispatch reads a snapshot of the table without locking; registration
/// replaces the table copy-on-write, so a dispatch in flight keeps seeing the
/// observers it started with.
///
/// # Ordering
///
/// For a path `web/unsecure/base_url`, dispatch runs the observers of
/// `web/unsecure` first, then those of `web/unsecure/base_url`. Observers
/// registered under the same route run in registration order. The first error
/// stops the chain.
pub struct ObserverRegistry {
    events: [ArcSwap<Routes>; 4],
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            events: std::array::from_fn(|_| ArcSwap::from_pointee(Routes::new())),
        }
    }

    fn table(&self, event: Event) -> &ArcSwap<Routes> {
        &self.events[event.index()]
    }

    /// Append an observer to the chain of `(event, route)`.
    ///
    /// `route` is a prefix with at least two segments, e.g. `payment/checkmo`
    /// applies to every field of that group.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotValid`](crate::error::ConfigError::NotValid) for malformed routes.
    pub fn register(&self, event: Event, route: &str, observer: Arc<dyn Observer>) -> Result<()> {
        validate_route(route)?;
        self.table(event).rcu(|routes| {
            let mut next = Routes::clone(routes);
            next.entry(route.to_string())
                .or_default()
                .push(Arc::clone(&observer));
            next
        });
        tracing::debug!(event = %event, route = %route, "registered observer");
        Ok(())
    }

    /// Remove every observer of `(event, route)`, returning how many were removed.
    pub fn deregister(&self, event: Event, route: &str) -> usize {
        let previous = self.table(event).rcu(|routes| {
            let mut next = Routes::clone(routes);
            next.remove(route);
            next
        });
        let removed = previous.get(route).map_or(0, Vec::len);
        if removed > 0 {
            tracing::debug!(event = %event, route = %route, removed, "deregistered observers");
        }
        removed
    }

    /// Number of observers registered for exactly `(event, route)`.
    pub fn count(&self, event: Event, route: &str) -> usize {
        self.table(event).load().get(route).map_or(0, Vec::len)
    }

    /// Run the chain for `path` at `event`.
    ///
    /// # Errors
    ///
    /// Returns the first observer error unchanged.
    pub fn dispatch(&self, event: Event, path: &Path, raw: Vec<u8>, found: bool) -> Result<Vec<u8>> {
        let routes = self.table(event).load_full();
        if routes.is_empty() {
            return Ok(raw);
        }

        let mut data = raw;
        for prefix in path.route_prefixes() {
            let Some(chain) = routes.get(prefix) else {
                continue;
            };
            for observer in chain {
                data = observer.observe(path, data, found).inspect_err(|err| {
                    tracing::debug!(event = %event, path = %path, route = %prefix, error = %err, "observer rejected value");
                })?;
            }
        }
        Ok(data)
    }

    /// Total number of registered observers.
    pub fn len(&self) -> usize {
        self.events
            .iter()
            .map(|table| table.load().values().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// Whether no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}
