//! Bounded least-recently-used cache backend.

use super::Storager;
use crate::core::{Path, ScopeTypeID};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

const NIL: usize = usize::MAX;

struct Node {
    scope: ScopeTypeID,
    route: Arc<str>,
    value: Vec<u8>,
    prev: usize,
    next: usize,
}

/// Index-linked doubly-linked list over a slot vector plus a two-level lookup map.
///
/// `head` is the most recently used slot, `tail` the eviction candidate.
struct Inner {
    index: HashMap<ScopeTypeID, HashMap<Arc<str>, usize>>,
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    len: usize,
    evictions: u64,
}

impl Inner {
    fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::new(),
            nodes: Vec::with_capacity(capacity.min(1024)),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
            evictions: 0,
        }
    }

    fn lookup(&self, scope: ScopeTypeID, route: &str) -> Option<usize> {
        self.index.get(&scope).and_then(|routes| routes.get(route)).copied()
    }

    fn unlink(&mut self, i: usize) {
        let (prev, next) = (self.nodes[i].prev, self.nodes[i].next);
        match prev {
            NIL => self.head = next,
            p => self.nodes[p].next = next,
        }
        match next {
            NIL => self.tail = prev,
            n => self.nodes[n].prev = prev,
        }
        self.nodes[i].prev = NIL;
        self.nodes[i].next = NIL;
    }

    fn push_front(&mut self, i: usize) {
        self.nodes[i].prev = NIL;
        self.nodes[i].next = self.head;
        match self.head {
            NIL => self.tail = i,
            h => self.nodes[h].prev = i,
        }
        self.head = i;
    }

    fn promote(&mut self, i: usize) {
        if self.head != i {
            self.unlink(i);
            self.push_front(i);
        }
    }

    fn detach(&mut self, i: usize) -> Vec<u8> {
        self.unlink(i);
        let node = &mut self.nodes[i];
        let (scope, route) = (node.scope, Arc::clone(&node.route));
        let value = std::mem::take(&mut node.value);
        if let Some(routes) = self.index.get_mut(&scope) {
            routes.remove(&*route);
            if routes.is_empty() {
                self.index.remove(&scope);
            }
        }
        self.free.push(i);
        self.len -= 1;
        value
    }

    fn insert(&mut self, scope: ScopeTypeID, route: &str, value: Vec<u8>) {
        let route: Arc<str> = Arc::from(route);
        let node = Node {
            scope,
            route: Arc::clone(&route),
            value,
            prev: NIL,
            next: NIL,
        };
        let i = match self.free.pop() {
            Some(i) => {
                self.nodes[i] = node;
                i
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.push_front(i);
        self.index.entry(scope).or_default().insert(route, i);
        self.len += 1;
    }
}

/// Fixed-capacity cache evicting the least recently used entry.
///
/// `get` and `set` are O(1) and promote the touched entry. All operations take a
/// single short-lived lock, so the cache is safe to share between tasks.
///
/// # Examples
///
/// ```rust
/// use scoped_config::core::Path;
/// use scoped_config::storage::{LruStorage, Storager};
///
/// # async fn example() -> scoped_config::error::Result<()> {
/// let cache = LruStorage::new(2)?;
/// let a = Path::new("aa/bb/a")?;
/// let b = Path::new("aa/bb/b")?;
/// let c = Path::new("aa/bb/c")?;
///
/// cache.set(&a, b"1").await?;
/// cache.set(&b, b"2").await?;
/// cache.get(&a).await?; // a is now most recently used
/// cache.set(&c, b"3").await?; // evicts b
///
/// assert!(cache.contains(&a));
/// assert!(!cache.contains(&b));
/// # Ok(())
/// # }
/// ```
pub struct LruStorage {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl LruStorage {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotValid`] for a zero capacity.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ConfigError::NotValid(
                "LRU capacity must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(Inner::new(capacity)),
        })
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries evicted because of capacity overflow.
    pub fn evictions(&self) -> u64 {
        self.inner.lock().evictions
    }

    /// Whether `path` is cached, without promoting it.
    pub fn contains(&self, path: &Path) -> bool {
        let (scope, route) = path.scope_route();
        self.inner.lock().lookup(scope, route).is_some()
    }

    /// Remove an entry, returning its value.
    pub fn remove(&self, path: &Path) -> Option<Vec<u8>> {
        let (scope, route) = path.scope_route();
        let mut inner = self.inner.lock();
        let i = inner.lookup(scope, route)?;
        Some(inner.detach(i))
    }

    /// Remove all entries. The eviction counter is kept.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        let evictions = inner.evictions;
        *inner = Inner::new(self.capacity);
        inner.evictions = evictions;
    }

    /// Cached paths from most to least recently used.
    pub fn keys(&self) -> Vec<Path> {
        let inner = self.inner.lock();
        let mut keys = Vec::with_capacity(inner.len);
        let mut i = inner.head;
        while i != NIL {
            let node = &inner.nodes[i];
            if let Ok(path) = Path::from_scope_route(node.scope, &node.route) {
                keys.push(path);
            }
            i = node.next;
        }
        keys
    }
}

#[async_trait]
impl Storager for LruStorage {
    async fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        let (scope, route) = path.scope_route();
        let mut inner = self.inner.lock();
        if let Some(i) = inner.lookup(scope, route) {
            inner.nodes[i].value = value.to_vec();
            inner.promote(i);
            return Ok(());
        }
        if inner.len >= self.capacity {
            let tail = inner.tail;
            inner.detach(tail);
            inner.evictions += 1;
        }
        inner.insert(scope, route, value.to_vec());
        Ok(())
    }

    async fn get(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let (scope, route) = path.scope_route();
        let mut inner = self.inner.lock();
        Ok(inner.lookup(scope, route).map(|i| {
            inner.promote(i);
            inner.nodes[i].value.clone()
        }))
    }

    fn name(&self) -> String {
        format!("lru:{}", self.capacity)
    }
}
