//! Composite-keyed cache store
//!
//! One shared map from [`CacheKey`] to [`CacheEntry`]. Readers take
//! snapshots; writers go through the fetchers (whole-entry replacement) or
//! the synchronizer (rule-driven edits under a single write lock).

use super::sync::SyncError;
use crate::resource::ResourceKind;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// What part of a resource an entry holds
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheScope {
    /// Active list of the resource
    List,
    /// One entity, by natural key
    Detail(String),
    /// Entries belonging to one parent entity, e.g. the transactions of an
    /// account or the totals of an account
    Parent { parent: ResourceKind, key: String },
}

/// Structured cache key: resource plus scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub resource: ResourceKind,
    pub scope: CacheScope,
}

impl CacheKey {
    pub fn list(resource: ResourceKind) -> Self {
        Self {
            resource,
            scope: CacheScope::List,
        }
    }

    pub fn detail(resource: ResourceKind, key: impl Into<String>) -> Self {
        Self {
            resource,
            scope: CacheScope::Detail(key.into()),
        }
    }

    pub fn scoped(resource: ResourceKind, parent: ResourceKind, key: impl Into<String>) -> Self {
        Self {
            resource,
            scope: CacheScope::Parent {
                parent,
                key: key.into(),
            },
        }
    }

    /// Natural key embedded in the key, if any
    pub fn embedded_key(&self) -> Option<&str> {
        match &self.scope {
            CacheScope::List => None,
            CacheScope::Detail(key) | CacheScope::Parent { key, .. } => Some(key),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            CacheScope::List => write!(f, "[{}]", self.resource),
            CacheScope::Detail(key) => write!(f, "[{}, {}]", self.resource, key),
            CacheScope::Parent { parent, key } => write!(f, "[{}, {}, {}]", self.resource, parent, key),
        }
    }
}

/// Cached value plus staleness
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Value,
    /// Content can no longer be trusted and should be refetched
    pub stale: bool,
}

impl CacheEntry {
    pub fn fresh(value: Value) -> Self {
        Self { value, stale: false }
    }
}

/// Shared in-memory cache
#[derive(Debug, Default)]
pub struct Cache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one entry
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.entries.read() {
            Ok(entries) => entries.get(key).cloned(),
            Err(_) => {
                tracing::warn!("Cache lock poisoned; reading {} as absent", key);
                None
            },
        }
    }

    /// Cached items of a list-valued entry
    pub fn items(&self, key: &CacheKey) -> Option<Vec<Value>> {
        self.get(key)
            .and_then(|entry| entry.value.as_array().cloned())
    }

    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.get(key).is_some_and(|entry| entry.stale)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.get(key).is_some()
    }

    /// All keys currently held, sorted
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = match self.entries.read() {
            Ok(entries) => entries.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        keys.sort();
        keys
    }

    /// Replace an entry with freshly fetched content
    pub fn store(&self, key: CacheKey, value: Value) {
        if let Err(e) = self.with_entries(|entries| {
            entries.insert(key.clone(), CacheEntry::fresh(value));
        }) {
            tracing::warn!("Failed to store {}: {}", key, e);
        }
    }

    /// Drop one entry
    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.with_entries(|entries| entries.remove(key)).ok().flatten()
    }

    pub fn clear(&self) {
        if let Err(e) = self.with_entries(|entries| entries.clear()) {
            tracing::warn!("Failed to clear cache: {}", e);
        }
    }

    /// Run `f` with exclusive access to the entry map.
    ///
    /// The whole closure runs under one write lock, so no reader observes a
    /// half-applied update.
    pub(crate) fn with_entries<R>(
        &self,
        f: impl FnOnce(&mut HashMap<CacheKey, CacheEntry>) -> R,
    ) -> Result<R, SyncError> {
        let mut entries = self.entries.write().map_err(|_| SyncError::Poisoned)?;
        Ok(f(&mut entries))
    }
}
