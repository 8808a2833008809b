//! Cache synchronization after successful mutations
//!
//! Pure and synchronous: no network calls, only already-held cache state plus
//! the mutation's before/after entities. Each pass is staged on a copy of the
//! entry map and swapped in whole, so a failed pass leaves the cache as it was.

use super::store::{Cache, CacheEntry, CacheKey, CacheScope};
use crate::api::endpoint::Generation;
use crate::resource::registry::{aggregates_keyed_by, aggregates_over, children_of};
use crate::resource::validate::canonicalize_key;
use crate::resource::{descriptor, AggregateDef, InsertPosition, ResourceKind};
use serde_json::Value;
use std::collections::HashMap;

type Entries = HashMap<CacheKey, CacheEntry>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("cache lock poisoned")]
    Poisoned,
    #[error("{resource} entity has no {field}")]
    MissingKey { resource: ResourceKind, field: String },
    #[error("cache entry {key} is not a list")]
    NotAList { key: String },
}

/// A successful mutation, as seen by the synchronizer
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create { after: Value },
    Update { before: Value, after: Value },
    Delete { before: Value },
}

impl Mutation {
    fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Cache key of an aggregate for one parent entity.
///
/// Aggregates flagged `canonical_key` are keyed by the canonicalized parent
/// name under the modern generation, matching the URL segment used to fetch
/// them.
pub fn aggregate_key(
    kind: ResourceKind,
    agg: &AggregateDef,
    parent_key: &str,
    generation: Generation,
) -> CacheKey {
    let key = if agg.canonical_key && generation == Generation::Modern {
        canonicalize_key(parent_key)
    } else {
        parent_key.to_string()
    };
    CacheKey::scoped(kind, agg.parent, key)
}

/// Applies the create/update/rename/delete rules to a [`Cache`]
pub struct CacheSynchronizer<'a> {
    cache: &'a Cache,
    /// Generation each resource is fetched under; aggregate keys depend on
    /// the aggregate's own generation, not the mutated resource's
    generation_of: Box<dyn Fn(ResourceKind) -> Generation + 'a>,
}

impl<'a> CacheSynchronizer<'a> {
    /// Synchronizer for a cache filled under one generation
    pub fn new(cache: &'a Cache, generation: Generation) -> Self {
        Self::with_generations(cache, move |_| generation)
    }

    /// Synchronizer for a cache whose resources use different generations
    pub fn with_generations(cache: &'a Cache, generation_of: impl Fn(ResourceKind) -> Generation + 'a) -> Self {
        Self {
            cache,
            generation_of: Box::new(generation_of),
        }
    }

    fn aggregate_key(&self, agg_kind: ResourceKind, agg: &AggregateDef, parent_key: &str) -> CacheKey {
        aggregate_key(agg_kind, agg, parent_key, (self.generation_of)(agg_kind))
    }

    pub fn sync(&self, kind: ResourceKind, mutation: &Mutation) -> Result<(), SyncError> {
        tracing::debug!("sync {} {}", kind, mutation.name());

        self.cache.with_entries(|entries| -> Result<(), SyncError> {
            let mut staged = entries.clone();
            match mutation {
                Mutation::Create { after } => self.apply_create(&mut staged, kind, after)?,
                Mutation::Update { before, after } => self.apply_update(&mut staged, kind, before, after)?,
                Mutation::Delete { before } => self.apply_delete(&mut staged, kind, before)?,
            }
            *entries = staged;
            Ok(())
        })?
    }

    fn apply_create(&self, entries: &mut Entries, kind: ResourceKind, after: &Value) -> Result<(), SyncError> {
        let desc = descriptor(kind);
        let key = entity_key(kind, after)?;

        let list_key = CacheKey::list(kind);
        match list_mut(entries, &list_key)? {
            Some(items) => upsert(items, &desc.natural_key, &key, after, desc.insert_position),
            // Not loaded yet: hold the new entity, flagged incomplete
            None => {
                entries.insert(
                    list_key,
                    CacheEntry {
                        value: Value::Array(vec![after.clone()]),
                        stale: true,
                    },
                );
            },
        }

        entries.insert(CacheKey::detail(kind, &key), CacheEntry::fresh(after.clone()));

        for scope in &desc.scopes {
            let Some(parent_key) = field_str(after, &scope.field) else {
                continue;
            };
            if let Some(items) = list_mut(entries, &CacheKey::scoped(kind, scope.parent, parent_key))? {
                upsert(items, &desc.natural_key, &key, after, desc.insert_position);
            }
        }

        self.invalidate_aggregates_over(entries, kind, &[after]);
        Ok(())
    }

    fn apply_update(
        &self,
        entries: &mut Entries,
        kind: ResourceKind,
        before: &Value,
        after: &Value,
    ) -> Result<(), SyncError> {
        let desc = descriptor(kind);
        let old_key = entity_key(kind, before)?;
        let new_key = entity_key(kind, after)?;
        let nk = desc.natural_key.as_str();

        if let Some(items) = list_mut(entries, &CacheKey::list(kind))? {
            replace(items, nk, &old_key, &new_key, after);
        }

        let had_detail = entries.remove(&CacheKey::detail(kind, &old_key)).is_some();
        let new_detail = CacheKey::detail(kind, &new_key);
        if had_detail || entries.contains_key(&new_detail) {
            entries.insert(new_detail, CacheEntry::fresh(after.clone()));
        }

        for scope in &desc.scopes {
            let old_parent = field_str(before, &scope.field);
            let new_parent = field_str(after, &scope.field);

            if old_parent == new_parent {
                if let Some(parent_key) = old_parent {
                    if let Some(items) = list_mut(entries, &CacheKey::scoped(kind, scope.parent, parent_key))? {
                        replace(items, nk, &old_key, &new_key, after);
                    }
                }
                continue;
            }

            // The entity moved to another parent
            if let Some(parent_key) = old_parent {
                if let Some(items) = list_mut(entries, &CacheKey::scoped(kind, scope.parent, parent_key))? {
                    remove_entity(items, nk, &old_key);
                }
            }
            if let Some(parent_key) = new_parent {
                if let Some(items) = list_mut(entries, &CacheKey::scoped(kind, scope.parent, parent_key))? {
                    upsert(items, nk, &new_key, after, desc.insert_position);
                }
            }
        }

        self.invalidate_aggregates_over(entries, kind, &[before, after]);

        if old_key != new_key {
            self.rekey_dependents(entries, kind, &old_key, &new_key);
        }
        Ok(())
    }

    /// Move every entry addressed by `old` to `new` and rewrite the parent
    /// reference held by cached child entities
    fn rekey_dependents(&self, entries: &mut Entries, kind: ResourceKind, old: &str, new: &str) {
        tracing::debug!("rename {} {} -> {}", kind, old, new);

        for (child, scope) in children_of(kind) {
            if let Some(entry) = entries.remove(&CacheKey::scoped(child, kind, old)) {
                entries.insert(CacheKey::scoped(child, kind, new), entry);
            }
            for (key, entry) in entries.iter_mut() {
                if key.resource == child {
                    rewrite_field(&mut entry.value, &scope.field, old, new);
                }
            }
        }

        for (agg_kind, agg) in aggregates_keyed_by(kind) {
            let old_key = self.aggregate_key(agg_kind, agg, old);
            let new_key = self.aggregate_key(agg_kind, agg, new);
            if old_key == new_key {
                continue;
            }
            if let Some(entry) = entries.remove(&old_key) {
                entries.insert(new_key, entry);
            }
        }
    }

    fn apply_delete(&self, entries: &mut Entries, kind: ResourceKind, before: &Value) -> Result<(), SyncError> {
        let desc = descriptor(kind);
        let key = entity_key(kind, before)?;

        for (cache_key, entry) in entries.iter_mut() {
            if cache_key.resource != kind || matches!(cache_key.scope, CacheScope::Detail(_)) {
                continue;
            }
            let items = entry
                .value
                .as_array_mut()
                .ok_or_else(|| SyncError::NotAList {
                    key: cache_key.to_string(),
                })?;
            remove_entity(items, &desc.natural_key, &key);
        }

        entries.remove(&CacheKey::detail(kind, &key));

        self.invalidate_aggregates_over(entries, kind, &[before]);

        for (agg_kind, agg) in aggregates_keyed_by(kind) {
            mark_stale(entries, &self.aggregate_key(agg_kind, agg, &key));
        }
        for (child, _) in children_of(kind) {
            mark_stale(entries, &CacheKey::scoped(child, kind, key.as_str()));
        }
        Ok(())
    }

    /// Aggregates are never recomputed locally; they are flagged for refetch
    fn invalidate_aggregates_over(&self, entries: &mut Entries, kind: ResourceKind, entities: &[&Value]) {
        for (agg_kind, agg) in aggregates_over(kind) {
            for entity in entities {
                if let Some(parent_key) = field_str(entity, &agg.parent_field) {
                    mark_stale(entries, &self.aggregate_key(agg_kind, agg, &parent_key));
                }
            }
        }
    }
}

/// Natural key of an entity as a string
fn entity_key(kind: ResourceKind, entity: &Value) -> Result<String, SyncError> {
    let field = &descriptor(kind).natural_key;
    field_str(entity, field).ok_or_else(|| SyncError::MissingKey {
        resource: kind,
        field: field.clone(),
    })
}

fn field_str(entity: &Value, field: &str) -> Option<String> {
    match entity.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn matches_key(entity: &Value, field: &str, key: &str) -> bool {
    field_str(entity, field).as_deref() == Some(key)
}

fn list_mut<'m>(entries: &'m mut Entries, key: &CacheKey) -> Result<Option<&'m mut Vec<Value>>, SyncError> {
    match entries.get_mut(key) {
        None => Ok(None),
        Some(entry) => match entry.value {
            Value::Array(ref mut items) => Ok(Some(items)),
            _ => Err(SyncError::NotAList { key: key.to_string() }),
        },
    }
}

/// Replace the entry with `key` or insert at `position`; never duplicates
fn upsert(items: &mut Vec<Value>, field: &str, key: &str, entity: &Value, position: InsertPosition) {
    if items.iter().any(|item| matches_key(item, field, key)) {
        replace(items, field, key, key, entity);
        return;
    }
    match position {
        InsertPosition::Prepend => items.insert(0, entity.clone()),
        InsertPosition::Append => items.push(entity.clone()),
    }
}

/// Replace the entry addressed by `old` with `entity` (addressed by `new`),
/// dropping any other entry already addressed by `new`
fn replace(items: &mut Vec<Value>, field: &str, old: &str, new: &str, entity: &Value) {
    let Some(idx) = items.iter().position(|item| matches_key(item, field, old)) else {
        return;
    };
    items[idx] = entity.clone();

    let mut i = 0;
    items.retain(|item| {
        let keep = i == idx || !matches_key(item, field, new);
        i += 1;
        keep
    });
}

fn remove_entity(items: &mut Vec<Value>, field: &str, key: &str) {
    items.retain(|item| !matches_key(item, field, key));
}

/// Rewrite `field == old` to `new` in an entity or a list of entities
fn rewrite_field(value: &mut Value, field: &str, old: &str, new: &str) {
    match value {
        Value::Array(items) => {
            for item in items {
                rewrite_field(item, field, old, new);
            }
        },
        Value::Object(map) => {
            if let Some(slot) = map.get_mut(field) {
                if slot.as_str() == Some(old) {
                    *slot = Value::String(new.to_string());
                }
            }
        },
        _ => {},
    }
}

fn mark_stale(entries: &mut Entries, key: &CacheKey) {
    if let Some(entry) = entries.get_mut(key) {
        entry.stale = true;
    }
}
