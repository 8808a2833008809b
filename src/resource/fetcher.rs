//! Resource Fetcher
//!
//! Read-only calls. Results are stored in the cache as fresh entries.

use super::registry::{descriptor, ResourceKind};
use super::validate::{canonicalize_key, validate_key};
use crate::api::client::SyncClient;
use crate::api::endpoint::{address_field, resolve, resolve_scoped, Generation, Operation};
use crate::api::error::{ApiResult, CanonicalError};
use crate::api::normalize::{normalize, normalize_list};
use crate::cache::{aggregate_key, CacheKey};
use futures::future::join_all;
use serde_json::Value;

/// Fetch the active list of a resource.
///
/// Always returns a list: a legacy 404 means "no rows" and yields `[]`.
pub async fn fetch_list(client: &SyncClient, kind: ResourceKind, generation: Generation) -> ApiResult<Vec<Value>> {
    let endpoint = resolve(kind, Operation::List, generation, None)?;
    let outcome = client.call(&endpoint, None).await;
    let items = normalize_list(outcome, generation)?;

    tracing::debug!("Fetched {} {} entries ({})", items.len(), kind, generation);
    client
        .cache()
        .store(CacheKey::list(kind), Value::Array(items.clone()));
    Ok(items)
}

/// Fetch one entity by its address key, or one aggregate by its parent key
pub async fn fetch_one(
    client: &SyncClient,
    kind: ResourceKind,
    key: &str,
    generation: Generation,
) -> ApiResult<Value> {
    let desc = descriptor(kind);

    let key = match &desc.aggregate {
        Some(agg) if agg.canonical_key && generation == Generation::Modern => {
            let canonical = canonicalize_key(key);
            if canonical.is_empty() {
                return Err(CanonicalError::validation(format!("{} is required", desc.natural_key)));
            }
            canonical
        },
        _ => validate_key(address_field(kind, generation), key)?,
    };

    let endpoint = resolve(kind, Operation::Get, generation, Some(&key))?;
    let outcome = client.call(&endpoint, None).await;
    let value = normalize(outcome, generation, Value::Null)?;

    let cache_key = match &desc.aggregate {
        Some(agg) => aggregate_key(kind, agg, &key, generation),
        None => {
            let natural = value
                .get(&desc.natural_key)
                .and_then(Value::as_str)
                .unwrap_or(key.as_str());
            CacheKey::detail(kind, natural)
        },
    };
    client.cache().store(cache_key, value.clone());
    Ok(value)
}

/// Fetch the children of one parent entity, e.g. the transactions of a
/// category. Follows the same 404 policy as [`fetch_list`].
pub async fn fetch_scoped(
    client: &SyncClient,
    kind: ResourceKind,
    parent: ResourceKind,
    parent_key: &str,
    generation: Generation,
) -> ApiResult<Vec<Value>> {
    let field = descriptor(kind)
        .scope_for(parent)
        .map(|s| s.field.as_str())
        .unwrap_or(descriptor(parent).natural_key.as_str());
    let parent_key = validate_key(field, parent_key)?;

    let endpoint = resolve_scoped(kind, parent, generation, &parent_key)?;
    let outcome = client.call(&endpoint, None).await;
    let items = normalize_list(outcome, generation)?;

    client.cache().store(
        CacheKey::scoped(kind, parent, parent_key.as_str()),
        Value::Array(items.clone()),
    );
    Ok(items)
}

/// List several resources concurrently, one attempt each, every resource
/// under its own effective generation
pub async fn refresh_all(client: &SyncClient, kinds: &[ResourceKind]) -> Vec<(ResourceKind, ApiResult<Vec<Value>>)> {
    let futures = kinds.iter().map(|&kind| async move {
        let result = fetch_list(client, kind, client.generation_for(kind)).await;
        if let Err(e) = &result {
            tracing::warn!("Failed to refresh {}: {}", kind, e);
        }
        (kind, result)
    });

    join_all(futures).await
}
