//! Mutation executor
//!
//! One pipeline for every resource:
//! `Validating -> Resolving -> Requesting -> Normalizing -> Synchronizing -> Done`,
//! with `Failed` reachable from every stage before `Synchronizing`. Cache
//! synchronization failures are logged and never fail a mutation the server
//! already accepted.

use super::registry::{descriptor, ResourceKind};
use super::validate::validate;
use crate::api::client::SyncClient;
use crate::api::endpoint::{address_field, resolve, Endpoint, Generation, Operation};
use crate::api::error::{ApiResult, CanonicalError};
use crate::api::http::ApiResponse;
use crate::api::normalize::normalize;
use crate::cache::{CacheSynchronizer, Mutation};
use serde_json::Value;
use std::fmt;

/// Stage of one mutation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStage {
    Validating,
    Resolving,
    Requesting,
    Normalizing,
    Synchronizing,
    Done,
    Failed,
}

impl fmt::Display for MutationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Resolving => "resolving",
            Self::Requesting => "requesting",
            Self::Normalizing => "normalizing",
            Self::Synchronizing => "synchronizing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a delete call
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// Server confirmed the delete; `null` for a 204
    Deleted(Value),
    /// Server answered 404 on the delete itself: the entity was already gone
    AlreadyGone,
}

impl DeleteOutcome {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Deleted(v) => Some(v),
            Self::AlreadyGone => None,
        }
    }
}

/// Bookkeeping for one call through the pipeline
struct MutationRun {
    kind: ResourceKind,
    operation: Operation,
    generation: Generation,
    stage: MutationStage,
}

impl MutationRun {
    fn new(kind: ResourceKind, operation: Operation, generation: Generation) -> Self {
        Self {
            kind,
            operation,
            generation,
            stage: MutationStage::Validating,
        }
    }

    fn enter(&mut self, stage: MutationStage) {
        tracing::trace!("{} {}: {} -> {}", self.operation, self.kind, self.stage, stage);
        self.stage = stage;
    }

    fn fail(&mut self, err: CanonicalError) -> CanonicalError {
        tracing::warn!(
            "{} {} failed while {} ({}): {}",
            self.operation,
            self.kind,
            self.stage,
            self.generation,
            err
        );
        self.stage = MutationStage::Failed;
        err
    }

    /// Apply cache rules; failures are reported, not returned
    fn synchronize(&mut self, client: &SyncClient, mutation: Mutation) {
        self.enter(MutationStage::Synchronizing);
        // Aggregates are keyed under their own generation, which overrides may set apart
        let (mutated, generation) = (self.kind, self.generation);
        let synchronizer = CacheSynchronizer::with_generations(client.cache(), move |kind| {
            if kind == mutated {
                generation
            } else {
                client.generation_for(kind)
            }
        });
        if let Err(e) = synchronizer.sync(self.kind, &mutation) {
            tracing::warn!(
                "Cache synchronization failed after {} {}; cache may be stale until the next list fetch: {}",
                self.operation,
                self.kind,
                e
            );
        }
    }

    fn done(&mut self) {
        self.enter(MutationStage::Done);
        tracing::info!("{} {} succeeded ({})", self.operation, self.kind, self.generation);
    }
}

/// Address value of `entity` for `kind` under `generation`
fn address_key(kind: ResourceKind, generation: Generation, entity: &Value) -> ApiResult<String> {
    let field = address_field(kind, generation);
    match entity.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(CanonicalError::validation(format!("{} is required", field))),
    }
}

/// Create an entity.
///
/// Resources with a minted identifier field get a fresh identifier merged in;
/// any caller-supplied value for that field is overwritten.
pub async fn insert(
    client: &SyncClient,
    kind: ResourceKind,
    payload: &Value,
    generation: Generation,
) -> ApiResult<Value> {
    let mut run = MutationRun::new(kind, Operation::Create, generation);

    let mut data = validate(kind, payload).into_result().map_err(|e| run.fail(e))?;

    run.enter(MutationStage::Resolving);
    let endpoint = resolve(kind, Operation::Create, generation, None).map_err(|e| run.fail(e))?;

    run.enter(MutationStage::Requesting);
    if let Some(field) = &descriptor(kind).minted_field {
        let id = client.ids().generate().await.map_err(|e| run.fail(e))?;
        if let Some(object) = data.as_object_mut() {
            object.insert(field.clone(), Value::String(id));
        }
    }
    let response = send(&mut run, client, &endpoint, Some(data.clone())).await?;

    run.enter(MutationStage::Normalizing);
    let value = normalize(Ok(response), generation, data).map_err(|e| run.fail(e))?;

    run.synchronize(client, Mutation::Create { after: value.clone() });
    run.done();
    Ok(value)
}

/// Update an entity.
///
/// The call is addressed by `before`'s key even when `after` renames the
/// entity; the cache ends up addressed by the new key.
pub async fn update(
    client: &SyncClient,
    kind: ResourceKind,
    before: &Value,
    after: &Value,
    generation: Generation,
) -> ApiResult<Value> {
    let mut run = MutationRun::new(kind, Operation::Update, generation);

    let data = validate(kind, after).into_result().map_err(|e| run.fail(e))?;
    let key = address_key(kind, generation, before).map_err(|e| run.fail(e))?;

    run.enter(MutationStage::Resolving);
    let endpoint = resolve(kind, Operation::Update, generation, Some(&key)).map_err(|e| run.fail(e))?;

    run.enter(MutationStage::Requesting);
    let response = send(&mut run, client, &endpoint, Some(data.clone())).await?;

    run.enter(MutationStage::Normalizing);
    let value = normalize(Ok(response), generation, data).map_err(|e| run.fail(e))?;

    run.synchronize(
        client,
        Mutation::Update {
            before: before.clone(),
            after: value.clone(),
        },
    );
    run.done();
    Ok(value)
}

/// Delete an entity.
///
/// A 404 on the delete call yields [`DeleteOutcome::AlreadyGone`]; the cache
/// is cleaned up either way.
pub async fn delete(
    client: &SyncClient,
    kind: ResourceKind,
    before: &Value,
    generation: Generation,
) -> ApiResult<DeleteOutcome> {
    let mut run = MutationRun::new(kind, Operation::Delete, generation);

    let key = address_key(kind, generation, before).map_err(|e| run.fail(e))?;

    run.enter(MutationStage::Resolving);
    let endpoint = resolve(kind, Operation::Delete, generation, Some(&key)).map_err(|e| run.fail(e))?;

    run.enter(MutationStage::Requesting);
    let response = send(&mut run, client, &endpoint, None).await?;

    run.enter(MutationStage::Normalizing);
    let outcome = if response.status == 404 {
        tracing::info!("{} {} already gone", kind, key);
        DeleteOutcome::AlreadyGone
    } else {
        DeleteOutcome::Deleted(normalize(Ok(response), generation, Value::Null).map_err(|e| run.fail(e))?)
    };

    run.synchronize(client, Mutation::Delete { before: before.clone() });
    run.done();
    Ok(outcome)
}

async fn send(
    run: &mut MutationRun,
    client: &SyncClient,
    endpoint: &Endpoint,
    body: Option<Value>,
) -> ApiResult<ApiResponse> {
    client
        .call(endpoint, body)
        .await
        .map_err(|e| run.fail(CanonicalError::network(e.0)))
}
