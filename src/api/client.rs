//! Sync client
//!
//! Main entry point for callers, combining the transport, the shared cache
//! and the identifier generator.

use super::endpoint::{Endpoint, Generation};
use super::error::ApiResult;
use super::http::{ApiRequest, ApiResponse, ReqwestTransport, Transport, TransportError};
use crate::cache::Cache;
use crate::resource::{self, DeleteOutcome, IdGenerator, ResourceKind};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Main finance tracker client
#[derive(Clone)]
pub struct SyncClient {
    transport: Arc<dyn Transport>,
    cache: Arc<Cache>,
    ids: IdGenerator,
    generation: Generation,
    overrides: HashMap<ResourceKind, Generation>,
}

impl SyncClient {
    /// Create a client talking to `base_url` over HTTP
    pub fn new(base_url: &str, generation: Generation) -> Result<Self> {
        let transport = ReqwestTransport::new(base_url).context("Failed to initialize HTTP transport")?;
        Ok(Self::with_transport(Arc::new(transport), generation))
    }

    /// Create a client over any transport
    pub fn with_transport(transport: Arc<dyn Transport>, generation: Generation) -> Self {
        Self {
            transport,
            cache: Arc::new(Cache::new()),
            ids: IdGenerator::default(),
            generation,
            overrides: HashMap::new(),
        }
    }

    /// Share an existing cache
    pub fn with_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Talk to `kind` with a different generation than the client default
    pub fn with_generation_override(mut self, kind: ResourceKind, generation: Generation) -> Self {
        self.overrides.insert(kind, generation);
        self
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Effective generation for a resource (override > client default)
    pub fn generation_for(&self, kind: ResourceKind) -> Generation {
        self.overrides.get(&kind).copied().unwrap_or(self.generation)
    }

    /// Issue one call for a resolved endpoint
    pub(crate) async fn call(
        &self,
        endpoint: &Endpoint,
        body: Option<Value>,
    ) -> std::result::Result<ApiResponse, TransportError> {
        let mut request = ApiRequest::new(endpoint.method.clone(), endpoint.path.clone());
        if let Some(body) = body {
            request = request.with_body(body);
        }
        self.transport.send(request).await
    }

    // =========================================================================
    // Convenience wrappers using the effective generation
    // =========================================================================

    /// List active entities of a resource
    pub async fn list(&self, kind: ResourceKind) -> ApiResult<Vec<Value>> {
        resource::fetch_list(self, kind, self.generation_for(kind)).await
    }

    /// Fetch one entity (or aggregate) by key
    pub async fn get(&self, kind: ResourceKind, key: &str) -> ApiResult<Value> {
        resource::fetch_one(self, kind, key, self.generation_for(kind)).await
    }

    /// Totals of one account
    pub async fn totals(&self, account_name: &str) -> ApiResult<Value> {
        self.get(ResourceKind::Totals, account_name).await
    }

    /// List the children of one parent entity, e.g. transactions of an account
    pub async fn list_by(&self, kind: ResourceKind, parent: ResourceKind, parent_key: &str) -> ApiResult<Vec<Value>> {
        resource::fetch_scoped(self, kind, parent, parent_key, self.generation_for(kind)).await
    }

    pub async fn insert(&self, kind: ResourceKind, payload: &Value) -> ApiResult<Value> {
        resource::insert(self, kind, payload, self.generation_for(kind)).await
    }

    pub async fn update(&self, kind: ResourceKind, before: &Value, after: &Value) -> ApiResult<Value> {
        resource::update(self, kind, before, after, self.generation_for(kind)).await
    }

    pub async fn delete(&self, kind: ResourceKind, before: &Value) -> ApiResult<DeleteOutcome> {
        resource::delete(self, kind, before, self.generation_for(kind)).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport for executor tests

    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outcomes in order and records every request
    #[derive(Default)]
    pub struct RecordingTransport {
        responses: Mutex<VecDeque<std::result::Result<ApiResponse, TransportError>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl RecordingTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn respond(&self, status: u16, body: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(ApiResponse::new(status, body)));
        }

        pub fn fail(&self, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(TransportError(message.to_string())));
        }

        pub fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError("no canned response".to_string())))
        }
    }

    pub fn client(transport: &Arc<RecordingTransport>, generation: Generation) -> SyncClient {
        SyncClient::with_transport(transport.clone(), generation)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{client, RecordingTransport};
    use super::*;

    #[test]
    fn test_generation_override() {
        let transport = RecordingTransport::new();
        let client = client(&transport, Generation::Legacy)
            .with_generation_override(ResourceKind::Parameter, Generation::Modern);
        assert_eq!(client.generation_for(ResourceKind::Parameter), Generation::Modern);
        assert_eq!(client.generation_for(ResourceKind::Account), Generation::Legacy);
    }

    #[test]
    fn test_clones_share_the_cache() {
        let transport = RecordingTransport::new();
        let a = client(&transport, Generation::Modern);
        let b = a.clone();
        a.cache()
            .store(crate::cache::CacheKey::list(ResourceKind::Account), serde_json::json!([]));
        assert!(b.cache().contains(&crate::cache::CacheKey::list(ResourceKind::Account)));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(SyncClient::new("::nope::", Generation::Legacy).is_err());
    }
}
