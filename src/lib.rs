//! Client-side synchronization layer for the finance tracker API.
//!
//! Validates payloads, resolves endpoints for the legacy and modern backend
//! generations, normalizes responses into one error taxonomy, mints
//! identifiers for client-created entities, and keeps the in-memory cache
//! consistent after every successful mutation.

pub mod api;
pub mod cache;
pub mod config;
pub mod resource;

pub use api::client::SyncClient;
pub use api::endpoint::{Generation, Operation};
pub use api::{ApiResult, CanonicalError, ErrorKind};
pub use cache::{Cache, CacheKey};
pub use resource::{DeleteOutcome, ResourceKind};
