//! Client-side cache
//!
//! - [`store`] - Composite-keyed entry map shared with readers
//! - [`sync`] - Rules that keep entries consistent after a mutation
//!
//! Keys are structured: a resource plus a scope (whole list, one entity, or
//! everything under one parent entity such as an account's totals).

pub mod store;
pub mod sync;

pub use store::{Cache, CacheEntry, CacheKey, CacheScope};
pub use sync::{aggregate_key, CacheSynchronizer, Mutation, SyncError};
