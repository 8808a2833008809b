//! Resource abstraction layer
//!
//! Every resource (account, category, description, parameter, transaction,
//! totals) is handled by the same code, driven by descriptors loaded from
//! JSON at compile time.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource descriptors from embedded JSON
//! - [`validate`] - Payload validation and sanitization before any request
//! - [`identifier`] - Client-side identifier minting for inserts
//! - [`fetcher`] - Read-only list/get calls that fill the cache
//! - [`mutation`] - Insert/update/delete pipeline ending in cache synchronization
//!
//! # Resource Descriptors
//!
//! Descriptors are defined in JSON files under `src/resources/`:
//! - `ledger.json` - accounts, transactions and per-account totals
//! - `reference.json` - categories, descriptions and parameters

pub mod fetcher;
pub mod identifier;
pub mod mutation;
pub mod registry;
pub mod validate;

pub use fetcher::{fetch_list, fetch_one, fetch_scoped, refresh_all};
pub use identifier::{EntropySource, IdGenerator, OsEntropy};
pub use mutation::{delete, insert, update, DeleteOutcome, MutationStage};
pub use registry::*;
pub use validate::{canonicalize_key, validate, FieldError, ValidationResult};
