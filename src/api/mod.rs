//! Finance tracker API interaction module
//!
//! # Module Structure
//!
//! - [`client`] - Client facade combining transport, cache and identifier minting
//! - [`endpoint`] - Path/verb resolution for the legacy and modern generations
//! - [`error`] - Canonical error taxonomy
//! - [`http`] - Transport trait and the reqwest implementation
//! - [`normalize`] - Response decoding into values or canonical errors
//!
//! # Example
//!
//! ```ignore
//! use finsync::api::{client::SyncClient, endpoint::Generation};
//! use finsync::resource::ResourceKind;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = SyncClient::new("http://localhost:8443", Generation::Modern)?;
//!     let accounts = client.list(ResourceKind::Account).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod normalize;

pub use error::{ApiResult, CanonicalError, ErrorKind};
