//! Client-side identifier minting
//!
//! Identifiers minted here become durable primary keys, so they come from the
//! OS CSPRNG only. There is no fallback source.

use crate::api::error::{ApiResult, CanonicalError};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use uuid::{Builder, Uuid};

/// Source of cryptographically strong random bytes
pub trait EntropySource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), String>;
}

/// Operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), String> {
        OsRng.try_fill_bytes(dest).map_err(|e| e.to_string())
    }
}

/// Mints 128-bit random identifiers in canonical hyphenated form
#[derive(Clone)]
pub struct IdGenerator {
    entropy: Arc<dyn EntropySource>,
}

impl IdGenerator {
    pub fn new(entropy: Arc<dyn EntropySource>) -> Self {
        Self { entropy }
    }

    /// Mint a new identifier, e.g. `"3f2b8c1e-9a4d-4e6f-8b21-0c5d7e9fa123"`.
    ///
    /// Fails with `Unknown` when the entropy source is unavailable; callers
    /// must abort rather than invent an identifier.
    pub async fn generate(&self) -> ApiResult<String> {
        let mut bytes = [0u8; 16];
        self.entropy.fill(&mut bytes).map_err(|e| {
            tracing::error!("Entropy source unavailable: {}", e);
            CanonicalError::unknown(format!("Failed to generate identifier: {}", e))
        })?;

        let id: Uuid = Builder::from_random_bytes(bytes).into_uuid();
        Ok(id.hyphenated().to_string())
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(Arc::new(OsEntropy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ErrorKind;
    use std::collections::HashSet;

    struct BrokenEntropy;

    impl EntropySource for BrokenEntropy {
        fn fill(&self, _dest: &mut [u8]) -> Result<(), String> {
            Err("getrandom: device not configured".to_string())
        }
    }

    #[test]
    fn test_generates_canonical_v4_uuid() {
        let id = tokio_test::block_on(IdGenerator::default().generate()).unwrap();
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(id, id.to_lowercase());
    }

    #[tokio::test]
    async fn test_identifiers_do_not_repeat() {
        let generator = IdGenerator::default();
        let mut seen = HashSet::new();
        for _ in 0..500 {
            assert!(seen.insert(generator.generate().await.unwrap()));
        }
    }

    #[tokio::test]
    async fn test_entropy_failure_is_unknown_error() {
        let generator = IdGenerator::new(Arc::new(BrokenEntropy));
        let err = generator.generate().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(err.message.contains("device not configured"));
    }
}
