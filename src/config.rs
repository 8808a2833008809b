//! Configuration Management
//!
//! Persistent settings for finsync, stored as JSON under the user's config
//! directory.

use crate::api::client::SyncClient;
use crate::api::endpoint::Generation;
use crate::resource::ResourceKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8443";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Backend base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Default backend generation
    #[serde(default)]
    pub generation: Option<Generation>,
    /// Per-resource generation, keyed by resource name
    #[serde(default)]
    pub generation_overrides: HashMap<String, Generation>,
    /// Last resource the CLI operated on
    #[serde(default)]
    pub last_resource: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("finsync").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config {}: {}", path.display(), e);
                Self::default()
            },
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Effective base URL (CLI > config > default)
    pub fn effective_base_url(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Effective default generation (CLI > config > legacy)
    pub fn effective_generation(&self, cli: Option<Generation>) -> Generation {
        cli.or(self.generation).unwrap_or_default()
    }

    /// Apply the configured per-resource overrides to a client.
    ///
    /// Unknown resource names are skipped with a warning.
    pub fn apply_overrides(&self, mut client: SyncClient) -> SyncClient {
        for (name, generation) in &self.generation_overrides {
            match name.parse::<ResourceKind>() {
                Ok(kind) => client = client.with_generation_override(kind, *generation),
                Err(e) => tracing::warn!("Ignoring generation override for {}: {}", name, e),
            }
        }
        client
    }

    /// Remember the last resource and save
    pub fn set_last_resource(&mut self, kind: ResourceKind) -> Result<()> {
        self.last_resource = Some(kind.to_string());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("finsync-config-test-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.effective_base_url(None), DEFAULT_BASE_URL);
        assert_eq!(config.effective_generation(None), Generation::Legacy);
    }

    #[test]
    fn test_cli_beats_config() {
        let config = Config {
            base_url: Some("http://finance.lan:8443".to_string()),
            generation: Some(Generation::Modern),
            ..Default::default()
        };
        assert_eq!(config.effective_base_url(None), "http://finance.lan:8443");
        assert_eq!(config.effective_base_url(Some("http://other:1")), "http://other:1");
        assert_eq!(config.effective_generation(None), Generation::Modern);
        assert_eq!(config.effective_generation(Some(Generation::Legacy)), Generation::Legacy);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = scratch_path("config.json");
        let mut config = Config {
            base_url: Some("http://localhost:9000".to_string()),
            generation: Some(Generation::Modern),
            ..Default::default()
        };
        config
            .generation_overrides
            .insert("parameter".to_string(), Generation::Legacy);

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_or_corrupt_file_falls_back() {
        let path = scratch_path("config.json");
        assert_eq!(Config::load_from(&path), Config::default());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_overrides_apply_to_client() {
        let mut config = Config::default();
        config
            .generation_overrides
            .insert("categories".to_string(), Generation::Modern);
        config
            .generation_overrides
            .insert("widgets".to_string(), Generation::Modern);

        let client = SyncClient::new(DEFAULT_BASE_URL, Generation::Legacy).unwrap();
        let client = config.apply_overrides(client);
        assert_eq!(client.generation_for(ResourceKind::Category), Generation::Modern);
        assert_eq!(client.generation_for(ResourceKind::Account), Generation::Legacy);
    }
}
