use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Embedding/summarization provider settings plus daemon-tunable knobs.
/// Loaded from `.oak/ci/config.toml`; any field not present falls back to
/// its default, so existing config files keep working across additive
/// schema changes here too.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CiConfig {
    pub embedding: ProviderConfig,
    pub summarization: ProviderConfig,
    /// Seconds an active batch may sit untouched before the recovery pass
    /// force-completes it.
    pub stuck_batch_timeout_secs: u64,
    /// Entries kept in the hook dedup LRU.
    pub dedup_cache_size: usize,
    /// Seconds between processor ticks.
    pub processor_tick_secs: u64,
    /// Max bytes before `daemon.log`/`hooks.log` rotate.
    pub log_rotation_bytes: u64,
    pub governance: GovernanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Pre-tool-use policy: tools or path globs the daemon should flag or deny
/// before the agent is allowed to run them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub denied_tools: Vec<String>,
    pub denied_path_globs: Vec<String>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self { denied_tools: Vec::new(), denied_path_globs: Vec::new() }
    }
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            embedding: ProviderConfig::default(),
            summarization: ProviderConfig::default(),
            stuck_batch_timeout_secs: 1800,
            dedup_cache_size: 4096,
            processor_tick_secs: 60,
            log_rotation_bytes: 10 * 1024 * 1024,
            governance: GovernanceConfig::default(),
        }
    }
}

impl CiConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_toml() {
        let cfg = CiConfig::default();
        let raw = toml::to_string_pretty(&cfg).unwrap();
        let parsed: CiConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.processor_tick_secs, cfg.processor_tick_secs);
    }

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CiConfig::load(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(cfg.dedup_cache_size, 4096);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = CiConfig::default();
        cfg.dedup_cache_size = 128;
        cfg.save(&path).unwrap();
        let loaded = CiConfig::load(&path).unwrap();
        assert_eq!(loaded.dedup_cache_size, 128);
    }
}
