//! Pipeline configuration helpers.
//!
//! This module loads, validates, and normalizes the pipeline config so every
//! deployment choice (oracle endpoints, pacing, read-back strictness) lives
//! in one reviewed file instead of scattered constants.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::contracts::Tier;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// What to do when a read-back after persist does not match what was
/// written. `warn` mirrors the historical behavior; `fail` upgrades the
/// mismatch to a batch abort.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadbackPolicy {
    #[default]
    Warn,
    Fail,
}

/// Deployment-owned configuration for the enrichment pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub schema_version: u32,
    pub tokenizer_url: String,
    pub g2p_url: String,
    pub phonetic_url: String,
    pub dictionary_url: String,
    pub normalizer_url: String,
    /// Per-call timeout for every oracle; a hung oracle fails its call
    /// instead of blocking the batch.
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,
    /// Fixed delay between token iterations to bound oracle call rates.
    /// Not a token-bucket limiter.
    #[serde(default = "default_pause_between_ms")]
    pub pause_between_ms: u64,
    #[serde(default)]
    pub readback: ReadbackPolicy,
    #[serde(default)]
    pub target_tier: Tier,
}

fn default_oracle_timeout_secs() -> u64 {
    30
}

fn default_pause_between_ms() -> u64 {
    500
}

/// Build the default config used when a deployment is first initialized.
pub fn default_config() -> PipelineConfig {
    PipelineConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        tokenizer_url: "http://localhost:8701/tokenize".to_string(),
        g2p_url: "http://localhost:8702/g2p".to_string(),
        phonetic_url: "http://localhost:8703/phonetic".to_string(),
        dictionary_url: "http://localhost:8704/lookup".to_string(),
        normalizer_url: "http://localhost:8705/normalize".to_string(),
        oracle_timeout_secs: default_oracle_timeout_secs(),
        pause_between_ms: default_pause_between_ms(),
        readback: ReadbackPolicy::default(),
        target_tier: Tier::default(),
    }
}

/// Render a pretty JSON config stub for new deployments or edit suggestions.
pub fn config_stub() -> String {
    serde_json::to_string_pretty(&default_config()).expect("serialize config stub")
}

/// Load the config from disk.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: PipelineConfig =
        serde_json::from_slice(&bytes).context("parse pipeline config JSON")?;
    Ok(config)
}

/// Persist a config to disk in a stable JSON format.
pub fn write_config(path: &Path, config: &PipelineConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    let text = serde_json::to_string_pretty(config).context("serialize pipeline config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Validate schema version and endpoint fields.
pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    for (field, url) in [
        ("tokenizer_url", &config.tokenizer_url),
        ("g2p_url", &config.g2p_url),
        ("phonetic_url", &config.phonetic_url),
        ("dictionary_url", &config.dictionary_url),
        ("normalizer_url", &config.normalizer_url),
    ] {
        if url.trim().is_empty() {
            return Err(anyhow!("{field} must be non-empty"));
        }
    }
    if config.oracle_timeout_secs == 0 {
        return Err(anyhow!("oracle_timeout_secs must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
