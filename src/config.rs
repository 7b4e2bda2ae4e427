// =============================================================================
// Engine Configuration — hot-loadable session defaults with atomic save
// =============================================================================
//
// Every tunable carries a `#[serde(default = "...")]` so a config file
// written by an older build still loads cleanly when new fields are added.
// Persistence follows the atomic write-tmp-then-rename pattern used
// throughout this codebase: never leave a torn file behind on crash.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_interval_seconds() -> u64 {
    60
}

fn default_order_quantity() -> u32 {
    1
}

fn default_max_tokens() -> f64 {
    15.0
}

fn default_refill_rate() -> f64 {
    15.0
}

fn default_environment() -> String {
    "vps".to_string()
}

/// Engine-wide defaults applied to a session when its request omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between strategy evaluation cycles.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Shares bought/sold per signal, absent a per-session override.
    #[serde(default = "default_order_quantity")]
    pub order_quantity: u32,

    /// Token-bucket capacity for the broker rate limiter.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: f64,

    /// Token-bucket refill rate, in tokens per second.
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,

    /// Upstream environment: "vps" (virtual trading server) or "real".
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            order_quantity: default_order_quantity(),
            max_tokens: default_max_tokens(),
            refill_rate: default_refill_rate(),
            environment: default_environment(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`. Returns an error if
    /// the file is missing or malformed so the caller can fall back to
    /// defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }
}
