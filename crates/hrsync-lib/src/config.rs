use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_MAX_SHIFT_S: u32 = 3600;
pub const DEFAULT_AMBIGUITY_MARGIN: f64 = 0.05;

/// Tunables for offset estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Largest admissible offset magnitude (seconds).
    pub max_shift_s: u32,
    /// Relative gap the correlation peak must keep over the next best local
    /// maximum before the estimate is trusted.
    pub ambiguity_margin: f64,
    /// Fail on an ambiguous peak instead of warning.
    pub strict: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_shift_s: DEFAULT_MAX_SHIFT_S,
            ambiguity_margin: DEFAULT_AMBIGUITY_MARGIN,
            strict: false,
        }
    }
}

impl SyncConfig {
    /// Command-line values win over file values.
    pub fn with_overrides(mut self, max_shift_s: Option<u32>, strict: bool) -> Self {
        if let Some(max_shift_s) = max_shift_s {
            self.max_shift_s = max_shift_s;
        }
        self.strict |= strict;
        self
    }
}

pub fn parse_config(text: &str) -> Result<SyncConfig> {
    let cfg: SyncConfig = toml::from_str(text).context("parsing sync config")?;
    if !(0.0..1.0).contains(&cfg.ambiguity_margin) {
        anyhow::bail!(
            "ambiguity_margin must be in [0, 1), got {}",
            cfg.ambiguity_margin
        );
    }
    Ok(cfg)
}

pub fn read_config(path: &Path) -> Result<SyncConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&text).with_context(|| format!("in {}", path.display()))
}
