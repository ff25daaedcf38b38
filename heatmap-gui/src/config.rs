//! # Application Configuration
//!
//! Settings read at startup from `heatmap.json`, or from the file named by
//! the `HEATMAP_CONFIG` environment variable. Every field has a default, so
//! a missing file or a partial one is fine.

use anyhow::{Context, Result};
use heatmap_core::VisualizationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "HEATMAP_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "heatmap.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub visualization: VisualizationConfig,
    pub audio: AudioSettings,
}

/// Capture and analysis settings of the producer thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Preferred capture rate in Hz; the device may pick the closest it supports.
    pub sample_rate: u32,
    /// Milliseconds of audio per heatmap column.
    pub interval_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            interval_ms: 10,
        }
    }
}

impl AudioSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// Path of the configuration file, honoring `HEATMAP_CONFIG`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Loads the configuration from `path`.
///
/// # Returns
/// * `Ok(config)` - Parsed configuration, or defaults when the file does not exist
/// * `Err(e)` - The file exists but could not be read or parsed
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        log::info!("no configuration at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = parse_config(&data).with_context(|| format!("invalid configuration in {}", path.display()))?;
    log::info!("loaded configuration from {}", path.display());
    Ok(config)
}

fn parse_config(data: &str) -> Result<AppConfig> {
    let config: AppConfig = serde_json::from_str(data)?;
    config.visualization.validate()?;
    Ok(config)
}
