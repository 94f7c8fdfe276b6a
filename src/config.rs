//! Pipeline configuration.
//!
//! Thresholds and encoder settings are loaded from an optional
//! `photo-variants.toml`. Stock defaults are the base layer; a user file only
//! needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [limits]
//! max_file_bytes = 8388608   # Raw upload ceiling (8 MiB)
//! min_width = 240            # Reject below this width
//! min_height = 240           # Reject below this height
//! warn_min_side = 500        # Flag low_res when the shorter side is below this
//! max_aspect_ratio = 3.0     # Reject when max(w/h, h/w) exceeds this
//! max_original_side = 1600   # Downscale the normalized original to this
//!
//! [quality]
//! blur_threshold = 60.0      # Flag blurry below this sharpness score
//!
//! [encoding]
//! raster_quality = 82        # JPEG quality for variants
//! normalized_quality = 85    # JPEG quality for the normalized original
//! secondary_quality = 80     # AVIF quality for variants
//! secondary_speed = 6        # AVIF encoder speed (1 = slowest, 10 = fastest)
//! secondary_enabled = true   # Write AVIF variants at all
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! The variant table and the pipeline version are not configurable: changing
//! either means bumping [`PIPELINE_VERSION`](crate::metadata::PIPELINE_VERSION).
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "photo-variants.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Intake size, aspect and byte limits.
    pub limits: LimitsConfig,
    /// Quality heuristics.
    pub quality: QualityConfig,
    /// Encoder settings for the normalized original and variants.
    pub encoding: EncodingConfig,
    /// Parallel processing settings for batch runs.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.limits;
        if l.max_file_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_file_bytes must be non-zero".into(),
            ));
        }
        if l.min_width == 0 || l.min_height == 0 {
            return Err(ConfigError::Validation(
                "limits.min_width and limits.min_height must be non-zero".into(),
            ));
        }
        if l.max_aspect_ratio.is_nan() || l.max_aspect_ratio < 1.0 {
            return Err(ConfigError::Validation(
                "limits.max_aspect_ratio must be at least 1.0".into(),
            ));
        }
        if l.max_original_side < l.min_width.max(l.min_height) {
            return Err(ConfigError::Validation(
                "limits.max_original_side must not be below the minimum dimensions".into(),
            ));
        }
        if !self.quality.blur_threshold.is_finite() || self.quality.blur_threshold < 0.0 {
            return Err(ConfigError::Validation(
                "quality.blur_threshold must be a non-negative number".into(),
            ));
        }
        let e = &self.encoding;
        for (name, value) in [
            ("raster_quality", e.raster_quality),
            ("normalized_quality", e.normalized_quality),
            ("secondary_quality", e.secondary_quality),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "encoding.{name} must be 1-100"
                )));
            }
        }
        if !(1..=10).contains(&e.secondary_speed) {
            return Err(ConfigError::Validation(
                "encoding.secondary_speed must be 1-10".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Intake limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Raw byte ceiling. Larger files are `file-too-large`.
    pub max_file_bytes: u64,
    /// Minimum accepted width in pixels.
    pub min_width: u32,
    /// Minimum accepted height in pixels.
    pub min_height: u32,
    /// Shorter side below this gets the `low_res` flag.
    pub warn_min_side: u32,
    /// Largest accepted `max(w/h, h/w)`.
    pub max_aspect_ratio: f64,
    /// Longer side of the normalized original.
    pub max_original_side: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 8 * 1024 * 1024,
            min_width: 240,
            min_height: 240,
            warn_min_side: 500,
            max_aspect_ratio: 3.0,
            max_original_side: 1600,
        }
    }
}

/// Quality heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// Sharpness scores below this get the `blurry` flag.
    pub blur_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            blur_threshold: 60.0,
        }
    }
}

/// Encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    /// JPEG quality for every variant.
    pub raster_quality: u32,
    /// JPEG quality for the normalized original.
    pub normalized_quality: u32,
    /// AVIF quality for every variant.
    pub secondary_quality: u32,
    /// AVIF encoder speed, 1 (slowest, smallest) to 10 (fastest).
    pub secondary_speed: u8,
    /// When false, every variant's `avif` slot is null.
    pub secondary_enabled: bool,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            raster_quality: 82,
            normalized_quality: 85,
            secondary_quality: 80,
            secondary_speed: 6,
            secondary_enabled: true,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers for batch runs.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock defaults as a TOML table, the base layer for user overrides.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PipelineConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`.
///
/// A missing file yields the stock defaults. A file that exists but does not
/// parse, has unknown keys, or fails validation is an error.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# photo-variants configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.
#
# The variant set (thumb, medium, large, xlarge) is fixed. Changing it is a
# pipeline version bump, not a config change.

# ---------------------------------------------------------------------------
# Intake limits
# ---------------------------------------------------------------------------
[limits]
# Raw upload ceiling in bytes. Larger files produce {"error": "file-too-large"}.
max_file_bytes = 8388608

# Images narrower or shorter than this are rejected as too_small.
min_width = 240
min_height = 240

# Images whose shorter side is below this are accepted but flagged low_res.
warn_min_side = 500

# Images with max(w/h, h/w) above this are rejected as extreme_aspect.
max_aspect_ratio = 3.0

# The normalized original is downscaled so its longer side is at most this.
max_original_side = 1600

# ---------------------------------------------------------------------------
# Quality heuristics
# ---------------------------------------------------------------------------
[quality]
# Edge-variance sharpness below this flags the image as blurry.
# Empirical calibration; lower it for soft portrait photography.
blur_threshold = 60.0

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[encoding]
# JPEG quality (1-100) for every variant.
raster_quality = 82

# JPEG quality (1-100) for the normalized original.
normalized_quality = 85

# AVIF quality (1-100) for every variant.
secondary_quality = 80

# AVIF encoder speed, 1 (slowest, smallest files) to 10 (fastest).
secondary_speed = 6

# Set to false to skip AVIF output entirely (avif slots become null).
secondary_enabled = true

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for backfill runs.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
