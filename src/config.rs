//! Pipeline configuration.
//!
//! Stored as TOML at `~/.config/nwbi/config.toml` (or XDG equivalent). A
//! missing file means defaults; a present file is validated on load.
//!
//! # Example Configuration
//!
//! ```toml
//! precision = 2
//! top_products = 15
//! top_customers = 20
//! fast_delivery_days = 7
//!
//! [segments]
//! cuts = [0.5, 0.8]
//! labels = ["Occasional", "Loyal", "VIP"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::DEFAULT_PRECISION;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Largest accepted `precision`.
pub const MAX_PRECISION: u32 = 10;

/// Tunables for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Decimal places for line totals, profit and derived money columns.
    pub precision: u32,
    /// Rows kept in the product rankings.
    pub top_products: usize,
    /// Rows kept in the customer ranking.
    pub top_customers: usize,
    /// Deliveries at or under this many days count as fast.
    pub fast_delivery_days: i64,
    pub segments: SegmentConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            top_products: 15,
            top_customers: 20,
            fast_delivery_days: 7,
            segments: SegmentConfig::default(),
        }
    }
}

/// Customer segmentation cut points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentConfig {
    /// Ascending quantiles strictly inside (0, 1).
    pub cuts: Vec<f64>,
    /// One more label than cuts, lowest segment first.
    pub labels: Vec<String>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            cuts: vec![0.5, 0.8],
            labels: vec!["Occasional".into(), "Loyal".into(), "VIP".into()],
        }
    }
}

impl PipelineConfig {
    /// Load configuration from the default location.
    ///
    /// Returns the defaults if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path.
    ///
    /// Uses XDG conventions:
    /// - Primary: `$XDG_CONFIG_HOME/nwbi/config.toml`
    /// - Fallback: platform-specific config dir (e.g., `~/.config/nwbi/config.toml` on Linux)
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config).join("nwbi").join("config.toml"));
        }

        dirs::config_dir()
            .map(|p| p.join("nwbi").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::Validation(msg));

        if self.precision > MAX_PRECISION {
            return fail(format!(
                "precision must be at most {MAX_PRECISION}, got {}",
                self.precision
            ));
        }
        if self.top_products == 0 || self.top_customers == 0 {
            return fail("top_products and top_customers must be positive".into());
        }

        let seg = &self.segments;
        if seg.labels.len() != seg.cuts.len() + 1 {
            return fail(format!(
                "segments need one more label than cuts ({} labels, {} cuts)",
                seg.labels.len(),
                seg.cuts.len()
            ));
        }
        if seg.cuts.iter().any(|c| !(*c > 0.0 && *c < 1.0)) {
            return fail("segment cuts must lie strictly between 0 and 1".into());
        }
        if seg.cuts.windows(2).any(|w| w[0] >= w[1]) {
            return fail("segment cuts must be strictly ascending".into());
        }
        let mut seen = std::collections::HashSet::new();
        for label in &seg.labels {
            if !seen.insert(label.as_str()) {
                return fail(format!("duplicate segment label: {label}"));
            }
        }

        Ok(())
    }
}
