//! Loader tuning configuration
//!
//! Every pacing constant of the loading screen lives here so it can be tuned
//! from a TOML file without code changes.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::startup::readiness::ReadinessSignal;
use crate::startup::resource::ResourceKind;

/// Minimum time (ms) a resource of each kind occupies the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinDurations {
    pub font: u64,
    pub image: u64,
    pub config: u64,
    pub character_asset: u64,
    pub generic: u64,
}

impl Default for MinDurations {
    fn default() -> Self {
        Self {
            font: 10,
            image: 10,
            config: 10,
            character_asset: 10,
            generic: 10,
        }
    }
}

impl MinDurations {
    /// No floor at all, used by tests and tight embeddings
    pub fn none() -> Self {
        Self {
            font: 0,
            image: 0,
            config: 0,
            character_asset: 0,
            generic: 0,
        }
    }

    pub fn for_kind(&self, kind: ResourceKind) -> Duration {
        let millis = match kind {
            ResourceKind::Font => self.font,
            ResourceKind::Image => self.image,
            ResourceKind::Config => self.config,
            ResourceKind::CharacterAsset => self.character_asset,
            ResourceKind::Generic => self.generic,
        };
        Duration::from_millis(millis)
    }
}

/// Loading screen configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Delay between consecutive resources (ms)
    pub stagger_ms: u64,
    /// Upper bound on the whole loading screen (ms)
    pub watchdog_ms: u64,
    /// Pause between natural completion and finalize (ms)
    pub finalize_grace_ms: u64,
    /// Delay before loading starts so the indicator is shown at 0% (ms)
    pub show_delay_ms: u64,
    /// Animation tick for the displayed progress (ms)
    pub tick_ms: u64,
    /// Fraction of the remaining gap closed per tick
    pub smoothing_factor: f64,
    /// Gap below which the displayed value snaps to the target
    pub settle_epsilon: f64,
    /// Interval for flag-based readiness polling (ms)
    pub poll_interval_ms: u64,
    /// Location of the site configuration document
    pub site_config_url: String,
    /// Directory that relative resource URLs resolve against
    pub asset_root: Option<PathBuf>,
    /// Timeout for individual HTTP requests (ms)
    pub request_timeout_ms: u64,
    /// Per-kind minimum durations (kept last so it serializes as a trailing table)
    pub min_durations: MinDurations,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            stagger_ms: 200,
            watchdog_ms: 15_000,
            finalize_grace_ms: 800,
            show_delay_ms: 300,
            tick_ms: 16, // ~60 FPS
            smoothing_factor: 0.1,
            settle_epsilon: 0.001,
            poll_interval_ms: 100,
            site_config_url: "_config.toml".to_string(),
            asset_root: None,
            request_timeout_ms: 10_000,
            min_durations: MinDurations::default(),
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config dir>/startgate/loader.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("startgate").join("loader.toml"))
    }

    /// Load configuration from file, falling back to defaults when it does not exist
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read loader config {}", path.display()))?;

        let config: LoaderConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse loader config {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = toml::to_string_pretty(self).context("Failed to serialize loader config")?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write loader config {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(anyhow!("Smoothing factor must be in (0, 1]"));
        }

        if self.settle_epsilon <= 0.0 {
            return Err(anyhow!("Settle epsilon must be greater than 0"));
        }

        if self.tick_ms == 0 {
            return Err(anyhow!("Animation tick must be greater than 0"));
        }

        if self.watchdog_ms == 0 {
            return Err(anyhow!("Watchdog ceiling must be greater than 0"));
        }

        Ok(())
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn watchdog_ceiling(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    pub fn finalize_grace(&self) -> Duration {
        Duration::from_millis(self.finalize_grace_ms)
    }

    pub fn show_delay(&self) -> Duration {
        Duration::from_millis(self.show_delay_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Readiness signal for a collaborator that only exposes a shared flag.
    pub fn flag_signal(&self, flag: Arc<AtomicBool>) -> ReadinessSignal {
        ReadinessSignal::from_flag(flag, self.poll_interval())
    }
}
