//! Engine configuration.
//!
//! The scoring constants here look arbitrary because they are: the x10
//! memory scale and the /72 age decay were calibrated empirically in the
//! field and changing them changes which processes get selected. They are
//! configuration, not derivable values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Weights of the five kill-score components. They sum to 1.0 by default
/// but nothing enforces that; the weights are relative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub cpu: f64,
    pub memory: f64,
    pub fds: f64,
    pub age: f64,
    pub category: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            cpu: 0.40,
            memory: 0.30,
            fds: 0.10,
            age: 0.10,
            category: 0.10,
        }
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclaimConfig {
    /// Kill-score component weights
    pub weights: ScoreWeights,

    /// Memory% multiplier before clamping (memory percentages run much
    /// lower than CPU percentages)
    pub memory_scale: f64,

    /// Age decay divisor: score contribution is max(0, 50 - age_secs/divisor)
    pub age_decay_divisor: f64,

    /// Score assigned to protected processes (effectively -inf for ranking)
    pub protected_score: f64,

    /// Minimum seconds between automatic trigger actions
    pub cooldown_secs: u64,

    /// Maximum processes killed per automatic trigger
    pub auto_kill_cap: usize,

    /// Maximum processes killed per manually invoked cleanup
    pub manual_kill_cap: usize,

    /// Run a cache-cleanup pass behind automatic triggers as well as the
    /// kill pass
    pub auto_clean_caches: bool,

    /// Grace period before escalating SIGTERM to SIGKILL, seconds
    pub grace_period_secs: f64,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            memory_scale: 10.0,
            age_decay_divisor: 72.0,
            protected_score: -1000.0,
            cooldown_secs: 180,
            auto_kill_cap: 5,
            manual_kill_cap: 10,
            auto_clean_caches: false,
            grace_period_secs: 2.0,
        }
    }
}

impl ReclaimConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config.sanitized())
    }

    /// Repair values a hand-edited file could break. The grace period
    /// feeds `Duration::from_secs_f64`, which panics on negative or
    /// non-finite input.
    fn sanitized(mut self) -> Self {
        if !self.grace_period_secs.is_finite() || self.grace_period_secs < 0.0 {
            self.grace_period_secs = Self::default().grace_period_secs;
        }
        self
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sysreclaim").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load_or_default() -> Self {
        Self::default_path()
            .filter(|p| p.exists())
            .and_then(|p| Self::load(&p).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_preserve_calibrated_constants() {
        let config = ReclaimConfig::default();
        assert_eq!(config.memory_scale, 10.0);
        assert_eq!(config.age_decay_divisor, 72.0);
        assert_eq!(config.protected_score, -1000.0);
        assert_eq!(config.cooldown_secs, 180);
        assert_eq!(config.auto_kill_cap, 5);
    }

    #[test]
    fn broken_grace_period_is_repaired_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");

        for bad in ["-5.0", "nan", "inf"] {
            let path = dir.path().join("config.toml");
            let content = toml::to_string_pretty(&ReclaimConfig::default())
                .expect("serialize")
                .replace("grace_period_secs = 2.0", &format!("grace_period_secs = {bad}"));
            std::fs::write(&path, content).expect("write");

            let loaded = ReclaimConfig::load(&path).expect("load");
            assert_eq!(loaded.grace_period_secs, 2.0, "input {bad}");
        }
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        let mut config = ReclaimConfig::default();
        config.cooldown_secs = 60;
        config.save(&path).expect("save");

        let loaded = ReclaimConfig::load(&path).expect("load");
        assert_eq!(loaded.cooldown_secs, 60);
        assert_eq!(loaded.weights.cpu, 0.40);
    }
}
