//! ═══════════════════════════════════════════════════════════════════════════════
//! CONFIG — Monitor Settings and Thresholds
//! ═══════════════════════════════════════════════════════════════════════════════
//! Every tunable constant lives in a component config with a `Default`.
//! File config overrides defaults, environment overrides file.
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::baseline::{default_baseline_path, BaselineConfig};
use crate::curiosity::CuriosityConfig;
use crate::error::{ConfigError, ForesightResult};
use crate::evaluator::EvaluatorConfig;
use crate::prediction::PredictionConfig;
use crate::reflection::GateConfig;

pub const ENV_BASELINE_PATH: &str = "FORESIGHT_BASELINE_PATH";
pub const ENV_SAVE_INTERVAL: &str = "FORESIGHT_SAVE_INTERVAL";

/// Main monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Baseline file; `None` keeps everything in memory
    pub baseline_path: Option<PathBuf>,
    pub baseline: BaselineConfig,
    pub prediction: PredictionConfig,
    pub evaluator: EvaluatorConfig,
    pub gate: GateConfig,
    pub curiosity: CuriosityConfig,
}

impl MonitorConfig {
    /// Defaults persisted at the standard data location
    pub fn persistent() -> Self {
        Self {
            baseline_path: Some(default_baseline_path()),
            ..Self::default()
        }
    }

    /// Load from a JSON file (missing file → defaults), then apply environment
    pub fn load(path: &Path) -> ForesightResult<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> ForesightResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> ForesightResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `FORESIGHT_*` overrides read through `lookup`
    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ForesightResult<()> {
        if let Some(path) = lookup(ENV_BASELINE_PATH) {
            if !path.trim().is_empty() {
                self.baseline_path = Some(PathBuf::from(path));
            }
        }
        if let Some(raw) = lookup(ENV_SAVE_INTERVAL) {
            self.baseline.save_interval =
                raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: ENV_SAVE_INTERVAL.to_string(),
                    message: format!("not an integer: {:?}", raw),
                })?;
        }
        Ok(())
    }

    /// Reject values the components cannot work with
    pub fn validate(&self) -> ForesightResult<()> {
        let fraction = |field: &str, v: f64| -> ForesightResult<()> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(invalid(field, format!("{} is outside [0, 1]", v)))
            }
        };

        if !(self.baseline.ema_alpha > 0.0 && self.baseline.ema_alpha <= 1.0) {
            return Err(invalid("baseline.ema_alpha", "must be in (0, 1]".to_string()));
        }
        if self.baseline.weight_floor > self.baseline.weight_ceiling {
            return Err(invalid(
                "baseline.weight_floor",
                "must not exceed weight_ceiling".to_string(),
            ));
        }
        if self.baseline.diurnal_bucket_size == 0 || self.baseline.recent_window == 0 {
            return Err(invalid(
                "baseline",
                "window sizes must be positive".to_string(),
            ));
        }
        fraction("prediction.actuator_weight", self.prediction.actuator_weight)?;
        fraction("prediction.diurnal_weight", self.prediction.diurnal_weight)?;
        fraction("prediction.confidence_floor", self.prediction.confidence_floor)?;
        fraction("prediction.confidence_ceiling", self.prediction.confidence_ceiling)?;
        if self.prediction.confidence_floor > self.prediction.confidence_ceiling {
            return Err(invalid(
                "prediction.confidence_floor",
                "must not exceed confidence_ceiling".to_string(),
            ));
        }
        fraction("gate.accumulator_decay", self.gate.accumulator_decay)?;
        if self.gate.cooldown_secs < 0 {
            return Err(invalid("gate.cooldown_secs", "must be >= 0".to_string()));
        }
        if self.curiosity.reward_step < 0.0 || self.curiosity.penalty_step < 0.0 {
            return Err(invalid(
                "curiosity",
                "reward and penalty steps must be >= 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Save config as JSON
    pub fn save(&self, path: &Path) -> ForesightResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

fn invalid(field: &str, message: String) -> crate::error::ForesightError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    }
    .into()
}
