//! ═══════════════════════════════════════════════════════════════════════════════
//! PREDICTION — What Should the Next Reading Be?
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Per channel, first applicable source wins:
//! ```text
//!   1. Actuator model  (light only, needs an output-level hint)  70/30 with EWMA
//!   2. Diurnal blend   (diurnal channel, bucket for this hour)   60/40 with EWMA
//!   3. Trend           (EWMA not warmed up, ≥2 recent values)     last + 30% of Δ
//!   4. Baseline        (EWMA exists)
//!   5. No data
//! ```
//!
//! Pure read of the baseline. No I/O, no allocation beyond the result.
//! ═══════════════════════════════════════════════════════════════════════════════

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::baseline::BaselineStore;
use crate::channel::{Channel, ChannelMap, ChannelValues};

// ═══════════════════════════════════════════════════════════════════════════════
// BASIS — Which model produced the estimate
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered by priority: the overall basis of a prediction is the max over channels
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    #[default]
    NoData,
    Baseline,
    TrendExtrapolation,
    DiurnalBlend,
    ActuatorModel,
}

impl Basis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Basis::NoData => "no-data",
            Basis::Baseline => "baseline",
            Basis::TrendExtrapolation => "trend-extrapolation",
            Basis::DiurnalBlend => "diurnal-blend",
            Basis::ActuatorModel => "actuator-model",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTUATOR MODEL — LED output → light sensor
// ═══════════════════════════════════════════════════════════════════════════════

/// Light the sensor sees as a function of the agent's own LED output level
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightModel {
    /// Lux seen with the LEDs off (sensor floor / ambient spill)
    pub ambient_floor_lux: f64,
    /// Additional lux at full output
    pub full_output_lux: f64,
}

impl Default for LightModel {
    fn default() -> Self {
        Self {
            ambient_floor_lux: 5.0,
            full_output_lux: 400.0,
        }
    }
}

impl LightModel {
    pub fn predict_lux(&self, level: f64) -> f64 {
        self.ambient_floor_lux + level.clamp(0.0, 1.0) * self.full_output_lux
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Share of the actuator model in the actuator/EWMA blend
    pub actuator_weight: f64,
    /// Share of the hour bucket in the diurnal/EWMA blend
    pub diurnal_weight: f64,
    /// Fraction of the last delta carried forward
    pub trend_damping: f64,
    /// Observations at which confidence reaches 0.5 (before the floor)
    pub confidence_scale: f64,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
    pub light_model: LightModel,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            actuator_weight: 0.7,
            diurnal_weight: 0.6,
            trend_damping: 0.3,
            confidence_scale: 20.0,
            confidence_floor: 0.3,
            confidence_ceiling: 0.95,
            light_model: LightModel::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PREDICTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Best estimate for every channel at one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub timestamp: DateTime<Utc>,
    pub values: ChannelValues,
    /// Basis per channel
    pub bases: ChannelMap<Basis>,
    /// Highest-priority basis used by any channel
    pub basis: Basis,
    /// In [floor, ceiling], never 0 or 1
    pub confidence: f64,
    pub hour: Option<u8>,
    pub actuator_level: Option<f64>,
    /// Observation counter when this prediction was made
    pub observation_count: u64,
}

impl Prediction {
    /// A prediction with no estimates
    pub fn empty(timestamp: DateTime<Utc>, confidence: f64) -> Self {
        Self {
            timestamp,
            values: ChannelValues::empty(),
            bases: ChannelMap::default(),
            basis: Basis::NoData,
            confidence,
            hour: None,
            actuator_level: None,
            observation_count: 0,
        }
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.values[channel]
    }

    pub fn basis_of(&self, channel: Channel) -> Basis {
        self.bases[channel]
    }

    pub fn has_any(&self) -> bool {
        self.values.present().next().is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct PredictionEngine {
    config: PredictionConfig,
}

impl PredictionEngine {
    pub fn new(config: PredictionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    /// Smooth saturation in observation count, clamped to [floor, ceiling]
    pub fn confidence(&self, observation_count: u64) -> f64 {
        let k = self.config.confidence_scale.max(f64::EPSILON);
        let raw = 1.0 - 1.0 / (1.0 + observation_count as f64 / k);
        raw.clamp(self.config.confidence_floor, self.config.confidence_ceiling)
    }

    pub fn predict(
        &self,
        store: &BaselineStore,
        actuator_hint: Option<f64>,
        hour: Option<u8>,
    ) -> Prediction {
        self.predict_at(store, actuator_hint, hour, Utc::now())
    }

    pub fn predict_at(
        &self,
        store: &BaselineStore,
        actuator_hint: Option<f64>,
        hour: Option<u8>,
        now: DateTime<Utc>,
    ) -> Prediction {
        let actuator_hint = actuator_hint.filter(|l| l.is_finite());
        let hour = hour.filter(|h| *h < 24);
        let count = store.state().observation_count();

        let mut prediction = Prediction::empty(now, self.confidence(count));
        prediction.hour = hour;
        prediction.actuator_level = actuator_hint;
        prediction.observation_count = count;

        for &channel in Channel::all() {
            let (value, basis) = self.predict_channel(store, channel, actuator_hint, hour);
            prediction.values[channel] = value.map(|v| channel.clamp_value(v));
            prediction.bases[channel] = basis;
            prediction.basis = prediction.basis.max(basis);
        }

        prediction
    }

    fn predict_channel(
        &self,
        store: &BaselineStore,
        channel: Channel,
        actuator_hint: Option<f64>,
        hour: Option<u8>,
    ) -> (Option<f64>, Basis) {
        let state = store.state();
        let ema = state.ema(channel);
        let blend = |primary: f64, weight: f64| match ema {
            Some(base) => weight * primary + (1.0 - weight) * base,
            None => primary,
        };

        if channel == Channel::Light {
            if let Some(level) = actuator_hint {
                let modelled = self.config.light_model.predict_lux(level);
                return (
                    Some(blend(modelled, self.config.actuator_weight)),
                    Basis::ActuatorModel,
                );
            }
        }

        if channel == state.diurnal_channel() {
            if let Some(bucket_mean) = hour.and_then(|h| state.diurnal().mean_at(h)) {
                return (
                    Some(blend(bucket_mean, self.config.diurnal_weight)),
                    Basis::DiurnalBlend,
                );
            }
        }

        if !state.baseline_ready(channel, store.config().warmup_samples) {
            if let Some((prev, last)) = state.recent(channel).last_pair() {
                let next = last + self.config.trend_damping * (last - prev);
                return (Some(next), Basis::TrendExtrapolation);
            }
        }

        match ema {
            Some(base) => (Some(base), Basis::Baseline),
            None => (None, Basis::NoData),
        }
    }
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new(PredictionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineConfig;

    fn store_with(channel: Channel, values: &[f64], hour: Option<u8>) -> BaselineStore {
        let mut store = BaselineStore::in_memory(BaselineConfig::default());
        for &v in values {
            store.state_mut().record(channel, v, hour);
            store.state_mut().increment_count();
        }
        store
    }

    #[test]
    fn test_empty_baseline_is_no_data() {
        let engine = PredictionEngine::default();
        let store = BaselineStore::in_memory(BaselineConfig::default());
        let p = engine.predict(&store, None, Some(12));
        assert_eq!(p.basis, Basis::NoData);
        assert!(!p.has_any());
        assert_eq!(p.confidence, 0.3);
    }

    #[test]
    fn test_baseline_after_warmup() {
        let engine = PredictionEngine::default();
        let store = store_with(Channel::Humidity, &[40.0, 40.0, 40.0, 40.0], None);
        let p = engine.predict(&store, None, None);
        assert_eq!(p.basis_of(Channel::Humidity), Basis::Baseline);
        assert_eq!(p.get(Channel::Humidity), Some(40.0));
    }

    #[test]
    fn test_trend_before_warmup() {
        let engine = PredictionEngine::default();
        let store = store_with(Channel::Warmth, &[0.4, 0.5], None);
        let p = engine.predict(&store, None, None);
        assert_eq!(p.basis_of(Channel::Warmth), Basis::TrendExtrapolation);
        let v = p.get(Channel::Warmth).unwrap();
        assert!((v - 0.53).abs() < 1e-9, "v = {}", v);
    }

    #[test]
    fn test_trend_is_clamped_to_physical_range() {
        let engine = PredictionEngine::default();
        let store = store_with(Channel::Presence, &[0.2, 1.0], None);
        let p = engine.predict(&store, None, None);
        assert_eq!(p.get(Channel::Presence), Some(1.0));
    }

    #[test]
    fn test_diurnal_blend() {
        let engine = PredictionEngine::default();
        let mut store = store_with(Channel::AmbientTemp, &[20.0; 5], Some(9));
        // Same hour bucket pulled upward, EWMA lags behind
        for _ in 0..5 {
            store.state_mut().record(Channel::AmbientTemp, 30.0, Some(9));
        }
        let p = engine.predict(&store, None, Some(9));
        assert_eq!(p.basis_of(Channel::AmbientTemp), Basis::DiurnalBlend);
        let ema = store.state().ema(Channel::AmbientTemp).unwrap();
        let expected = 0.6 * 25.0 + 0.4 * ema;
        assert!((p.get(Channel::AmbientTemp).unwrap() - expected).abs() < 1e-9);

        // Other hour: no bucket, falls back to baseline
        let p = engine.predict(&store, None, Some(21));
        assert_eq!(p.basis_of(Channel::AmbientTemp), Basis::Baseline);
    }

    #[test]
    fn test_actuator_model_takes_priority() {
        let engine = PredictionEngine::default();
        let store = store_with(Channel::Light, &[100.0; 4], None);
        let p = engine.predict(&store, Some(0.5), None);
        assert_eq!(p.basis_of(Channel::Light), Basis::ActuatorModel);
        assert_eq!(p.basis, Basis::ActuatorModel);
        let expected = 0.7 * 205.0 + 0.3 * 100.0;
        assert!((p.get(Channel::Light).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_actuator_model_without_baseline() {
        let engine = PredictionEngine::default();
        let store = BaselineStore::in_memory(BaselineConfig::default());
        let p = engine.predict(&store, Some(1.0), None);
        assert_eq!(p.get(Channel::Light), Some(405.0));
    }

    #[test]
    fn test_confidence_monotone_and_bounded() {
        let engine = PredictionEngine::default();
        let mut last = 0.0;
        for n in 0..10_000u64 {
            let c = engine.confidence(n);
            assert!(c >= last);
            assert!((0.3..=0.95).contains(&c));
            last = c;
        }
        assert!(engine.confidence(10) > 0.3);
    }
}
