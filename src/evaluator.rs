//! ═══════════════════════════════════════════════════════════════════════════════
//! EVALUATOR — Prediction vs Reality
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Scores one tick:
//! - Linear channels: |actual - predicted| / span
//! - Light: |log10(actual) - log10(predicted)| / decades, both floored first
//! - Each error clamped to [0, 1]
//! - Surprise = attention-weighted mean of scored channels
//! - Sources = channels whose error exceeds their own threshold
//!
//! Then folds the actuals back into the baseline and advances the counter.
//! A channel without a prediction scores nothing, whatever its actual value.
//! ═══════════════════════════════════════════════════════════════════════════════

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::baseline::{BaselineState, BaselineStore};
use crate::channel::{Channel, ChannelMap, ChannelValues, Scale};
use crate::prediction::Prediction;
use crate::stats::{float_cmp, mean};

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Per-channel significance thresholds overriding the channel defaults
    pub threshold_overrides: BTreeMap<Channel, f64>,
    /// Scored ticks kept for diagnostics
    pub history_len: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            threshold_overrides: BTreeMap::new(),
            history_len: 100,
        }
    }
}

impl EvaluatorConfig {
    pub fn threshold(&self, channel: Channel) -> f64 {
        self.threshold_overrides
            .get(&channel)
            .copied()
            .unwrap_or_else(|| channel.default_threshold())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR METRIC
// ═══════════════════════════════════════════════════════════════════════════════

/// Normalized error in [0, 1]. Never non-finite.
pub fn channel_error(channel: Channel, predicted: f64, actual: f64) -> f64 {
    let raw = match channel.scale() {
        Scale::Linear { span } => (actual - predicted).abs() / span,
        Scale::Log { decades, floor } => {
            (actual.max(floor).log10() - predicted.max(floor).log10()).abs() / decades
        }
    };
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PREDICTION ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of scoring one prediction against reality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionError {
    pub timestamp: DateTime<Utc>,
    pub prediction: Prediction,
    /// Normalized error; `None` where prediction or actual was missing
    pub channel_errors: ChannelMap<Option<f64>>,
    /// Attention-weighted aggregate in [0, 1]
    pub surprise: f64,
    /// Channels above their threshold, largest error first
    pub surprise_sources: Vec<Channel>,
    /// Actual values as observed (non-finite dropped)
    pub actual: ChannelValues,
    /// Observation counter after this observation
    pub observation_count: u64,
}

impl PredictionError {
    /// A tick where nothing could be scored
    pub fn quiet(timestamp: DateTime<Utc>, observation_count: u64) -> Self {
        Self {
            timestamp,
            prediction: Prediction::empty(timestamp, 0.3),
            channel_errors: ChannelMap::default(),
            surprise: 0.0,
            surprise_sources: Vec::new(),
            actual: ChannelValues::empty(),
            observation_count,
        }
    }

    pub fn error(&self, channel: Channel) -> Option<f64> {
        self.channel_errors[channel]
    }

    pub fn is_source(&self, channel: Channel) -> bool {
        self.surprise_sources.contains(&channel)
    }

    /// (predicted, actual) for a channel when both exist
    pub fn pair(&self, channel: Channel) -> Option<(f64, f64)> {
        Some((self.prediction.get(channel)?, self.actual[channel]?))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HISTORY + STATS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct ErrorRecord {
    surprise: f64,
    channel_errors: ChannelMap<Option<f64>>,
}

/// Read-only diagnostics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct AccuracyStats {
    pub observation_count: u64,
    /// Ticks held in the history window
    pub scored_ticks: usize,
    pub mean_surprise: Option<f64>,
    pub channel_mean_error: BTreeMap<String, f64>,
    /// Fraction of scored ticks where the channel stayed under its threshold
    pub channel_hit_rate: BTreeMap<String, f64>,
    pub domain_weights: BTreeMap<String, f64>,
    pub pending_curiosity: usize,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVALUATOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct ObservationEvaluator {
    config: EvaluatorConfig,
    history: VecDeque<ErrorRecord>,
}

impl ObservationEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_len),
            config,
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Score without learning from it
    pub fn score(
        &self,
        state: &BaselineState,
        prediction: &Prediction,
        actual: &ChannelValues,
        now: DateTime<Utc>,
    ) -> PredictionError {
        let actual = actual.map(|_, v| (*v).filter(|x| x.is_finite()));
        let weights = state.weights();

        let mut channel_errors: ChannelMap<Option<f64>> = ChannelMap::default();
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut sources: Vec<(Channel, f64)> = Vec::new();

        for &channel in Channel::all() {
            let (Some(predicted), Some(observed)) = (prediction.get(channel), actual[channel])
            else {
                continue;
            };
            let err = channel_error(channel, predicted, observed);
            channel_errors[channel] = Some(err);

            let w = weights.get(channel).max(0.0);
            weighted_sum += w * err;
            weight_total += w;

            if err > self.config.threshold(channel) {
                sources.push((channel, err));
            }
        }

        let surprise = if weight_total > 0.0 {
            (weighted_sum / weight_total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        sources.sort_by(|a, b| float_cmp(&b.1, &a.1).then(a.0.cmp(&b.0)));

        PredictionError {
            timestamp: now,
            prediction: prediction.clone(),
            channel_errors,
            surprise,
            surprise_sources: sources.into_iter().map(|(c, _)| c).collect(),
            actual,
            observation_count: state.observation_count(),
        }
    }

    /// Score, learn, advance the counter, and save on cadence
    pub fn observe(
        &mut self,
        store: &mut BaselineStore,
        prediction: &Prediction,
        actual: &ChannelValues,
        hour: Option<u8>,
        now: DateTime<Utc>,
    ) -> PredictionError {
        if prediction.observation_count != store.state().observation_count() {
            tracing::warn!(
                predicted_at = prediction.observation_count,
                current = store.state().observation_count(),
                "Observing against a stale prediction"
            );
        }

        let mut error = self.score(store.state(), prediction, actual, now);
        let hour = hour.filter(|h| *h < 24);

        let state = store.state_mut();
        for (channel, value) in error.actual.present() {
            state.record(channel, value, hour);
        }
        error.observation_count = state.increment_count();

        self.push_history(&error);
        store.maybe_save();
        error
    }

    fn push_history(&mut self, error: &PredictionError) {
        if self.config.history_len == 0 {
            return;
        }
        if self.history.len() >= self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(ErrorRecord {
            surprise: error.surprise,
            channel_errors: error.channel_errors,
        });
    }

    /// Mean surprise over the last `window` scored ticks
    pub fn mean_surprise(&self, window: usize) -> Option<f64> {
        let skip = self.history.len().saturating_sub(window);
        let recent: Vec<f64> = self.history.iter().skip(skip).map(|r| r.surprise).collect();
        mean(recent.iter())
    }

    /// Mean error per channel over the history window
    pub fn channel_mean_errors(&self) -> ChannelMap<Option<f64>> {
        ChannelMap::from_fn(|c| {
            let errs: Vec<f64> = self
                .history
                .iter()
                .filter_map(|r| r.channel_errors[c])
                .collect();
            mean(errs.iter())
        })
    }

    /// Fraction of scored ticks under threshold, per channel
    pub fn hit_rates(&self) -> ChannelMap<Option<f64>> {
        ChannelMap::from_fn(|c| {
            let threshold = self.config.threshold(c);
            let (hits, total) = self
                .history
                .iter()
                .filter_map(|r| r.channel_errors[c])
                .fold((0usize, 0usize), |(h, t), e| {
                    (h + usize::from(e <= threshold), t + 1)
                });
            (total > 0).then(|| hits as f64 / total as f64)
        })
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn stats(
        &self,
        state: &BaselineState,
        window: usize,
        pending_curiosity: usize,
    ) -> AccuracyStats {
        let by_name = |map: ChannelMap<Option<f64>>| -> BTreeMap<String, f64> {
            map.iter()
                .filter_map(|(c, v)| v.map(|v| (c.name().to_string(), v)))
                .collect()
        };
        AccuracyStats {
            observation_count: state.observation_count(),
            scored_ticks: self.history.len(),
            mean_surprise: self.mean_surprise(window),
            channel_mean_error: by_name(self.channel_mean_errors()),
            channel_hit_rate: by_name(self.hit_rates()),
            domain_weights: state.weights().snapshot(),
            pending_curiosity,
        }
    }
}

impl Default for ObservationEvaluator {
    fn default() -> Self {
        Self::new(EvaluatorConfig::default())
    }
}
