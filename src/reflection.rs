//! ═══════════════════════════════════════════════════════════════════════════════
//! REFLECTION — When Does Surprise Deserve Introspection?
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Gate, evaluated once per observation, first match wins:
//! ```text
//!   1. Cooldown since last reflection         → no  ("cooldown")
//!   2. surprise > threshold                   → yes ("high_surprise")
//!   3. ≥ N surprise sources                   → yes ("multiple_sources")
//!   4. decaying accumulator > 0.8 × threshold → yes ("sustained")
//!   5.                                        → no  ("normal")
//! ```
//!
//! Time comes from the error's timestamp, so the gate holds no clock of its own.
//! ═══════════════════════════════════════════════════════════════════════════════

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::channel::{AnimaState, Channel, SensorReadings};
use crate::evaluator::PredictionError;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum seconds between reflections
    pub cooldown_secs: i64,
    /// Instantaneous surprise threshold
    pub surprise_threshold: f64,
    /// Simultaneous sources that force a reflection
    pub multiple_sources_min: usize,
    /// Accumulator decay per observation
    pub accumulator_decay: f64,
    /// Accumulator trips at this fraction of `surprise_threshold`
    pub sustained_fraction: f64,
    /// Felt-vs-implied gap worth describing
    pub discrepancy_threshold: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 180,
            surprise_threshold: 0.25,
            multiple_sources_min: 3,
            accumulator_decay: 0.8,
            sustained_fraction: 0.8,
            discrepancy_threshold: 0.3,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECISION
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a reflection was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    HighSurprise,
    Sustained,
    MultipleSources,
    Manual,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::HighSurprise => "high_surprise",
            Trigger::Sustained => "sustained",
            Trigger::MultipleSources => "multiple_sources",
            Trigger::Manual => "manual",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason attached to every gate decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    Cooldown,
    HighSurprise,
    MultipleSources,
    Sustained,
    Normal,
}

impl GateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateReason::Cooldown => "cooldown",
            GateReason::HighSurprise => "high_surprise",
            GateReason::MultipleSources => "multiple_sources",
            GateReason::Sustained => "sustained",
            GateReason::Normal => "normal",
        }
    }

    pub fn trigger(&self) -> Option<Trigger> {
        match self {
            GateReason::HighSurprise => Some(Trigger::HighSurprise),
            GateReason::MultipleSources => Some(Trigger::MultipleSources),
            GateReason::Sustained => Some(Trigger::Sustained),
            GateReason::Cooldown | GateReason::Normal => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub reflect: bool,
    pub reason: GateReason,
}

impl GateDecision {
    fn no(reason: GateReason) -> Self {
        Self {
            reflect: false,
            reason,
        }
    }

    fn yes(reason: GateReason) -> Self {
        Self {
            reflect: true,
            reason,
        }
    }

    pub fn trigger(&self) -> Option<Trigger> {
        if self.reflect {
            self.reason.trigger()
        } else {
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REFLECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Felt state vs what the sensors alone imply it should be
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Anima dimension compared
    pub dimension: Channel,
    pub felt: f64,
    pub implied: f64,
    /// felt - implied
    pub value: f64,
    /// Present only when the gap is sharp
    pub description: Option<String>,
}

/// An introspective event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub timestamp: DateTime<Utc>,
    pub trigger: Trigger,
    pub observation: String,
    pub felt: Option<AnimaState>,
    pub sensed: SensorReadings,
    pub surprise: f64,
    pub surprise_sources: Vec<Channel>,
    pub discrepancy: Option<Discrepancy>,
}

/// Warmth the temperature alone suggests: 10°C → 0, 30°C → 1
pub fn implied_warmth(temp_c: f64) -> f64 {
    ((temp_c - 10.0) / 20.0).clamp(0.0, 1.0)
}

/// Clarity the light alone suggests: 1 lux → 0, 1000 lux → 1
pub fn implied_clarity(lux: f64) -> f64 {
    (lux.max(1.0).log10() / 3.0).clamp(0.0, 1.0)
}

/// Largest felt-vs-implied gap across the dimensions with a sensor proxy
pub fn compute_discrepancy(
    felt: &AnimaState,
    sensed: &SensorReadings,
    threshold: f64,
) -> Option<Discrepancy> {
    let candidates = [
        sensed
            .ambient_temp
            .filter(|t| t.is_finite())
            .map(|t| (Channel::Warmth, felt.warmth, implied_warmth(t))),
        sensed
            .light
            .filter(|l| l.is_finite())
            .map(|l| (Channel::Clarity, felt.clarity, implied_clarity(l))),
    ];

    let (dimension, felt_value, implied) = candidates
        .into_iter()
        .flatten()
        .max_by(|a, b| crate::stats::float_cmp(&(a.1 - a.2).abs(), &(b.1 - b.2).abs()))?;

    let value = felt_value - implied;
    let description = (value.abs() > threshold).then(|| {
        let higher = value > 0.0;
        match (dimension, higher) {
            (Channel::Warmth, true) => "I feel warmer than the environment implies",
            (Channel::Warmth, false) => "I feel cooler than the environment implies",
            (_, true) => "I feel clearer than the light implies",
            (_, false) => "I feel foggier than the light implies",
        }
        .to_string()
    });

    Some(Discrepancy {
        dimension,
        felt: felt_value,
        implied,
        value,
        description,
    })
}

fn describe(error: &PredictionError, trigger: Trigger) -> String {
    let opening = match trigger {
        Trigger::HighSurprise => "That surprised me.",
        Trigger::MultipleSources => "Several things changed at once.",
        Trigger::Sustained => "Things have been slightly off for a while.",
        Trigger::Manual => "Checking in.",
    };

    let details: Vec<String> = error
        .surprise_sources
        .iter()
        .take(3)
        .filter_map(|&c| {
            let (predicted, actual) = error.pair(c)?;
            Some(format!(
                "{} was {}, I expected {}",
                c.label(),
                c.format_value(actual),
                c.format_value(predicted)
            ))
        })
        .collect();

    if details.is_empty() {
        format!(
            "{} Nothing stands out on its own; overall surprise is {:.2}.",
            opening, error.surprise
        )
    } else {
        format!("{} {}.", opening, details.join("; "))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GATE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct ReflectionGate {
    config: GateConfig,
    last_reflection: Option<DateTime<Utc>>,
    /// Decaying cumulative surprise
    accumulator: f64,
    reflections: u64,
}

impl ReflectionGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            last_reflection: None,
            accumulator: 0.0,
            reflections: 0,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn last_reflection(&self) -> Option<DateTime<Utc>> {
        self.last_reflection
    }

    pub fn reflection_count(&self) -> u64 {
        self.reflections
    }

    /// Within `cooldown_secs` after the last reflection. A timestamp earlier
    /// than the last reflection (clock stepped back) ends the cooldown.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.last_reflection.is_some_and(|last| {
            let elapsed = now - last;
            elapsed >= Duration::zero() && elapsed < Duration::seconds(self.config.cooldown_secs)
        })
    }

    pub fn should_reflect(&mut self, error: &PredictionError) -> GateDecision {
        if self.in_cooldown(error.timestamp) {
            return GateDecision::no(GateReason::Cooldown);
        }

        if error.surprise > self.config.surprise_threshold {
            return GateDecision::yes(GateReason::HighSurprise);
        }

        if error.surprise_sources.len() >= self.config.multiple_sources_min {
            return GateDecision::yes(GateReason::MultipleSources);
        }

        self.accumulator = self.accumulator * self.config.accumulator_decay + error.surprise;
        if self.accumulator > self.config.sustained_fraction * self.config.surprise_threshold {
            return GateDecision::yes(GateReason::Sustained);
        }

        GateDecision::no(GateReason::Normal)
    }

    /// Emit a reflection and restart the cooldown clock
    pub fn reflect(
        &mut self,
        error: &PredictionError,
        felt: Option<&AnimaState>,
        sensed: &SensorReadings,
        trigger: Trigger,
    ) -> Reflection {
        self.last_reflection = Some(error.timestamp);
        self.accumulator = 0.0;
        self.reflections += 1;

        let discrepancy =
            felt.and_then(|f| compute_discrepancy(f, sensed, self.config.discrepancy_threshold));

        let mut observation = describe(error, trigger);
        if let Some(note) = discrepancy.as_ref().and_then(|d| d.description.as_ref()) {
            observation.push(' ');
            observation.push_str(note);
            observation.push('.');
        }

        tracing::debug!(
            trigger = trigger.as_str(),
            surprise = error.surprise,
            sources = error.surprise_sources.len(),
            "Reflection emitted"
        );

        Reflection {
            timestamp: error.timestamp,
            trigger,
            observation,
            felt: felt.copied(),
            sensed: *sensed,
            surprise: error.surprise,
            surprise_sources: error.surprise_sources.clone(),
            discrepancy,
        }
    }
}

impl Default for ReflectionGate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}
