//! ═══════════════════════════════════════════════════════════════════════════════
//! MONITOR — The Per-Tick Loop
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Owns one of each component and runs them in order:
//!
//!   predict → observe → evaluate curiosity → gate → reflect → question
//!
//! Constructed explicitly by the host loop. There is no global instance.
//! Nothing here blocks except `save()`; periodic saves happen inside `observe`.
//! ═══════════════════════════════════════════════════════════════════════════════

use chrono::{DateTime, Local, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::thread::JoinHandle;

use crate::baseline::BaselineStore;
use crate::channel::{AnimaState, Channel, ChannelValues, SensorReadings};
use crate::config::MonitorConfig;
use crate::curiosity::{CuriosityConfig, CuriosityEngine, CuriosityOutcome};
use crate::error::ForesightResult;
use crate::evaluator::{AccuracyStats, EvaluatorConfig, ObservationEvaluator, PredictionError};
use crate::prediction::{Prediction, PredictionConfig, PredictionEngine};
use crate::reflection::{GateConfig, GateDecision, Reflection, ReflectionGate, Trigger};

/// Local hour of day, 0..=23
fn local_hour_of(ts: DateTime<Utc>) -> u8 {
    ts.with_timezone(&Local).hour() as u8
}

// ═══════════════════════════════════════════════════════════════════════════════
// TICK I/O
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the host knows about one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    /// Defaults to now
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Defaults to the local hour of `timestamp`
    #[serde(default)]
    pub hour: Option<u8>,
    #[serde(flatten)]
    pub readings: SensorReadings,
    #[serde(default)]
    pub anima: Option<AnimaState>,
    /// Commanded actuator level in [0, 1]
    #[serde(default)]
    pub actuator_level: Option<f64>,
}

/// What happened during one tick
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub prediction: Prediction,
    pub error: PredictionError,
    pub decision: GateDecision,
    pub reflection: Option<Reflection>,
    pub question: Option<String>,
    pub curiosity_outcomes: Vec<CuriosityOutcome>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELF MONITOR
// ═══════════════════════════════════════════════════════════════════════════════

pub struct SelfMonitor {
    store: BaselineStore,
    engine: PredictionEngine,
    evaluator: ObservationEvaluator,
    gate: ReflectionGate,
    curiosity: CuriosityEngine,
    pending: Option<Prediction>,
    last_error: Option<PredictionError>,
    last_outcomes: Vec<CuriosityOutcome>,
}

impl SelfMonitor {
    /// Build from config; loads the baseline file if one is configured
    pub fn new(config: MonitorConfig) -> Self {
        let store = match config.baseline_path {
            Some(path) => BaselineStore::open(path, config.baseline),
            None => BaselineStore::in_memory(config.baseline),
        };
        Self::with_store(store, config.prediction, config.evaluator, config.gate, config.curiosity)
    }

    pub fn in_memory() -> Self {
        Self::new(MonitorConfig::default())
    }

    fn with_store(
        store: BaselineStore,
        prediction: PredictionConfig,
        evaluator: EvaluatorConfig,
        gate: GateConfig,
        curiosity: CuriosityConfig,
    ) -> Self {
        tracing::info!(
            observations = store.state().observation_count(),
            persistent = store.path().is_some(),
            "Self monitor ready"
        );
        Self {
            store,
            engine: PredictionEngine::new(prediction),
            evaluator: ObservationEvaluator::new(evaluator),
            gate: ReflectionGate::new(gate),
            curiosity: CuriosityEngine::new(curiosity),
            pending: None,
            last_error: None,
            last_outcomes: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Predict / observe
    // ─────────────────────────────────────────────────────────────────────────

    pub fn predict(&mut self, actuator_hint: Option<f64>, hour: Option<u8>) -> Prediction {
        self.predict_at(actuator_hint, hour, Utc::now())
    }

    /// Predict and hold the result for the next `observe`
    pub fn predict_at(
        &mut self,
        actuator_hint: Option<f64>,
        hour: Option<u8>,
        now: DateTime<Utc>,
    ) -> Prediction {
        let prediction = self
            .engine
            .predict_at(&self.store, actuator_hint, hour, now);
        self.pending = Some(prediction.clone());
        prediction
    }

    pub fn observe(&mut self, actual: &ChannelValues, hour: Option<u8>) -> PredictionError {
        self.observe_at(actual, hour, Utc::now())
    }

    /// Score against the held prediction (or a fresh one if none is held),
    /// learn, then judge any curiosity records that came due.
    pub fn observe_at(
        &mut self,
        actual: &ChannelValues,
        hour: Option<u8>,
        now: DateTime<Utc>,
    ) -> PredictionError {
        let prediction = match self.pending.take() {
            Some(p) => p,
            None => self.engine.predict_at(&self.store, None, hour, now),
        };

        let error = self
            .evaluator
            .observe(&mut self.store, &prediction, actual, hour, now);
        self.last_outcomes = self.curiosity.evaluate_pending(&mut self.store, &error);
        self.last_error = Some(error.clone());
        error
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reflection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn should_reflect(&mut self, error: &PredictionError) -> GateDecision {
        self.gate.should_reflect(error)
    }

    pub fn reflect(
        &mut self,
        error: &PredictionError,
        felt: Option<&AnimaState>,
        sensed: &SensorReadings,
        trigger: Trigger,
    ) -> Reflection {
        self.gate.reflect(error, felt, sensed, trigger)
    }

    /// Reflect on request, bypassing the gate
    pub fn reflect_now(&mut self, felt: Option<&AnimaState>, sensed: &SensorReadings) -> Reflection {
        self.reflect_now_at(felt, sensed, Utc::now())
    }

    pub fn reflect_now_at(
        &mut self,
        felt: Option<&AnimaState>,
        sensed: &SensorReadings,
        now: DateTime<Utc>,
    ) -> Reflection {
        let mut error = match &self.last_error {
            Some(e) => e.clone(),
            None => PredictionError::quiet(now, self.store.state().observation_count()),
        };
        error.timestamp = now;
        self.gate.reflect(&error, felt, sensed, Trigger::Manual)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Curiosity
    // ─────────────────────────────────────────────────────────────────────────

    pub fn generate_question(&self, error: &PredictionError) -> Option<String> {
        self.curiosity.generate_question(error)
    }

    pub fn record_curiosity(&mut self, domains: &[Channel], error: &PredictionError) -> bool {
        self.curiosity.record(domains, error)
    }

    /// Outcomes judged during the most recent `observe`
    pub fn last_outcomes(&self) -> &[CuriosityOutcome] {
        &self.last_outcomes
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Full tick
    // ─────────────────────────────────────────────────────────────────────────

    pub fn step(&mut self, tick: &TickInput) -> TickReport {
        let now = tick.timestamp.unwrap_or_else(Utc::now);
        let hour = tick
            .hour
            .filter(|h| *h < 24)
            .or_else(|| Some(local_hour_of(now)));

        let prediction = self.predict_at(tick.actuator_level, hour, now);
        let actual = ChannelValues::from_parts(&tick.readings, tick.anima.as_ref());
        let error = self.observe_at(&actual, hour, now);
        let curiosity_outcomes = self.last_outcomes.clone();

        let decision = self.gate.should_reflect(&error);
        let mut reflection = None;
        let mut question = None;

        if let Some(trigger) = decision.trigger() {
            reflection = Some(
                self.gate
                    .reflect(&error, tick.anima.as_ref(), &tick.readings, trigger),
            );
            question = self.curiosity.generate_question(&error);
            if question.is_some() {
                self.curiosity.record(&error.surprise_sources, &error);
            }
        }

        TickReport {
            prediction,
            error,
            decision,
            reflection,
            question,
            curiosity_outcomes,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State
    // ─────────────────────────────────────────────────────────────────────────

    pub fn stats(&self, window: usize) -> AccuracyStats {
        self.evaluator
            .stats(self.store.state(), window, self.curiosity.pending_count())
    }

    pub fn save(&mut self) -> ForesightResult<()> {
        self.store.save()
    }

    pub fn save_in_background(&mut self) -> Option<JoinHandle<ForesightResult<()>>> {
        self.store.save_in_background()
    }

    pub fn store(&self) -> &BaselineStore {
        &self.store
    }

    pub fn gate(&self) -> &ReflectionGate {
        &self.gate
    }

    pub fn curiosity(&self) -> &CuriosityEngine {
        &self.curiosity
    }

    pub fn last_error(&self) -> Option<&PredictionError> {
        self.last_error.as_ref()
    }

    pub fn weight(&self, channel: Channel) -> f64 {
        self.store.state().weights().get(channel)
    }
}

impl Default for SelfMonitor {
    fn default() -> Self {
        Self::in_memory()
    }
}
