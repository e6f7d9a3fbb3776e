//! ═══════════════════════════════════════════════════════════════════════════════
//! FORESIGHT — Predictive Self-Monitoring
//! ═══════════════════════════════════════════════════════════════════════════════
//! Predict the next tick, compare with reality, measure surprise, decide when
//! surprise deserves a reflection, ask about it, and learn which questions
//! were worth asking.
//! ═══════════════════════════════════════════════════════════════════════════════

// ═══════════════════════════════════════════════════════════════════════════════
// FOUNDATION — Signal vocabulary, statistics, persistence
// ═══════════════════════════════════════════════════════════════════════════════

pub mod baseline;
pub mod channel;
pub mod config;
pub mod error;
pub mod stats;

// ═══════════════════════════════════════════════════════════════════════════════
// CORE — The prediction/surprise/reflection loop
// ═══════════════════════════════════════════════════════════════════════════════

pub mod curiosity;
pub mod evaluator;
pub mod monitor;
pub mod prediction;
pub mod reflection;

pub use baseline::{BaselineConfig, BaselineSnapshot, BaselineState, BaselineStore};
pub use channel::{AnimaState, Channel, ChannelMap, ChannelValues, SensorReadings};
pub use config::MonitorConfig;
pub use curiosity::{CuriosityConfig, CuriosityEngine, CuriosityOutcome};
pub use error::{ConfigError, ForesightError, ForesightResult};
pub use evaluator::{AccuracyStats, ObservationEvaluator, PredictionError};
pub use monitor::{SelfMonitor, TickInput, TickReport};
pub use prediction::{Basis, Prediction, PredictionEngine};
pub use reflection::{GateDecision, GateReason, Reflection, ReflectionGate, Trigger};
