//! ═══════════════════════════════════════════════════════════════════════════════
//! CURIOSITY — Ask, Wait, Check Whether Asking Helped
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Delayed credit assignment on attention:
//! ```text
//! 1. Surprise attributable to a domain → draft a question about it
//! 2. Record that domain's error at question time, due N observations later
//! 3. At the due point compare error-then vs error-now:
//!      shrank          → weight += reward   (capped at ceiling)
//!      same or grew    → weight -= penalty  (floored)
//! ```
//!
//! Domains that became more predictable after attention earn more attention.
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::baseline::BaselineStore;
use crate::channel::Channel;
use crate::evaluator::PredictionError;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CuriosityConfig {
    /// Below this surprise no question is drafted
    pub min_surprise: f64,
    /// Observations between question and evaluation
    pub horizon: u64,
    pub reward_step: f64,
    pub penalty_step: f64,
    /// Oldest pending records are dropped beyond this
    pub max_pending: usize,
}

impl Default for CuriosityConfig {
    fn default() -> Self {
        Self {
            min_surprise: 0.15,
            horizon: 20,
            reward_step: 0.1,
            penalty_step: 0.05,
            max_pending: 32,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// One question awaiting its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuriosityRecord {
    /// Domains asked about with their error at question time
    pub domains: Vec<(Channel, f64)>,
    pub recorded_at: u64,
    pub due_at: u64,
}

/// Result of evaluating one domain of a due record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuriosityOutcome {
    pub domain: Channel,
    pub error_then: f64,
    pub error_now: f64,
    pub old_weight: f64,
    pub new_weight: f64,
    /// Error shrank
    pub improved: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUESTIONS
// ═══════════════════════════════════════════════════════════════════════════════

const GENERIC_QUESTION: &str = "Something changed that I didn't predict. What is different right now?";

fn domain_question(channel: Channel, predicted: f64, actual: f64) -> String {
    let a = channel.format_value(actual);
    let p = channel.format_value(predicted);
    match channel {
        Channel::AmbientTemp => {
            let direction = if actual > predicted { "warmer" } else { "cooler" };
            format!("Why is it {} than I expected? It is {}, I expected {}.", direction, a, p)
        }
        Channel::Light => format!("What changed the light? It is {}, I expected {}.", a, p),
        Channel::Humidity => format!("Why is the humidity {} when I expected {}?", a, p),
        Channel::Pressure => format!(
            "Is the weather changing? Pressure is {}, I expected {}.",
            a, p
        ),
        _ => {
            let direction = if actual > predicted { "more" } else { "less" };
            format!(
                "Why do I feel {} {} than I expected ({} instead of {})?",
                direction,
                channel.label(),
                a,
                p
            )
        }
    }
}

fn connection_question(first: Channel, second: Channel) -> String {
    format!(
        "Is the change in {} connected to the change in {}?",
        first.label(),
        second.label()
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct CuriosityEngine {
    config: CuriosityConfig,
    pending: VecDeque<CuriosityRecord>,
}

impl CuriosityEngine {
    pub fn new(config: CuriosityConfig) -> Self {
        Self {
            config,
            pending: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &CuriosityConfig {
        &self.config
    }

    pub fn pending(&self) -> impl Iterator<Item = &CuriosityRecord> {
        self.pending.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Draft a question about the most surprising domain(s), if surprise warrants one
    pub fn generate_question(&self, error: &PredictionError) -> Option<String> {
        if error.surprise < self.config.min_surprise {
            return None;
        }
        let question = match error.surprise_sources.as_slice() {
            [] => GENERIC_QUESTION.to_string(),
            [only] => match error.pair(*only) {
                Some((predicted, actual)) => domain_question(*only, predicted, actual),
                None => GENERIC_QUESTION.to_string(),
            },
            [first, second, ..] => connection_question(*first, *second),
        };
        Some(question)
    }

    /// Remember the error of `domains` now, to be judged `horizon` observations later.
    /// Domains without an error this tick are skipped; returns false if none remain.
    pub fn record(&mut self, domains: &[Channel], error: &PredictionError) -> bool {
        let mut tracked: Vec<(Channel, f64)> = Vec::new();
        for &d in domains {
            if tracked.iter().any(|(c, _)| *c == d) {
                continue;
            }
            if let Some(e) = error.error(d) {
                tracked.push((d, e));
            }
        }
        if tracked.is_empty() {
            return false;
        }

        if self.config.max_pending > 0 && self.pending.len() >= self.config.max_pending {
            self.pending.pop_front();
        }
        self.pending.push_back(CuriosityRecord {
            domains: tracked,
            recorded_at: error.observation_count,
            due_at: error.observation_count + self.config.horizon,
        });
        true
    }

    /// Judge every record whose horizon has been reached; each is consumed once
    pub fn evaluate_pending(
        &mut self,
        store: &mut BaselineStore,
        current: &PredictionError,
    ) -> Vec<CuriosityOutcome> {
        let now = current.observation_count;
        let (due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|r| r.due_at <= now);
        self.pending = waiting.into();

        let weights = store.state_mut().weights_mut();
        let mut outcomes = Vec::new();

        for record in due {
            for (domain, error_then) in record.domains {
                let Some(error_now) = current.error(domain) else {
                    continue;
                };
                let improved = error_now < error_then;
                let delta = if improved {
                    self.config.reward_step
                } else {
                    -self.config.penalty_step
                };
                let (old_weight, new_weight) = weights.adjust(domain, delta);

                tracing::debug!(
                    domain = domain.name(),
                    error_then,
                    error_now,
                    old_weight,
                    new_weight,
                    "Curiosity outcome"
                );

                outcomes.push(CuriosityOutcome {
                    domain,
                    error_then,
                    error_now,
                    old_weight,
                    new_weight,
                    improved,
                });
            }
        }

        outcomes
    }
}

impl Default for CuriosityEngine {
    fn default() -> Self {
        Self::new(CuriosityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineConfig;
    use crate::channel::ChannelValues;
    use chrono::Utc;

    fn error_with(count: u64, surprise: f64, errors: &[(Channel, f64)]) -> PredictionError {
        let mut e = PredictionError::quiet(Utc::now(), count);
        e.surprise = surprise;
        for &(c, err) in errors {
            e.channel_errors[c] = Some(err);
        }
        e
    }

    #[test]
    fn test_no_question_when_calm() {
        let engine = CuriosityEngine::default();
        assert_eq!(engine.generate_question(&error_with(1, 0.05, &[])), None);
    }

    #[test]
    fn test_single_domain_question() {
        let engine = CuriosityEngine::default();
        let mut e = error_with(1, 0.4, &[(Channel::AmbientTemp, 0.65)]);
        e.surprise_sources = vec![Channel::AmbientTemp];
        e.prediction.values[Channel::AmbientTemp] = Some(22.0);
        e.actual = ChannelValues::empty().with(Channel::AmbientTemp, 35.0);
        let q = engine.generate_question(&e).unwrap();
        assert!(q.contains("warmer"), "{}", q);
        assert!(q.contains("35.0°C"));
        assert!(q.contains("22.0°C"));
    }

    #[test]
    fn test_connection_question() {
        let engine = CuriosityEngine::default();
        let mut e = error_with(1, 0.4, &[]);
        e.surprise_sources = vec![Channel::Light, Channel::Clarity, Channel::Warmth];
        let q = engine.generate_question(&e).unwrap();
        assert_eq!(q, "Is the change in light connected to the change in clarity?");
    }

    #[test]
    fn test_generic_question() {
        let engine = CuriosityEngine::default();
        let q = engine.generate_question(&error_with(1, 0.5, &[])).unwrap();
        assert_eq!(q, GENERIC_QUESTION);
    }

    #[test]
    fn test_record_skips_unscored_domains() {
        let mut engine = CuriosityEngine::default();
        let e = error_with(7, 0.4, &[(Channel::Humidity, 0.5)]);
        assert!(!engine.record(&[Channel::Pressure], &e));
        assert!(engine.record(&[Channel::Humidity, Channel::Pressure, Channel::Humidity], &e));
        let record = engine.pending().next().unwrap();
        assert_eq!(record.domains, vec![(Channel::Humidity, 0.5)]);
        assert_eq!(record.due_at, 27);
    }

    #[test]
    fn test_not_evaluated_before_horizon() {
        let mut store = BaselineStore::in_memory(BaselineConfig::default());
        let mut engine = CuriosityEngine::default();
        engine.record(&[Channel::Humidity], &error_with(10, 0.4, &[(Channel::Humidity, 0.5)]));

        let outcomes =
            engine.evaluate_pending(&mut store, &error_with(29, 0.0, &[(Channel::Humidity, 0.0)]));
        assert!(outcomes.is_empty());
        assert_eq!(engine.pending_count(), 1);
        assert_eq!(store.state().weights().get(Channel::Humidity), 1.0);
    }

    #[test]
    fn test_improvement_rewards_domain() {
        let mut store = BaselineStore::in_memory(BaselineConfig::default());
        let mut engine = CuriosityEngine::default();
        engine.record(&[Channel::Humidity], &error_with(10, 0.4, &[(Channel::Humidity, 0.5)]));

        let outcomes =
            engine.evaluate_pending(&mut store, &error_with(30, 0.0, &[(Channel::Humidity, 0.1)]));
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].improved);
        assert!(store.state().weights().get(Channel::Humidity) > 1.0);
        // Consumed exactly once
        assert_eq!(engine.pending_count(), 0);
        let again =
            engine.evaluate_pending(&mut store, &error_with(31, 0.0, &[(Channel::Humidity, 0.1)]));
        assert!(again.is_empty());
    }

    #[test]
    fn test_no_improvement_penalizes_domain() {
        let mut store = BaselineStore::in_memory(BaselineConfig::default());
        let mut engine = CuriosityEngine::default();
        engine.record(&[Channel::Light], &error_with(0, 0.4, &[(Channel::Light, 0.3)]));

        let outcomes =
            engine.evaluate_pending(&mut store, &error_with(20, 0.3, &[(Channel::Light, 0.3)]));
        assert!(!outcomes[0].improved);
        assert!(store.state().weights().get(Channel::Light) < 1.0);
    }

    #[test]
    fn test_weights_bounded_under_repeated_outcomes() {
        let mut store = BaselineStore::in_memory(BaselineConfig::default());
        let mut engine = CuriosityEngine::default();
        for i in 0..200u64 {
            engine.record(&[Channel::Warmth], &error_with(i, 0.4, &[(Channel::Warmth, 0.9)]));
            engine.evaluate_pending(&mut store, &error_with(i + 20, 0.1, &[(Channel::Warmth, 0.0)]));
        }
        assert_eq!(store.state().weights().get(Channel::Warmth), 3.0);

        for i in 0..200u64 {
            engine.record(&[Channel::Warmth], &error_with(i, 0.4, &[(Channel::Warmth, 0.1)]));
            engine.evaluate_pending(&mut store, &error_with(i + 20, 0.1, &[(Channel::Warmth, 0.8)]));
        }
        let w = store.state().weights().get(Channel::Warmth);
        assert!((w - 0.3).abs() < 1e-12, "w = {}", w);
    }

    #[test]
    fn test_pending_bounded() {
        let mut engine = CuriosityEngine::new(CuriosityConfig {
            max_pending: 2,
            ..Default::default()
        });
        for i in 0..5 {
            engine.record(&[Channel::Pressure], &error_with(i, 0.4, &[(Channel::Pressure, 0.2)]));
        }
        assert_eq!(engine.pending_count(), 2);
        assert_eq!(engine.pending().next().unwrap().recorded_at, 3);
    }
}
