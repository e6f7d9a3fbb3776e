//! ═══════════════════════════════════════════════════════════════════════════════
//! STATS — Statistical Primitives for Baselines
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! - EWMA with an explicit "no value yet" state
//! - Bounded recent-value window with mean and last delta
//!
//! Both run every tick; neither allocates once warm.
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Total ordering for floats (NaN sorts equal)
pub fn float_cmp(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Arithmetic mean, `None` when empty
pub fn mean<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

// ═══════════════════════════════════════════════════════════════════════════════
// EWMA — Exponentially Weighted Moving Average
// ═══════════════════════════════════════════════════════════════════════════════

/// Exponentially Weighted Moving Average
/// New value weighted by α, history by (1-α). Absent until the first sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ewma {
    /// Smoothing factor (0 < α ≤ 1)
    alpha: f64,
    /// Current smoothed value
    value: Option<f64>,
    /// Samples folded in since this process created or restored it
    count: u64,
}

impl Ewma {
    /// Create new EWMA with specified alpha (clamped into (0, 1])
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            value: None,
            count: 0,
        }
    }

    /// Restore a persisted value
    pub fn restored(alpha: f64, value: Option<f64>) -> Self {
        Self {
            value: value.filter(|v| v.is_finite()),
            ..Self::new(alpha)
        }
    }

    /// Update with new sample. First sample initializes directly.
    pub fn update(&mut self, sample: f64) {
        self.value = Some(match self.value {
            None => sample,
            Some(current) => self.alpha * sample + (1.0 - self.alpha) * current,
        });
        self.count += 1;
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECENT WINDOW — Bounded FIFO of raw values
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded history; oldest evicted first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentWindow {
    samples: VecDeque<f64>,
    max_size: usize,
}

impl RecentWindow {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            samples: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() >= self.max_size {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        mean(self.samples.iter())
    }

    /// (previous, last) when at least two samples exist
    pub fn last_pair(&self) -> Option<(f64, f64)> {
        let n = self.samples.len();
        if n < 2 {
            return None;
        }
        Some((self.samples[n - 2], self.samples[n - 1]))
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ewma_first_sample_initializes() {
        let mut ewma = Ewma::new(0.1);
        assert_eq!(ewma.value(), None);
        ewma.update(22.0);
        assert_eq!(ewma.value(), Some(22.0));
    }

    #[test]
    fn test_ewma_converges() {
        let mut ewma = Ewma::new(0.1);
        ewma.update(0.0);
        for _ in 0..200 {
            ewma.update(10.0);
        }
        let v = ewma.value().unwrap();
        assert!((v - 10.0).abs() < 0.01, "v = {}", v);
        assert_eq!(ewma.count(), 201);
    }

    #[test]
    fn test_ewma_restored_drops_non_finite() {
        let ewma = Ewma::restored(0.1, Some(f64::NAN));
        assert!(!ewma.is_initialized());
        let ewma = Ewma::restored(0.1, Some(3.5));
        assert_eq!(ewma.value(), Some(3.5));
        assert_eq!(ewma.count(), 0);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut w = RecentWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.push(v);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.values().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_eq!(w.mean(), Some(3.0));
        assert_eq!(w.last_pair(), Some((3.0, 4.0)));
    }

    #[test]
    fn test_mean_empty() {
        let empty: Vec<f64> = Vec::new();
        assert_eq!(mean(empty.iter()), None);
    }
}
