//! ═══════════════════════════════════════════════════════════════════════════════
//! BASELINE — Learned State and its Persistence
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Owns everything the monitor learns over its lifetime:
//! - Per-channel EWMA (absent until first observation)
//! - Per-channel recent window (in memory only, feeds trend extrapolation)
//! - Hour-of-day table of recent values for one diurnal channel
//! - Domain attention weights, bounded to [floor, ceiling]
//! - Monotonic observation counter (save cadence, curiosity horizon)
//!
//! Persistence is one flat JSON file. Missing or malformed file means
//! "no baseline yet", never zero and never an error for the caller.
//! ═══════════════════════════════════════════════════════════════════════════════

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tempfile::NamedTempFile;

use crate::channel::{Channel, ChannelMap};
use crate::error::{ConfigError, ForesightResult};
use crate::stats::{Ewma, RecentWindow};

pub const HOURS_PER_DAY: usize = 24;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for baseline learning and persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// EWMA smoothing factor
    pub ema_alpha: f64,
    /// Samples before an in-process EWMA is trusted on its own
    pub warmup_samples: u64,
    /// Recent-value window per channel
    pub recent_window: usize,
    /// Channel tracked by the hour-of-day table
    pub diurnal_channel: Channel,
    /// Values kept per hour bucket
    pub diurnal_bucket_size: usize,
    /// Starting attention weight
    pub default_weight: f64,
    pub weight_floor: f64,
    pub weight_ceiling: f64,
    /// Persist every N observations
    pub save_interval: u64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.2,
            warmup_samples: 3,
            recent_window: 10,
            diurnal_channel: Channel::AmbientTemp,
            diurnal_bucket_size: 10,
            default_weight: 1.0,
            weight_floor: 0.3,
            weight_ceiling: 3.0,
            save_interval: 100,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIURNAL TABLE — 24 bounded hour buckets
// ═══════════════════════════════════════════════════════════════════════════════

/// Hour-of-day history for the diurnal channel
#[derive(Debug, Clone, PartialEq)]
pub struct DiurnalTable {
    buckets: Vec<RecentWindow>,
}

impl DiurnalTable {
    pub fn new(bucket_size: usize) -> Self {
        Self {
            buckets: (0..HOURS_PER_DAY)
                .map(|_| RecentWindow::new(bucket_size))
                .collect(),
        }
    }

    pub fn push(&mut self, hour: u8, value: f64) {
        if let Some(bucket) = self.buckets.get_mut(hour as usize) {
            bucket.push(value);
        }
    }

    /// Mean of the bucket for `hour`, `None` if empty or hour out of range
    pub fn mean_at(&self, hour: u8) -> Option<f64> {
        self.buckets.get(hour as usize).and_then(|b| b.mean())
    }

    pub fn len_at(&self, hour: u8) -> usize {
        self.buckets.get(hour as usize).map_or(0, |b| b.len())
    }

    pub fn total_samples(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).sum()
    }

    /// Non-empty buckets keyed by hour-as-string
    pub fn to_persisted(&self) -> BTreeMap<String, Vec<f64>> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_empty())
            .map(|(h, b)| (h.to_string(), b.values().collect()))
            .collect()
    }

    /// Lenient restore: unknown hours and non-finite values are skipped
    pub fn from_persisted(map: &BTreeMap<String, Vec<f64>>, bucket_size: usize) -> Self {
        let mut table = Self::new(bucket_size);
        for (key, values) in map {
            let Ok(hour) = key.trim().parse::<u8>() else {
                continue;
            };
            if (hour as usize) >= HOURS_PER_DAY {
                continue;
            }
            for &v in values.iter().filter(|v| v.is_finite()) {
                table.push(hour, v);
            }
        }
        table
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN WEIGHTS — Bounded attention multipliers
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-channel attention weight, always within [floor, ceiling]
#[derive(Debug, Clone, PartialEq)]
pub struct DomainWeights {
    weights: ChannelMap<f64>,
    floor: f64,
    ceiling: f64,
}

impl DomainWeights {
    pub fn new(default_weight: f64, floor: f64, ceiling: f64) -> Self {
        let (floor, ceiling) = if floor <= ceiling {
            (floor, ceiling)
        } else {
            (ceiling, floor)
        };
        let start = default_weight.clamp(floor, ceiling);
        Self {
            weights: ChannelMap::from_fn(|_| start),
            floor,
            ceiling,
        }
    }

    pub fn get(&self, channel: Channel) -> f64 {
        self.weights[channel]
    }

    pub fn set(&mut self, channel: Channel, weight: f64) {
        if weight.is_finite() {
            self.weights[channel] = weight.clamp(self.floor, self.ceiling);
        }
    }

    /// Nudge by `delta`; returns (old, new)
    pub fn adjust(&mut self, channel: Channel, delta: f64) -> (f64, f64) {
        let old = self.weights[channel];
        self.set(channel, old + delta);
        (old, self.weights[channel])
    }

    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.weights
            .iter()
            .map(|(c, w)| (c.name().to_string(), *w))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        self.weights.iter().map(|(c, w)| (c, *w))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BASELINE STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything learned. Read freely; mutated by the evaluator and curiosity engine.
#[derive(Debug, Clone)]
pub struct BaselineState {
    emas: ChannelMap<Ewma>,
    /// EWMA came from disk (trusted without warm-up)
    restored: ChannelMap<bool>,
    recent: ChannelMap<RecentWindow>,
    diurnal_channel: Channel,
    diurnal: DiurnalTable,
    weights: DomainWeights,
    observation_count: u64,
}

impl BaselineState {
    /// Empty-but-valid state
    pub fn empty(config: &BaselineConfig) -> Self {
        Self {
            emas: ChannelMap::from_fn(|_| Ewma::new(config.ema_alpha)),
            restored: ChannelMap::default(),
            recent: ChannelMap::from_fn(|_| RecentWindow::new(config.recent_window)),
            diurnal_channel: config.diurnal_channel,
            diurnal: DiurnalTable::new(config.diurnal_bucket_size),
            weights: DomainWeights::new(
                config.default_weight,
                config.weight_floor,
                config.weight_ceiling,
            ),
            observation_count: 0,
        }
    }

    /// Rebuild from a persisted document; anything missing stays empty
    pub fn from_snapshot(snapshot: &BaselineSnapshot, config: &BaselineConfig) -> Self {
        let mut state = Self::empty(config);
        for &c in Channel::all() {
            let value = snapshot.channel_value(c);
            state.emas[c] = Ewma::restored(config.ema_alpha, value);
            state.restored[c] = state.emas[c].is_initialized();
        }
        state.diurnal = DiurnalTable::from_persisted(&snapshot.diurnal, config.diurnal_bucket_size);
        for (name, &w) in &snapshot.domain_weights {
            if let Some(c) = Channel::from_name(name) {
                state.weights.set(c, w);
            }
        }
        state.observation_count = snapshot.observation_count;
        state
    }

    /// By-value copy of the persisted subset
    pub fn to_snapshot(&self) -> BaselineSnapshot {
        let mut snapshot = BaselineSnapshot {
            diurnal: self.diurnal.to_persisted(),
            domain_weights: self.weights.snapshot(),
            observation_count: self.observation_count,
            saved_at: Some(Utc::now()),
            ..Default::default()
        };
        for &c in Channel::all() {
            snapshot.set_channel_value(c, self.emas[c].value());
        }
        snapshot
    }

    pub fn ema(&self, channel: Channel) -> Option<f64> {
        self.emas[channel].value()
    }

    /// EWMA usable on its own: restored from disk, or warmed up in-process
    pub fn baseline_ready(&self, channel: Channel, warmup: u64) -> bool {
        self.emas[channel].is_initialized()
            && (self.restored[channel] || self.emas[channel].count() >= warmup)
    }

    pub fn recent(&self, channel: Channel) -> &RecentWindow {
        &self.recent[channel]
    }

    pub fn diurnal_channel(&self) -> Channel {
        self.diurnal_channel
    }

    pub fn diurnal(&self) -> &DiurnalTable {
        &self.diurnal
    }

    pub fn weights(&self) -> &DomainWeights {
        &self.weights
    }

    pub fn observation_count(&self) -> u64 {
        self.observation_count
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation (evaluator / curiosity only)
    // ─────────────────────────────────────────────────────────────────────────

    /// Fold one actual value into the EWMA, recent window and diurnal table
    pub(crate) fn record(&mut self, channel: Channel, value: f64, hour: Option<u8>) {
        self.emas[channel].update(value);
        self.recent[channel].push(value);
        if channel == self.diurnal_channel {
            if let Some(h) = hour {
                self.diurnal.push(h, value);
            }
        }
    }

    pub(crate) fn increment_count(&mut self) -> u64 {
        self.observation_count += 1;
        self.observation_count
    }

    pub(crate) fn weights_mut(&mut self) -> &mut DomainWeights {
        &mut self.weights
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PERSISTED DOCUMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// On-disk shape. Every key optional; `null` means "no baseline yet".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineSnapshot {
    pub ambient_temp: Option<f64>,
    pub light: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub warmth: Option<f64>,
    pub clarity: Option<f64>,
    pub stability: Option<f64>,
    pub presence: Option<f64>,
    /// Hour ("0".."23") → recent values of the diurnal channel
    pub diurnal: BTreeMap<String, Vec<f64>>,
    /// Domain name → attention weight
    pub domain_weights: BTreeMap<String, f64>,
    pub observation_count: u64,
    pub saved_at: Option<DateTime<Utc>>,
}

impl BaselineSnapshot {
    pub fn channel_value(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::AmbientTemp => self.ambient_temp,
            Channel::Light => self.light,
            Channel::Humidity => self.humidity,
            Channel::Pressure => self.pressure,
            Channel::Warmth => self.warmth,
            Channel::Clarity => self.clarity,
            Channel::Stability => self.stability,
            Channel::Presence => self.presence,
        }
    }

    pub fn set_channel_value(&mut self, channel: Channel, value: Option<f64>) {
        let slot = match channel {
            Channel::AmbientTemp => &mut self.ambient_temp,
            Channel::Light => &mut self.light,
            Channel::Humidity => &mut self.humidity,
            Channel::Pressure => &mut self.pressure,
            Channel::Warmth => &mut self.warmth,
            Channel::Clarity => &mut self.clarity,
            Channel::Stability => &mut self.stability,
            Channel::Presence => &mut self.presence,
        };
        *slot = value;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE I/O
// ═══════════════════════════════════════════════════════════════════════════════

/// Default baseline file path
pub fn default_baseline_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("foresight")
        .join("baseline.json")
}

/// Read and parse a baseline file (errors surfaced; see `load_state` for the lenient path)
pub fn read_snapshot(path: &Path) -> ForesightResult<BaselineSnapshot> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Write a snapshot. Each write goes through its own uniquely named temp file
/// in the target directory, then is renamed over `path`; concurrent writers
/// never share a temp file and a torn write never replaces a good file.
pub fn write_snapshot(path: &Path, snapshot: &BaselineSnapshot) -> ForesightResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(snapshot)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Load state from `path`, falling back to an empty baseline on any failure
pub fn load_state(path: &Path, config: &BaselineConfig) -> BaselineState {
    if !path.exists() {
        tracing::info!(path = %path.display(), "No baseline file, starting fresh");
        return BaselineState::empty(config);
    }
    match read_snapshot(path) {
        Ok(snapshot) => {
            let state = BaselineState::from_snapshot(&snapshot, config);
            tracing::info!(
                path = %path.display(),
                observations = state.observation_count(),
                diurnal_samples = state.diurnal().total_samples(),
                "Baseline loaded"
            );
            state
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "Baseline unreadable, starting fresh: {}", e);
            BaselineState::empty(config)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BASELINE STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Baseline state plus where (and how often) it is persisted
#[derive(Debug)]
pub struct BaselineStore {
    config: BaselineConfig,
    state: BaselineState,
    path: Option<PathBuf>,
    /// Observation count of the newest successful write (0 = never saved).
    /// Shared with background writers, which mark it only once their write lands.
    last_saved_at: Arc<AtomicU64>,
}

impl BaselineStore {
    /// In-memory store (never persists)
    pub fn in_memory(config: BaselineConfig) -> Self {
        Self {
            state: BaselineState::empty(&config),
            config,
            path: None,
            last_saved_at: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Store backed by `path`; loads whatever is there
    pub fn open(path: impl Into<PathBuf>, config: BaselineConfig) -> Self {
        let path = path.into();
        let state = load_state(&path, &config);
        Self {
            state,
            config,
            path: Some(path),
            last_saved_at: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    pub fn state(&self) -> &BaselineState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut BaselineState {
        &mut self.state
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn snapshot(&self) -> BaselineSnapshot {
        self.state.to_snapshot()
    }

    /// Persist now
    pub fn save(&mut self) -> ForesightResult<()> {
        let path = self.path.as_ref().ok_or(ConfigError::NoBaselinePath)?;
        write_snapshot(path, &self.state.to_snapshot())?;
        let count = self.state.observation_count();
        self.last_saved_at.fetch_max(count, Ordering::AcqRel);
        tracing::debug!(
            path = %path.display(),
            observations = self.state.observation_count(),
            "Baseline saved"
        );
        Ok(())
    }

    /// Whether the counter sits on a save boundary not yet saved
    pub fn save_due(&self) -> bool {
        let count = self.state.observation_count();
        self.path.is_some()
            && self.config.save_interval > 0
            && count > 0
            && count % self.config.save_interval == 0
            && self.last_saved_at.load(Ordering::Acquire) != count
    }

    /// Save on the observation-count cadence. Failures are logged, not raised.
    pub fn maybe_save(&mut self) -> bool {
        if !self.save_due() {
            return false;
        }
        match self.save() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Baseline save failed: {}", e);
                false
            }
        }
    }

    /// Snapshot by value and write on a worker thread. The caller may keep
    /// mutating the state; the write sees the state as of this call. The
    /// save boundary counts as saved only after the write succeeds.
    pub fn save_in_background(&mut self) -> Option<JoinHandle<ForesightResult<()>>> {
        let path = self.path.clone()?;
        let snapshot = self.state.to_snapshot();
        let count = self.state.observation_count();
        let last_saved_at = Arc::clone(&self.last_saved_at);
        Some(std::thread::spawn(move || {
            let result = write_snapshot(&path, &snapshot);
            match &result {
                Ok(()) => {
                    last_saved_at.fetch_max(count, Ordering::AcqRel);
                }
                Err(e) => tracing::warn!("Background baseline save failed: {}", e),
            }
            result
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populated(config: &BaselineConfig) -> BaselineState {
        let mut state = BaselineState::empty(config);
        for i in 0..5 {
            state.record(Channel::AmbientTemp, 20.0 + i as f64, Some(14));
            state.record(Channel::Light, 250.0, Some(14));
            state.increment_count();
        }
        state.weights_mut().set(Channel::Light, 1.7);
        state
    }

    #[test]
    fn test_empty_state_has_no_baselines() {
        let state = BaselineState::empty(&BaselineConfig::default());
        for &c in Channel::all() {
            assert_eq!(state.ema(c), None);
            assert_eq!(state.weights().get(c), 1.0);
        }
        assert_eq!(state.observation_count(), 0);
    }

    #[test]
    fn test_diurnal_bucket_capped() {
        let mut table = DiurnalTable::new(3);
        for v in 0..10 {
            table.push(7, v as f64);
        }
        assert_eq!(table.len_at(7), 3);
        assert_eq!(table.mean_at(7), Some(8.0));
        assert_eq!(table.mean_at(8), None);
        table.push(24, 1.0);
        assert_eq!(table.total_samples(), 3);
    }

    #[test]
    fn test_diurnal_restore_is_lenient() {
        let mut map = BTreeMap::new();
        map.insert("3".to_string(), vec![1.0, f64::INFINITY, 2.0]);
        map.insert("99".to_string(), vec![5.0]);
        map.insert("noon".to_string(), vec![5.0]);
        let table = DiurnalTable::from_persisted(&map, 10);
        assert_eq!(table.len_at(3), 2);
        assert_eq!(table.total_samples(), 2);
    }

    #[test]
    fn test_weights_stay_bounded() {
        let mut w = DomainWeights::new(1.0, 0.3, 3.0);
        for _ in 0..100 {
            w.adjust(Channel::Humidity, 0.1);
        }
        assert_eq!(w.get(Channel::Humidity), 3.0);
        for _ in 0..100 {
            w.adjust(Channel::Humidity, -0.05);
        }
        assert!((w.get(Channel::Humidity) - 0.3).abs() < 1e-12);
        w.set(Channel::Humidity, f64::NAN);
        assert!((w.get(Channel::Humidity) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("baseline.json");
        let config = BaselineConfig::default();
        let state = populated(&config);

        write_snapshot(&path, &state.to_snapshot()).unwrap();
        let loaded = load_state(&path, &config);

        for &c in Channel::all() {
            match (state.ema(c), loaded.ema(c)) {
                (Some(a), Some(b)) => assert!((a - b).abs() < 1e-9),
                (None, None) => {}
                other => panic!("{} mismatch: {:?}", c, other),
            }
            assert!((state.weights().get(c) - loaded.weights().get(c)).abs() < 1e-9);
        }
        assert_eq!(
            state.diurnal().to_persisted(),
            loaded.diurnal().to_persisted()
        );
        assert_eq!(loaded.observation_count(), 5);
        // Restored EWMA is trusted immediately
        assert!(loaded.baseline_ready(Channel::AmbientTemp, 3));
    }

    #[test]
    fn test_missing_file_yields_empty() {
        let dir = TempDir::new().unwrap();
        let state = load_state(&dir.path().join("nope.json"), &BaselineConfig::default());
        assert_eq!(state.ema(Channel::Light), None);
    }

    #[test]
    fn test_malformed_file_yields_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("baseline.json");
        fs::write(&path, "{ this is not json").unwrap();
        let state = load_state(&path, &BaselineConfig::default());
        assert_eq!(state.ema(Channel::AmbientTemp), None);
        assert_eq!(state.weights().get(Channel::AmbientTemp), 1.0);
    }

    #[test]
    fn test_partial_file_defaults_missing_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("baseline.json");
        fs::write(
            &path,
            r#"{"light": 120.5, "ambient_temp": null, "domain_weights": {"light": 2.0, "bogus": 9.0}}"#,
        )
        .unwrap();
        let state = load_state(&path, &BaselineConfig::default());
        assert_eq!(state.ema(Channel::Light), Some(120.5));
        assert_eq!(state.ema(Channel::AmbientTemp), None);
        assert_eq!(state.weights().get(Channel::Light), 2.0);
        assert_eq!(state.weights().get(Channel::Warmth), 1.0);
        assert_eq!(state.observation_count(), 0);
    }

    #[test]
    fn test_persisted_keys_match_channel_names() {
        let config = BaselineConfig::default();
        let json = serde_json::to_value(BaselineState::empty(&config).to_snapshot()).unwrap();
        for &c in Channel::all() {
            assert!(json.get(c.name()).is_some(), "missing key {}", c);
            assert!(json[c.name()].is_null());
        }
    }

    #[test]
    fn test_maybe_save_cadence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("baseline.json");
        let config = BaselineConfig {
            save_interval: 3,
            ..Default::default()
        };
        let mut store = BaselineStore::open(&path, config);

        store.state_mut().increment_count();
        assert!(!store.maybe_save());
        store.state_mut().increment_count();
        store.state_mut().increment_count();
        assert!(store.maybe_save());
        assert!(path.exists());
        // Same count: already saved
        assert!(!store.maybe_save());
    }

    #[test]
    fn test_in_memory_store_cannot_save() {
        let mut store = BaselineStore::in_memory(BaselineConfig::default());
        assert!(store.save().is_err());
        assert!(store.save_in_background().is_none());
    }

    #[test]
    fn test_background_save_uses_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("baseline.json");
        let mut store = BaselineStore::open(&path, BaselineConfig::default());
        store.state_mut().record(Channel::Pressure, 1013.0, None);
        let handle = store.save_in_background().unwrap();
        // Keep mutating while the write is in flight
        store.state_mut().record(Channel::Pressure, 900.0, None);
        handle.join().unwrap().unwrap();

        let snapshot = read_snapshot(&path).unwrap();
        assert_eq!(snapshot.pressure, Some(1013.0));
    }

    #[test]
    fn test_concurrent_saves_leave_valid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("baseline.json");
        let mut store = BaselineStore::open(&path, BaselineConfig::default());

        let mut handles = Vec::new();
        for i in 0..8 {
            store.state_mut().record(Channel::Pressure, 1000.0 + i as f64, None);
            handles.push(store.save_in_background().unwrap());
            store.save().unwrap();
        }
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let snapshot = read_snapshot(&path).unwrap();
        assert!(snapshot.pressure.is_some());
        // Only the target file remains; temp files were renamed away
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_failed_background_save_stays_due() {
        let dir = TempDir::new().unwrap();
        // Parent is a regular file, so the write cannot succeed
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let config = BaselineConfig {
            save_interval: 1,
            ..Default::default()
        };
        let mut store = BaselineStore::open(blocker.join("baseline.json"), config);
        store.state_mut().increment_count();
        assert!(store.save_due());

        let handle = store.save_in_background().unwrap();
        assert!(handle.join().unwrap().is_err());
        assert!(store.save_due());
    }

    #[test]
    fn test_successful_background_save_clears_due() {
        let dir = TempDir::new().unwrap();
        let config = BaselineConfig {
            save_interval: 1,
            ..Default::default()
        };
        let mut store = BaselineStore::open(dir.path().join("baseline.json"), config);
        store.state_mut().increment_count();
        let handle = store.save_in_background().unwrap();
        handle.join().unwrap().unwrap();
        assert!(!store.save_due());
    }
}
