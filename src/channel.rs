//! ═══════════════════════════════════════════════════════════════════════════════
//! CHANNEL — Typed Signal Vocabulary
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! Every tracked quantity is a `Channel`. The set is fixed at compile time:
//! four environmental sensors and four internal anima dimensions.
//!
//! `ChannelMap<T>` is a dense array indexed by channel, so per-channel state
//! never needs hashing or allocation on the tick path.
//! ═══════════════════════════════════════════════════════════════════════════════

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

// ═══════════════════════════════════════════════════════════════════════════════
// CHANNELS
// ═══════════════════════════════════════════════════════════════════════════════

/// A tracked scalar quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    // ─────────────────────────────────────────────────────────────────────────
    // Environment
    // ─────────────────────────────────────────────────────────────────────────
    /// Ambient temperature (°C)
    AmbientTemp,
    /// Ambient light intensity (lux, log-distributed)
    Light,
    /// Relative humidity (%)
    Humidity,
    /// Barometric pressure (hPa)
    Pressure,

    // ─────────────────────────────────────────────────────────────────────────
    // Anima (felt state, each in [0, 1])
    // ─────────────────────────────────────────────────────────────────────────
    Warmth,
    Clarity,
    Stability,
    Presence,
}

/// How prediction error is measured on a channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    /// |actual - predicted| / span
    Linear { span: f64 },
    /// |log10(actual) - log10(predicted)| / decades
    Log { decades: f64, floor: f64 },
}

impl Channel {
    pub const COUNT: usize = 8;

    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::AmbientTemp,
        Channel::Light,
        Channel::Humidity,
        Channel::Pressure,
        Channel::Warmth,
        Channel::Clarity,
        Channel::Stability,
        Channel::Presence,
    ];

    pub fn all() -> &'static [Channel] {
        &Self::ALL
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Serialized / domain name
    pub fn name(self) -> &'static str {
        match self {
            Channel::AmbientTemp => "ambient_temp",
            Channel::Light => "light",
            Channel::Humidity => "humidity",
            Channel::Pressure => "pressure",
            Channel::Warmth => "warmth",
            Channel::Clarity => "clarity",
            Channel::Stability => "stability",
            Channel::Presence => "presence",
        }
    }

    pub fn from_name(name: &str) -> Option<Channel> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Human-facing label used in reflection text and questions
    pub fn label(self) -> &'static str {
        match self {
            Channel::AmbientTemp => "temperature",
            Channel::Light => "light",
            Channel::Humidity => "humidity",
            Channel::Pressure => "pressure",
            Channel::Warmth => "warmth",
            Channel::Clarity => "clarity",
            Channel::Stability => "stability",
            Channel::Presence => "presence",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Channel::AmbientTemp => "°C",
            Channel::Light => " lux",
            Channel::Humidity => "%",
            Channel::Pressure => " hPa",
            _ => "",
        }
    }

    /// Value with the precision and unit a person would expect
    pub fn format_value(self, value: f64) -> String {
        match self {
            Channel::Light => format!("{:.0}{}", value, self.unit()),
            c if c.is_anima() => format!("{:.2}", value),
            _ => format!("{:.1}{}", value, self.unit()),
        }
    }

    pub fn is_anima(self) -> bool {
        matches!(
            self,
            Channel::Warmth | Channel::Clarity | Channel::Stability | Channel::Presence
        )
    }

    /// Physically sane range; predictions are clamped into it
    pub fn valid_range(self) -> (f64, f64) {
        match self {
            Channel::AmbientTemp => (-40.0, 85.0),
            Channel::Light => (0.0, 100_000.0),
            Channel::Humidity => (0.0, 100.0),
            Channel::Pressure => (300.0, 1100.0),
            _ => (0.0, 1.0),
        }
    }

    pub fn clamp_value(self, value: f64) -> f64 {
        let (lo, hi) = self.valid_range();
        value.clamp(lo, hi)
    }

    pub fn scale(self) -> Scale {
        match self {
            Channel::AmbientTemp => Scale::Linear { span: 20.0 },
            // Light spans decades; a 10 lux swing at dusk is not a 10 lux swing at noon
            Channel::Light => Scale::Log {
                decades: 2.0,
                floor: 1.0,
            },
            Channel::Humidity => Scale::Linear { span: 50.0 },
            Channel::Pressure => Scale::Linear { span: 20.0 },
            _ => Scale::Linear { span: 1.0 },
        }
    }

    /// Normalized error above which the channel counts as a surprise source
    pub fn default_threshold(self) -> f64 {
        match self {
            Channel::AmbientTemp => 0.15,
            Channel::Light => 0.25,
            Channel::Humidity => 0.20,
            Channel::Pressure => 0.15,
            _ => 0.20,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHANNEL MAP — Dense per-channel storage
// ═══════════════════════════════════════════════════════════════════════════════

/// One `T` per channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelMap<T>([T; Channel::COUNT]);

impl<T> ChannelMap<T> {
    pub fn from_fn(mut f: impl FnMut(Channel) -> T) -> Self {
        Self(Channel::ALL.map(&mut f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &T)> {
        Channel::ALL.iter().copied().zip(self.0.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Channel, &T) -> U) -> ChannelMap<U> {
        ChannelMap::from_fn(|c| f(c, &self[c]))
    }
}

impl<T: Default> Default for ChannelMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<Channel> for ChannelMap<T> {
    type Output = T;

    fn index(&self, channel: Channel) -> &T {
        &self.0[channel.index()]
    }
}

impl<T> IndexMut<Channel> for ChannelMap<T> {
    fn index_mut(&mut self, channel: Channel) -> &mut T {
        &mut self.0[channel.index()]
    }
}

/// Actual values for one tick; `None` = not sensed this tick
pub type ChannelValues = ChannelMap<Option<f64>>;

impl ChannelMap<Option<f64>> {
    /// Empty reading set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from the external sensor reading set and felt state
    pub fn from_parts(readings: &SensorReadings, anima: Option<&AnimaState>) -> Self {
        let mut values = Self::empty();
        values[Channel::AmbientTemp] = readings.ambient_temp;
        values[Channel::Light] = readings.light;
        values[Channel::Humidity] = readings.humidity;
        values[Channel::Pressure] = readings.pressure;
        if let Some(a) = anima {
            values[Channel::Warmth] = Some(a.warmth);
            values[Channel::Clarity] = Some(a.clarity);
            values[Channel::Stability] = Some(a.stability);
            values[Channel::Presence] = Some(a.presence);
        }
        values
    }

    /// Builder-style setter
    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self[channel] = Some(value);
        self
    }

    /// Channels carrying a value
    pub fn present(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        self.iter().filter_map(|(c, v)| v.map(|v| (c, v)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTERNAL INPUTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Raw environmental readings for one tick (any field may be absent)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReadings {
    #[serde(default)]
    pub ambient_temp: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub light: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
}

/// Internal felt state, each dimension in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimaState {
    pub warmth: f64,
    pub clarity: f64,
    pub stability: f64,
    pub presence: f64,
}

impl AnimaState {
    pub fn new(warmth: f64, clarity: f64, stability: f64, presence: f64) -> Self {
        Self {
            warmth: warmth.clamp(0.0, 1.0),
            clarity: clarity.clamp(0.0, 1.0),
            stability: stability.clamp(0.0, 1.0),
            presence: presence.clamp(0.0, 1.0),
        }
    }
}

impl Default for AnimaState {
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.5, 0.5)
    }
}
