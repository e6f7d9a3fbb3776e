//! ═══════════════════════════════════════════════════════════════════════════════
//! ERROR — Unified Error Type for Foresight
//! ═══════════════════════════════════════════════════════════════════════════════
//! Only persistence and configuration can fail. The tick path (predict, observe,
//! reflect, curiosity) degrades to defaults and never returns these.
//! ═══════════════════════════════════════════════════════════════════════════════

use std::fmt;

/// The unified error type for the Foresight crate
#[derive(Debug)]
pub enum ForesightError {
    /// I/O error (baseline file, config file)
    Io(std::io::Error),
    /// JSON serialization/deserialization error
    Json(serde_json::Error),
    /// Configuration error
    Config(ConfigError),
}

impl std::error::Error for ForesightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ForesightError::Io(e) => Some(e),
            ForesightError::Json(e) => Some(e),
            ForesightError::Config(e) => Some(e),
        }
    }
}

impl fmt::Display for ForesightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForesightError::Io(e) => write!(f, "I/O error: {}", e),
            ForesightError::Json(e) => write!(f, "JSON error: {}", e),
            ForesightError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl From<std::io::Error> for ForesightError {
    fn from(err: std::io::Error) -> Self {
        ForesightError::Io(err)
    }
}

impl From<serde_json::Error> for ForesightError {
    fn from(err: serde_json::Error) -> Self {
        ForesightError::Json(err)
    }
}

/// Configuration-specific errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Invalid value
    InvalidValue { field: String, message: String },
    /// No baseline path configured where one is required
    NoBaselinePath,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid value for '{}': {}", field, message)
            }
            ConfigError::NoBaselinePath => write!(f, "No baseline path configured"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for ForesightError {
    fn from(err: ConfigError) -> Self {
        ForesightError::Config(err)
    }
}

/// Type alias for Result with ForesightError
pub type ForesightResult<T> = Result<T, ForesightError>;
