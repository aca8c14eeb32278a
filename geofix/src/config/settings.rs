//! Settings structs for each `[section]` of config.ini.
//!
//! Pure data; parsing lives in [`super::parser`] and serialization in
//! [`super::writer`].

use std::path::PathBuf;

use crate::policy::{
    DEFAULT_DEADLINE_GRACE, DEFAULT_PREFLIGHT_TIMEOUT, FULL_FALLBACK_TIMEOUT,
    FULL_HARD_MAX_ACCURACY_M, FULL_MAX_WAIT, FULL_TARGET_ACCURACY_M, QUICK_MAX_WAIT,
    QUICK_SOFT_ACCURACY_M,
};
use crate::source::DEFAULT_GPSD_ADDRESS;

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE: &str = "geofix.log";

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Full (survey-grade) profile
    pub full: FullSettings,
    /// Quick (field entry) profile
    pub quick: QuickSettings,
    /// Settings shared by both profiles
    pub engine: EngineSettings,
    pub gpsd: GpsdSettings,
    pub logging: LoggingSettings,
}

/// `[full]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct FullSettings {
    pub max_wait_secs: u64,
    pub target_accuracy_m: f64,
    pub hard_max_accuracy_m: f64,
    pub fallback_timeout_secs: u64,
}

/// `[quick]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickSettings {
    pub max_wait_secs: u64,
    pub soft_accuracy_m: f64,
    /// Take one reading instead of sampling a stream.
    pub single_shot: bool,
}

/// `[engine]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub preflight_timeout_secs: u64,
    pub deadline_grace_ms: u64,
}

/// `[gpsd]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct GpsdSettings {
    /// Daemon address as `host:port`
    pub address: String,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub file: PathBuf,
}

impl Default for FullSettings {
    fn default() -> Self {
        Self {
            max_wait_secs: FULL_MAX_WAIT.as_secs(),
            target_accuracy_m: FULL_TARGET_ACCURACY_M,
            hard_max_accuracy_m: FULL_HARD_MAX_ACCURACY_M,
            fallback_timeout_secs: FULL_FALLBACK_TIMEOUT.as_secs(),
        }
    }
}

impl Default for QuickSettings {
    fn default() -> Self {
        Self {
            max_wait_secs: QUICK_MAX_WAIT.as_secs(),
            soft_accuracy_m: QUICK_SOFT_ACCURACY_M,
            single_shot: true,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            preflight_timeout_secs: DEFAULT_PREFLIGHT_TIMEOUT.as_secs(),
            deadline_grace_ms: DEFAULT_DEADLINE_GRACE.as_millis() as u64,
        }
    }
}

impl Default for GpsdSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_GPSD_ADDRESS.to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: super::config_directory().join(DEFAULT_LOG_FILE),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            full: FullSettings::default(),
            quick: QuickSettings::default(),
            engine: EngineSettings::default(),
            gpsd: GpsdSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
