//! Loading and saving ~/.geofix/config.ini.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;
use crate::policy::{AcquisitionMode, AcquisitionPolicy, PolicyError};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Values parse but do not form a valid profile
    #[error("Invalid [{section}] profile: {source}")]
    InvalidPolicy {
        section: &'static str,
        #[source]
        source: PolicyError,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.geofix/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }

    /// Build the Full profile from `[full]` and `[engine]`.
    pub fn full_policy(&self) -> Result<AcquisitionPolicy, ConfigFileError> {
        let invalid = |source| ConfigFileError::InvalidPolicy {
            section: "full",
            source,
        };

        AcquisitionPolicy::new(
            AcquisitionMode::Full,
            Duration::from_secs(self.full.max_wait_secs),
            self.full.target_accuracy_m,
            self.full.hard_max_accuracy_m,
            Duration::from_secs(self.full.fallback_timeout_secs),
        )
        .and_then(|p| self.apply_engine(p))
        .map_err(invalid)
    }

    /// Build the Quick profile from `[quick]` and `[engine]`.
    pub fn quick_policy(&self) -> Result<AcquisitionPolicy, ConfigFileError> {
        let invalid = |source| ConfigFileError::InvalidPolicy {
            section: "quick",
            source,
        };
        let max_wait = Duration::from_secs(self.quick.max_wait_secs);

        AcquisitionPolicy::quick()
            .with_max_wait(max_wait)
            .and_then(|p| p.with_fallback_timeout(max_wait))
            .and_then(|p| p.with_soft_accuracy_m(self.quick.soft_accuracy_m))
            .and_then(|p| p.with_single_shot(self.quick.single_shot))
            .and_then(|p| self.apply_engine(p))
            .map_err(invalid)
    }

    fn apply_engine(&self, policy: AcquisitionPolicy) -> Result<AcquisitionPolicy, PolicyError> {
        policy
            .with_preflight_timeout(Duration::from_secs(self.engine.preflight_timeout_secs))?
            .with_deadline_grace(Duration::from_millis(self.engine.deadline_grace_ms))
    }
}

/// Path to the config directory (~/.geofix).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geofix")
}

/// Path to the config file (~/.geofix/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_default_policies_match_profiles() {
        let config = ConfigFile::default();
        assert_eq!(config.full_policy().unwrap(), AcquisitionPolicy::full());
        assert_eq!(config.quick_policy().unwrap(), AcquisitionPolicy::quick());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.full.target_accuracy_m = 12.5;
        config.quick.single_shot = false;
        config.engine.deadline_grace_ms = 0;
        config.gpsd.address = "192.168.1.20:2947".to_string();
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_full_policy_from_settings() {
        let mut config = ConfigFile::default();
        config.full.max_wait_secs = 60;
        config.full.target_accuracy_m = 100.0;
        config.full.hard_max_accuracy_m = 150.0;
        config.full.fallback_timeout_secs = 20;

        let policy = config.full_policy().unwrap();
        assert_eq!(policy.mode(), AcquisitionMode::Full);
        assert_eq!(policy.max_wait(), Duration::from_secs(60));
        assert_eq!(policy.target_accuracy_m(), 100.0);
        assert_eq!(policy.hard_max_accuracy_m(), 150.0);
        assert_eq!(policy.fallback_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_full_policy_rejects_hard_max_below_target() {
        let mut config = ConfigFile::default();
        config.full.target_accuracy_m = 50.0;
        config.full.hard_max_accuracy_m = 30.0;

        let err = config.full_policy().unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidPolicy {
                section: "full",
                source: PolicyError::HardMaxBelowTarget { .. }
            }
        ));
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let mut config = ConfigFile::default();
        config.full.max_wait_secs = u64::MAX;
        config.full.fallback_timeout_secs = u64::MAX;
        assert!(matches!(
            config.full_policy(),
            Err(ConfigFileError::InvalidPolicy {
                section: "full",
                source: PolicyError::DurationTooLong { name: "max wait", .. }
            })
        ));

        let mut config = ConfigFile::default();
        config.engine.deadline_grace_ms = u64::MAX;
        assert!(matches!(
            config.quick_policy(),
            Err(ConfigFileError::InvalidPolicy {
                section: "quick",
                source: PolicyError::DurationTooLong { name: "deadline grace", .. }
            })
        ));
    }

    #[test]
    fn test_quick_policy_from_settings() {
        let mut config = ConfigFile::default();
        config.quick.max_wait_secs = 8;
        config.quick.soft_accuracy_m = 150.0;
        config.quick.single_shot = false;

        let policy = config.quick_policy().unwrap();
        assert_eq!(policy.max_wait(), Duration::from_secs(8));
        assert_eq!(policy.soft_threshold_m(), 150.0);
        assert!(!policy.single_shot());
    }
}
