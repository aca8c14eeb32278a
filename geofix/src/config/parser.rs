//! INI parsing: `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use std::path::PathBuf;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [full] section
    if let Some(section) = ini.section(Some("full")) {
        if let Some(v) = section.get("max_wait_secs") {
            config.full.max_wait_secs = parse_secs("full", "max_wait_secs", v)?;
        }
        if let Some(v) = section.get("target_accuracy_m") {
            config.full.target_accuracy_m = parse_meters("full", "target_accuracy_m", v)?;
        }
        if let Some(v) = section.get("hard_max_accuracy_m") {
            config.full.hard_max_accuracy_m = parse_meters("full", "hard_max_accuracy_m", v)?;
        }
        if let Some(v) = section.get("fallback_timeout_secs") {
            config.full.fallback_timeout_secs = parse_secs("full", "fallback_timeout_secs", v)?;
        }
    }

    // [quick] section
    if let Some(section) = ini.section(Some("quick")) {
        if let Some(v) = section.get("max_wait_secs") {
            config.quick.max_wait_secs = parse_secs("quick", "max_wait_secs", v)?;
        }
        if let Some(v) = section.get("soft_accuracy_m") {
            config.quick.soft_accuracy_m = parse_meters("quick", "soft_accuracy_m", v)?;
        }
        if let Some(v) = section.get("single_shot") {
            config.quick.single_shot = parse_bool("quick", "single_shot", v)?;
        }
    }

    // [engine] section
    if let Some(section) = ini.section(Some("engine")) {
        if let Some(v) = section.get("preflight_timeout_secs") {
            config.engine.preflight_timeout_secs =
                parse_secs("engine", "preflight_timeout_secs", v)?;
        }
        if let Some(v) = section.get("deadline_grace_ms") {
            config.engine.deadline_grace_ms =
                v.trim()
                    .parse()
                    .map_err(|_| ConfigFileError::InvalidValue {
                        section: "engine".to_string(),
                        key: "deadline_grace_ms".to_string(),
                        value: v.to_string(),
                        reason: "expected a whole number of milliseconds".to_string(),
                    })?;
        }
    }

    // [gpsd] section
    if let Some(section) = ini.section(Some("gpsd")) {
        if let Some(v) = non_empty(section, "address") {
            if !v.contains(':') {
                return Err(ConfigFileError::InvalidValue {
                    section: "gpsd".to_string(),
                    key: "address".to_string(),
                    value: v.to_string(),
                    reason: "expected host:port, e.g. 127.0.0.1:2947".to_string(),
                });
            }
            config.gpsd.address = v.to_string();
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "file") {
            config.logging.file = expand_tilde(v);
        }
    }

    Ok(config)
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

/// Positive whole seconds.
fn parse_secs(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a positive whole number of seconds".to_string(),
        }),
    }
}

/// Positive finite meters.
fn parse_meters(section: &str, key: &str, value: &str) -> Result<f64, ConfigFileError> {
    match value.trim().parse::<f64>() {
        Ok(m) if m.is_finite() && m > 0.0 => Ok(m),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a positive number of meters".to_string(),
        }),
    }
}

pub(super) fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

/// Expand ~ to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
