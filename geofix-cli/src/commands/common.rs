//! Common types and utilities shared across CLI commands.

use clap::ValueEnum;

use geofix::config::ConfigFile;
use geofix::permission::PermissionState;
use geofix::policy::{AcquisitionMode, AcquisitionPolicy};

use crate::error::CliError;

/// Acquisition profile selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ModeArg {
    /// Survey-grade: wait for a precise fix, fail if it never comes
    Full,
    /// Field entry: answer fast, flag imprecise fixes as coarse
    Quick,
}

impl From<ModeArg> for AcquisitionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => AcquisitionMode::Full,
            ModeArg::Quick => AcquisitionMode::Quick,
        }
    }
}

/// Permission state reported to the engine.
///
/// A terminal has no platform permission dialog, so the state is declared
/// on the command line; `prompt` exercises the preflight request.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum PermissionArg {
    Granted,
    Prompt,
    Denied,
    Unknown,
}

impl From<PermissionArg> for PermissionState {
    fn from(arg: PermissionArg) -> Self {
        match arg {
            PermissionArg::Granted => PermissionState::Granted,
            PermissionArg::Prompt => PermissionState::Prompt,
            PermissionArg::Denied => PermissionState::Denied,
            PermissionArg::Unknown => PermissionState::Unknown,
        }
    }
}

/// Build the policy for a mode from the config file.
///
/// `streaming` switches Quick from a single reading to stream sampling;
/// Full always streams.
pub fn resolve_policy(
    mode: ModeArg,
    streaming: bool,
    config: &ConfigFile,
) -> Result<AcquisitionPolicy, CliError> {
    match AcquisitionMode::from(mode) {
        AcquisitionMode::Full => Ok(config.full_policy()?),
        AcquisitionMode::Quick => {
            let policy = config.quick_policy()?;
            if streaming {
                policy
                    .with_single_shot(false)
                    .map_err(|e| CliError::Config(e.to_string()))
            } else {
                Ok(policy)
            }
        }
    }
}
