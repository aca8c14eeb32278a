//! CLI error handling with user-friendly messages.
//!
//! Centralizes error reporting for the CLI, providing consistent formatting,
//! follow-up hints and exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use geofix::acquisition::AcquisitionError;
use geofix::config::ConfigFileError;
use geofix::source::ScriptError;
use geofix::submit::SinkError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Failed to load a recorded trace
    Trace { path: PathBuf, error: ScriptError },
    /// Acquisition ended without a usable fix
    Acquisition(AcquisitionError),
    /// Failed to write the location record
    Sink { path: PathBuf, error: SinkError },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Acquisition(AcquisitionError::PermissionDenied) => {
                eprintln!();
                eprintln!("Location access is blocked:");
                eprintln!("  1. Re-run with --permission prompt to ask again");
                eprintln!("  2. Check the device's location settings for this program");
            }
            CliError::Acquisition(AcquisitionError::CapabilityUnavailable) => {
                eprintln!();
                eprintln!("No positioning device was found:");
                eprintln!("  1. Is gpsd running? Try: systemctl status gpsd");
                eprintln!("  2. Is a receiver attached? Try: gpsmon");
                eprintln!("  3. Replay a recorded trace instead with --trace <FILE>");
            }
            CliError::Acquisition(AcquisitionError::NoSignal)
            | CliError::Acquisition(AcquisitionError::AccuracyTooLow { .. }) => {
                eprintln!();
                eprintln!("For a better fix:");
                eprintln!("  1. Move outdoors with a clear view of the sky");
                eprintln!("  2. Wait ~15s for the receiver to settle");
                eprintln!("  3. Or use --mode quick to accept a coarse fix");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Trace { path, error } => {
                write!(f, "Failed to load trace '{}': {}", path.display(), error)
            }
            CliError::Acquisition(e) => write!(f, "{}", e),
            CliError::Sink { path, error } => {
                write!(f, "Failed to save location to '{}': {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Runtime(e) => Some(e),
            CliError::Trace { error, .. } => Some(error),
            CliError::Acquisition(e) => Some(e),
            CliError::Sink { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<AcquisitionError> for CliError {
    fn from(e: AcquisitionError) -> Self {
        CliError::Acquisition(e)
    }
}
