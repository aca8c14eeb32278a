//! User configuration (~/.geofix/config.ini).
//!
//! Settings structs live in [`settings`], parsing in `parser` and
//! serialization in `writer`. A missing file means defaults; every value
//! present is validated and reported with its section and key when wrong.
//!
//! # Example
//!
//! ```ignore
//! use geofix::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let policy = config.full_policy()?;
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, EngineSettings, FullSettings, GpsdSettings, LoggingSettings, QuickSettings,
    DEFAULT_LOG_FILE,
};
