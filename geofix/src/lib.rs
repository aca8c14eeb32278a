//! Geofix - best-effort location fixes from unreliable positioning sensors.
//!
//! The library races a continuous sample stream against a one-shot read and
//! a hard deadline, keeps the most accurate reading, and resolves exactly
//! once with either a fix or a typed error. Two policy profiles trade
//! accuracy against latency: Full for survey-grade records, Quick for fast
//! field entry that degrades to a coarse fix instead of failing.
//!
//! # Modules
//!
//! - [`acquisition`]: the engine and its state machine
//! - [`fix`]: fix model and best-fix selection
//! - [`permission`]: permission state and change notification
//! - [`policy`]: Full and Quick acquisition profiles
//! - [`source`]: sample source adapters (scripted, push-based, gpsd)
//! - [`submit`]: location records and sinks
//! - [`config`]: ~/.geofix/config.ini
//! - [`logging`]: tracing subscriber setup

pub mod acquisition;
pub mod config;
pub mod fix;
pub mod logging;
pub mod permission;
pub mod policy;
pub mod source;
pub mod submit;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
