//! CLI command implementations.
//!
//! - [`acquire`] - Capture one location fix
//! - [`config`] - Configuration management (show, path, init)

pub mod acquire;
pub mod common;
pub mod config;
