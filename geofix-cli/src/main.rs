//! Geofix CLI - Command-line interface
//!
//! Captures a location fix from gpsd or a recorded trace using the Full or
//! Quick acquisition profile.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::acquire::AcquireArgs;
use commands::common::{ModeArg, PermissionArg};
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "geofix")]
#[command(version, about = "Capture a best-effort location fix", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture one location fix
    Acquire {
        /// Acquisition profile
        #[arg(long, value_enum, default_value = "full")]
        mode: ModeArg,

        /// Replay a recorded JSON trace instead of reading a receiver
        #[arg(long, conflicts_with = "gpsd")]
        trace: Option<PathBuf>,

        /// gpsd address as host:port (default from config.ini)
        #[arg(long)]
        gpsd: Option<String>,

        /// Permission state to report to the engine
        #[arg(long, value_enum, default_value = "granted")]
        permission: PermissionArg,

        /// Append the location record to this JSON Lines file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Quick mode: sample a stream instead of taking one reading
        #[arg(long)]
        streaming: bool,

        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Acquire {
            mode,
            trace,
            gpsd,
            permission,
            output,
            streaming,
            debug,
        } => commands::acquire::run(AcquireArgs {
            mode,
            trace,
            gpsd,
            permission,
            output,
            streaming,
            debug,
        }),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
