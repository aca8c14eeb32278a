//! Configuration management CLI commands.
//!
//! Provides `config show`, `config path` and `config init`.

use clap::Subcommand;
use console::style;

use geofix::config::{config_file_path, ConfigFile};
use geofix::policy::AcquisitionPolicy;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration and the profiles it produces
    Show,

    /// Show the configuration file path
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Init { force } => run_init(force),
    }
}

fn run_show() -> Result<(), CliError> {
    let path = config_file_path();
    let config = ConfigFile::load()?;

    if path.exists() {
        println!("Configuration: {}", path.display());
    } else {
        println!("Configuration: {} (not found, using defaults)", path.display());
    }
    println!();

    print_profile("Full", config.full_policy());
    print_profile("Quick", config.quick_policy());

    println!("{}", style("Sources").bold());
    println!("  gpsd address:       {}", config.gpsd.address);
    println!("  log file:           {}", config.logging.file.display());

    Ok(())
}

fn print_profile(name: &str, policy: Result<AcquisitionPolicy, geofix::config::ConfigFileError>) {
    println!("{}", style(format!("{} profile", name)).bold());
    match policy {
        Ok(policy) => {
            println!("  max wait:           {}s", policy.max_wait().as_secs());
            if policy.early_accept() {
                println!("  target accuracy:    {} m", policy.target_accuracy_m());
                println!("  hard max accuracy:  {} m", policy.hard_max_accuracy_m());
                println!("  fallback timeout:   {}s", policy.fallback_timeout().as_secs());
            } else {
                println!("  soft accuracy:      {} m", policy.soft_threshold_m());
                println!("  single shot:        {}", policy.single_shot());
            }
            println!("  preflight timeout:  {}s", policy.preflight_timeout().as_secs());
            println!("  deadline grace:     {}ms", policy.deadline_grace().as_millis());
        }
        Err(e) => println!("  {}", style(e).red()),
    }
    println!();
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_init(force: bool) -> Result<(), CliError> {
    let path = config_file_path();

    if path.exists() && !force {
        println!("Config file already exists: {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(&path)?;
    println!("{} {}", style("Wrote").green(), path.display());
    Ok(())
}
