//! Acquire command - capture one location fix.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use geofix::acquisition::{AcquiredFix, AcquisitionEngine, AcquisitionProgress};
use geofix::config::ConfigFile;
use geofix::permission::SharedPermission;
use geofix::source::{GpsdSource, SampleSource, ScriptedSource};
use geofix::submit::{JsonLinesSink, LocationSubmission, RecordSink};

use super::common::{resolve_policy, ModeArg, PermissionArg};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the acquire command.
pub struct AcquireArgs {
    pub mode: ModeArg,
    pub trace: Option<PathBuf>,
    pub gpsd: Option<String>,
    pub permission: PermissionArg,
    pub output: Option<PathBuf>,
    pub streaming: bool,
    pub debug: bool,
}

/// Run the acquire command.
pub fn run(args: AcquireArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("acquire");

    let policy = resolve_policy(args.mode, args.streaming, runner.config())?;
    let (source, description) = open_source(args.trace.as_deref(), args.gpsd, runner.config())?;
    let permission = Arc::new(SharedPermission::new(args.permission.into()));
    let engine = AcquisitionEngine::new(source, permission);

    println!(
        "{} {} fix from {} (up to {}s)",
        style("Capturing").bold(),
        policy.mode(),
        description,
        policy.max_wait().as_secs()
    );
    println!("Press Ctrl+C to cancel");
    println!();

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let interactive = atty::is(atty::Stream::Stdout);
    let display =
        interactive.then(|| ProgressDisplay::start(&runner, engine.subscribe_progress()));

    let result = runner.block_on(engine.acquire_with_cancel(&policy, cancel));

    if let Some(display) = display {
        display.finish();
    }

    let acquired = result?;
    print_fix(&acquired);

    let can_prompt = interactive && atty::is(atty::Stream::Stdin);
    if acquired.coarse && can_prompt && !confirm_coarse(&acquired)? {
        info!("Coarse fix rejected by user");
        println!("{}", style("Location discarded.").yellow());
        return Ok(());
    }

    let submission = LocationSubmission::from(acquired);
    println!("  Source:   {}", submission.source_label);
    println!("  Location: {}", submission.to_ewkt());

    if let Some(path) = args.output {
        let sink = JsonLinesSink::new(path.clone());
        runner
            .block_on(sink.submit(submission))
            .map_err(|error| CliError::Sink {
                path: path.clone(),
                error,
            })?;
        println!();
        println!("Saved to {}", path.display());
    }

    Ok(())
}

/// Pick the sample source: a recorded trace, or gpsd.
fn open_source(
    trace: Option<&Path>,
    gpsd: Option<String>,
    config: &ConfigFile,
) -> Result<(Arc<dyn SampleSource>, String), CliError> {
    match trace {
        Some(path) => {
            let source = ScriptedSource::load(path).map_err(|error| CliError::Trace {
                path: path.to_path_buf(),
                error,
            })?;
            Ok((Arc::new(source), format!("trace {}", path.display())))
        }
        None => {
            let address = gpsd.unwrap_or_else(|| config.gpsd.address.clone());
            let description = format!("gpsd at {}", address);
            Ok((Arc::new(GpsdSource::new(address)), description))
        }
    }
}

fn print_fix(acquired: &AcquiredFix) {
    let headline = if acquired.coarse {
        style("Coarse fix").yellow().bold()
    } else {
        style("Fix acquired").green().bold()
    };
    println!("{}", headline);
    println!("  Position: {}", acquired.fix);
    println!("  Samples:  {}", acquired.samples);
}

fn confirm_coarse(acquired: &AcquiredFix) -> Result<bool, CliError> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Fix is only accurate to ±{:.0} m. Keep it?",
            acquired.accuracy_m()
        ))
        .default(true)
        .interact()
        .map_err(|e| CliError::Config(format!("Confirm error: {}", e)))
}

/// Spinner fed by the engine's progress channel.
struct ProgressDisplay {
    bar: ProgressBar,
    updater: JoinHandle<()>,
}

impl ProgressDisplay {
    fn start(runner: &CliRunner, mut progress: watch::Receiver<AcquisitionProgress>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷ "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        let updater = {
            let bar = bar.clone();
            runner.spawn(async move {
                while progress.changed().await.is_ok() {
                    let line = progress.borrow_and_update().status_line();
                    bar.set_message(line);
                }
            })
        };

        Self { bar, updater }
    }

    fn finish(self) {
        self.updater.abort();
        self.bar.finish_and_clear();
    }
}
