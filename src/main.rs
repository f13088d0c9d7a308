//! bulkpatch command-line entry point.
//!
//! Loads the main configuration document, then runs the pipeline (expand archives,
//! rewrite text, replace files, recompress archives) on a tokio blocking worker:
//!
//! 1. Initialize logging → `<log-dir>/bulkpatch.<date>`
//! 2. Create a tokio runtime
//! 3. Attach a [`StateManager`] to the pipeline and print its item events as status lines
//! 4. On Ctrl-C, request a stop and wait at most `--stop-timeout-secs` for the worker
//! 5. Print exactly one summary line and exit with a matching code

use anyhow::{Context, Result};
use bulkpatch::logging::{self, LogFormat};
use bulkpatch::pipeline::{JoinStatus, PipelineHandle, ProgressObserver, run_from_config_path};
use bulkpatch::services::Severity;
use bulkpatch::{APP_NAME, PipelineStage, StateChange, StateManager, VERSION};
use camino::Utf8PathBuf;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Exit code used when the run was interrupted
const EXIT_INTERRUPTED: u8 = 130;

/// Unzip every archive under a directory tree, patch text and files, then rezip
#[derive(Parser, Debug)]
#[command(name = "bulkpatch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Main configuration document (JSON, or YAML for .yaml/.yml)
    #[arg(value_name = "CONFIG", default_value = "config.json")]
    config: Utf8PathBuf,

    /// Directory for log files
    #[arg(long, value_name = "DIR", default_value = logging::DEFAULT_LOG_DIR)]
    log_dir: Utf8PathBuf,

    /// Log at debug level and print debug-level status lines
    #[arg(long)]
    debug: bool,

    /// Only print the final summary line
    #[arg(short, long)]
    quiet: bool,

    /// Write the log file as JSON lines
    #[arg(long)]
    json_log: bool,

    /// Seconds to wait for the worker after Ctrl-C
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    stop_timeout_secs: u64,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let format = if cli.json_log {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    let _guard = logging::setup_logging_with_console(
        &cli.log_dir,
        logging::DEFAULT_LOG_PREFIX,
        cli.debug,
        !cli.quiet,
        format,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("bulkpatch-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let status = runtime.block_on(run(&cli));

    let code = match &status {
        JoinStatus::Finished(outcome) | JoinStatus::Cancelled(outcome) => {
            println!("{}", outcome);
            outcome.exit_code()
        }
        JoinStatus::StillRunning => {
            println!(
                "Processing did not stop within {}s. Check the log file for details.",
                cli.stop_timeout_secs
            );
            EXIT_INTERRUPTED
        }
    };

    runtime.shutdown_timeout(Duration::from_secs(cli.stop_timeout_secs));
    tracing::info!("Shutdown complete (exit code {})", code);

    Ok(ExitCode::from(code))
}

async fn run(cli: &Cli) -> JoinStatus {
    let min_severity = if cli.debug {
        Severity::Debug
    } else {
        Severity::Info
    };
    let state = Arc::new(StateManager::new().with_item_severity(min_severity));

    let printer = if cli.quiet {
        None
    } else {
        Some(tokio::spawn(print_progress(state.subscribe(), min_severity)))
    };

    let config_path = cli.config.clone();
    let observer: Arc<dyn ProgressObserver> = state.clone();
    let mut handle = PipelineHandle::spawn_with(&tokio::runtime::Handle::current(), move |stop| {
        run_from_config_path(&config_path, stop, observer)
    });
    let stop = handle.stop_handle();

    let status = tokio::select! {
        outcome = handle.wait() => JoinStatus::from(outcome),
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping after the current item");
            eprintln!("Stopping after the current item...");
            stop.request_stop();
            handle.wait_for(Duration::from_secs(cli.stop_timeout_secs)).await
        }
    };

    // Let the printer drain what is already queued
    drop(state);
    if let Some(printer) = printer {
        if tokio::time::timeout(Duration::from_millis(500), printer).await.is_err() {
            tracing::debug!("Status printer did not drain in time");
        }
    }

    status
}

async fn print_progress(mut rx: broadcast::Receiver<StateChange>, min_severity: Severity) {
    loop {
        match rx.recv().await {
            Ok(StateChange::StageChanged { stage }) if PipelineStage::WORK_STAGES.contains(&stage) => {
                println!("==> {}", stage);
            }
            Ok(StateChange::ItemProcessed {
                severity, message, ..
            }) if severity >= min_severity => {
                println!("{}", message);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Status output skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}
