//! rota-send - Publishing daemon
//!
//! Runs one publish cycle per interval: fetch candidates, pick the account
//! owning the current minute, publish something it has not published yet.

use clap::Parser;
use librotacast::logging::{LogFormat, LoggingConfig};
use librotacast::{Config, CycleOutcome, PublishingPipeline, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "rota-send")]
#[command(version)]
#[command(about = "Publish one item per interval from a rotating set of accounts")]
#[command(long_about = "\
rota-send - Publishing daemon

DESCRIPTION:
    rota-send fetches candidate posts from the configured source, picks the
    account that owns the current minute of the hour, skips anything that
    account has already published and publishes one item, optionally with
    an image drawn in fair rotation.

    History and media usage are kept in JSON files that are rewritten
    atomically after every change. Run a single instance per state
    directory.

USAGE:
    # Run in foreground (logs to stderr)
    rota-send

    # One cycle, then exit (cron friendly)
    rota-send --once

    # Override the configured interval
    rota-send --interval 15m

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current cycle)

CONFIGURATION:
    Configuration file: ~/.config/rotacast/config.toml
    Override with --config or ROTACAST_CONFIG.

EXIT CODES:
    0 - Clean shutdown, or --once cycle without failure
    1 - Runtime error, or --once cycle that failed to publish or persist
    2 - Configuration or authentication error
    3 - Invalid input
")]
struct Cli {
    /// Configuration file (default: ~/.config/rotacast/config.toml)
    #[arg(short, long, value_name = "PATH", env = "ROTACAST_CONFIG")]
    config: Option<PathBuf>,

    /// Time between cycles, e.g. "30m" (overrides config)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT", env = "ROTACAST_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.verbose = cli.verbose;
    logging.init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    info!("rota-send daemon starting");

    let mut pipeline = PublishingPipeline::from_config(&config)?;
    let interval = cli.interval.unwrap_or(config.schedule.interval);
    info!("Interval: {}", humantime::format_duration(interval));

    if cli.once {
        let outcome = pipeline.run_cycle().await;
        info!(outcome = outcome.label(), "rota-send: ran one cycle, exiting");
        return Ok(once_exit_code(&outcome));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    run_daemon_loop(&mut pipeline, interval, shutdown).await;

    info!("rota-send daemon stopped");
    Ok(0)
}

fn once_exit_code(outcome: &CycleOutcome) -> i32 {
    match outcome {
        CycleOutcome::PublishFailed { .. } | CycleOutcome::StorageFailed { .. } => 1,
        _ => 0,
    }
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        librotacast::RotacastError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping after the current cycle");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    warn!("Graceful shutdown on signals is only supported on Unix");
    Ok(())
}

async fn run_daemon_loop(
    pipeline: &mut PublishingPipeline,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        match pipeline.run_cycle().await {
            CycleOutcome::PublishFailed { account, error, .. } => {
                warn!(account = %account, error = %error, "Cycle ended without publishing")
            }
            CycleOutcome::StorageFailed { account, error, .. } => {
                error!(account = %account, error = %error, "Cycle could not persist state")
            }
            _ => {}
        }

        // Sleep in one-second slices so shutdown is noticed promptly
        let mut remaining = interval;
        while !remaining.is_zero() {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let step = remaining.min(Duration::from_secs(1));
            sleep(step).await;
            remaining -= step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use librotacast::error::PublishError;
    use librotacast::AccountId;

    #[test]
    fn test_cli_parses_interval() {
        let cli = Cli::try_parse_from(["rota-send", "--once", "--interval", "15m"]).unwrap();
        assert!(cli.once);
        assert_eq!(cli.interval, Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_cli_rejects_bad_interval() {
        assert!(Cli::try_parse_from(["rota-send", "--interval", "whenever"]).is_err());
    }

    #[test]
    fn test_cli_log_format() {
        let cli = Cli::try_parse_from(["rota-send", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(Cli::try_parse_from(["rota-send", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn test_once_exit_code() {
        assert_eq!(once_exit_code(&CycleOutcome::NoContent), 0);
        assert_eq!(
            once_exit_code(&CycleOutcome::NothingEligible {
                account: AccountId::new("a")
            }),
            0
        );
        assert_eq!(
            once_exit_code(&CycleOutcome::PublishFailed {
                account: AccountId::new("a"),
                content_id: "1".to_string(),
                error: PublishError::Network("reset".to_string()),
            }),
            1
        );
    }
}
