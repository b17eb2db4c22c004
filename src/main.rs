#![warn(clippy::all)]

// main entry point
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use rmz::commands::{load_script, run_replay, start_relay, stop_relay, wait_for_idle, RelayState};
use rmz::network::classify::AcceptAllAssociator;
use rmz::settings::{load_settings, RelaySettings};
use rmz::utils::log_statistics;
use rmz::{Result, RmzError};

/// Longest wait for the consumer to catch up after the script has run
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Replays scripted stream events through the interception core and writes
/// the relayed records to a file or stdout.
#[derive(Parser, Debug)]
#[command(name = "rmz", version, about)]
struct Cli {
    /// TOML settings file; replaces the relay flags below when given
    #[arg(long)]
    config: Option<PathBuf>,

    /// TOML script of events to replay
    #[arg(long)]
    script: PathBuf,

    /// File to write records to (defaults to stdout)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,

    #[command(flatten)]
    settings: RelaySettings,
}

/// Initialize the application logger
///
/// Logs go to stderr so stdout stays free for records. `RUST_LOG` overrides
/// the level given on the command line.
fn init_logger(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}: {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn open_sink(output: Option<&PathBuf>) -> Result<Box<dyn Write + Send>> {
    match output {
        Some(path) => {
            info!("Writing records to {}", path.display());
            Ok(Box::new(BufWriter::new(File::create(path)?)))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => cli.settings.clone(),
    };
    let script = load_script(&cli.script)?;

    let state = RelayState::new(settings, Arc::new(AcceptAllAssociator));

    let interceptor = Arc::clone(&state.interceptor);
    ctrlc::set_handler(move || {
        info!("Received Ctrl-C, shutting down");
        interceptor.shutdown();
    })
    .map_err(|e| RmzError::InvalidState(format!("Failed to set Ctrl-C handler: {}", e)))?;

    start_relay(&state, open_sink(cli.output.as_ref())?)?;

    let replay = run_replay(&state, &script);
    if replay.is_ok() && !wait_for_idle(&state, IDLE_TIMEOUT) {
        warn!("Consumer did not deliver every queued packet before shutdown");
    }

    let stop = stop_relay(&state);
    let replay = replay?;
    let stop = stop?;

    log_statistics(&state.interceptor.statistics().snapshot(), 0);
    info!(
        "Done: {} events replayed, {} records written, {} packets discarded",
        replay.events, stop.delivered, stop.unload.packets_drained
    );
    Ok(())
}

/// Main entry point for rmz
fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = cli.log_level.parse().unwrap_or_else(|_| {
        eprintln!("Unknown log level '{}', using info", cli.log_level);
        LevelFilter::Info
    });
    init_logger(level);

    info!("rmz starting up");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
