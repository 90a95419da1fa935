mod config;
mod csv_writer;
mod error;
mod normalize;
mod pipeline;
mod power_client;
mod request;
#[cfg(test)]
mod test_support;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::Config;
use csv_writer::OutputWriter;
use error::{PowerError, Result};
use power_client::{PowerClient, DEFAULT_REQUEST_DELAY};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "power-fetch", about = "Fetch daily NASA POWER weather data for configured sites into CSV")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "POWER_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Log file, appended to alongside console output
    #[arg(long, global = true, default_value = "nasa_power_fetch.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every configured (site, year) pair and append rows to CSV
    Fetch {
        /// Pause after each API request, in seconds
        #[arg(long, default_value_t = DEFAULT_REQUEST_DELAY.as_secs_f64())]
        delay_secs: f64,
    },

    /// Load the configuration and log a summary of what would be fetched
    Summary,
}

fn run_fetch(config_path: &Path, delay_secs: f64) -> Result<()> {
    let delay = Duration::try_from_secs_f64(delay_secs)
        .map_err(|e| PowerError::config(format!("invalid --delay-secs {delay_secs}: {e}")))?;

    let config = Config::load(config_path)?;
    config.log_summary();

    let client = PowerClient::new(&config.api, delay)?;
    let mut writer = OutputWriter::new(&config.output_directory, config.year_span())?;

    let summary = pipeline::run(&config, &client, &mut writer);
    let combined = writer.combined_path();
    summary.log();
    writer.finish()?;

    info!(combined = %combined.display(), "Data collection complete");
    Ok(())
}

fn run_summary(config_path: &Path) -> Result<()> {
    Config::load(config_path)?.log_summary();
    Ok(())
}

fn init_tracing(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    subscriber(filter, file).init();
    Ok(())
}

/// Console output plus an ANSI-free copy of every event appended to `file`.
fn subscriber(filter: EnvFilter, file: File) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
}

fn main() -> Result<()> {
    match dotenvy::dotenv() {
        Err(e) if !e.not_found() => return Err(e.into()),
        _ => {}
    }

    let cli = Cli::parse();
    init_tracing(&cli.log_file)?;

    let result = match cli.command {
        Command::Fetch { delay_secs } => run_fetch(&cli.config, delay_secs),
        Command::Summary => run_summary(&cli.config),
    };

    if let Err(e) = &result {
        error!(error = %e, "Aborting");
    }
    result
}
