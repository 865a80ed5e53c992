use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use torrents_bot::assemble;
use torrents_bot::config::{self, Config, ConfigOverrides};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Fetches torrents for the unseen episodes of your BetaSeries watch list
#[derive(Debug, Parser)]
#[command(name = "torrents-bot", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to config.toml in the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory the torrent files are written to
    #[arg(long, value_name = "DIR")]
    torrents_path: Option<PathBuf>,

    /// Minutes between two polls of the watch list
    #[arg(long, value_name = "MINUTES")]
    freq: Option<u64>,

    /// Poll once and exit
    #[arg(long)]
    single: bool,

    /// Log every search attempt
    #[arg(long)]
    debug: bool,

    /// Directory for the daily log files (defaults to the platform data directory)
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// BetaSeries API key
    #[arg(long)]
    bs_key: Option<String>,

    /// BetaSeries login
    #[arg(long)]
    bs_username: Option<String>,

    /// MD5 hex digest of the BetaSeries password
    #[arg(long)]
    bs_password_md5: Option<String>,

    /// T411 username
    #[arg(long)]
    t411_username: Option<String>,

    /// T411 password
    #[arg(long)]
    t411_password: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            torrents_path: self.torrents_path.clone(),
            interval_minutes: self.freq,
            single_shot: self.single,
            debug: self.debug,
            bs_key: self.bs_key.clone(),
            bs_username: self.bs_username.clone(),
            bs_password_md5: self.bs_password_md5.clone(),
            t411_username: self.t411_username.clone(),
            t411_password: self.t411_password.clone(),
        }
    }
}

/// Logs to stderr and to a daily rotated file in `log_dir`
///
/// The returned guard flushes the file writer when dropped.
fn setup_logging(log_dir: &Path, debug: bool) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "torrents-bot.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("torrents_bot={}", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Ok(guard)
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    config.apply(cli.overrides());

    let log_dir = match cli.log_dir.clone().map(Ok).unwrap_or_else(config::data_dir) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let _guard = match setup_logging(&log_dir, config.debug) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: Could not set up logging in {}: {}", log_dir.display(), e);
            process::exit(1);
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "starting torrents-bot");
    info!(config = ?config.masked(), "configuration loaded");

    let started = assemble(&config).and_then(|bot| Ok((bot, config.run_mode()?)));
    let (mut bot, mode) = match started {
        Ok(started) => started,
        Err(e) => {
            error!(error = %e, "startup failed");
            process::exit(1);
        }
    };

    bot.run(mode);
    info!("done");
}
