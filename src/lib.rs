//! torrents-bot - Automatically fetch torrents for unseen episodes
//!
//! This library polls a watch-list service for episodes the user has not seen
//! yet, searches a torrent index for each of them (preferring complete
//! seasons or series, then the best quality available) and drops the torrent
//! files into a directory watched by a torrent client.

mod alias_resolver;
mod cache;
pub mod config;
mod file_operations;
mod lenient;
pub mod orchestrator;
pub mod poll_loop;
pub mod quality;
mod temp;
pub mod torrent_index;
pub mod watch_list;

#[cfg(test)]
mod test_support;

use config::Config;
use orchestrator::Orchestrator;
use poll_loop::PollLoop;
use quality::QualityLadder;
use torrent_index::T411Client;
use tracing::info;
use watch_list::{BetaSeriesClient, CachedWatchList, WatchList};

// Re-export error types
pub use cache::CacheError;
pub use config::ConfigError;
pub use file_operations::FileOperationError;
pub use orchestrator::FetchError;
pub use torrent_index::TorrentIndexError;
pub use watch_list::WatchListError;

pub use alias_resolver::{clean_title, derive_aliases};
pub use file_operations::{Relocator, ensure_destination, sanitize_filename};

use thiserror::Error;

/// Top-level error type for torrents-bot operations
#[derive(Debug, Error)]
pub enum TorrentsBotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Watch list error: {0}")]
    WatchList(#[from] WatchListError),

    #[error("Torrent index error: {0}")]
    TorrentIndex(#[from] TorrentIndexError),

    #[error("File operation error: {0}")]
    FileOperation(#[from] FileOperationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// The poll loop as wired by [`assemble`]
pub type Bot = PollLoop<Box<dyn WatchList>, T411Client>;

/// Connects both services and builds the poll loop described by `config`
///
/// Creates the destination directory, authenticates against BetaSeries and
/// T411, and wraps the watch list with the show cache unless it is disabled.
///
/// # Errors
///
/// Any failure here is a startup failure: incomplete credentials, an
/// unusable destination directory, or a service rejecting the login.
///
/// # Examples
///
/// ```no_run
/// use torrents_bot::assemble;
/// use torrents_bot::config::Config;
///
/// let config = Config::load(None).unwrap();
/// let mut bot = assemble(&config).unwrap();
/// bot.run(config.run_mode().unwrap());
/// ```
pub fn assemble(config: &Config) -> Result<Bot, TorrentsBotError> {
    config.validate()?;

    let destination = ensure_destination(&config.torrents_path)?;
    info!(path = %destination.display(), "torrent files go to destination directory");

    let betaseries = BetaSeriesClient::connect(
        &config.betaseries.base_url,
        &config.betaseries_credentials()?,
    )?;
    let watch_list: Box<dyn WatchList> = match config.show_cache_ttl()? {
        Some(ttl) => Box::new(CachedWatchList::open(betaseries, ttl)?),
        None => Box::new(betaseries),
    };

    let t411 = T411Client::connect(
        &config.t411.base_url,
        &config.t411_credentials()?,
        config.t411.search_limit,
    )?;

    let relocator = Relocator::new(destination, config.file_extension.clone());
    let orchestrator = Orchestrator::new(watch_list, t411, relocator)
        .with_ladder(QualityLadder::default())
        .with_language(config.language.clone());

    Ok(PollLoop::new(orchestrator))
}
