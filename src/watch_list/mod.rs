//! Watch-list service data structures and traits.
//!
//! This module provides structures to represent shows and their unseen
//! episodes as reported by a watch-list service, as well as the trait the
//! download engine uses to query and update that service.
mod betaseries;
mod betaseries_types;
mod cached;

pub use betaseries::{BetaSeriesClient, BetaSeriesCredentials};
pub use cached::CachedWatchList;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while talking to the watch-list service.
#[derive(Debug, Error)]
pub enum WatchListError {
    /// Request to the watch-list service failed
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Failed to parse the service's JSON response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The service rejected the request
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// The requested show does not exist
    #[error("Show not found: {0}")]
    ShowNotFound(ShowId),
}

/// Identifier of a show on the watch-list service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShowId(pub u64);

impl fmt::Display for ShowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of an episode on the watch-list service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpisodeId(pub u64);

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowStatus {
    /// No more episodes will air
    Ended,
    /// New episodes are still being produced
    Continuing,
    /// Any status the service reports that we do not act upon
    Other(String),
}

impl From<&str> for ShowStatus {
    fn from(status: &str) -> Self {
        match status {
            "Ended" => ShowStatus::Ended,
            "Continuing" => ShowStatus::Continuing,
            other => ShowStatus::Other(other.to_string()),
        }
    }
}

/// A single episode entry of the watch list.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub id: EpisodeId,
    /// The show this episode belongs to
    pub show_id: ShowId,
    /// Title of the show as the watch list displays it
    pub show_title: String,
    /// The season number this episode belongs to
    pub season: u32,
    /// The episode number within the season
    pub number: u32,
    /// First air date, if known
    pub air_date: Option<NaiveDate>,
    /// Specials do not follow the canonical season numbering
    pub special: bool,
    /// Whether the watch list already knows this episode as downloaded
    pub downloaded: bool,
}

impl Episode {
    /// `S01E02` style code used in logs
    pub fn code(&self) -> String {
        format!("S{:02}E{:02}", self.season, self.number)
    }
}

/// Detailed information about a show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: ShowId,
    /// Canonical title
    pub title: String,
    pub status: ShowStatus,
    /// Number of seasons, as a display string
    pub seasons: String,
    /// Alternate titles, in the order the service lists them
    pub aliases: Vec<String>,
}

/// A show with the episodes the user has not seen yet
#[derive(Debug, Clone, PartialEq)]
pub struct UnseenShow {
    pub id: ShowId,
    pub title: String,
    /// Unseen episodes, in watch-list order
    pub episodes: Vec<Episode>,
}

/// Trait for watch-list services that track which episodes a user has seen
/// and downloaded.
///
/// All calls are synchronous; timeouts are the implementor's responsibility.
pub trait WatchList {
    /// Lists every show with at least one unseen episode.
    fn list_unseen_episodes(&self) -> Result<Vec<UnseenShow>, WatchListError>;

    /// Fetches status, season count and aliases of a show.
    fn get_show_detail(&self, show_id: ShowId) -> Result<Show, WatchListError>;

    /// Lists the episodes of one season of a show.
    ///
    /// Season `0` lists every episode of the show.
    fn list_episodes_of_season(
        &self,
        show_id: ShowId,
        season: u32,
    ) -> Result<Vec<Episode>, WatchListError>;

    /// Marks an episode as downloaded.
    fn acknowledge_downloaded(&self, episode_id: EpisodeId) -> Result<(), WatchListError>;
}

impl<W> WatchList for Box<W>
where
    W: WatchList + ?Sized,
{
    fn list_unseen_episodes(&self) -> Result<Vec<UnseenShow>, WatchListError> {
        (**self).list_unseen_episodes()
    }

    fn get_show_detail(&self, show_id: ShowId) -> Result<Show, WatchListError> {
        (**self).get_show_detail(show_id)
    }

    fn list_episodes_of_season(
        &self,
        show_id: ShowId,
        season: u32,
    ) -> Result<Vec<Episode>, WatchListError> {
        (**self).list_episodes_of_season(show_id, season)
    }

    fn acknowledge_downloaded(&self, episode_id: EpisodeId) -> Result<(), WatchListError> {
        (**self).acknowledge_downloaded(episode_id)
    }
}
