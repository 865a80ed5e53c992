//! Torrent index searching
//!
//! This module defines how the download engine talks to a torrent index: a
//! term based search that directly yields the `.torrent` file of the best
//! matching release.

mod t411;
mod t411_types;

pub use t411::{T411Client, T411Credentials};

use crate::temp::TempGuard;
use chrono::NaiveDate;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while searching or downloading from a torrent index
#[derive(Debug, Error)]
pub enum TorrentIndexError {
    /// No release matches the search
    ///
    /// This is the only error that lets the download engine move on to the
    /// next quality tier or title alias.
    #[error("No matching torrent found")]
    NotFound,

    /// Request to the torrent index failed
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Failed to parse the index's response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The index rejected the request
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    /// A search term name does not exist on the index
    #[error("Unknown {kind} term: {name}")]
    UnknownTerm { kind: &'static str, name: String },

    /// Failed to store the downloaded torrent file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TorrentIndexError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TorrentIndexError::NotFound)
    }
}

/// Parameters of a single search on the torrent index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRequest<'a> {
    /// Show title variant to search for
    pub title: &'a str,
    /// Season number, `0` for the complete series
    pub season: u32,
    /// Episode number, `0` for a complete season (or series)
    pub episode: u32,
    /// Release language term, e.g. `VOSTFR`
    pub language: &'a str,
    /// Quality term, empty for no quality filter
    pub quality: &'a str,
    /// Air date of the episode; releases added before it are ignored
    pub date: Option<NaiveDate>,
}

/// A `.torrent` file retrieved from an index, still in temporary storage
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct DownloadedTorrent {
    file: TempGuard,
    /// File name the torrent should get in the destination directory
    name: String,
}

impl DownloadedTorrent {
    pub(crate) fn new(file: TempGuard, name: impl Into<String>) -> Self {
        Self {
            file,
            name: name.into(),
        }
    }

    /// Location of the temporary file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Base name for the relocated file
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Trait for torrent indexes that can be searched by terms.
pub trait TorrentIndex {
    /// Restricts subsequent searches to releases verified by the index staff.
    fn set_verified_only(&mut self, verified_only: bool);

    /// Searches for the best release matching `request` and downloads its
    /// torrent file.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentIndexError::NotFound`] when no release matches, any
    /// other variant for transport, API or storage failures.
    fn search_and_download(
        &self,
        request: &SearchRequest<'_>,
    ) -> Result<DownloadedTorrent, TorrentIndexError>;
}
