//! Download decision engine
//!
//! For one unseen episode, this module decides what to search for (the whole
//! series, a season, or the single episode), under which title variants and at
//! which quality tier, and runs the resulting fetch attempts until one
//! succeeds.
//!
//! The search space is composed from three independent pieces:
//!
//! * the quality ladder, swept in order by [`Orchestrator::sweep`],
//! * the title variants (canonical title, known aliases, derived aliases),
//!   swept by [`Orchestrator::sweep_titles`],
//! * the granularity policy in [`Orchestrator::process_episode`].
//!
//! Only [`TorrentIndexError::NotFound`] is structurally meaningful: it moves the
//! search on. Every other failure is logged at the attempt boundary and handled
//! like a miss, so a collaborator hiccup never aborts the poll cycle.

use crate::alias_resolver::derive_aliases;
use crate::file_operations::{FileOperationError, Relocator};
use crate::quality::{QualityLadder, QualityTier};
use crate::torrent_index::{SearchRequest, TorrentIndex, TorrentIndexError};
use crate::watch_list::{Episode, EpisodeId, Show, ShowStatus, WatchList};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Release language searched for unless configured otherwise
pub const DEFAULT_LANGUAGE: &str = "VOSTFR";

/// Scope of a single search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// Every season of the show in one release
    Series,
    /// One complete season
    Season,
    /// A single episode
    Episode,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Granularity::Series => "series",
            Granularity::Season => "season",
            Granularity::Episode => "episode",
        })
    }
}

/// Errors that end a fetch attempt without a result
#[derive(Debug, Error)]
pub enum FetchError {
    /// The torrent index failed for another reason than a missing release
    #[error("Torrent index error: {0}")]
    Index(#[from] TorrentIndexError),

    /// The torrent file could not be moved into the destination directory
    #[error("Relocation error: {0}")]
    Relocation(#[from] FileOperationError),
}

/// A torrent file that made it into the destination directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Where the torrent file now lives
    pub path: PathBuf,
    pub granularity: Granularity,
    /// Episodes the watch list accepted as downloaded
    pub acknowledged: Vec<EpisodeId>,
}

/// Result of a fetch attempt, a sweep, or a whole episode decision
#[derive(Debug)]
pub enum FetchOutcome {
    Success(Download),
    /// No release matched
    NotFound,
    /// Any other failure; logged, never fatal
    TransientError(FetchError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

/// Seasons of one show already satisfied at season or series granularity
/// during the current poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet {
    seasons: BTreeSet<u32>,
    /// Set once the complete series was obtained
    whole_series: bool,
}

impl SkipSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, season: u32) -> bool {
        self.whole_series || self.seasons.contains(&season)
    }

    pub fn insert(&mut self, season: u32) {
        self.seasons.insert(season);
    }

    /// Marks every season as satisfied
    pub fn mark_whole_series(&mut self) {
        self.whole_series = true;
    }

    pub fn is_whole_series(&self) -> bool {
        self.whole_series
    }

    pub fn is_empty(&self) -> bool {
        !self.whole_series && self.seasons.is_empty()
    }
}

/// The download decision engine
///
/// Owns both collaborators, the quality ladder and the relocation target.
pub struct Orchestrator<W, T> {
    watch_list: W,
    index: T,
    ladder: QualityLadder,
    relocator: Relocator,
    language: String,
}

impl<W, T> Orchestrator<W, T>
where
    W: WatchList,
    T: TorrentIndex,
{
    /// Creates an orchestrator with the default quality ladder and language
    pub fn new(watch_list: W, index: T, relocator: Relocator) -> Self {
        Self {
            watch_list,
            index,
            ladder: QualityLadder::default(),
            relocator,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn with_ladder(mut self, ladder: QualityLadder) -> Self {
        self.ladder = ladder;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn watch_list(&self) -> &W {
        &self.watch_list
    }

    pub fn index(&self) -> &T {
        &self.index
    }

    /// Obtains one unseen episode, preferring the coarsest sensible granularity
    ///
    /// Season and series releases are only considered for season openers
    /// (episode number 0 or 1, not a special) whose season is not in `skip`
    /// yet, searching verified releases only:
    ///
    /// 1. ended shows try the complete series first,
    /// 2. ended and continuing shows then try the complete season,
    /// 3. everything else falls back to the single episode, any uploader.
    ///
    /// A successful series download marks the whole show in `skip`, a season
    /// download its season. `show` gains derived aliases along the way.
    pub fn process_episode(
        &mut self,
        episode: &Episode,
        show: &mut Show,
        skip: &mut SkipSet,
    ) -> FetchOutcome {
        derive_aliases(show);
        let titles = search_titles(show);

        let opener = !episode.special && episode.number <= 1;
        if opener && !skip.contains(episode.season) {
            if let Some(outcome) = self.try_coarse(episode, show, &titles, skip) {
                return outcome;
            }
        }

        self.index.set_verified_only(false);
        let outcome = self.sweep_titles(&titles, show, episode, Granularity::Episode);
        if !outcome.is_success() {
            info!(show = %show.title, episode = %episode.code(), "no release found");
        }
        outcome
    }

    /// Series then season attempts; `None` when both came up empty
    fn try_coarse(
        &mut self,
        episode: &Episode,
        show: &Show,
        titles: &[String],
        skip: &mut SkipSet,
    ) -> Option<FetchOutcome> {
        let try_series = match show.status {
            ShowStatus::Ended => true,
            ShowStatus::Continuing => false,
            ShowStatus::Other(ref status) => {
                debug!(show = %show.title, status = %status, "no season or series attempt for this status");
                return None;
            }
        };

        self.index.set_verified_only(true);

        if try_series {
            let outcome = self.sweep_titles(titles, show, episode, Granularity::Series);
            if outcome.is_success() {
                skip.mark_whole_series();
                return Some(outcome);
            }
        }

        let outcome = self.sweep_titles(titles, show, episode, Granularity::Season);
        if outcome.is_success() {
            skip.insert(episode.season);
            return Some(outcome);
        }

        None
    }

    /// Sweeps the quality ladder for each title variant in turn
    ///
    /// Stops at the first success; otherwise returns the outcome of the last
    /// variant.
    pub fn sweep_titles(
        &self,
        titles: &[String],
        show: &Show,
        episode: &Episode,
        granularity: Granularity,
    ) -> FetchOutcome {
        let mut outcome = FetchOutcome::NotFound;
        for title in titles {
            outcome = self.sweep(title, show, episode, granularity);
            if outcome.is_success() {
                break;
            }
        }
        outcome
    }

    /// Tries every quality tier in ladder order for one title variant
    ///
    /// Returns the first success, or `NotFound` once the ladder is exhausted.
    /// Errors other than a miss are logged and the next tier is tried.
    pub fn sweep(
        &self,
        title: &str,
        show: &Show,
        episode: &Episode,
        granularity: Granularity,
    ) -> FetchOutcome {
        for tier in self.ladder.tiers() {
            debug!(
                "trying {} {}",
                tier,
                describe(title, show, episode, granularity)
            );
            match self.fetch(title, show, episode, granularity, tier) {
                FetchOutcome::Success(download) => return FetchOutcome::Success(download),
                FetchOutcome::NotFound => {}
                FetchOutcome::TransientError(e) => {
                    warn!(
                        title = %title,
                        granularity = %granularity,
                        quality = %tier,
                        error = %e,
                        "fetch attempt failed"
                    );
                }
            }
        }
        FetchOutcome::NotFound
    }

    /// One search, relocation and acknowledgement round
    ///
    /// Acknowledgements are only sent once the torrent file sits in the
    /// destination directory.
    pub fn fetch(
        &self,
        title: &str,
        show: &Show,
        episode: &Episode,
        granularity: Granularity,
        tier: &QualityTier,
    ) -> FetchOutcome {
        let (season, number, date) = match granularity {
            Granularity::Series => (0, 0, None),
            Granularity::Season => (episode.season, 0, None),
            Granularity::Episode => (episode.season, episode.number, episode.air_date),
        };
        let request = SearchRequest {
            title,
            season,
            episode: number,
            language: &self.language,
            quality: tier.term(),
            date,
        };

        let torrent = match self.index.search_and_download(&request) {
            Ok(torrent) => torrent,
            Err(e) if e.is_not_found() => {
                debug!(title = %title, granularity = %granularity, quality = %tier, "not found");
                return FetchOutcome::NotFound;
            }
            Err(e) => return FetchOutcome::TransientError(e.into()),
        };

        let path = match self.relocator.relocate(&torrent) {
            Ok(path) => path,
            Err(e) => return FetchOutcome::TransientError(e.into()),
        };
        drop(torrent);

        let acknowledged = self.acknowledge(show, episode, granularity);
        info!(
            path = %path.display(),
            "{} downloaded",
            describe(&show.title, show, episode, granularity)
        );

        FetchOutcome::Success(Download {
            path,
            granularity,
            acknowledged,
        })
    }

    /// Marks the episodes covered by a download as downloaded
    ///
    /// Failures are logged per episode and never undo the download. Returns
    /// the episodes the watch list accepted.
    fn acknowledge(&self, show: &Show, episode: &Episode, granularity: Granularity) -> Vec<EpisodeId> {
        let covered = match granularity {
            Granularity::Episode => vec![episode.id],
            Granularity::Season | Granularity::Series => {
                let season = if granularity == Granularity::Series {
                    0
                } else {
                    episode.season
                };
                match self.watch_list.list_episodes_of_season(show.id, season) {
                    Ok(episodes) => episodes.into_iter().map(|e| e.id).collect(),
                    Err(e) => {
                        warn!(show = %show.title, season, error = %e, "failed to list covered episodes");
                        Vec::new()
                    }
                }
            }
        };

        covered
            .into_iter()
            .filter(|id| match self.watch_list.acknowledge_downloaded(*id) {
                Ok(()) => true,
                Err(e) => {
                    warn!(show = %show.title, episode = %id, error = %e, "failed to mark episode as downloaded");
                    false
                }
            })
            .collect()
    }
}

/// Canonical title first, then every alias, without repetitions
fn search_titles(show: &Show) -> Vec<String> {
    let mut titles: Vec<String> = Vec::with_capacity(show.aliases.len() + 1);
    for title in std::iter::once(&show.title).chain(&show.aliases) {
        let title = title.trim();
        if !title.is_empty() && !titles.iter().any(|known| known == title) {
            titles.push(title.to_string());
        }
    }
    titles
}

/// Human readable target of a search, for logs
fn describe(title: &str, show: &Show, episode: &Episode, granularity: Granularity) -> String {
    match granularity {
        Granularity::Series => format!("{} - {} seasons / complete series", title, show.seasons),
        Granularity::Season => format!("{} - season {} complete", title, episode.season),
        Granularity::Episode => format!("{} - {}", title, episode.code()),
    }
}
