//! In-memory collaborators for unit tests

use crate::orchestrator::Granularity;
use crate::temp::write_temp_file;
use crate::torrent_index::{DownloadedTorrent, SearchRequest, TorrentIndex, TorrentIndexError};
use crate::watch_list::{
    Episode, EpisodeId, Show, ShowId, ShowStatus, UnseenShow, WatchList, WatchListError,
};
use chrono::NaiveDate;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

pub(crate) fn show(id: u64, title: &str, status: ShowStatus) -> Show {
    Show {
        id: ShowId(id),
        title: title.to_string(),
        status,
        seasons: "1".to_string(),
        aliases: Vec::new(),
    }
}

pub(crate) fn episode(id: u64, show: &Show, season: u32, number: u32) -> Episode {
    Episode {
        id: EpisodeId(id),
        show_id: show.id,
        show_title: show.title.clone(),
        season,
        number,
        air_date: None,
        special: false,
        downloaded: false,
    }
}

/// Watch list backed by maps, recording every mutation
#[derive(Default)]
pub(crate) struct FakeWatchList {
    unseen: Vec<UnseenShow>,
    shows: HashMap<ShowId, Show>,
    seasons: HashMap<(ShowId, u32), Vec<Episode>>,
    failing_acknowledgements: HashSet<EpisodeId>,
    unseen_fails: bool,
    forgets_acknowledgements: bool,
    acknowledged: RefCell<Vec<EpisodeId>>,
    season_listings: RefCell<Vec<(ShowId, u32)>>,
    unseen_calls: Cell<usize>,
    show_detail_calls: Cell<usize>,
}

impl FakeWatchList {
    pub fn add_show(&mut self, show: Show) {
        self.shows.insert(show.id, show);
    }

    /// Registers a show along with its unseen episodes
    pub fn add_unseen(&mut self, show: Show, episodes: Vec<Episode>) {
        self.unseen.push(UnseenShow {
            id: show.id,
            title: show.title.clone(),
            episodes,
        });
        self.add_show(show);
    }

    /// Registers unseen episodes of a show whose detail lookup fails
    pub fn add_unseen_without_detail(&mut self, show: &Show, episodes: Vec<Episode>) {
        self.unseen.push(UnseenShow {
            id: show.id,
            title: show.title.clone(),
            episodes,
        });
    }

    /// Makes listing unseen episodes fail
    pub fn fail_unseen(&mut self) {
        self.unseen_fails = true;
    }

    /// Accepts acknowledgements without ever reflecting them in listings
    pub fn forget_acknowledgements(&mut self) {
        self.forgets_acknowledgements = true;
    }

    pub fn add_season(&mut self, show_id: ShowId, season: u32, episodes: Vec<Episode>) {
        self.seasons.insert((show_id, season), episodes);
    }

    pub fn fail_acknowledge_of(&mut self, episode_id: EpisodeId) {
        self.failing_acknowledgements.insert(episode_id);
    }

    /// Successfully acknowledged episodes, in call order
    pub fn acknowledged(&self) -> Vec<EpisodeId> {
        self.acknowledged.borrow().clone()
    }

    pub fn season_listings(&self) -> Vec<(ShowId, u32)> {
        self.season_listings.borrow().clone()
    }

    pub fn unseen_calls(&self) -> usize {
        self.unseen_calls.get()
    }

    /// Number of detail lookups, failed ones included
    pub fn show_detail_calls(&self) -> usize {
        self.show_detail_calls.get()
    }
}

impl WatchList for FakeWatchList {
    fn list_unseen_episodes(&self) -> Result<Vec<UnseenShow>, WatchListError> {
        self.unseen_calls.set(self.unseen_calls.get() + 1);
        if self.unseen_fails {
            return Err(WatchListError::RequestError("connection refused".to_string()));
        }

        // Acknowledged episodes come back flagged, like the real service does
        let acknowledged = if self.forgets_acknowledgements {
            Vec::new()
        } else {
            self.acknowledged.borrow().clone()
        };
        Ok(self
            .unseen
            .iter()
            .cloned()
            .map(|mut unseen| {
                for episode in &mut unseen.episodes {
                    episode.downloaded |= acknowledged.contains(&episode.id);
                }
                unseen
            })
            .collect())
    }

    fn get_show_detail(&self, show_id: ShowId) -> Result<Show, WatchListError> {
        self.show_detail_calls.set(self.show_detail_calls.get() + 1);
        self.shows
            .get(&show_id)
            .cloned()
            .ok_or(WatchListError::ShowNotFound(show_id))
    }

    fn list_episodes_of_season(
        &self,
        show_id: ShowId,
        season: u32,
    ) -> Result<Vec<Episode>, WatchListError> {
        self.season_listings.borrow_mut().push((show_id, season));
        Ok(self
            .seasons
            .get(&(show_id, season))
            .cloned()
            .unwrap_or_default())
    }

    fn acknowledge_downloaded(&self, episode_id: EpisodeId) -> Result<(), WatchListError> {
        if self.failing_acknowledgements.contains(&episode_id) {
            return Err(WatchListError::Api {
                code: 4001,
                message: "episode not found".to_string(),
            });
        }
        self.acknowledged.borrow_mut().push(episode_id);
        Ok(())
    }
}

/// A search as the fake index received it
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Search {
    pub title: String,
    pub season: u32,
    pub episode: u32,
    pub quality: String,
    pub date: Option<NaiveDate>,
    pub verified_only: bool,
}

impl Search {
    pub fn granularity(&self) -> Granularity {
        match (self.season, self.episode) {
            (0, 0) => Granularity::Series,
            (_, 0) => Granularity::Season,
            _ => Granularity::Episode,
        }
    }
}

type ReleaseKey = (String, u32, u32, String);

/// Torrent index answering from a fixed set of releases
#[derive(Default)]
pub(crate) struct FakeTorrentIndex {
    verified_only: bool,
    releases: HashSet<ReleaseKey>,
    failures: HashSet<ReleaseKey>,
    searches: RefCell<Vec<Search>>,
}

impl FakeTorrentIndex {
    /// Makes a release available for the given search parameters
    pub fn with_release(mut self, title: &str, season: u32, episode: u32, quality: &str) -> Self {
        self.releases
            .insert((title.to_string(), season, episode, quality.to_string()));
        self
    }

    /// Makes the given search fail with a transport error
    pub fn with_failure(mut self, title: &str, season: u32, episode: u32, quality: &str) -> Self {
        self.failures
            .insert((title.to_string(), season, episode, quality.to_string()));
        self
    }

    pub fn searches(&self) -> Vec<Search> {
        self.searches.borrow().clone()
    }
}

impl TorrentIndex for FakeTorrentIndex {
    fn set_verified_only(&mut self, verified_only: bool) {
        self.verified_only = verified_only;
    }

    fn search_and_download(
        &self,
        request: &SearchRequest<'_>,
    ) -> Result<DownloadedTorrent, TorrentIndexError> {
        self.searches.borrow_mut().push(Search {
            title: request.title.to_string(),
            season: request.season,
            episode: request.episode,
            quality: request.quality.to_string(),
            date: request.date,
            verified_only: self.verified_only,
        });

        let key = (
            request.title.to_string(),
            request.season,
            request.episode,
            request.quality.to_string(),
        );
        if self.failures.contains(&key) {
            return Err(TorrentIndexError::RequestError("timed out".to_string()));
        }
        if !self.releases.contains(&key) {
            return Err(TorrentIndexError::NotFound);
        }

        let file = write_temp_file("fake", "torrent", b"d4:infod4:name4:fakeee")?;
        let name = format!(
            "{} S{:02}E{:02} {}.torrent",
            request.title,
            request.season,
            request.episode,
            if request.quality.is_empty() { "NQ" } else { "Q" }
        );
        Ok(DownloadedTorrent::new(file, name))
    }
}
