//! Cached watch-list implementation
//!
//! Show details (status, season count, aliases) change rarely, yet the poll
//! loop needs them for every show with unseen episodes on every cycle. This
//! wrapper keeps them in the on-disk cache; all other calls go straight to
//! the wrapped service.

use super::{Episode, EpisodeId, Show, ShowId, UnseenShow, WatchList, WatchListError};
use crate::cache::{CacheError, CacheStorage};
use std::time::Duration;
use tracing::{debug, warn};

/// A caching wrapper for watch-list services
pub struct CachedWatchList<W>
where
    W: WatchList,
{
    /// The underlying watch-list service
    inner: W,
    /// Cache storage for show details
    cache: CacheStorage<Show>,
}

impl<W> CachedWatchList<W>
where
    W: WatchList,
{
    /// Creates a new cached watch list wrapping the given service
    pub(crate) fn new(inner: W, cache: CacheStorage<Show>) -> Self {
        Self { inner, cache }
    }

    /// Wraps `inner` with the application's show cache, expiring entries after `ttl`
    pub fn open(inner: W, ttl: Duration) -> Result<Self, CacheError> {
        let cache = CacheStorage::open("shows", Some(ttl))?;
        Ok(Self::new(inner, cache))
    }

    fn cache_key(show_id: ShowId) -> String {
        format!("show-{}", show_id)
    }
}

impl<W> WatchList for CachedWatchList<W>
where
    W: WatchList,
{
    fn list_unseen_episodes(&self) -> Result<Vec<UnseenShow>, WatchListError> {
        self.inner.list_unseen_episodes()
    }

    fn get_show_detail(&self, show_id: ShowId) -> Result<Show, WatchListError> {
        let cache_key = Self::cache_key(show_id);

        match self.cache.load(&cache_key) {
            Ok(Some(show)) => {
                debug!(show = %show.title, "show detail served from cache");
                return Ok(show);
            }
            Ok(None) => {}
            // A broken cache must never prevent fetching
            Err(e) => warn!(error = %e, "ignoring unreadable show cache entry"),
        }

        let show = self.inner.get_show_detail(show_id)?;

        if let Err(e) = self.cache.store(&cache_key, &show) {
            warn!(error = %e, "failed to cache show detail");
        }

        Ok(show)
    }

    fn list_episodes_of_season(
        &self,
        show_id: ShowId,
        season: u32,
    ) -> Result<Vec<Episode>, WatchListError> {
        self.inner.list_episodes_of_season(show_id, season)
    }

    fn acknowledge_downloaded(&self, episode_id: EpisodeId) -> Result<(), WatchListError> {
        self.inner.acknowledge_downloaded(episode_id)
    }
}
