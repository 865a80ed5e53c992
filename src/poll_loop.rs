//! Periodic polling of the watch list
//!
//! A cycle walks every show with unseen episodes and hands each episode that
//! still needs a torrent to the [`Orchestrator`]. The loop either runs a
//! single cycle or keeps running cycles on a fixed schedule.

use crate::orchestrator::{FetchOutcome, Orchestrator, SkipSet};
use crate::torrent_index::TorrentIndex;
use crate::watch_list::{EpisodeId, Show, UnseenShow, WatchList, WatchListError};
use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How often cycles run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One cycle, then return
    SingleShot,
    /// A cycle right away, then one per period until the process is stopped
    Interval(Duration),
}

/// When the cycle after the one started at `prev` should start
///
/// Stays on the fixed schedule while cycles fit in their period. Once a cycle
/// overruns, the missed ticks are dropped and the next cycle starts at `now`.
fn next_deadline(prev: Instant, now: Instant, period: Duration) -> Instant {
    match prev.checked_add(period) {
        Some(next) if next > now => next,
        _ => now,
    }
}

/// Counters reported at the end of a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Shows with unseen episodes
    pub shows: usize,
    /// Episodes handed to the orchestrator
    pub attempted: usize,
    /// Attempts that produced a torrent file
    pub obtained: usize,
}

/// Drives poll cycles and remembers acknowledgements across them
pub struct PollLoop<W, T> {
    orchestrator: Orchestrator<W, T>,
    /// Episodes acknowledged by this process
    ///
    /// Guards against re-downloading when the watch list accepted an
    /// acknowledgement but keeps listing the episode as not downloaded.
    acknowledged: HashSet<EpisodeId>,
}

impl<W, T> PollLoop<W, T>
where
    W: WatchList,
    T: TorrentIndex,
{
    pub fn new(orchestrator: Orchestrator<W, T>) -> Self {
        Self {
            orchestrator,
            acknowledged: HashSet::new(),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator<W, T> {
        &self.orchestrator
    }

    /// Whether this process already acknowledged an episode
    pub fn is_acknowledged(&self, episode_id: EpisodeId) -> bool {
        self.acknowledged.contains(&episode_id)
    }

    /// Runs cycles according to `mode`
    ///
    /// In interval mode this only returns if the process is stopped. A cycle
    /// that outlasts the period delays the next one instead of overlapping it.
    pub fn run(&mut self, mode: RunMode) {
        match mode {
            RunMode::SingleShot => self.run_logged(),
            RunMode::Interval(period) => {
                let mut deadline = Instant::now();
                loop {
                    self.run_logged();

                    let now = Instant::now();
                    deadline = next_deadline(deadline, now, period);
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else {
                        debug!("cycle overran its period, missed ticks skipped");
                    }
                }
            }
        }
    }

    fn run_logged(&mut self) {
        match self.run_cycle() {
            Ok(summary) => info!(
                shows = summary.shows,
                attempted = summary.attempted,
                obtained = summary.obtained,
                "poll cycle finished"
            ),
            Err(e) => error!(error = %e, "failed to fetch unseen episodes"),
        }
    }

    /// Runs one poll cycle
    ///
    /// # Errors
    ///
    /// Only a failure to list unseen episodes ends the cycle; every failure
    /// further down is logged and confined to its show or episode.
    pub fn run_cycle(&mut self) -> Result<CycleSummary, WatchListError> {
        let shows = self.orchestrator.watch_list().list_unseen_episodes()?;
        info!("checking for episodes to download in {} shows", shows.len());

        let mut summary = CycleSummary {
            shows: shows.len(),
            ..CycleSummary::default()
        };
        for unseen in &shows {
            self.process_show(unseen, &mut summary);
        }

        Ok(summary)
    }

    fn process_show(&mut self, unseen: &UnseenShow, summary: &mut CycleSummary) {
        let mut skip = SkipSet::new();
        // Looked up on the first episode that needs it
        let mut detail: Option<Show> = None;

        for episode in &unseen.episodes {
            if episode.downloaded || skip.contains(episode.season) || self.is_acknowledged(episode.id) {
                debug!(show = %unseen.title, episode = %episode.code(), "skipped");
                continue;
            }

            if detail.is_none() {
                match self.orchestrator.watch_list().get_show_detail(unseen.id) {
                    Ok(show) => detail = Some(show),
                    Err(e) => {
                        warn!(show = %unseen.title, error = %e, "failed to fetch show detail, skipping show");
                        return;
                    }
                }
            }
            let Some(show) = detail.as_mut() else {
                return;
            };

            summary.attempted += 1;
            if let FetchOutcome::Success(download) =
                self.orchestrator.process_episode(episode, show, &mut skip)
            {
                summary.obtained += 1;
                self.acknowledged.extend(download.acknowledged);
            }
        }
    }
}
