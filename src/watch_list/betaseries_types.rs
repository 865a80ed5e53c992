/// BetaSeries API response types for deserialization.
///
/// These structures mirror the JSON response format of the BetaSeries API v3.0.
use crate::lenient;
use serde::Deserialize;
use std::collections::BTreeMap;

/// An error entry returned in the `errors` array of any response
#[derive(Debug, Deserialize)]
pub(super) struct BsError {
    pub code: i64,
    #[serde(default)]
    pub text: String,
}

/// Any response, looked at only for its `errors` array
#[derive(Debug, Deserialize)]
pub(super) struct BsErrorEnvelope {
    #[serde(default)]
    pub errors: Vec<BsError>,
}

/// Response of `POST /members/auth`
#[derive(Debug, Deserialize)]
pub(super) struct BsAuthResponse {
    pub token: String,
}

/// Response of `GET /episodes/list`
#[derive(Debug, Deserialize)]
pub(super) struct BsEpisodesList {
    #[serde(default)]
    pub shows: Vec<BsUnseenShow>,
}

/// A show entry of the unseen episodes list
#[derive(Debug, Deserialize)]
pub(super) struct BsUnseenShow {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub unseen: Vec<BsEpisode>,
}

/// Response of `GET /shows/episodes`
#[derive(Debug, Deserialize)]
pub(super) struct BsShowEpisodes {
    #[serde(default)]
    pub episodes: Vec<BsEpisode>,
}

/// A single episode as returned by the API
#[derive(Debug, Deserialize)]
pub(super) struct BsEpisode {
    pub id: u64,
    pub season: u32,
    pub episode: u32,
    pub show: BsShowRef,
    /// Air date as `YYYY-MM-DD`, `0000-00-00` when unknown
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub special: bool,
    #[serde(default)]
    pub user: BsEpisodeUser,
}

/// Reference to the parent show embedded in an episode
#[derive(Debug, Deserialize)]
pub(super) struct BsShowRef {
    pub id: u64,
    pub title: String,
}

/// Per-member state of an episode
#[derive(Debug, Default, Deserialize)]
pub(super) struct BsEpisodeUser {
    #[serde(default, deserialize_with = "lenient::flag")]
    pub downloaded: bool,
}

/// Response of `GET /shows/display`
#[derive(Debug, Deserialize)]
pub(super) struct BsShowDisplay {
    pub show: Option<BsShow>,
}

/// Show details
#[derive(Debug, Deserialize)]
pub(super) struct BsShow {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub seasons: String,
    #[serde(default)]
    pub aliases: BsAliases,
}

/// Aliases come either as a JSON object keyed by alias id or as an array
/// (the empty case is always an array)
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum BsAliases {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl Default for BsAliases {
    fn default() -> Self {
        BsAliases::List(Vec::new())
    }
}

impl BsAliases {
    /// Flattens the aliases, ordering the object form by numeric alias id
    pub fn into_vec(self) -> Vec<String> {
        match self {
            BsAliases::List(list) => list,
            BsAliases::Map(map) => {
                let mut entries: Vec<(String, String)> = map.into_iter().collect();
                entries.sort_by_key(|(key, _)| key.parse::<u64>().unwrap_or(u64::MAX));
                entries.into_iter().map(|(_, alias)| alias).collect()
            }
        }
    }
}
