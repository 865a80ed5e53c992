/// T411 torrent index implementation.
use super::t411_types::{
    T411Auth, T411Error, T411SearchEntry, T411SearchResult, T411Terms, T411TermTypes,
    T411TermsTree, T411Torrent,
};
use super::{DownloadedTorrent, SearchRequest, TorrentIndex, TorrentIndexError};
use crate::file_operations::sanitize_filename;
use crate::temp::write_temp_file;
use chrono::{NaiveDate, NaiveDateTime};
use humansize::{DECIMAL, format_size};
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Category id of tv series on T411
const SERIES_CATEGORY: &str = "433";

/// Timeout applied to every request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Term name selecting a complete series
const COMPLETE_SERIES_TERM: &str = "Série intégrale";

/// Term name selecting a complete season
const COMPLETE_SEASON_TERM: &str = "Saison complète";

/// Credentials of a T411 member
#[derive(Debug, Clone)]
pub struct T411Credentials {
    pub username: String,
    pub password: String,
}

/// Search term filter: term type id and term id
#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    type_id: String,
    term_id: String,
}

/// Lookup of tv series term names, built from the terms tree
#[derive(Debug, Default)]
struct TermIndex {
    by_name: HashMap<String, Term>,
}

impl TermIndex {
    fn from_tree(mut tree: T411TermsTree) -> Self {
        let mut by_name = HashMap::new();

        if let Some(T411TermTypes::Map(types)) = tree.remove(SERIES_CATEGORY) {
            for (type_id, term_type) in types {
                let T411Terms::Map(terms) = term_type.terms else {
                    continue;
                };
                debug!(kind = %term_type.kind, count = terms.len(), "loaded T411 terms");
                for (term_id, name) in terms {
                    by_name.insert(
                        name.to_lowercase(),
                        Term {
                            type_id: type_id.clone(),
                            term_id,
                        },
                    );
                }
            }
        }

        Self { by_name }
    }

    fn get(&self, name: &str) -> Option<&Term> {
        self.by_name.get(&name.to_lowercase())
    }

    /// Season term, `0` meaning the complete series
    fn season(&self, season: u32) -> Option<&Term> {
        if season == 0 {
            self.get(COMPLETE_SERIES_TERM)
        } else {
            self.get(&format!("Saison {:02}", season))
        }
    }

    /// Episode term, `0` meaning the complete season
    fn episode(&self, episode: u32) -> Option<&Term> {
        if episode == 0 {
            self.get(COMPLETE_SEASON_TERM)
        } else {
            self.get(&format!("Episode {:02}", episode))
        }
    }
}

/// Torrent index client for the T411 API.
///
/// Authenticates and loads the terms tree once on
/// [`T411Client::connect`].
pub struct T411Client {
    client: Client,
    base_url: Url,
    token: String,
    terms: TermIndex,
    search_limit: u32,
    verified_only: bool,
}

impl T411Client {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.t411.al";

    /// Authenticates against the API and returns a ready client.
    pub fn connect(
        base_url: &str,
        credentials: &T411Credentials,
        search_limit: u32,
    ) -> Result<Self, TorrentIndexError> {
        let base_url =
            Url::parse(base_url).map_err(|e| TorrentIndexError::RequestError(e.to_string()))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TorrentIndexError::RequestError(e.to_string()))?;

        let mut t411 = Self {
            client,
            base_url,
            token: String::new(),
            terms: TermIndex::default(),
            search_limit,
            verified_only: false,
        };

        let auth_url = t411.endpoint(&["auth"])?;
        let auth: T411Auth = decode(
            t411.client
                .post(auth_url)
                .form(&[
                    ("username", credentials.username.as_str()),
                    ("password", credentials.password.as_str()),
                ])
                .send()
                .map_err(|e| TorrentIndexError::RequestError(e.to_string()))?,
        )?;
        t411.token = auth.token;
        debug!(username = %credentials.username, "authenticated against T411");

        let tree: T411TermsTree = t411.get(&["terms", "tree"], &[])?;
        t411.terms = TermIndex::from_tree(tree);

        Ok(t411)
    }

    /// Joins path segments onto the base URL, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TorrentIndexError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TorrentIndexError::RequestError(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get_raw(&self, segments: &[&str], query: &[(String, String)]) -> Result<Response, TorrentIndexError> {
        self.client
            .get(self.endpoint(segments)?)
            .header("Authorization", &self.token)
            .query(query)
            .send()
            .map_err(|e| TorrentIndexError::RequestError(e.to_string()))
    }

    fn get<T: DeserializeOwned>(&self, segments: &[&str], query: &[(String, String)]) -> Result<T, TorrentIndexError> {
        decode(self.get_raw(segments, query)?)
    }

    /// Resolves the term filters of a request
    ///
    /// Seasons and episodes missing from the tree cannot have releases, which
    /// makes them a plain miss. Unknown language or quality names are
    /// configuration mistakes and reported as such.
    fn filters(&self, request: &SearchRequest<'_>) -> Result<Vec<(String, String)>, TorrentIndexError> {
        let mut terms = Vec::with_capacity(4);

        terms.push(self.terms.season(request.season).ok_or(TorrentIndexError::NotFound)?);
        terms.push(self.terms.episode(request.episode).ok_or(TorrentIndexError::NotFound)?);
        terms.push(self.terms.get(request.language).ok_or_else(|| {
            TorrentIndexError::UnknownTerm {
                kind: "language",
                name: request.language.to_string(),
            }
        })?);
        if !request.quality.is_empty() {
            terms.push(self.terms.get(request.quality).ok_or_else(|| {
                TorrentIndexError::UnknownTerm {
                    kind: "quality",
                    name: request.quality.to_string(),
                }
            })?);
        }

        let mut query = vec![
            ("limit".to_string(), self.search_limit.to_string()),
            ("cid".to_string(), SERIES_CATEGORY.to_string()),
        ];
        query.extend(
            terms
                .into_iter()
                .map(|term| (format!("term[{}][]", term.type_id), term.term_id.clone())),
        );
        Ok(query)
    }
}

/// Decodes a JSON response, turning `{"error": .., "code": ..}` bodies into errors
fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TorrentIndexError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| TorrentIndexError::RequestError(e.to_string()))?;

    decode_body(status.as_u16(), &body)
}

fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, TorrentIndexError> {
    if let Ok(error) = serde_json::from_str::<T411Error>(body) {
        return Err(TorrentIndexError::Api {
            code: error.code,
            message: error.error,
        });
    }

    if !(200..300).contains(&status) {
        return Err(TorrentIndexError::RequestError(format!("HTTP {}", status)));
    }

    serde_json::from_str(body).map_err(|e| TorrentIndexError::ParseError(e.to_string()))
}

/// Picks the best release among search results
///
/// Unverified releases are dropped when `verified_only` is set, and releases
/// uploaded before `aired` cannot be the episode. The most seeded release
/// wins, the first one listed on ties.
fn pick_release(
    torrents: Vec<T411Torrent>,
    verified_only: bool,
    aired: Option<NaiveDate>,
) -> Option<T411Torrent> {
    torrents
        .into_iter()
        .filter(|torrent| !verified_only || torrent.is_verified)
        .filter(|torrent| match (aired, added_date(&torrent.added)) {
            (Some(aired), Some(added)) => added >= aired,
            _ => true,
        })
        .fold(None, |best: Option<T411Torrent>, torrent| match best {
            Some(best) if best.seeders >= torrent.seeders => Some(best),
            _ => Some(torrent),
        })
}

fn added_date(added: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(added, "%Y-%m-%d %H:%M:%S")
        .map(|datetime| datetime.date())
        .ok()
}

impl TorrentIndex for T411Client {
    fn set_verified_only(&mut self, verified_only: bool) {
        self.verified_only = verified_only;
    }

    fn search_and_download(
        &self,
        request: &SearchRequest<'_>,
    ) -> Result<DownloadedTorrent, TorrentIndexError> {
        let query = self.filters(request)?;
        let result: T411SearchResult = self.get(&["torrents", "search", request.title], &query)?;

        let torrents = result
            .torrents
            .into_iter()
            .filter_map(|entry| match entry {
                T411SearchEntry::Torrent(torrent) => Some(torrent),
                T411SearchEntry::Other(_) => None,
            })
            .collect();

        let release = pick_release(torrents, self.verified_only, request.date)
            .ok_or(TorrentIndexError::NotFound)?;
        debug!(
            release = %release.name,
            seeders = release.seeders,
            size = %format_size(release.size, DECIMAL),
            "selected release"
        );

        let id = release.id.to_string();
        let response = self.get_raw(&["torrents", "download", &id], &[])?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json || !status.is_success() {
            let body = response
                .text()
                .map_err(|e| TorrentIndexError::RequestError(e.to_string()))?;
            // A JSON body here is always an error report
            return Err(decode_body::<T411Error>(status.as_u16(), &body)
                .err()
                .unwrap_or_else(|| TorrentIndexError::ParseError(body)));
        }

        let bytes = response
            .bytes()
            .map_err(|e| TorrentIndexError::RequestError(e.to_string()))?;
        let file = write_temp_file("t411", "torrent", &bytes)?;

        Ok(DownloadedTorrent::new(
            file,
            format!("{}.torrent", sanitize_filename(&release.name)),
        ))
    }
}
