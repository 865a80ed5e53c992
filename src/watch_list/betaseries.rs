/// BetaSeries watch-list implementation.
use super::betaseries_types::{
    BsAuthResponse, BsEpisode, BsEpisodesList, BsErrorEnvelope, BsShow, BsShowDisplay,
    BsShowEpisodes,
};
use super::{Episode, EpisodeId, Show, ShowId, ShowStatus, UnseenShow, WatchList, WatchListError};
use chrono::NaiveDate;
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Version of the BetaSeries API this client speaks
const API_VERSION: &str = "3.0";

/// Timeout applied to every request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials of a BetaSeries member and application
#[derive(Debug, Clone)]
pub struct BetaSeriesCredentials {
    /// Application API key
    pub api_key: String,
    /// Member login
    pub login: String,
    /// MD5 hex digest of the member password, as the API expects it
    pub password_md5: String,
}

/// Watch-list client for the BetaSeries API.
///
/// The client authenticates once on [`BetaSeriesClient::connect`] and reuses
/// the member token for every later request.
pub struct BetaSeriesClient {
    client: Client,
    base_url: String,
    api_key: String,
    token: String,
}

impl BetaSeriesClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.betaseries.com";

    /// Authenticates against the API and returns a ready client.
    pub fn connect(
        base_url: &str,
        credentials: &BetaSeriesCredentials,
    ) -> Result<Self, WatchListError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WatchListError::RequestError(e.to_string()))?;

        let mut bs = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.clone(),
            token: String::new(),
        };

        let auth: BsAuthResponse = bs.send(
            bs.request(Method::POST, "/members/auth").form(&[
                ("login", credentials.login.as_str()),
                ("password", credentials.password_md5.as_str()),
            ]),
        )?;
        bs.token = auth.token;
        debug!(login = %credentials.login, "authenticated against BetaSeries");

        Ok(bs)
    }

    /// Builds a request carrying the API version, key and member token
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-BetaSeries-Version", API_VERSION)
            .header("X-BetaSeries-Key", &self.api_key);
        if !self.token.is_empty() {
            builder = builder.header("X-BetaSeries-Token", &self.token);
        }
        builder
    }

    /// Sends a request and decodes the JSON body
    ///
    /// A non-empty `errors` array wins over the HTTP status, since the API
    /// reports most failures that way.
    fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, WatchListError> {
        let response = builder
            .send()
            .map_err(|e| WatchListError::RequestError(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| WatchListError::RequestError(e.to_string()))?;

        decode_body(status.as_u16(), status.canonical_reason(), &body)
    }

    fn convert_show(show: BsShow) -> Show {
        Show {
            id: ShowId(show.id),
            title: show.title,
            status: ShowStatus::from(show.status.as_str()),
            seasons: show.seasons,
            aliases: show.aliases.into_vec(),
        }
    }
}

/// Decodes a response body, turning API level errors into [`WatchListError`]
fn decode_body<T: DeserializeOwned>(
    status: u16,
    reason: Option<&str>,
    body: &str,
) -> Result<T, WatchListError> {
    if let Ok(envelope) = serde_json::from_str::<BsErrorEnvelope>(body) {
        if let Some(error) = envelope.errors.into_iter().next() {
            return Err(WatchListError::Api {
                code: error.code,
                message: error.text,
            });
        }
    }

    if !(200..300).contains(&status) {
        return Err(WatchListError::Api {
            code: i64::from(status),
            message: reason.unwrap_or("Unknown").to_string(),
        });
    }

    serde_json::from_str(body).map_err(|e| WatchListError::ParseError(e.to_string()))
}

/// Converts an API episode to our internal Episode structure.
fn convert_episode(episode: BsEpisode) -> Episode {
    Episode {
        id: EpisodeId(episode.id),
        show_id: ShowId(episode.show.id),
        show_title: episode.show.title,
        season: episode.season,
        number: episode.episode,
        // "0000-00-00" fails to parse and ends up as unknown
        air_date: episode
            .date
            .and_then(|date| NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()),
        special: episode.special,
        downloaded: episode.user.downloaded,
    }
}

impl WatchList for BetaSeriesClient {
    fn list_unseen_episodes(&self) -> Result<Vec<UnseenShow>, WatchListError> {
        let list: BsEpisodesList = self.send(self.request(Method::GET, "/episodes/list"))?;

        Ok(list
            .shows
            .into_iter()
            .map(|show| UnseenShow {
                id: ShowId(show.id),
                title: show.title,
                episodes: show.unseen.into_iter().map(convert_episode).collect(),
            })
            .collect())
    }

    fn get_show_detail(&self, show_id: ShowId) -> Result<Show, WatchListError> {
        let display: BsShowDisplay = self.send(
            self.request(Method::GET, "/shows/display")
                .query(&[("id", show_id.0)]),
        )?;

        display
            .show
            .map(Self::convert_show)
            .ok_or(WatchListError::ShowNotFound(show_id))
    }

    fn list_episodes_of_season(
        &self,
        show_id: ShowId,
        season: u32,
    ) -> Result<Vec<Episode>, WatchListError> {
        let mut request = self
            .request(Method::GET, "/shows/episodes")
            .query(&[("id", show_id.0)]);
        if season != 0 {
            request = request.query(&[("season", season)]);
        }

        let episodes: BsShowEpisodes = self.send(request)?;
        Ok(episodes.episodes.into_iter().map(convert_episode).collect())
    }

    fn acknowledge_downloaded(&self, episode_id: EpisodeId) -> Result<(), WatchListError> {
        let _: serde_json::Value = self.send(
            self.request(Method::POST, "/episodes/downloaded")
                .query(&[("id", episode_id.0)]),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSEEN_LIST: &str = r#"{
        "shows": [{
            "id": 481,
            "title": "Utopia (2013)",
            "remaining": 2,
            "unseen": [
                {
                    "id": 1001, "title": "Episode 1", "season": 1, "episode": 1,
                    "show": {"id": 481, "title": "Utopia (2013)"},
                    "code": "S01E01", "special": 0, "date": "2013-01-15",
                    "user": {"seen": false, "downloaded": false}
                },
                {
                    "id": 1002, "title": "Special", "season": 1, "episode": 2,
                    "show": {"id": 481, "title": "Utopia (2013)"},
                    "special": "1", "date": "0000-00-00",
                    "user": {"seen": false, "downloaded": 1}
                }
            ]
        }],
        "errors": []
    }"#;

    #[test]
    fn test_decode_unseen_list() {
        let list: BsEpisodesList = decode_body(200, Some("OK"), UNSEEN_LIST).unwrap();
        assert_eq!(list.shows.len(), 1);

        let show = list.shows.into_iter().next().unwrap();
        let episodes: Vec<Episode> = show.unseen.into_iter().map(convert_episode).collect();

        assert_eq!(episodes[0].id, EpisodeId(1001));
        assert_eq!(episodes[0].show_id, ShowId(481));
        assert_eq!(episodes[0].air_date, NaiveDate::from_ymd_opt(2013, 1, 15));
        assert!(!episodes[0].special);
        assert!(!episodes[0].downloaded);

        assert!(episodes[1].special);
        assert!(episodes[1].downloaded);
        assert_eq!(episodes[1].air_date, None);
    }

    #[test]
    fn test_decode_show_with_alias_object() {
        let body = r#"{"show": {
            "id": 481, "title": "Utopia (2013)", "status": "Ended", "seasons": "2",
            "aliases": {"12": "Utopia UK", "3": "Utopia"}
        }, "errors": []}"#;

        let display: BsShowDisplay = decode_body(200, None, body).unwrap();
        let show = BetaSeriesClient::convert_show(display.show.unwrap());

        assert_eq!(show.status, ShowStatus::Ended);
        assert_eq!(show.seasons, "2");
        assert_eq!(show.aliases, vec!["Utopia".to_string(), "Utopia UK".to_string()]);
    }

    #[test]
    fn test_decode_show_with_numeric_seasons_and_empty_aliases() {
        let body = r#"{"show": {
            "id": 7, "title": "Plain", "status": "Continuing", "seasons": 4, "aliases": []
        }}"#;

        let display: BsShowDisplay = decode_body(200, None, body).unwrap();
        let show = BetaSeriesClient::convert_show(display.show.unwrap());

        assert_eq!(show.status, ShowStatus::Continuing);
        assert_eq!(show.seasons, "4");
        assert!(show.aliases.is_empty());
    }

    #[test]
    fn test_decode_api_error() {
        let body = r#"{"errors": [{"code": 2005, "text": "Invalid token."}]}"#;
        let result: Result<serde_json::Value, _> = decode_body(400, Some("Bad Request"), body);

        match result {
            Err(WatchListError::Api { code, message }) => {
                assert_eq!(code, 2005);
                assert_eq!(message, "Invalid token.");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_http_error_without_envelope() {
        let result: Result<serde_json::Value, _> =
            decode_body(503, Some("Service Unavailable"), "<html>down</html>");
        assert!(matches!(result, Err(WatchListError::Api { code: 503, .. })));
    }
}
