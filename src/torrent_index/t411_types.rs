/// T411 API response types for deserialization.
///
/// These structures mirror the JSON response format of the T411 API.
use crate::lenient;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

/// Error body returned instead of the expected payload
#[derive(Debug, Deserialize)]
pub(super) struct T411Error {
    pub error: String,
    pub code: i64,
}

/// Response of `POST /auth`
#[derive(Debug, Deserialize)]
pub(super) struct T411Auth {
    pub token: String,
}

/// Response of `GET /terms/tree`: category id → term type id → term type
///
/// Categories without terms are serialized as an empty array.
pub(super) type T411TermsTree = HashMap<String, T411TermTypes>;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum T411TermTypes {
    Map(HashMap<String, T411TermType>),
    Empty(Vec<Value>),
}

/// A group of terms such as the quality or language choices
#[derive(Debug, Deserialize)]
pub(super) struct T411TermType {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub terms: T411Terms,
}

/// Term id → term name, or an empty array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum T411Terms {
    Map(HashMap<String, String>),
    Empty(Vec<Value>),
}

impl Default for T411Terms {
    fn default() -> Self {
        T411Terms::Empty(Vec::new())
    }
}

/// Response of `GET /torrents/search/{query}`
#[derive(Debug, Deserialize)]
pub(super) struct T411SearchResult {
    #[serde(default)]
    pub torrents: Vec<T411SearchEntry>,
}

/// Moderated torrents show up as bare ids in search results
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum T411SearchEntry {
    Torrent(T411Torrent),
    Other(Value),
}

/// A single release of a search result
#[derive(Debug, Clone, Deserialize)]
pub(super) struct T411Torrent {
    #[serde(deserialize_with = "lenient::unsigned")]
    pub id: u64,
    pub name: String,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub seeders: u64,
    #[serde(rename = "isVerified", default, deserialize_with = "lenient::flag")]
    pub is_verified: bool,
    /// Upload time as `YYYY-MM-DD HH:MM:SS`
    #[serde(default)]
    pub added: String,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub size: u64,
}
