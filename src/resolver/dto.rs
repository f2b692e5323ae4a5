//! Data Transfer Objects for the aggregator and catalog APIs
//!
//! These structs match the external JSON shapes exactly.
//! They are converted to domain types in the adapter layer.

use serde::Deserialize;
use std::collections::HashMap;

/// Link aggregator `/links` response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinksResponse {
    #[serde(default)]
    pub entity_unique_id: Option<String>,
    #[serde(default)]
    pub links_by_platform: HashMap<String, PlatformLinks>,
}

/// One entry in `linksByPlatform`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformLinks {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub entity_unique_id: Option<String>,
}

/// Qobuz `track/search` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QobuzSearchResponse {
    #[serde(default)]
    pub tracks: QobuzTracks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QobuzTracks {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub items: Vec<QobuzTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QobuzTrack {
    pub id: i64,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Deezer `track/isrc:{code}` response.
///
/// Deezer answers 200 with an `error` object when nothing matches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeezerTrack {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub error: Option<DeezerError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeezerError {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}
