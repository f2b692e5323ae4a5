//! Internal domain models for cross-catalog availability.
//!
//! These types are OUR types - they don't change when external APIs change.
//! Aggregator and catalog responses get converted into these via the adapter.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::youtube;

/// A streaming catalog or video-hosting service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Spotify,
    Deezer,
    Tidal,
    AmazonMusic,
    Qobuz,
    YouTube,
    YouTubeMusic,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Platform::Spotify,
        Platform::Deezer,
        Platform::Tidal,
        Platform::AmazonMusic,
        Platform::Qobuz,
        Platform::YouTube,
        Platform::YouTubeMusic,
    ];

    /// Key used by the link aggregator's `linksByPlatform` map
    pub fn aggregator_key(self) -> &'static str {
        match self {
            Self::Spotify => "spotify",
            Self::Deezer => "deezer",
            Self::Tidal => "tidal",
            Self::AmazonMusic => "amazonMusic",
            Self::Qobuz => "qobuz",
            Self::YouTube => "youtube",
            Self::YouTubeMusic => "youtubeMusic",
        }
    }

    pub fn from_aggregator_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.aggregator_key() == key)
    }

    /// Lenient parse of user-facing names ("amazon", "youtube_music", ...)
    pub fn parse(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "spotify" => Some(Self::Spotify),
            "deezer" => Some(Self::Deezer),
            "tidal" => Some(Self::Tidal),
            "amazon" | "amazonmusic" => Some(Self::AmazonMusic),
            "qobuz" => Some(Self::Qobuz),
            "youtube" => Some(Self::YouTube),
            "youtubemusic" => Some(Self::YouTubeMusic),
            _ => None,
        }
    }

    /// Catalog-specific id carried in a track/album URL
    pub fn id_from_url(self, url: &str) -> Option<String> {
        match self {
            Self::Spotify | Self::Deezer | Self::Tidal | Self::Qobuz => last_path_segment(url),
            Self::YouTube | Self::YouTubeMusic => youtube::extract_video_id(url),
            Self::AmazonMusic => query_param(url, "trackAsin").or_else(|| last_path_segment(url)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Spotify => "Spotify",
            Self::Deezer => "Deezer",
            Self::Tidal => "Tidal",
            Self::AmazonMusic => "Amazon Music",
            Self::Qobuz => "Qobuz",
            Self::YouTube => "YouTube",
            Self::YouTubeMusic => "YouTube Music",
        };
        f.write_str(name)
    }
}

/// Last non-empty path segment of a URL, with query and fragment removed
pub fn last_path_segment(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .filter(|segment| !segment.contains(':') && !segment.contains('.'))
        .map(str::to_string)
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// One platform's link for a track or album
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformLink {
    pub url: Option<String>,
    pub id: Option<String>,
}

impl PlatformLink {
    /// Link from a URL, deriving the platform id from it
    pub fn from_url(platform: Platform, url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            id: platform.id_from_url(url),
        }
    }
}

/// A direct Qobuz ISRC search that reported at least one hit.
///
/// The hit count alone decides availability; the track id is missing when
/// the result page came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QobuzMatch {
    pub track_id: Option<i64>,
}

impl QobuzMatch {
    pub fn link(&self) -> PlatformLink {
        PlatformLink {
            url: self
                .track_id
                .map(|id| format!("https://open.qobuz.com/track/{id}")),
            id: self.track_id.map(|id| id.to_string()),
        }
    }
}

/// Where a track is available. Presence of a platform key means available.
///
/// Built once by the resolver and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackAvailability {
    source_id: String,
    links: BTreeMap<Platform, PlatformLink>,
}

impl TrackAvailability {
    pub fn new(source_id: impl Into<String>, links: BTreeMap<Platform, PlatformLink>) -> Self {
        Self {
            source_id: source_id.into(),
            links,
        }
    }

    /// Identifier the lookup started from
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn is_available(&self, platform: Platform) -> bool {
        self.links.contains_key(&platform)
    }

    pub fn url(&self, platform: Platform) -> Option<&str> {
        self.links.get(&platform)?.url.as_deref()
    }

    pub fn id(&self, platform: Platform) -> Option<&str> {
        self.links.get(&platform)?.id.as_deref()
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.links.keys().copied()
    }

    pub fn links(&self) -> &BTreeMap<Platform, PlatformLink> {
        &self.links
    }
}

/// Album-level availability; only the Deezer album link is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumAvailability {
    source_id: String,
    deezer: Option<PlatformLink>,
}

impl AlbumAvailability {
    pub fn new(source_id: impl Into<String>, deezer: Option<PlatformLink>) -> Self {
        Self {
            source_id: source_id.into(),
            deezer,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn is_on_deezer(&self) -> bool {
        self.deezer.is_some()
    }

    pub fn deezer_url(&self) -> Option<&str> {
        self.deezer.as_ref()?.url.as_deref()
    }

    pub fn deezer_id(&self) -> Option<&str> {
        self.deezer.as_ref()?.id.as_deref()
    }
}

/// The identifier a lookup starts from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackSource {
    Spotify(String),
    Deezer(String),
    Isrc(String),
}

impl TrackSource {
    /// Canonical catalog URL embedded in the aggregator query
    pub fn catalog_url(&self) -> Option<String> {
        match self {
            Self::Spotify(id) => Some(format!("https://open.spotify.com/track/{id}")),
            Self::Deezer(id) => Some(format!("https://www.deezer.com/track/{id}")),
            Self::Isrc(_) => None,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Spotify(v) | Self::Deezer(v) | Self::Isrc(v) => v,
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spotify(id) => write!(f, "spotify:{id}"),
            Self::Deezer(id) => write!(f, "deezer:{id}"),
            Self::Isrc(code) => write!(f, "isrc:{code}"),
        }
    }
}

/// Errors from availability lookups
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("{what} not found on {platform}")]
    NotFound { what: String, platform: Platform },

    #[error("Invalid identifier: {0}")]
    InvalidId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_path_segment_strips_query() {
        assert_eq!(
            last_path_segment("https://www.deezer.com/track/3135556?utm_source=x"),
            Some("3135556".to_string())
        );
        assert_eq!(
            last_path_segment("https://tidal.com/browse/track/77646168/"),
            Some("77646168".to_string())
        );
        assert_eq!(last_path_segment("https://www.deezer.com/"), None);
    }

    #[test]
    fn test_amazon_id_prefers_track_asin() {
        let url = "https://music.amazon.com/albums/B00A1?trackAsin=B00TRACK&do=play";
        assert_eq!(
            Platform::AmazonMusic.id_from_url(url),
            Some("B00TRACK".to_string())
        );
    }

    #[test]
    fn test_aggregator_keys_roundtrip() {
        for platform in Platform::ALL {
            assert_eq!(
                Platform::from_aggregator_key(platform.aggregator_key()),
                Some(platform)
            );
        }
        assert_eq!(Platform::from_aggregator_key("napster"), None);
    }

    #[test]
    fn test_platform_parse_is_lenient() {
        assert_eq!(Platform::parse("amazon"), Some(Platform::AmazonMusic));
        assert_eq!(Platform::parse("YouTube_Music"), Some(Platform::YouTubeMusic));
        assert_eq!(Platform::parse("Tidal"), Some(Platform::Tidal));
        assert_eq!(Platform::parse("unknown"), None);
    }

    #[test]
    fn test_availability_accessors() {
        let mut links = BTreeMap::new();
        links.insert(
            Platform::Deezer,
            PlatformLink::from_url(Platform::Deezer, "https://www.deezer.com/track/42"),
        );
        let availability = TrackAvailability::new("spotify:abc", links);

        assert!(availability.is_available(Platform::Deezer));
        assert!(!availability.is_available(Platform::Tidal));
        assert_eq!(availability.id(Platform::Deezer), Some("42"));
        assert_eq!(availability.url(Platform::Tidal), None);
        assert_eq!(availability.platforms().collect::<Vec<_>>(), vec![Platform::Deezer]);
    }

    #[test]
    fn test_source_display_and_urls() {
        let source = TrackSource::Spotify("abc".to_string());
        assert_eq!(source.to_string(), "spotify:abc");
        assert_eq!(
            source.catalog_url().as_deref(),
            Some("https://open.spotify.com/track/abc")
        );
        assert_eq!(TrackSource::Isrc("X".into()).catalog_url(), None);
    }
}
