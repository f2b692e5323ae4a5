//! Adapter layer: Convert aggregator and catalog DTOs to domain models
//!
//! This is the ONLY place where resolver DTO types become domain types.

use std::collections::BTreeMap;

use super::domain::{
    AlbumAvailability, Platform, PlatformLink, QobuzMatch, ResolveError, TrackAvailability,
};
use super::dto;

/// Platforms we keep from an aggregator track response
const TRACK_PLATFORMS: [Platform; 6] = [
    Platform::Spotify,
    Platform::Deezer,
    Platform::Tidal,
    Platform::AmazonMusic,
    Platform::YouTube,
    Platform::YouTubeMusic,
];

/// Build track availability from an aggregator response plus an optional
/// direct Qobuz match.
pub fn to_track_availability(
    source_id: &str,
    response: &dto::LinksResponse,
    qobuz: Option<QobuzMatch>,
) -> TrackAvailability {
    let mut links: BTreeMap<Platform, PlatformLink> = response
        .links_by_platform
        .iter()
        .filter_map(|(key, entry)| {
            let platform = Platform::from_aggregator_key(key)?;
            if !TRACK_PLATFORMS.contains(&platform) || entry.url.trim().is_empty() {
                return None;
            }
            Some((platform, PlatformLink::from_url(platform, &entry.url)))
        })
        .collect();

    if let Some(hit) = qobuz {
        links.insert(Platform::Qobuz, hit.link());
    }

    TrackAvailability::new(source_id, links)
}

/// Build album availability; only the Deezer album link is relevant
pub fn to_album_availability(source_id: &str, response: &dto::LinksResponse) -> AlbumAvailability {
    AlbumAvailability::new(source_id, link_for(response, Platform::Deezer))
}

fn link_for(response: &dto::LinksResponse, platform: Platform) -> Option<PlatformLink> {
    let entry = response.links_by_platform.get(platform.aggregator_key())?;
    if entry.url.trim().is_empty() {
        return None;
    }
    Some(PlatformLink::from_url(platform, &entry.url))
}

/// A match whenever the search reports at least one hit, carrying the
/// first track id if the page lists one
pub fn qobuz_match(response: &dto::QobuzSearchResponse) -> Option<QobuzMatch> {
    if response.tracks.total == 0 {
        return None;
    }
    Some(QobuzMatch {
        track_id: response.tracks.items.first().map(|track| track.id),
    })
}

/// Deezer track id from an ISRC lookup
pub fn deezer_track_id(isrc: &str, response: &dto::DeezerTrack) -> Result<String, ResolveError> {
    if let Some(error) = &response.error {
        tracing::debug!(
            isrc,
            kind = error.kind.as_deref().unwrap_or("unknown"),
            message = error.message.as_deref().unwrap_or(""),
            "Deezer ISRC lookup returned an error object"
        );
    }

    response
        .id
        .filter(|id| *id > 0)
        .map(|id| id.to_string())
        .ok_or_else(|| ResolveError::NotFound {
            what: format!("ISRC {isrc}"),
            platform: Platform::Deezer,
        })
}
