//! Source fallback chain: find a video-hosting watch URL for a request.
//!
//! Sources are tried in a fixed order and the first that yields a URL wins:
//!
//! 1. The source-catalog id itself, when it is already a video id or watch URL
//! 2. Source-catalog id through the aggregator
//! 3. Deezer id through the aggregator
//! 4. A video id cached for the ISRC
//! 5. ISRC (via Deezer) through the aggregator
//!
//! Every successful aggregator lookup for a request that carries an ISRC is
//! recorded in the identifier cache, so live downloads and pre-warming share
//! one view of the catalog ids.

use std::sync::Arc;

use crate::cache::IdentifierCache;
use crate::model::DownloadRequest;
use crate::resolver::{Platform, TrackAvailability, TrackSource, youtube};
use crate::traits::AvailabilityApi;

/// How the watch URL was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedVia {
    /// The request's catalog id was already a video id
    DirectVideoId,
    /// An aggregator lookup from this source
    Aggregator(TrackSource),
    /// A video id cached for the request's ISRC
    Cache,
}

/// A resolved watch URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub watch_url: String,
    pub via: ResolvedVia,
}

/// Walks the fallback order for a request
pub struct FallbackChain {
    availability: Arc<dyn AvailabilityApi>,
    cache: Arc<IdentifierCache>,
}

impl FallbackChain {
    pub fn new(availability: Arc<dyn AvailabilityApi>, cache: Arc<IdentifierCache>) -> Self {
        Self { availability, cache }
    }

    /// Resolve a watch URL, or fail listing every source that was tried
    pub async fn resolve(&self, request: &DownloadRequest) -> crate::Result<ResolvedSource> {
        if let Some(video_id) = request.spotify_id().and_then(direct_video_id) {
            tracing::info!(%video_id, "Catalog id is a video id, skipping lookup");
            return Ok(ResolvedSource {
                watch_url: youtube::watch_url(&video_id),
                via: ResolvedVia::DirectVideoId,
            });
        }

        let candidates = [
            request.spotify_id().map(|id| TrackSource::Spotify(id.to_string())),
            request.deezer_id().map(|id| TrackSource::Deezer(id.to_string())),
            request.isrc().map(|code| TrackSource::Isrc(code.to_string())),
        ];

        let mut attempted = Vec::new();
        for source in candidates.into_iter().flatten() {
            if let TrackSource::Isrc(code) = &source
                && let Some(watch_url) = self.cached_watch_url(code)
            {
                tracing::info!(isrc = %code, %watch_url, "Resolved watch URL from cache");
                return Ok(ResolvedSource {
                    watch_url,
                    via: ResolvedVia::Cache,
                });
            }

            attempted.push(source.to_string());

            match self.availability.resolve(&source, None).await {
                Ok(availability) => {
                    if let Some(code) = request.isrc() {
                        self.cache.record_availability(code, &availability);
                    }
                    match watch_url_from(&availability) {
                        Some(watch_url) => {
                            tracing::info!(source = %source, %watch_url, "Resolved watch URL");
                            return Ok(ResolvedSource {
                                watch_url,
                                via: ResolvedVia::Aggregator(source),
                            });
                        }
                        None => tracing::debug!(source = %source, "No video link for source"),
                    }
                }
                Err(e) => tracing::warn!(source = %source, error = %e, "Lookup failed, trying next source"),
            }
        }

        tracing::warn!(item_id = %request.item_id, ?attempted, "No source produced a watch URL");
        Err(crate::Error::Resolution { attempted })
    }

    fn cached_watch_url(&self, code: &str) -> Option<String> {
        let entry = self.cache.get(code)?;
        let cached = entry.get(Platform::YouTube)?.to_string();
        direct_video_id(&cached).map(|video_id| youtube::watch_url(&video_id))
    }
}

/// Video id carried by a bare id or a video-hosting URL
fn direct_video_id(value: &str) -> Option<String> {
    if youtube::is_video_id(value) {
        Some(value.to_string())
    } else if youtube::is_youtube_url(value) {
        youtube::extract_video_id(value)
    } else {
        None
    }
}

/// Watch URL from an availability record, normalized to the canonical form
fn watch_url_from(availability: &TrackAvailability) -> Option<String> {
    [Platform::YouTube, Platform::YouTubeMusic]
        .into_iter()
        .find_map(|platform| {
            availability
                .id(platform)
                .map(youtube::watch_url)
                .or_else(|| availability.url(platform).map(str::to_string))
        })
}
