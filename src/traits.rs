//! Trait definitions for external API clients.
//!
//! These traits enable dependency injection and mocking for tests.
//! Production code uses the real client implementations, while tests
//! can substitute mock implementations.
//!
//! # Example
//!
//! ```ignore
//! use songbridge::traits::AvailabilityApi;
//!
//! // In production code:
//! async fn deezer_id<T: AvailabilityApi>(client: &T, source: &TrackSource) -> Option<String> {
//!     let availability = client.resolve(source, None).await.ok()?;
//!     availability.id(Platform::Deezer).map(str::to_string)
//! }
//!
//! // In tests:
//! let mock = MockAvailability::new().with_track("spotify:abc", availability);
//! ```

use async_trait::async_trait;

use crate::assets::{AssetError, CoverArt, CoverClient, Lyrics, LyricsClient, LyricsQuery};
use crate::model::Quality;
use crate::orchestrator::{ConversionClient, ConversionError, Tunnel};
use crate::resolver::{AvailabilityClient, Platform, ResolveError, TrackAvailability, TrackSource};

/// Trait for cross-catalog availability lookups.
#[async_trait]
pub trait AvailabilityApi: Send + Sync {
    /// Resolve where a track is available. `isrc` enables the secondary
    /// catalog check.
    async fn resolve(
        &self,
        source: &TrackSource,
        isrc: Option<&str>,
    ) -> Result<TrackAvailability, ResolveError>;
}

/// Trait for direct catalog search by recording code.
#[async_trait]
pub trait IsrcSearchApi: Send + Sync {
    /// Catalog id for `isrc` on `platform`, or None when not found or the
    /// platform has no direct search.
    async fn search_by_isrc(
        &self,
        platform: Platform,
        isrc: &str,
    ) -> Result<Option<String>, ResolveError>;
}

/// Trait for cover art downloads.
#[async_trait]
pub trait CoverApi: Send + Sync {
    async fn fetch_cover(&self, url: &str, max_quality: bool) -> Result<CoverArt, AssetError>;
}

/// Trait for lyrics lookup.
#[async_trait]
pub trait LyricsApi: Send + Sync {
    async fn fetch_lyrics(&self, query: &LyricsQuery) -> Result<Lyrics, AssetError>;
}

/// Trait for the watch-URL to audio-tunnel conversion provider.
#[async_trait]
pub trait ConversionApi: Send + Sync {
    async fn request_tunnel(
        &self,
        watch_url: &str,
        quality: Quality,
    ) -> Result<Tunnel, ConversionError>;
}

// Implement traits for real clients

#[async_trait]
impl AvailabilityApi for AvailabilityClient {
    async fn resolve(
        &self,
        source: &TrackSource,
        isrc: Option<&str>,
    ) -> Result<TrackAvailability, ResolveError> {
        self.resolve_source(source, isrc).await
    }
}

#[async_trait]
impl IsrcSearchApi for AvailabilityClient {
    async fn search_by_isrc(
        &self,
        platform: Platform,
        isrc: &str,
    ) -> Result<Option<String>, ResolveError> {
        match platform {
            Platform::Qobuz => Ok(self
                .search_qobuz_by_isrc(isrc)
                .await?
                .and_then(|hit| hit.track_id)
                .map(|id| id.to_string())),
            Platform::Deezer => match self.deezer_track_by_isrc(isrc).await {
                Ok(id) => Ok(Some(id)),
                Err(ResolveError::NotFound { .. }) => Ok(None),
                Err(e) => Err(e),
            },
            // No public search-by-ISRC for the others; the aggregator covers them
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl CoverApi for CoverClient {
    async fn fetch_cover(&self, url: &str, max_quality: bool) -> Result<CoverArt, AssetError> {
        self.fetch(url, max_quality).await
    }
}

#[async_trait]
impl LyricsApi for LyricsClient {
    async fn fetch_lyrics(&self, query: &LyricsQuery) -> Result<Lyrics, AssetError> {
        self.fetch(query).await
    }
}

#[async_trait]
impl ConversionApi for ConversionClient {
    async fn request_tunnel(
        &self,
        watch_url: &str,
        quality: Quality,
    ) -> Result<Tunnel, ConversionError> {
        ConversionClient::request_tunnel(self, watch_url, quality).await
    }
}
