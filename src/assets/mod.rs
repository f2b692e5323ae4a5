//! Side assets fetched alongside the audio: cover art and lyrics.
//!
//! Both fetches run concurrently and write into one shared result record.
//! A failure in either is recorded on the record and never fails the
//! download.

pub mod cover;
pub mod lyrics;

use std::sync::Arc;

use parking_lot::Mutex;

pub use cover::{CoverArt, CoverClient, max_quality_url};
pub use lyrics::{Lyrics, LyricsClient, LyricsLine, LyricsQuery, to_lrc};

use crate::traits::{CoverApi, LyricsApi};
use crate::transport::TransportError;

/// Side-asset failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum AssetError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("No {0} found")]
    NotFound(String),

    #[error("Response is not a supported image")]
    InvalidImage,
}

/// What to fetch for one track
#[derive(Debug, Clone, Default)]
pub struct SideAssetRequest {
    pub cover_url: Option<String>,
    pub max_quality_cover: bool,
    /// Lyrics are only fetched when requested
    pub lyrics: Option<LyricsQuery>,
}

/// Outcome of a side-asset fetch. Fields are independent: one can be set
/// while the other carries an error.
#[derive(Debug, Clone, Default)]
pub struct SideAssets {
    pub cover: Option<CoverArt>,
    pub lyrics: Option<Lyrics>,
    pub lyrics_lrc: Option<String>,
    pub cover_error: Option<AssetError>,
    pub lyrics_error: Option<AssetError>,
}

impl SideAssets {
    pub fn errors(&self) -> impl Iterator<Item = &AssetError> {
        self.cover_error.iter().chain(self.lyrics_error.iter())
    }
}

/// Runs the cover and lyrics fetches for a track
pub struct SideAssetFetcher {
    cover: Arc<dyn CoverApi>,
    lyrics: Arc<dyn LyricsApi>,
}

impl SideAssetFetcher {
    pub fn new(cover: Arc<dyn CoverApi>, lyrics: Arc<dyn LyricsApi>) -> Self {
        Self { cover, lyrics }
    }

    /// Fetch both assets concurrently; returns once the slower one finishes.
    pub async fn fetch(&self, request: &SideAssetRequest) -> SideAssets {
        let result = Mutex::new(SideAssets::default());

        let cover_task = async {
            let Some(url) = request.cover_url.as_deref().filter(|u| !u.is_empty()) else {
                return;
            };
            match self.cover.fetch_cover(url, request.max_quality_cover).await {
                Ok(cover) => result.lock().cover = Some(cover),
                Err(e) => {
                    tracing::warn!(url, error = %e, "Cover art fetch failed");
                    result.lock().cover_error = Some(e);
                }
            }
        };

        let lyrics_task = async {
            let Some(query) = request.lyrics.as_ref() else {
                return;
            };
            match self.lyrics.fetch_lyrics(query).await {
                Ok(lyrics) => {
                    let lrc = to_lrc(&lyrics, &query.track_name, &query.artist_name);
                    let mut guard = result.lock();
                    guard.lyrics = Some(lyrics);
                    guard.lyrics_lrc = Some(lrc);
                }
                Err(e) => {
                    tracing::warn!(track = %query.track_name, error = %e, "Lyrics fetch failed");
                    result.lock().lyrics_error = Some(e);
                }
            }
        };

        tokio::join!(cover_task, lyrics_task);
        result.into_inner()
    }
}
