//! Core data models for a download job.
//!
//! Defines the request a caller submits ([`DownloadRequest`]), the record
//! returned on success ([`DownloadResult`]), and the audio [`Quality`] tiers
//! offered by the conversion provider.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::assets::AssetError;
use crate::download::OutputTarget;
use crate::error::ResultExt;

/// Audio quality tier requested from the conversion provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Quality {
    /// Opus at 256 kbps
    Opus256,
    /// MP3 at 320 kbps (default)
    #[default]
    Mp3320,
}

impl Quality {
    /// Parse a user-supplied quality string. Anything unrecognized is MP3 320.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "opus_256" | "opus256" | "opus" => Self::Opus256,
            _ => Self::Mp3320,
        }
    }

    /// Codec name understood by the conversion provider
    pub fn format(self) -> &'static str {
        match self {
            Self::Opus256 => "opus",
            Self::Mp3320 => "mp3",
        }
    }

    /// Bitrate in kbps
    pub fn bitrate(self) -> u32 {
        match self {
            Self::Opus256 => 256,
            Self::Mp3320 => 320,
        }
    }

    /// File extension including the dot
    pub fn extension(self) -> &'static str {
        match self {
            Self::Opus256 => ".opus",
            Self::Mp3320 => ".mp3",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}k", self.format(), self.bitrate())
    }
}

/// Display metadata carried through to naming and the result record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: String,
    /// Release date as supplied by the catalog (YYYY, YYYY-MM or YYYY-MM-DD)
    pub release_date: String,
    pub track_number: u32,
    pub disc_number: u32,
    pub duration: Option<Duration>,
}

impl TrackMetadata {
    /// Four-digit year from the release date, if present
    pub fn year(&self) -> Option<&str> {
        self.release_date
            .get(..4)
            .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
    }
}

/// Where the downloaded audio goes.
#[derive(Debug)]
pub enum OutputDestination {
    /// Render a filename into `dir` (template falls back to the configured one)
    Directory {
        dir: PathBuf,
        filename_template: Option<String>,
    },
    /// Write to an explicit path or an already-open handle
    Target(OutputTarget),
}

/// A single download job.
///
/// At least one of `spotify_id`, `deezer_id` or `isrc` must be present.
#[derive(Debug)]
pub struct DownloadRequest {
    /// Caller-chosen id used for progress and cancellation
    pub item_id: String,
    /// Source-catalog track id (or a bare 11-character video id)
    pub spotify_id: Option<String>,
    pub deezer_id: Option<String>,
    pub isrc: Option<String>,
    pub metadata: TrackMetadata,
    pub quality: Quality,
    pub output: OutputDestination,
    pub embed_lyrics: bool,
    pub cover_url: Option<String>,
    pub max_quality_cover: bool,
    /// Skip the transfer when the output directory already holds this ISRC
    pub skip_existing: bool,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl DownloadRequest {
    pub fn spotify_id(&self) -> Option<&str> {
        present(&self.spotify_id)
    }

    pub fn deezer_id(&self) -> Option<&str> {
        present(&self.deezer_id)
    }

    pub fn isrc(&self) -> Option<&str> {
        present(&self.isrc)
    }

    /// Check the request carries what the pipeline needs
    pub fn validate(&self) -> crate::Result<()> {
        if self.item_id.trim().is_empty() {
            return Err(crate::Error::config("download request has no item id"));
        }
        if self.spotify_id().is_none() && self.deezer_id().is_none() && self.isrc().is_none() {
            return Err(crate::Error::config(format!(
                "download request {} has no track identifiers",
                self.item_id
            )));
        }
        Ok(())
    }
}

/// Record of a finished (or skipped) download.
#[derive(Debug, Default)]
pub struct DownloadResult {
    /// Output path; None when writing to a caller-supplied handle
    pub file_path: Option<PathBuf>,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub release_date: String,
    pub track_number: u32,
    pub disc_number: u32,
    pub isrc: Option<String>,
    pub format: String,
    pub bitrate: u32,
    pub bytes_written: u64,
    /// Rendered LRC document, when lyrics were requested and found
    pub lyrics_lrc: Option<String>,
    pub cover_data: Option<Vec<u8>>,
    /// Side-asset failures; these never fail the download
    pub asset_errors: Vec<AssetError>,
    /// The transfer was skipped because a matching file already exists
    pub already_exists: bool,
}

impl DownloadResult {
    /// Result shell carrying the request's display metadata
    pub fn for_track(metadata: &TrackMetadata, isrc: Option<&str>, quality: Quality) -> Self {
        Self {
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            album: metadata.album.clone(),
            release_date: metadata.release_date.clone(),
            track_number: metadata.track_number,
            disc_number: metadata.disc_number,
            isrc: isrc.map(str::to_string),
            format: quality.format().to_string(),
            bitrate: quality.bitrate(),
            ..Self::default()
        }
    }

    /// Write the LRC document next to the audio file as `<stem>.lrc`.
    ///
    /// Returns the written path, or None when there are no lyrics or no
    /// output path.
    pub fn write_lyrics_sidecar(&self) -> crate::Result<Option<PathBuf>> {
        let (Some(lrc), Some(file)) = (&self.lyrics_lrc, &self.file_path) else {
            return Ok(None);
        };
        let path = file.with_extension("lrc");
        std::fs::write(&path, lrc).with_context(format!("writing lyrics to {}", path.display()))?;
        Ok(Some(path))
    }
}
