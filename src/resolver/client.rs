//! Availability resolver HTTP client
//!
//! Looks tracks up on the public link aggregator (song.link / Odesli) and
//! checks the secondary high-resolution catalog (Qobuz) directly by ISRC.
//! The aggregator allows 10 requests per minute, so it gets its own
//! limiter on top of the shared transport budget.
//!
//! API: https://www.notion.so/odesli/Public-API-d8093b1bb8874f8b9c4e1a9d0eb1b5f0

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use super::adapter;
use super::domain::{
    AlbumAvailability, Platform, QobuzMatch, ResolveError, TrackAvailability, TrackSource,
};
use super::dto;
use crate::config::ResolverConfig;
use crate::transport::{HttpTransport, RetryPolicy};

/// Aggregator and catalog-search client
pub struct AvailabilityClient {
    transport: Arc<HttpTransport>,
    limiter: DefaultDirectRateLimiter,
    config: ResolverConfig,
}

impl AvailabilityClient {
    pub fn new(transport: Arc<HttpTransport>, config: &ResolverConfig) -> Self {
        let per_minute =
            NonZeroU32::new(config.songlink_requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Self {
            transport,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            config: config.clone(),
        }
    }

    /// Resolve a source-catalog track id.
    ///
    /// When `isrc` is given the secondary catalog is searched too; a failure
    /// there only marks that catalog unavailable.
    pub async fn resolve_track(
        &self,
        spotify_id: &str,
        isrc: Option<&str>,
    ) -> Result<TrackAvailability, ResolveError> {
        self.resolve_source(&TrackSource::Spotify(spotify_id.to_string()), isrc)
            .await
    }

    /// Resolve from any supported starting identifier
    #[tracing::instrument(skip(self, source), fields(source = %source))]
    pub async fn resolve_source(
        &self,
        source: &TrackSource,
        isrc: Option<&str>,
    ) -> Result<TrackAvailability, ResolveError> {
        let catalog_url = match source {
            TrackSource::Spotify(id) | TrackSource::Deezer(id) if id.trim().is_empty() => {
                return Err(ResolveError::InvalidId(source.to_string()));
            }
            TrackSource::Isrc(code) => {
                let deezer_id = self.deezer_track_by_isrc(code).await?;
                format!("https://www.deezer.com/track/{deezer_id}")
            }
            other => other
                .catalog_url()
                .ok_or_else(|| ResolveError::InvalidId(other.to_string()))?,
        };

        let response = self.fetch_links(&catalog_url).await?;

        let isrc = isrc.or(match source {
            TrackSource::Isrc(code) => Some(code.as_str()),
            _ => None,
        });
        let qobuz = match isrc.filter(|code| !code.is_empty()) {
            Some(code) => match self.search_qobuz_by_isrc(code).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(isrc = code, error = %e, "Qobuz availability check failed");
                    None
                }
            },
            None => None,
        };

        let availability =
            adapter::to_track_availability(&source.to_string(), &response, qobuz);
        tracing::info!(
            platforms = ?availability.platforms().collect::<Vec<_>>(),
            "Resolved track availability"
        );
        Ok(availability)
    }

    /// Resolve a source-catalog album id (Deezer album link only)
    #[tracing::instrument(skip(self))]
    pub async fn resolve_album(
        &self,
        spotify_album_id: &str,
    ) -> Result<AlbumAvailability, ResolveError> {
        if spotify_album_id.trim().is_empty() {
            return Err(ResolveError::InvalidId("empty album id".to_string()));
        }
        let url = format!("https://open.spotify.com/album/{spotify_album_id}");
        let response = self.fetch_links(&url).await?;
        let album =
            adapter::to_album_availability(&format!("spotify:album:{spotify_album_id}"), &response);
        tracing::info!(on_deezer = album.is_on_deezer(), "Resolved album availability");
        Ok(album)
    }

    /// Deezer track id for a source-catalog track id
    pub async fn deezer_id_from_spotify(&self, spotify_id: &str) -> Result<String, ResolveError> {
        let availability = self.resolve_track(spotify_id, None).await?;
        availability
            .id(Platform::Deezer)
            .map(str::to_string)
            .ok_or_else(|| ResolveError::NotFound {
                what: format!("track {spotify_id}"),
                platform: Platform::Deezer,
            })
    }

    /// Deezer album id for a source-catalog album id
    pub async fn deezer_album_id_from_spotify(
        &self,
        spotify_album_id: &str,
    ) -> Result<String, ResolveError> {
        let album = self.resolve_album(spotify_album_id).await?;
        album
            .deezer_id()
            .map(str::to_string)
            .ok_or_else(|| ResolveError::NotFound {
                what: format!("album {spotify_album_id}"),
                platform: Platform::Deezer,
            })
    }

    /// Streaming URLs for the lossless catalogs the aggregator covers
    pub async fn streaming_urls(
        &self,
        spotify_id: &str,
    ) -> Result<BTreeMap<Platform, String>, ResolveError> {
        let availability = self.resolve_track(spotify_id, None).await?;
        Ok([Platform::Tidal, Platform::AmazonMusic, Platform::Deezer]
            .into_iter()
            .filter_map(|p| availability.url(p).map(|url| (p, url.to_string())))
            .collect())
    }

    /// Search the secondary catalog by ISRC.
    ///
    /// Returns a match whenever the reported hit count is positive, or None
    /// when there is no hit.
    pub async fn search_qobuz_by_isrc(
        &self,
        isrc: &str,
    ) -> Result<Option<QobuzMatch>, ResolveError> {
        let url = format!(
            "{}/track/search?query={}&limit=1&app_id={}",
            self.config.qobuz_base_url,
            urlencoding::encode(isrc),
            urlencoding::encode(&self.config.qobuz_app_id),
        );
        let response: dto::QobuzSearchResponse =
            self.transport.get_json(&url, RetryPolicy::none()).await?;
        Ok(adapter::qobuz_match(&response))
    }

    /// Map an ISRC to a Deezer track id
    pub async fn deezer_track_by_isrc(&self, isrc: &str) -> Result<String, ResolveError> {
        if isrc.trim().is_empty() {
            return Err(ResolveError::InvalidId("empty ISRC".to_string()));
        }
        let url = format!(
            "{}/track/isrc:{}",
            self.config.deezer_base_url,
            urlencoding::encode(isrc)
        );
        let response: dto::DeezerTrack = self
            .transport
            .get_json(&url, self.transport.default_policy())
            .await?;
        adapter::deezer_track_id(isrc, &response)
    }

    /// Query the aggregator for one catalog URL
    async fn fetch_links(&self, catalog_url: &str) -> Result<dto::LinksResponse, ResolveError> {
        self.limiter.until_ready().await;

        let mut url = format!(
            "{}/links?url={}",
            self.config.songlink_base_url,
            urlencoding::encode(catalog_url)
        );
        if let Some(country) = self.config.user_country.as_deref().filter(|c| !c.is_empty()) {
            url.push_str("&userCountry=");
            url.push_str(&urlencoding::encode(country));
        }

        tracing::debug!(catalog_url, "Querying link aggregator");
        self.transport
            .get_json(&url, self.transport.default_policy())
            .await
            .map_err(|e| match e {
                crate::transport::TransportError::Decode(msg) => ResolveError::Parse(msg),
                other => ResolveError::Transport(other),
            })
    }
}
