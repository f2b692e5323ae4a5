//! End-to-end download pipeline.
//!
//! For one [`DownloadRequest`]:
//!
//! 1. Validate identifiers and register the item so it can be cancelled;
//!    optionally skip when the ISRC is already on disk
//! 2. Resolve a watch URL through the [`FallbackChain`]
//! 3. Ask the conversion provider for an audio tunnel (one shot)
//! 4. Stream the tunnel into the output while cover art and lyrics are
//!    fetched concurrently
//! 5. Return a [`DownloadResult`]
//!
//! Any stage failure ends the pipeline with a stage-specific error. A cancel
//! that arrives during resolution or conversion ends it before the transfer
//! starts. The item is deregistered on every exit.

mod chain;
mod conversion;

pub use chain::{FallbackChain, ResolvedSource, ResolvedVia};
pub use conversion::{ConversionClient, ConversionError, Tunnel};

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::assets::{LyricsQuery, SideAssetFetcher, SideAssetRequest};
use crate::cache::IdentifierCache;
use crate::config::DownloadConfig;
use crate::download::{DownloadError, DownloadExecutor, OutputTarget};
use crate::duplicate;
use crate::model::{DownloadRequest, DownloadResult, OutputDestination};
use crate::naming::FilenameRenderer;
use crate::traits::{AvailabilityApi, ConversionApi};

/// Runs download requests through the full pipeline
pub struct DownloadService {
    chain: FallbackChain,
    conversion: Arc<dyn ConversionApi>,
    executor: Arc<DownloadExecutor>,
    assets: SideAssetFetcher,
    renderer: Arc<dyn FilenameRenderer>,
    default_template: String,
}

impl DownloadService {
    pub fn new(
        availability: Arc<dyn AvailabilityApi>,
        cache: Arc<IdentifierCache>,
        conversion: Arc<dyn ConversionApi>,
        executor: Arc<DownloadExecutor>,
        assets: SideAssetFetcher,
        renderer: Arc<dyn FilenameRenderer>,
        config: &DownloadConfig,
    ) -> Self {
        Self {
            chain: FallbackChain::new(availability, cache),
            conversion,
            executor,
            assets,
            renderer,
            default_template: config.filename_template.clone(),
        }
    }

    pub fn executor(&self) -> &Arc<DownloadExecutor> {
        &self.executor
    }

    /// Run one request to completion
    #[tracing::instrument(skip(self, request), fields(item_id = %request.item_id))]
    pub async fn download(&self, request: DownloadRequest) -> crate::Result<DownloadResult> {
        request.validate()?;
        let accepted = self.executor.registry().accept(&request.item_id);
        let token = accepted.token();

        let DownloadRequest {
            item_id,
            isrc,
            metadata,
            quality,
            output,
            embed_lyrics,
            cover_url,
            max_quality_cover,
            skip_existing,
            ..
        } = &request;
        let isrc = isrc.as_deref().map(str::trim).filter(|s| !s.is_empty());

        if *skip_existing
            && let (Some(code), OutputDestination::Directory { dir, .. }) = (isrc, output)
            && let Some(existing) = duplicate::find_existing_by_isrc(dir, code).await
        {
            tracing::info!(path = %existing.display(), isrc = code, "Track already downloaded, skipping");
            return Ok(DownloadResult {
                file_path: Some(existing),
                already_exists: true,
                ..DownloadResult::for_track(metadata, isrc, *quality)
            });
        }

        let source = unless_cancelled(token, self.chain.resolve(&request)).await?;
        let tunnel = unless_cancelled(token, async {
            self.conversion
                .request_tunnel(&source.watch_url, *quality)
                .await
                .map_err(crate::Error::from)
        })
        .await?;

        let asset_request = SideAssetRequest {
            cover_url: cover_url.clone(),
            max_quality_cover: *max_quality_cover,
            lyrics: embed_lyrics.then(|| LyricsQuery {
                track_name: metadata.title.clone(),
                artist_name: metadata.artist.clone(),
                album_name: metadata.album.clone(),
                duration: metadata.duration,
            }),
        };

        let mut result = DownloadResult::for_track(metadata, isrc, *quality);
        let item_id = item_id.clone();

        let (target, file_path) = self.output_target(request)?;
        let (assets, transfer) = tokio::join!(
            self.assets.fetch(&asset_request),
            self.executor.download(&tunnel.url, target, &item_id),
        );
        result.bytes_written = transfer?;
        result.file_path = file_path;

        result.asset_errors = assets.errors().cloned().collect();
        result.lyrics_lrc = assets.lyrics_lrc;
        result.cover_data = assets.cover.map(|cover| cover.data);

        tracing::info!(
            bytes = result.bytes_written,
            path = ?result.file_path,
            asset_errors = result.asset_errors.len(),
            "Download finished"
        );
        Ok(result)
    }

    /// Turn the request's destination into a writable target
    fn output_target(
        &self,
        request: DownloadRequest,
    ) -> crate::Result<(OutputTarget, Option<PathBuf>)> {
        match request.output {
            OutputDestination::Directory {
                dir,
                filename_template,
            } => {
                let template = filename_template
                    .as_deref()
                    .unwrap_or(self.default_template.as_str());
                let name = self
                    .renderer
                    .file_name(template, &request.metadata, request.quality);
                let path = dir.join(name);
                Ok((OutputTarget::Path(path.clone()), Some(path)))
            }
            OutputDestination::Target(target) => {
                let path = target.cleanup_path().map(|p| p.to_path_buf());
                Ok((target, path))
            }
        }
    }
}

/// Run `work` unless the item is cancelled first
async fn unless_cancelled<T>(
    token: &CancellationToken,
    work: impl Future<Output = crate::Result<T>>,
) -> crate::Result<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::info!("Cancelled before transfer");
            Err(DownloadError::Cancelled.into())
        }
        result = work => result,
    }
}
