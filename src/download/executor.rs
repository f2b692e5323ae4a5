//! Streaming transfer of one audio asset to its output target.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Response;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;

use super::output::{OutputTarget, remove_partial};
use super::writer::ProgressWriter;
use super::{DownloadError, DownloadRegistry};
use crate::config::DownloadConfig;
use crate::transport::{HttpTransport, RetryPolicy};

/// Runs cancellable, progress-tracked downloads
pub struct DownloadExecutor {
    transport: Arc<HttpTransport>,
    registry: Arc<DownloadRegistry>,
    buffer_size: usize,
    idle_timeout: Duration,
}

impl DownloadExecutor {
    pub fn new(
        transport: Arc<HttpTransport>,
        registry: Arc<DownloadRegistry>,
        config: &DownloadConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            buffer_size: config.buffer_size(),
            idle_timeout: config.download_timeout(),
        }
    }

    pub fn registry(&self) -> &Arc<DownloadRegistry> {
        &self.registry
    }

    /// Download `url` into `target`, tracked under `item_id`.
    ///
    /// Returns the number of bytes written. On any failure a partially
    /// written path target is removed; caller-supplied handles are left as is.
    #[tracing::instrument(skip(self, target))]
    pub async fn download(
        &self,
        url: &str,
        target: OutputTarget,
        item_id: &str,
    ) -> Result<u64, DownloadError> {
        let guard = self.registry.register(item_id, &target.display_name());
        let token = guard.token().clone();

        if token.is_cancelled() {
            tracing::info!("Download cancelled before start");
            return Err(DownloadError::Cancelled);
        }

        let request = self
            .transport
            .get(url)
            .build()
            .map_err(|e| DownloadError::Request(e.into()))?;

        let response = tokio::select! {
            biased;
            () = token.cancelled() => return Err(DownloadError::Cancelled),
            result = self.transport.send(request, RetryPolicy::none()) => result?,
        };

        let expected = response.content_length().filter(|len| *len > 0);
        if let Some(total) = expected {
            self.registry.set_total(item_id, total);
        }

        let cleanup = target.cleanup_path().map(Path::to_path_buf);
        let file = target.open().await.map_err(DownloadError::Open)?;

        let result = self
            .stream_body(response, file, item_id, &token)
            .await
            .map_err(|e| {
                if token.is_cancelled() {
                    DownloadError::Cancelled
                } else {
                    e
                }
            })
            .and_then(|written| match expected {
                Some(expected) if written != expected => Err(DownloadError::SizeMismatch {
                    expected,
                    actual: written,
                }),
                _ => Ok(written),
            })
            .or_else(|e| match (e, expected) {
                // The body ended early: report it as an incomplete file
                (DownloadError::Interrupted { written, message }, Some(expected))
                    if written < expected =>
                {
                    tracing::debug!(%message, "Body ended before declared length");
                    Err(DownloadError::SizeMismatch {
                        expected,
                        actual: written,
                    })
                }
                (e, _) => Err(e),
            });

        match &result {
            Ok(written) => tracing::info!(bytes = written, "Download complete"),
            Err(e) => {
                if let Some(path) = cleanup.as_deref() {
                    remove_partial(path).await;
                }
                if matches!(e, DownloadError::Cancelled) {
                    tracing::info!("Download cancelled");
                } else {
                    tracing::warn!(error = %e, "Download failed");
                }
            }
        }

        drop(guard);
        result
    }

    async fn stream_body(
        &self,
        response: Response,
        file: tokio::fs::File,
        item_id: &str,
        token: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        let buffered = BufWriter::with_capacity(self.buffer_size, file);
        let mut writer = ProgressWriter::new(buffered, Arc::clone(&self.registry), item_id);
        let mut body = std::pin::pin!(response.bytes_stream());

        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => return Err(DownloadError::Cancelled),
                next = tokio::time::timeout(self.idle_timeout, body.next()) => next,
            };

            let chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    return Err(DownloadError::Interrupted {
                        written: writer.written(),
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    return Err(DownloadError::Interrupted {
                        written: writer.written(),
                        message: format!("no data received for {:?}", self.idle_timeout),
                    });
                }
            };

            writer.write_all(&chunk).await.map_err(DownloadError::Write)?;
        }

        writer.flush().await.map_err(DownloadError::Write)?;
        let written = writer.written();

        let mut file = writer.into_inner().into_inner();
        file.flush().await.map_err(DownloadError::Write)?;
        Ok(written)
    }
}
