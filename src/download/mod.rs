//! Cancellable, progress-tracked audio transfers.
//!
//! # Architecture
//!
//! - [`DownloadRegistry`] - shared per-item progress and cancellation tokens
//! - [`DownloadExecutor`] - streams one response body into an [`OutputTarget`]
//! - [`ProgressWriter`] - buffered writer adapter that reports accepted bytes
//!
//! A transfer's lifecycle: register, check for early cancellation, send the
//! request, record the declared size, stream chunks (racing each read against
//! the item's cancellation token), flush, verify the byte count. Any failure
//! removes a partially written file.

mod executor;
mod output;
mod registry;
mod writer;

pub use executor::DownloadExecutor;
pub use output::OutputTarget;
pub use registry::{DownloadGuard, DownloadRegistry, ItemProgress};
pub use writer::ProgressWriter;

use crate::transport::TransportError;

/// Transfer failures
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Stopped by a cancellation request; not a failure
    #[error("Download cancelled")]
    Cancelled,

    #[error("Request failed: {0}")]
    Request(#[from] TransportError),

    #[error("Failed to open output: {0}")]
    Open(#[source] std::io::Error),

    #[error("Failed to write output: {0}")]
    Write(#[source] std::io::Error),

    #[error("Download interrupted after {written} bytes: {message}")]
    Interrupted { written: u64, message: String },

    #[error("Incomplete download: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}
