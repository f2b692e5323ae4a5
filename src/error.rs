//! Engine-wide error types.
//!
//! This module provides a unified error hierarchy for the engine.
//! Library modules use specific error types via `thiserror`, while
//! the CLI uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level error enum, one variant per pipeline stage
//! - Module-specific errors ([`TransportError`], [`ResolveError`],
//!   [`ConversionError`], [`DownloadError`]) for detailed handling
//! - Cancellation is not a failure: check [`Error::is_cancelled`]

use crate::download::DownloadError;
use crate::orchestrator::ConversionError;
use crate::resolver::ResolveError;
use crate::transport::TransportError;

/// Engine-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level engine error.
///
/// Aggregates errors from all subsystems. A failed download surfaces exactly
/// one of these, naming the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network or protocol error outside a specific stage
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Availability lookup failed
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// No source in the fallback chain produced a playable URL
    #[error("No resolvable source (attempted: {})", format_attempted(.attempted))]
    Resolution { attempted: Vec<String> },

    /// The conversion provider refused or returned nothing usable
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Byte transfer failed or was cancelled
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// Missing identifiers or invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

fn format_attempted(attempted: &[String]) -> String {
    if attempted.is_empty() {
        "none".to_string()
    } else {
        attempted.join(", ")
    }
}

impl Error {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error is a user-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Download(DownloadError::Cancelled) => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Short name of the pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Resolve(_) | Self::Resolution { .. } => "resolution",
            Self::Conversion(_) => "conversion",
            Self::Download(_) => "transfer",
            Self::Config(_) => "configuration",
            Self::Io(_) | Self::Transport(_) => "io",
            Self::WithContext { source, .. } => source.stage(),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}
