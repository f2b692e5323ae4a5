//! Songbridge - cross-catalog track resolution and download engine.
//!
//! Resolves a track identified on one streaming catalog to equivalent links
//! on other catalogs, then runs a cancellable, progress-tracked download of
//! the chosen audio asset while cover art and lyrics are fetched alongside.
//!
//! # Architecture
//!
//! - **Transport** (`transport`) - shared rate-limited HTTP client with retry
//! - **Resolver** (`resolver`) - link-aggregator and catalog-search lookups
//! - **Cache** (`cache`) - time-bound recording-code to catalog-id store
//! - **Pre-warm** (`prewarm`) - background batch population of the cache
//! - **Assets** (`assets`) - parallel cover art and lyrics fetching
//! - **Download** (`download`) - streaming transfer with cancellation
//! - **Orchestrator** (`orchestrator`) - fallback chain and full pipeline
//! - **Engine** (`engine`) - the shared service object wiring it all together

pub mod assets;
pub mod cache;
pub mod cli;
pub mod config;
pub mod download;
pub mod duplicate;
pub mod engine;
pub mod error;
pub mod model;
pub mod naming;
pub mod orchestrator;
pub mod prewarm;
pub mod resolver;
#[cfg(test)]
pub mod test_utils;
pub mod traits;
pub mod transport;

pub use engine::Engine;
pub use error::{Error, Result};
