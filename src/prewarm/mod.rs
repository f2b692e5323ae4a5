//! Background cache pre-warming.
//!
//! Populates the identifier cache for tracks the user is likely to download
//! soon. Each item resolves a single target platform: the aggregator result
//! is consulted first and a direct ISRC search is the fallback. A semaphore
//! caps how many lookups run at once.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};

use crate::cache::{CachedId, IdentifierCache};
use crate::resolver::{Platform, TrackSource};
use crate::traits::{AvailabilityApi, IsrcSearchApi};

/// One track to warm
#[derive(Debug, Clone, Deserialize)]
pub struct PreWarmRequest {
    pub isrc: String,
    #[serde(default)]
    pub track_name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub spotify_id: Option<String>,
    /// Target platform name, e.g. "tidal", "qobuz", "amazon"
    pub service: String,
}

impl PreWarmRequest {
    pub fn target(&self) -> Option<Platform> {
        Platform::parse(&self.service)
    }
}

/// Parse a JSON array of pre-warm requests
pub fn parse_requests(json: &str) -> Result<Vec<PreWarmRequest>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Counts for one pre-warm batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreWarmSummary {
    pub requested: usize,
    pub skipped: usize,
    pub warmed: usize,
    pub failed: usize,
}

enum Outcome {
    Warmed,
    Failed,
}

/// Fills the identifier cache ahead of downloads
#[derive(Clone)]
pub struct CacheWarmer {
    availability: Arc<dyn AvailabilityApi>,
    search: Arc<dyn IsrcSearchApi>,
    cache: Arc<IdentifierCache>,
    gate: Arc<Semaphore>,
}

impl CacheWarmer {
    pub fn new(
        availability: Arc<dyn AvailabilityApi>,
        search: Arc<dyn IsrcSearchApi>,
        cache: Arc<IdentifierCache>,
        concurrency: usize,
    ) -> Self {
        Self {
            availability,
            search,
            cache,
            gate: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn cache(&self) -> &Arc<IdentifierCache> {
        &self.cache
    }

    /// Start warming `items` in the background and return immediately.
    ///
    /// Items with an empty ISRC, an unknown target or an already cached
    /// target field are skipped. Awaiting the handle is optional.
    pub fn pre_warm(&self, items: Vec<PreWarmRequest>) -> JoinHandle<PreWarmSummary> {
        let warmer = self.clone();
        tokio::spawn(async move { warmer.run_batch(items).await })
    }

    async fn run_batch(&self, items: Vec<PreWarmRequest>) -> PreWarmSummary {
        let mut summary = PreWarmSummary {
            requested: items.len(),
            ..Default::default()
        };
        let mut tasks = JoinSet::new();

        for item in items {
            let isrc = item.isrc.trim().to_string();
            let target = match item.target() {
                Some(target) if !isrc.is_empty() => target,
                _ => {
                    tracing::debug!(isrc = %item.isrc, service = %item.service, "Skipping pre-warm item");
                    summary.skipped += 1;
                    continue;
                }
            };
            if self.cache.has(&isrc, target) {
                summary.skipped += 1;
                continue;
            }

            let warmer = self.clone();
            tasks.spawn(async move {
                // The semaphore is never closed
                let Ok(_permit) = warmer.gate.clone().acquire_owned().await else {
                    return Outcome::Failed;
                };
                warmer.warm_one(&isrc, target, item.spotify_id.as_deref()).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Outcome::Warmed) => summary.warmed += 1,
                Ok(Outcome::Failed) => summary.failed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Pre-warm task panicked");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            requested = summary.requested,
            warmed = summary.warmed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Pre-warm batch finished"
        );
        summary
    }

    #[tracing::instrument(skip(self, spotify_id))]
    async fn warm_one(&self, isrc: &str, target: Platform, spotify_id: Option<&str>) -> Outcome {
        let source = match spotify_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => TrackSource::Spotify(id.to_string()),
            None => TrackSource::Isrc(isrc.to_string()),
        };
        // The ISRC hint only matters for the secondary catalog check
        let hint = (target == Platform::Qobuz).then_some(isrc);

        let from_aggregator = match self.availability.resolve(&source, hint).await {
            Ok(availability) => CachedId::from_availability(&availability, target),
            Err(e) => {
                tracing::debug!(error = %e, "Aggregator lookup failed, falling back to search");
                None
            }
        };

        let id = match from_aggregator {
            Some(id) => Some(id),
            None => match self.search.search_by_isrc(target, isrc).await {
                Ok(found) => found.map(CachedId::parse),
                Err(e) => {
                    tracing::debug!(error = %e, "Direct search failed");
                    None
                }
            },
        };

        match id {
            Some(id) => {
                tracing::debug!(%id, "Pre-warmed");
                self.cache.set(isrc, target, id);
                Outcome::Warmed
            }
            None => {
                tracing::debug!("No id found");
                Outcome::Failed
            }
        }
    }
}
