//! Per-item progress and cancellation state.
//!
//! One [`DownloadRegistry`] is shared by the whole engine. A transfer
//! registers its item id and holds the returned [`DownloadGuard`] for its
//! lifetime; dropping the guard releases the cancellation token and
//! marks progress complete on every exit path. Tokens only exist while a
//! download is live, so a late cancel never affects a later download.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Snapshot of one item's transfer progress
#[derive(Debug, Clone, Serialize)]
pub struct ItemProgress {
    pub item_id: String,
    pub current_file: String,
    pub bytes_received: u64,
    /// 0 when the size is unknown
    pub bytes_total: u64,
    /// 0.0 - 100.0; stays 0 when the size is unknown
    pub percent: f64,
    pub speed_mbps: f64,
    pub is_downloading: bool,
    #[serde(skip)]
    started_at: Instant,
}

impl ItemProgress {
    fn new(item_id: &str, current_file: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            current_file: current_file.to_string(),
            bytes_received: 0,
            bytes_total: 0,
            percent: 0.0,
            speed_mbps: 0.0,
            is_downloading: true,
            started_at: Instant::now(),
        }
    }

    fn recompute(&mut self) {
        if self.bytes_total > 0 {
            self.percent = (self.bytes_received as f64 / self.bytes_total as f64 * 100.0).min(100.0);
        }
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.speed_mbps = self.bytes_received as f64 / (1024.0 * 1024.0) / elapsed;
        }
    }
}

/// Shared progress and cancellation registry
#[derive(Default)]
pub struct DownloadRegistry {
    progress: RwLock<HashMap<String, ItemProgress>>,
    tokens: RwLock<HashMap<String, Registration>>,
}

/// A live cancellation token and how many guards hold it
struct Registration {
    token: CancellationToken,
    holders: usize,
}

impl DownloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    /// Make `item_id` cancellable without starting a progress record.
    ///
    /// Called when a request is accepted, before resolution starts, so a
    /// cancel issued during resolution reaches the later transfer. Nested
    /// guards for the same id share one token; the entry is removed when
    /// the last guard drops.
    pub fn accept(&self, item_id: &str) -> DownloadGuard<'_> {
        let token = self.hold(item_id);
        DownloadGuard {
            registry: self,
            item_id: item_id.to_string(),
            token,
            tracks_progress: false,
        }
    }

    /// Register a transfer for `item_id` and start its progress record.
    ///
    /// If the item was accepted and cancelled before the transfer began,
    /// the returned guard's token is already cancelled.
    pub fn register(&self, item_id: &str, current_file: &str) -> DownloadGuard<'_> {
        let token = self.hold(item_id);
        self.start(item_id, current_file);

        DownloadGuard {
            registry: self,
            item_id: item_id.to_string(),
            token,
            tracks_progress: true,
        }
    }

    fn hold(&self, item_id: &str) -> CancellationToken {
        let mut tokens = self.tokens.write();
        let registration = tokens
            .entry(item_id.to_string())
            .or_insert_with(|| Registration {
                token: CancellationToken::new(),
                holders: 0,
            });
        registration.holders += 1;
        registration.token.clone()
    }

    /// Request cancellation of `item_id`.
    ///
    /// Returns true if an accepted or running download was signalled. Ids
    /// with no live registration are left untouched.
    pub fn cancel(&self, item_id: &str) -> bool {
        match self.tokens.read().get(item_id) {
            Some(registration) => {
                registration.token.cancel();
                tracing::info!(item_id, "Download cancelled");
                true
            }
            None => {
                tracing::debug!(item_id, "Cancel ignored, no live download");
                false
            }
        }
    }

    pub fn is_cancelled(&self, item_id: &str) -> bool {
        self.tokens
            .read()
            .get(item_id)
            .is_some_and(|registration| registration.token.is_cancelled())
    }

    /// Ids with a live registration
    pub fn active_items(&self) -> Vec<String> {
        self.tokens.read().keys().cloned().collect()
    }

    fn release(&self, item_id: &str) {
        let mut tokens = self.tokens.write();
        if let Some(registration) = tokens.get_mut(item_id) {
            registration.holders = registration.holders.saturating_sub(1);
            if registration.holders == 0 {
                tokens.remove(item_id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Progress
    // ------------------------------------------------------------------

    /// Begin (or restart) tracking an item
    pub fn start(&self, item_id: &str, current_file: &str) {
        self.progress
            .write()
            .insert(item_id.to_string(), ItemProgress::new(item_id, current_file));
    }

    pub fn set_total(&self, item_id: &str, total: u64) {
        if let Some(progress) = self.progress.write().get_mut(item_id) {
            progress.bytes_total = total;
            progress.recompute();
        }
    }

    pub fn add_received(&self, item_id: &str, bytes: u64) {
        if let Some(progress) = self.progress.write().get_mut(item_id) {
            progress.bytes_received += bytes;
            progress.recompute();
        }
    }

    /// Mark the item finished; the last counters stay readable until removed
    pub fn complete(&self, item_id: &str) {
        if let Some(progress) = self.progress.write().get_mut(item_id) {
            progress.recompute();
            progress.is_downloading = false;
        }
    }

    pub fn snapshot(&self, item_id: &str) -> Option<ItemProgress> {
        self.progress.read().get(item_id).cloned()
    }

    pub fn all(&self) -> Vec<ItemProgress> {
        self.progress.read().values().cloned().collect()
    }

    pub fn remove(&self, item_id: &str) {
        self.progress.write().remove(item_id);
    }
}

/// Live registration of one download; releases it on drop
pub struct DownloadGuard<'a> {
    registry: &'a DownloadRegistry,
    item_id: String,
    token: CancellationToken,
    tracks_progress: bool,
}

impl DownloadGuard<'_> {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }
}

impl Drop for DownloadGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.item_id);
        if self.tracks_progress {
            self.registry.complete(&self.item_id);
        }
    }
}
