//! Time-bound cache of catalog identifiers keyed by recording code (ISRC).
//!
//! Each entry holds per-platform ids and expires a fixed time after its most
//! recent write. Expired entries are never returned; they are dropped lazily
//! on read and by an amortized sweep that runs on writes at most once per
//! cleanup interval.
//!
//! Uses `tokio::time::Instant`, so tests can drive expiry with paused time.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::resolver::{Platform, TrackAvailability};

/// Platforms recorded from a live aggregator resolution
const RECORDED_PLATFORMS: [Platform; 4] = [
    Platform::Tidal,
    Platform::Qobuz,
    Platform::AmazonMusic,
    Platform::YouTube,
];

/// An identifier stored for one platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedId {
    /// Numeric catalog id (Tidal, Qobuz, Deezer)
    Numeric(i64),
    /// URLs (Amazon Music) and non-numeric ids such as video ids
    Url(String),
}

impl CachedId {
    /// Numeric when the id parses as one, otherwise kept as a string
    pub fn parse(id: impl AsRef<str>) -> Self {
        let id = id.as_ref();
        id.parse::<i64>()
            .map(Self::Numeric)
            .unwrap_or_else(|_| Self::Url(id.to_string()))
    }

    /// The cacheable identifier for `platform` in an availability record.
    /// Amazon Music is stored by URL, everything else by id.
    pub fn from_availability(availability: &TrackAvailability, platform: Platform) -> Option<Self> {
        if platform == Platform::AmazonMusic {
            return availability
                .url(platform)
                .map(|url| Self::Url(url.to_string()));
        }
        availability.id(platform).map(Self::parse)
    }

    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            Self::Numeric(id) => Some(*id),
            Self::Url(_) => None,
        }
    }

    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Numeric(_) => None,
        }
    }
}

impl std::fmt::Display for CachedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Snapshot of one cached recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    ids: BTreeMap<Platform, CachedId>,
    expires_at: Instant,
}

impl CacheEntry {
    pub fn get(&self, platform: Platform) -> Option<&CachedId> {
        self.ids.get(&platform)
    }

    pub fn tidal_id(&self) -> Option<i64> {
        self.get(Platform::Tidal).and_then(CachedId::as_numeric)
    }

    pub fn qobuz_id(&self) -> Option<i64> {
        self.get(Platform::Qobuz).and_then(CachedId::as_numeric)
    }

    pub fn amazon_url(&self) -> Option<&str> {
        self.get(Platform::AmazonMusic).and_then(CachedId::as_url)
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

struct Inner {
    entries: HashMap<String, CacheEntry>,
    last_sweep: Option<Instant>,
    sweeps: u64,
}

/// Concurrent identifier cache.
///
/// Reads take a shared lock; only writes and expiry removal are exclusive.
/// Concurrent writes to the same field are last-writer-wins.
pub struct IdentifierCache {
    inner: RwLock<Inner>,
    ttl: Duration,
    cleanup_interval: Duration,
}

impl IdentifierCache {
    pub fn new(ttl: Duration, cleanup_interval: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                last_sweep: None,
                sweeps: 0,
            }),
            ttl,
            cleanup_interval,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.cleanup_interval())
    }

    /// Fresh entry for `code`, or None if absent or expired.
    pub fn get(&self, code: &str) -> Option<CacheEntry> {
        {
            let inner = self.inner.read();
            match inner.entries.get(code) {
                None => return None,
                Some(entry) if !entry.is_expired(Instant::now()) => return Some(entry.clone()),
                Some(_) => {}
            }
        }

        // Re-check under the exclusive lock: a writer may have refreshed it
        let mut inner = self.inner.write();
        let now = Instant::now();
        match inner.entries.get(code) {
            Some(entry) if !entry.is_expired(now) => Some(entry.clone()),
            Some(_) => {
                inner.entries.remove(code);
                tracing::trace!(code, "Dropped expired cache entry");
                None
            }
            None => None,
        }
    }

    /// Whether a fresh entry holds an id for `platform`
    pub fn has(&self, code: &str, platform: Platform) -> bool {
        self.get(code).is_some_and(|entry| entry.get(platform).is_some())
    }

    /// Store one platform id, creating the entry if needed and extending its
    /// expiry. Runs the expiry sweep when the cleanup interval has elapsed.
    pub fn set(&self, code: &str, platform: Platform, id: CachedId) {
        let mut inner = self.inner.write();
        let now = Instant::now();
        let expires_at = now + self.ttl;

        let entry = inner
            .entries
            .entry(code.to_string())
            .or_insert_with(|| CacheEntry {
                ids: BTreeMap::new(),
                expires_at,
            });
        entry.ids.insert(platform, id);
        entry.expires_at = expires_at;

        let sweep_due = inner
            .last_sweep
            .is_none_or(|last| now.duration_since(last) >= self.cleanup_interval);
        if sweep_due {
            let before = inner.entries.len();
            inner.entries.retain(|_, entry| !entry.is_expired(now));
            inner.last_sweep = Some(now);
            inner.sweeps += 1;
            let removed = before - inner.entries.len();
            if removed > 0 {
                tracing::debug!(removed, remaining = inner.entries.len(), "Swept expired cache entries");
            }
        }
    }

    pub fn set_tidal_id(&self, code: &str, id: i64) {
        self.set(code, Platform::Tidal, CachedId::Numeric(id));
    }

    pub fn set_qobuz_id(&self, code: &str, id: i64) {
        self.set(code, Platform::Qobuz, CachedId::Numeric(id));
    }

    pub fn set_amazon_url(&self, code: &str, url: impl Into<String>) {
        self.set(code, Platform::AmazonMusic, CachedId::Url(url.into()));
    }

    /// Store every recorded platform id present in `availability`.
    /// Returns how many ids were written.
    pub fn record_availability(&self, code: &str, availability: &TrackAvailability) -> usize {
        let mut written = 0;
        for platform in RECORDED_PLATFORMS {
            if let Some(id) = CachedId::from_availability(availability, platform) {
                self.set(code, platform, id);
                written += 1;
            }
        }
        if written > 0 {
            tracing::debug!(code, written, "Recorded resolved ids");
        }
        written
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.inner.write().entries.clear();
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn size(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// How many expiry sweeps have run
    pub fn sweep_count(&self) -> u64 {
        self.inner.read().sweeps
    }
}

impl Default for IdentifierCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
