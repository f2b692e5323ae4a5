//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\songbridge\config.toml
//! - macOS: ~/Library/Application Support/songbridge/config.toml
//! - Linux: ~/.config/songbridge/config.toml
//!
//! Every section has defaults, so a partial file (or no file at all) yields
//! a usable engine configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transport::RetryPolicy;

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Outbound HTTP behaviour shared by every client
    pub network: NetworkConfig,

    /// Link aggregator and catalog search endpoints
    pub resolver: ResolverConfig,

    /// Identifier cache lifetimes
    pub cache: CacheConfig,

    /// Background pre-warm settings
    pub prewarm: PrewarmConfig,

    /// Download output and provider settings
    pub download: DownloadConfig,
}

/// Shared transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// User-Agent sent with every request
    pub user_agent: String,

    /// Per-request timeout for API calls
    pub request_timeout_secs: u64,

    /// Global outbound request budget
    pub requests_per_second: u32,

    /// Retries for idempotent requests on transient failures
    pub max_retries: u32,

    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::transport::USER_AGENT.to_string(),
            request_timeout_secs: 30,
            requests_per_second: 10,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 16_000,
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry policy derived from these settings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// Availability resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Link aggregator API root (the `/links` endpoint is appended)
    pub songlink_base_url: String,

    /// The aggregator's public quota is 10/min; stay one below it
    pub songlink_requests_per_minute: u32,

    pub qobuz_base_url: String,
    pub qobuz_app_id: String,
    pub deezer_base_url: String,

    /// Optional country hint passed to the aggregator
    pub user_country: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            songlink_base_url: "https://api.song.link/v1-alpha.1".to_string(),
            songlink_requests_per_minute: 9,
            qobuz_base_url: "https://www.qobuz.com/api.json/0.2".to_string(),
            qobuz_app_id: "798273057".to_string(),
            deezer_base_url: "https://api.deezer.com".to_string(),
            user_country: None,
        }
    }
}

/// Identifier cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of an entry after its latest write
    pub ttl_secs: u64,

    /// Minimum time between expiry sweeps
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60,
            cleanup_interval_secs: 5 * 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Pre-warm settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrewarmConfig {
    /// Maximum concurrent lookups in one batch
    pub concurrency: usize,
}

impl Default for PrewarmConfig {
    fn default() -> Self {
        Self { concurrency: 3 }
    }
}

/// Download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Default output directory (None = current directory)
    pub output_dir: Option<PathBuf>,

    /// Filename template, e.g. "{artist} - {title}"
    pub filename_template: String,

    /// Write buffer size for the output file
    pub buffer_size_kib: usize,

    /// Video-hosting conversion API endpoint
    pub conversion_url: String,

    /// Lyrics provider API root
    pub lyrics_base_url: String,

    /// Abort a transfer that receives no data for this long
    pub download_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            filename_template: crate::naming::DEFAULT_TEMPLATE.to_string(),
            buffer_size_kib: 256,
            conversion_url: "https://api.qwkuns.me".to_string(),
            lyrics_base_url: "https://lrclib.net".to_string(),
            download_timeout_secs: 120,
        }
    }
}

impl DownloadConfig {
    pub fn buffer_size(&self) -> usize {
        self.buffer_size_kib.max(1) * 1024
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Output directory, falling back to the working directory
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("songbridge"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from an explicit path, with the same fallback rules
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to the default location
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)
}

/// Save configuration to an explicit path
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

impl From<ConfigError> for crate::Error {
    fn from(e: ConfigError) -> Self {
        crate::Error::Config(e.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
