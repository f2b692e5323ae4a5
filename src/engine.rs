//! The shared service object.
//!
//! One `Engine` owns the HTTP transport, identifier cache, download
//! registry and every API client, so rate limits and connections are shared
//! by all callers. Construct it with [`Engine::new`] and pass it around, or
//! use [`Engine::global`] for a lazily built process-wide instance.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::assets::{CoverClient, LyricsClient, SideAssetFetcher};
use crate::cache::IdentifierCache;
use crate::config::{self, Config};
use crate::error::ResultExt;
use crate::download::{DownloadExecutor, DownloadRegistry, ItemProgress};
use crate::model::{DownloadRequest, DownloadResult};
use crate::naming::TemplateRenderer;
use crate::orchestrator::{ConversionClient, DownloadService};
use crate::prewarm::{CacheWarmer, PreWarmRequest, PreWarmSummary};
use crate::resolver::AvailabilityClient;
use crate::transport::HttpTransport;

static GLOBAL: OnceLock<Engine> = OnceLock::new();
static GLOBAL_INIT: Mutex<()> = Mutex::new(());

pub struct Engine {
    config: Config,
    transport: Arc<HttpTransport>,
    resolver: Arc<AvailabilityClient>,
    cache: Arc<IdentifierCache>,
    registry: Arc<DownloadRegistry>,
    warmer: CacheWarmer,
    downloads: DownloadService,
}

impl Engine {
    pub fn new(config: Config) -> crate::Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config.network)?);
        let resolver = Arc::new(AvailabilityClient::new(transport.clone(), &config.resolver));
        let cache = Arc::new(IdentifierCache::from_config(&config.cache));
        let registry = Arc::new(DownloadRegistry::new());

        let warmer = CacheWarmer::new(
            resolver.clone(),
            resolver.clone(),
            cache.clone(),
            config.prewarm.concurrency,
        );

        let executor = Arc::new(DownloadExecutor::new(
            transport.clone(),
            registry.clone(),
            &config.download,
        ));
        let assets = SideAssetFetcher::new(
            Arc::new(CoverClient::new(transport.clone())),
            Arc::new(LyricsClient::new(
                transport.clone(),
                config.download.lyrics_base_url.clone(),
            )),
        );
        let conversion = Arc::new(ConversionClient::new(
            transport.clone(),
            config.download.conversion_url.clone(),
        ));
        let downloads = DownloadService::new(
            resolver.clone(),
            cache.clone(),
            conversion,
            executor,
            assets,
            Arc::new(TemplateRenderer),
            &config.download,
        );

        tracing::debug!("Engine initialized");
        Ok(Self {
            config,
            transport,
            resolver,
            cache,
            registry,
            warmer,
            downloads,
        })
    }

    /// Process-wide engine built from the default config file on first use
    pub fn global() -> crate::Result<&'static Engine> {
        if let Some(engine) = GLOBAL.get() {
            return Ok(engine);
        }
        let _init = GLOBAL_INIT.lock();
        if let Some(engine) = GLOBAL.get() {
            return Ok(engine);
        }
        let engine = Engine::new(config::load())?;
        Ok(GLOBAL.get_or_init(|| engine))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &Arc<HttpTransport> {
        &self.transport
    }

    pub fn resolver(&self) -> &Arc<AvailabilityClient> {
        &self.resolver
    }

    pub fn cache(&self) -> &Arc<IdentifierCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<DownloadRegistry> {
        &self.registry
    }

    /// Run one download through the full pipeline
    pub async fn download(&self, request: DownloadRequest) -> crate::Result<DownloadResult> {
        let item_id = request.item_id.clone();
        self.downloads
            .download(request)
            .await
            .with_context(format!("item {item_id}"))
    }

    /// Start a background pre-warm batch
    pub fn pre_warm(&self, items: Vec<PreWarmRequest>) -> tokio::task::JoinHandle<PreWarmSummary> {
        self.warmer.pre_warm(items)
    }

    /// Cancel a download by item id. Returns true if it was running.
    pub fn cancel(&self, item_id: &str) -> bool {
        self.registry.cancel(item_id)
    }

    pub fn progress(&self, item_id: &str) -> Option<ItemProgress> {
        self.registry.snapshot(item_id)
    }
}
