//! # Engine Configuration
//!
//! The explicit context object for the playback engine. Hosts construct an
//! [`EngineConfig`] once at startup through the builder, injecting every
//! collaborator the core needs; the config is then handed to the player
//! whole. Validation is fail-fast with actionable messages naming the
//! missing capability.
//!
//! ## Required collaborators
//!
//! - [`KeyValueStore`]: durable storage for snapshot + source cache
//! - [`MetadataGateway`]: catalog lookups and the personal-FM feed
//! - official + alternate [`AudioSourceProvider`]s: the primary sources
//! - [`AudioOutput`]: the playback device
//! - [`NotificationSink`]: user-visible notices
//! - [`SessionInfo`]: authentication state
//!
//! ## Optional collaborators
//!
//! - unblock [`AudioSourceProvider`] + [`UnblockConfig`]: last-resort
//!   source, gated behind `enable_unblock`
//! - [`MediaFetcher`]: required only to cache URL-resolved sources
//! - [`ListeningReporter`]: scrobbling / now-playing reports
//! - [`MediaIntegration`]: tray / lock-screen / presence hooks
//!
//! ```ignore
//! let config = EngineConfig::builder()
//!     .store(store)
//!     .metadata(gateway)
//!     .official_provider(official)
//!     .alternate_provider(alternate)
//!     .output(output)
//!     .notifications(toasts)
//!     .session(session)
//!     .cache_limit_mb(Some(2048))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use host_bridge::{
    AudioOutput, AudioSourceProvider, BitrateTier, KeyValueStore, ListeningReporter, MediaFetcher,
    MediaIntegration, MetadataGateway, NotificationSink, SessionInfo, UnblockConfig,
};
use std::sync::Arc;
use std::time::Duration;

/// Assembled engine context. Construct through [`EngineConfig::builder`].
#[derive(Clone)]
pub struct EngineConfig {
    pub store: Arc<dyn KeyValueStore>,
    pub metadata: Arc<dyn MetadataGateway>,
    pub official_provider: Arc<dyn AudioSourceProvider>,
    pub alternate_provider: Arc<dyn AudioSourceProvider>,
    pub unblock_provider: Option<Arc<dyn AudioSourceProvider>>,
    pub unblock_config: Option<UnblockConfig>,
    /// Whether the unblock fallback participates in resolution at all.
    pub enable_unblock: bool,
    pub fetcher: Option<Arc<dyn MediaFetcher>>,
    pub output: Arc<dyn AudioOutput>,
    pub notifications: Arc<dyn NotificationSink>,
    pub reporter: Option<Arc<dyn ListeningReporter>>,
    pub media_integration: Option<Arc<dyn MediaIntegration>>,
    pub session: Arc<dyn SessionInfo>,

    /// Preferred quality tier passed to providers.
    pub bitrate: BitrateTier,
    /// Source cache ceiling in bytes; `None` disables eviction entirely.
    pub cache_limit_bytes: Option<u64>,
    /// Cache successful resolutions automatically.
    pub auto_cache: bool,
    /// Grace period before a resolved source is downloaded into the cache,
    /// so the download does not compete with the just-started playback.
    pub cache_writeback_delay: Duration,
    /// Fade length wrapped around play/pause.
    pub fade_duration: Duration,
    /// Trailing debounce window for snapshot writes.
    pub persist_debounce: Duration,
    /// Personal-FM cold-start fetch attempts before giving up.
    pub fm_retry_budget: u32,
    /// Delay between personal-FM fetch attempts.
    pub fm_retry_delay: Duration,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("enable_unblock", &self.enable_unblock)
            .field("has_unblock_provider", &self.unblock_provider.is_some())
            .field("has_fetcher", &self.fetcher.is_some())
            .field("has_reporter", &self.reporter.is_some())
            .field(
                "has_media_integration",
                &self.media_integration.is_some(),
            )
            .field("bitrate", &self.bitrate)
            .field("cache_limit_bytes", &self.cache_limit_bytes)
            .field("auto_cache", &self.auto_cache)
            .field("cache_writeback_delay", &self.cache_writeback_delay)
            .field("fade_duration", &self.fade_duration)
            .field("persist_debounce", &self.persist_debounce)
            .field("fm_retry_budget", &self.fm_retry_budget)
            .field("fm_retry_delay", &self.fm_retry_delay)
            .finish()
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Re-checks invariants after construction. The builder already calls
    /// this; exposed for hosts that mutate tunables between runs.
    pub fn validate(&self) -> Result<()> {
        if self.fade_duration > Duration::from_secs(1) {
            return Err(Error::Config(format!(
                "fade_duration {:?} exceeds the 1s ceiling",
                self.fade_duration
            )));
        }

        if self.persist_debounce < Duration::from_millis(10)
            || self.persist_debounce > Duration::from_secs(10)
        {
            return Err(Error::Config(format!(
                "persist_debounce {:?} outside 10ms..10s",
                self.persist_debounce
            )));
        }

        if self.cache_limit_bytes == Some(0) {
            return Err(Error::Config(
                "cache_limit_bytes of 0 would evict every record; use None to disable eviction"
                    .to_string(),
            ));
        }

        if self.fm_retry_budget == 0 {
            return Err(Error::Config(
                "fm_retry_budget must allow at least one attempt".to_string(),
            ));
        }

        if self.enable_unblock && self.unblock_provider.is_none() {
            return Err(Error::CapabilityMissing {
                capability: "AudioSourceProvider (unblock)".to_string(),
                hint: "enable_unblock is set but no unblock provider was injected; \
                       call .unblock_provider(...) or disable the fallback"
                    .to_string(),
            });
        }

        if let Some(unblock) = &self.unblock_config {
            unblock
                .validate()
                .map_err(|reason| Error::Config(format!("unblock_config: {reason}")))?;
        }

        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Default)]
pub struct EngineConfigBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    metadata: Option<Arc<dyn MetadataGateway>>,
    official_provider: Option<Arc<dyn AudioSourceProvider>>,
    alternate_provider: Option<Arc<dyn AudioSourceProvider>>,
    unblock_provider: Option<Arc<dyn AudioSourceProvider>>,
    unblock_config: Option<UnblockConfig>,
    enable_unblock: bool,
    fetcher: Option<Arc<dyn MediaFetcher>>,
    output: Option<Arc<dyn AudioOutput>>,
    notifications: Option<Arc<dyn NotificationSink>>,
    reporter: Option<Arc<dyn ListeningReporter>>,
    media_integration: Option<Arc<dyn MediaIntegration>>,
    session: Option<Arc<dyn SessionInfo>>,
    bitrate: BitrateTier,
    cache_limit_bytes: Option<Option<u64>>,
    auto_cache: Option<bool>,
    cache_writeback_delay: Option<Duration>,
    fade_duration: Option<Duration>,
    persist_debounce: Option<Duration>,
    fm_retry_budget: Option<u32>,
    fm_retry_delay: Option<Duration>,
}

impl EngineConfigBuilder {
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn metadata(mut self, gateway: Arc<dyn MetadataGateway>) -> Self {
        self.metadata = Some(gateway);
        self
    }

    pub fn official_provider(mut self, provider: Arc<dyn AudioSourceProvider>) -> Self {
        self.official_provider = Some(provider);
        self
    }

    pub fn alternate_provider(mut self, provider: Arc<dyn AudioSourceProvider>) -> Self {
        self.alternate_provider = Some(provider);
        self
    }

    /// Injects the optional unblock provider and enables the fallback.
    pub fn unblock_provider(mut self, provider: Arc<dyn AudioSourceProvider>) -> Self {
        self.unblock_provider = Some(provider);
        self.enable_unblock = true;
        self
    }

    pub fn unblock_config(mut self, config: UnblockConfig) -> Self {
        self.unblock_config = Some(config);
        self
    }

    /// Turns the unblock fallback on or off without removing the provider.
    pub fn enable_unblock(mut self, enabled: bool) -> Self {
        self.enable_unblock = enabled;
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn MediaFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn notifications(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ListeningReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn media_integration(mut self, hooks: Arc<dyn MediaIntegration>) -> Self {
        self.media_integration = Some(hooks);
        self
    }

    pub fn session(mut self, session: Arc<dyn SessionInfo>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn bitrate(mut self, tier: BitrateTier) -> Self {
        self.bitrate = tier;
        self
    }

    /// Cache ceiling in megabytes; `None` disables eviction.
    pub fn cache_limit_mb(mut self, limit_mb: Option<u64>) -> Self {
        self.cache_limit_bytes = Some(limit_mb.map(|mb| mb * 1024 * 1024));
        self
    }

    pub fn auto_cache(mut self, enabled: bool) -> Self {
        self.auto_cache = Some(enabled);
        self
    }

    pub fn cache_writeback_delay(mut self, delay: Duration) -> Self {
        self.cache_writeback_delay = Some(delay);
        self
    }

    pub fn fade_duration(mut self, duration: Duration) -> Self {
        self.fade_duration = Some(duration);
        self
    }

    pub fn persist_debounce(mut self, window: Duration) -> Self {
        self.persist_debounce = Some(window);
        self
    }

    pub fn fm_retry_budget(mut self, attempts: u32) -> Self {
        self.fm_retry_budget = Some(attempts);
        self
    }

    pub fn fm_retry_delay(mut self, delay: Duration) -> Self {
        self.fm_retry_delay = Some(delay);
        self
    }

    /// Builds and validates the final configuration.
    pub fn build(self) -> Result<EngineConfig> {
        fn required<T>(value: Option<T>, capability: &str, hint: &str) -> Result<T> {
            value.ok_or_else(|| Error::CapabilityMissing {
                capability: capability.to_string(),
                hint: hint.to_string(),
            })
        }

        let config = EngineConfig {
            store: required(
                self.store,
                "KeyValueStore",
                "inject durable storage with .store(...); \
                 the in-memory shim from host-bridge works for ephemeral hosts",
            )?,
            metadata: required(
                self.metadata,
                "MetadataGateway",
                "inject the catalog gateway with .metadata(...)",
            )?,
            official_provider: required(
                self.official_provider,
                "AudioSourceProvider (official)",
                "inject the catalog's streaming provider with .official_provider(...)",
            )?,
            alternate_provider: required(
                self.alternate_provider,
                "AudioSourceProvider (alternate)",
                "inject the mirror provider with .alternate_provider(...)",
            )?,
            unblock_provider: self.unblock_provider,
            unblock_config: self.unblock_config,
            enable_unblock: self.enable_unblock,
            fetcher: self.fetcher,
            output: required(
                self.output,
                "AudioOutput",
                "inject the playback device with .output(...)",
            )?,
            notifications: required(
                self.notifications,
                "NotificationSink",
                "inject a notification sink with .notifications(...)",
            )?,
            reporter: self.reporter,
            media_integration: self.media_integration,
            session: required(
                self.session,
                "SessionInfo",
                "inject session state with .session(...)",
            )?,
            bitrate: self.bitrate,
            cache_limit_bytes: self
                .cache_limit_bytes
                .unwrap_or(Some(8 * 1024 * 1024 * 1024)),
            auto_cache: self.auto_cache.unwrap_or(true),
            cache_writeback_delay: self
                .cache_writeback_delay
                .unwrap_or(Duration::from_secs(10)),
            fade_duration: self.fade_duration.unwrap_or(Duration::from_millis(200)),
            persist_debounce: self.persist_debounce.unwrap_or(Duration::from_millis(500)),
            fm_retry_budget: self.fm_retry_budget.unwrap_or(5),
            fm_retry_delay: self.fm_retry_delay.unwrap_or(Duration::from_secs(1)),
        };

        config.validate()?;
        Ok(config)
    }
}
