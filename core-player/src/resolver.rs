//! # Audio Source Resolution
//!
//! Resolves a track to playable audio through the local cache and a chain
//! of partially-unreliable remote providers.
//!
//! - Cache hit: returned immediately, no provider invoked.
//! - Unauthenticated: providers strictly in sequence: the official
//!   provider's guest endpoint, then the unblock fallback if configured.
//! - Authenticated: both primary providers start concurrently. The
//!   priority provider (official for paid accounts, alternate otherwise)
//!   races an adaptive timeout derived from its recent latency history; if
//!   the timeout wins, the in-flight call is *not* cancelled; the
//!   already-started other provider is awaited instead, then the unblock
//!   fallback.
//!
//! Provider errors are swallowed and treated as empty results; total
//! exhaustion is the first-class [`Resolution::Unavailable`] value, not an
//! error. Every successful non-cache resolution schedules a delayed cache
//! write-back so the download does not compete with the just-started
//! playback for bandwidth.

use crate::cache::{CachedSourceRecord, SourceCache};
use bytes::Bytes;
use chrono::Utc;
use core_runtime::config::EngineConfig;
use host_bridge::provider::ProviderKind;
use host_bridge::{
    AudioSourceProvider, MediaFetcher, MediaSource, ResolvedSource, SessionInfo, SourceHints,
    SubscriptionTier, Track,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Samples kept per provider for the adaptive timeout.
const LATENCY_WINDOW: usize = 10;
const MIN_TIMEOUT: Duration = Duration::from_millis(1000);
const MAX_TIMEOUT: Duration = Duration::from_millis(5000);
/// Defaults used while a provider has no latency history yet. The
/// alternate mirror is slower on cold paths, so it gets more headroom.
const DEFAULT_OFFICIAL_TIMEOUT: Duration = Duration::from_millis(1000);
const DEFAULT_ALTERNATE_TIMEOUT: Duration = Duration::from_millis(2500);

/// Outcome of a resolution attempt. `Unavailable` means the whole chain
/// (cache + providers) came up empty, distinct from provider-level
/// errors, which are absorbed along the way.
#[derive(Debug, Clone)]
pub enum Resolution {
    Source(ResolvedSource),
    Unavailable,
}

impl Resolution {
    pub fn is_available(&self) -> bool {
        matches!(self, Resolution::Source(_))
    }
}

/// Per-provider ring buffer of recently observed resolution latencies.
/// Never persisted; its only consumer is the adaptive timeout.
#[derive(Default)]
pub struct LatencyRegistry {
    samples: Mutex<HashMap<ProviderKind, VecDeque<Duration>>>,
}

impl LatencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: ProviderKind, latency: Duration) {
        let mut samples = self.samples.lock();
        let ring = samples.entry(kind).or_default();
        ring.push_back(latency);
        while ring.len() > LATENCY_WINDOW {
            ring.pop_front();
        }
    }

    /// `clamp(rolling average * 1.5, 1s, 5s)`, or the provider's fixed
    /// default when no history exists.
    pub fn adaptive_timeout(&self, kind: ProviderKind) -> Duration {
        let samples = self.samples.lock();
        let Some(ring) = samples.get(&kind).filter(|ring| !ring.is_empty()) else {
            return match kind {
                ProviderKind::Official => DEFAULT_OFFICIAL_TIMEOUT,
                _ => DEFAULT_ALTERNATE_TIMEOUT,
            };
        };

        let total: Duration = ring.iter().sum();
        let average = total / ring.len() as u32;
        (average + average / 2).clamp(MIN_TIMEOUT, MAX_TIMEOUT)
    }
}

/// Multi-provider audio source resolver.
pub struct SourceResolver {
    cache: Arc<SourceCache>,
    official: Arc<dyn AudioSourceProvider>,
    alternate: Arc<dyn AudioSourceProvider>,
    unblock: Option<Arc<dyn AudioSourceProvider>>,
    unblock_enabled: bool,
    fetcher: Option<Arc<dyn MediaFetcher>>,
    session: Arc<dyn SessionInfo>,
    hints_bitrate: host_bridge::BitrateTier,
    auto_cache: bool,
    writeback_delay: Duration,
    latency: Arc<LatencyRegistry>,
}

impl SourceResolver {
    pub fn new(config: &EngineConfig, cache: Arc<SourceCache>) -> Self {
        Self {
            cache,
            official: config.official_provider.clone(),
            alternate: config.alternate_provider.clone(),
            unblock: config.unblock_provider.clone(),
            unblock_enabled: config.enable_unblock,
            fetcher: config.fetcher.clone(),
            session: config.session.clone(),
            hints_bitrate: config.bitrate,
            auto_cache: config.auto_cache,
            writeback_delay: config.cache_writeback_delay,
            latency: Arc::new(LatencyRegistry::new()),
        }
    }

    /// Latency bookkeeping, exposed for diagnostics and tests.
    pub fn latency(&self) -> &LatencyRegistry {
        &self.latency
    }

    /// Resolves `track` to a playable source.
    pub async fn resolve(&self, track: &Track) -> Resolution {
        match self.cache.get(track.id).await {
            Ok(Some(record)) => {
                debug!(track_id = %track.id, "resolved from cache");
                return Resolution::Source(ResolvedSource {
                    media: MediaSource::Bytes(Bytes::from(record.bytes)),
                    bitrate: record.bitrate,
                    provider_tag: record.provider_tag,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(track_id = %track.id, error = %e, "cache lookup failed"),
        }

        let authenticated = self.session.is_authenticated();
        let hints = SourceHints {
            bitrate: self.hints_bitrate,
            authenticated,
        };

        let resolved = if authenticated {
            self.resolve_racing(track, &hints).await
        } else {
            self.resolve_sequential(track, &hints).await
        };

        match resolved {
            Some(source) => {
                self.schedule_writeback(track, &source);
                Resolution::Source(source)
            }
            None => {
                debug!(track_id = %track.id, "every source exhausted");
                Resolution::Unavailable
            }
        }
    }

    /// Guest chain: official free-tier endpoint, then the unblock
    /// fallback; first success wins.
    async fn resolve_sequential(&self, track: &Track, hints: &SourceHints) -> Option<ResolvedSource> {
        if let Some(source) = self.call_recorded(&self.official, track, hints).await {
            return Some(source);
        }
        self.try_unblock(track, hints).await
    }

    /// Authenticated chain: both primaries start at once; the priority
    /// provider races its adaptive timeout. A timeout does not cancel the
    /// in-flight call; the task keeps running and still records its
    /// latency; only its result goes unused.
    async fn resolve_racing(&self, track: &Track, hints: &SourceHints) -> Option<ResolvedSource> {
        let official = self.spawn_provider(self.official.clone(), track, hints);
        let alternate = self.spawn_provider(self.alternate.clone(), track, hints);

        let paid = self.session.subscription() == SubscriptionTier::Paid;
        let (mut priority, fallback, priority_kind) = if paid {
            (official, alternate, ProviderKind::Official)
        } else {
            (alternate, official, ProviderKind::Alternate)
        };

        let budget = self.latency.adaptive_timeout(priority_kind);
        let from_priority = match tokio::time::timeout(budget, &mut priority).await {
            Ok(joined) => joined.ok().flatten(),
            Err(_) => {
                debug!(
                    track_id = %track.id,
                    provider = priority_kind.as_str(),
                    timeout_ms = budget.as_millis() as u64,
                    "priority provider timed out; awaiting the other provider"
                );
                None
            }
        };
        if let Some(source) = from_priority {
            return Some(source);
        }

        if let Some(source) = fallback.await.ok().flatten() {
            return Some(source);
        }

        self.try_unblock(track, hints).await
    }

    /// Runs one provider on its own task so a lost race or a superseded
    /// resolution never cancels it mid-flight.
    fn spawn_provider(
        &self,
        provider: Arc<dyn AudioSourceProvider>,
        track: &Track,
        hints: &SourceHints,
    ) -> JoinHandle<Option<ResolvedSource>> {
        let latency = self.latency.clone();
        let track = track.clone();
        let hints = hints.clone();
        tokio::spawn(async move {
            call_provider(&*provider, &track, &hints, Some(latency.as_ref())).await
        })
    }

    async fn call_recorded(
        &self,
        provider: &Arc<dyn AudioSourceProvider>,
        track: &Track,
        hints: &SourceHints,
    ) -> Option<ResolvedSource> {
        call_provider(&**provider, track, hints, Some(self.latency.as_ref())).await
    }

    async fn try_unblock(&self, track: &Track, hints: &SourceHints) -> Option<ResolvedSource> {
        if !self.unblock_enabled {
            return None;
        }
        let provider = self.unblock.as_ref()?;
        debug!(track_id = %track.id, "primary providers empty; trying unblock fallback");
        call_provider(&**provider, track, hints, None).await
    }

    /// Schedules the deferred cache write-back for a freshly resolved
    /// source. URL sources are downloaded through the injected fetcher;
    /// without one they simply are not cached. Failures are logged and
    /// never retried.
    fn schedule_writeback(&self, track: &Track, source: &ResolvedSource) {
        if !self.auto_cache {
            return;
        }

        let cache = self.cache.clone();
        let fetcher = self.fetcher.clone();
        let delay = self.writeback_delay;
        let track_id = track.id;
        let source = source.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let bytes = match &source.media {
                MediaSource::Bytes(bytes) => bytes.clone(),
                MediaSource::Url(url) => {
                    let Some(fetcher) = fetcher else {
                        trace!(track_id = %track_id, "no media fetcher; skipping write-back");
                        return;
                    };
                    match fetcher.fetch(url).await {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            warn!(track_id = %track_id, error = %e, "cache download failed");
                            return;
                        }
                    }
                }
            };

            let record = CachedSourceRecord {
                track_id,
                bytes: bytes.to_vec(),
                bitrate: source.bitrate,
                provider_tag: source.provider_tag.clone(),
                inserted_at: Utc::now(),
            };
            if let Err(e) = cache.put(record).await {
                warn!(track_id = %track_id, error = %e, "cache write-back failed");
            }
        });
    }
}

/// One provider call: measures latency, records it on success, swallows
/// errors into "empty", and upgrades URL sources to https.
async fn call_provider(
    provider: &dyn AudioSourceProvider,
    track: &Track,
    hints: &SourceHints,
    latency: Option<&LatencyRegistry>,
) -> Option<ResolvedSource> {
    let kind = provider.kind();
    let started = Instant::now();
    match provider.resolve(track, hints).await {
        Ok(Some(source)) => {
            let elapsed = started.elapsed();
            if let Some(latency) = latency {
                latency.record(kind, elapsed);
            }
            debug!(
                track_id = %track.id,
                provider = kind.as_str(),
                latency_ms = elapsed.as_millis() as u64,
                "provider resolved a source"
            );
            Some(ResolvedSource {
                media: source.media.into_secure(),
                bitrate: source.bitrate,
                provider_tag: source.provider_tag,
            })
        }
        Ok(None) => {
            trace!(track_id = %track.id, provider = kind.as_str(), "provider had no source");
            None
        }
        Err(e) => {
            debug!(
                track_id = %track.id,
                provider = kind.as_str(),
                error = %e,
                "provider failed; treating as empty"
            );
            None
        }
    }
}
