//! Shared mock collaborators for the integration suites.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use host_bridge::provider::ProviderKind;
use host_bridge::{
    AudioOutput, AudioSourceProvider, BridgeError, KeyValueStore, ListeningReporter, MediaFetcher,
    MediaSource, MemoryKeyValueStore, MetadataGateway, NotificationSink, OutputEvent, OutputHandle,
    ResolvedSource, SessionInfo, SourceHints, SubscriptionTier, Track, TrackId,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub fn make_track(id: u64) -> Track {
    Track {
        id: TrackId(id),
        title: format!("Track {id}"),
        artist: "Test Artist".into(),
        album: "Test Album".into(),
        duration_ms: 180_000,
        track_number: Some(1),
        artwork_url: None,
    }
}

// ---------------------------------------------------------------------------
// Metadata gateway
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedGateway {
    failing_tracks: Mutex<HashSet<u64>>,
    albums: Mutex<HashMap<u64, Vec<TrackId>>>,
    playlists: Mutex<HashMap<u64, Vec<TrackId>>>,
    artists: Mutex<HashMap<u64, Vec<TrackId>>>,
    /// Upcoming personal-FM responses; an exhausted queue keeps returning
    /// empty batches.
    fm_batches: Mutex<VecDeque<Result<Vec<Track>, BridgeError>>>,
    pub fm_calls: AtomicUsize,
    pub trashed: Mutex<Vec<TrackId>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_track(&self, id: u64) {
        self.failing_tracks.lock().insert(id);
    }

    pub fn set_album(&self, id: u64, tracks: &[u64]) {
        self.albums
            .lock()
            .insert(id, tracks.iter().copied().map(TrackId).collect());
    }

    pub fn push_fm_batch(&self, batch: Vec<Track>) {
        self.fm_batches.lock().push_back(Ok(batch));
    }

    pub fn push_fm_error(&self) {
        self.fm_batches
            .lock()
            .push_back(Err(BridgeError::Remote("feed down".into())));
    }
}

#[async_trait]
impl MetadataGateway for ScriptedGateway {
    async fn track_detail(&self, id: TrackId) -> host_bridge::Result<Track> {
        if self.failing_tracks.lock().contains(&id.0) {
            return Err(BridgeError::Remote(format!("no detail for {id}")));
        }
        Ok(make_track(id.0))
    }

    async fn album_tracks(&self, album_id: u64) -> host_bridge::Result<Vec<TrackId>> {
        Ok(self.albums.lock().get(&album_id).cloned().unwrap_or_default())
    }

    async fn artist_tracks(&self, artist_id: u64) -> host_bridge::Result<Vec<TrackId>> {
        Ok(self
            .artists
            .lock()
            .get(&artist_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn playlist_tracks(&self, playlist_id: u64) -> host_bridge::Result<Vec<TrackId>> {
        Ok(self
            .playlists
            .lock()
            .get(&playlist_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn personal_fm(&self) -> host_bridge::Result<Vec<Track>> {
        self.fm_calls.fetch_add(1, Ordering::SeqCst);
        match self.fm_batches.lock().pop_front() {
            Some(result) => result,
            None => Ok(Vec::new()),
        }
    }

    async fn fm_trash(&self, id: TrackId) -> host_bridge::Result<()> {
        self.trashed.lock().push(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Audio source providers
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub enum Outcome {
    Url,
    Bytes(Vec<u8>),
    Empty,
    Error,
}

#[derive(Clone)]
pub struct Script {
    pub delay: Duration,
    pub outcome: Outcome,
}

impl Script {
    pub fn url() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Outcome::Url,
        }
    }

    pub fn bytes(payload: Vec<u8>) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Outcome::Bytes(payload),
        }
    }

    pub fn empty() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Outcome::Empty,
        }
    }

    pub fn error() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Outcome::Error,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub struct ScriptedProvider {
    kind: ProviderKind,
    default: Script,
    per_track: Mutex<HashMap<u64, Script>>,
    pub calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind, default: Script) -> Self {
        Self {
            kind,
            default,
            per_track: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn script_track(&self, id: u64, script: Script) {
        self.per_track.lock().insert(id, script);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSourceProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn resolve(
        &self,
        track: &Track,
        _hints: &SourceHints,
    ) -> host_bridge::Result<Option<ResolvedSource>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .per_track
            .lock()
            .get(&track.id.0)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        if script.delay > Duration::ZERO {
            tokio::time::sleep(script.delay).await;
        }

        match script.outcome {
            Outcome::Url => Ok(Some(ResolvedSource {
                media: MediaSource::Url(format!(
                    "https://cdn.test/{}/{}.mp3",
                    self.kind.as_str(),
                    track.id
                )),
                bitrate: Some(320),
                provider_tag: self.kind.as_str().to_string(),
            })),
            Outcome::Bytes(payload) => Ok(Some(ResolvedSource {
                media: MediaSource::Bytes(Bytes::from(payload)),
                bitrate: Some(320),
                provider_tag: self.kind.as_str().to_string(),
            })),
            Outcome::Empty => Ok(None),
            Outcome::Error => Err(BridgeError::Remote("provider exploded".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Output device
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct OutputProbe {
    /// Human-readable descriptions of every opened source, in order.
    pub opened: Mutex<Vec<String>>,
    /// Control calls across all handles, in order ("play", "pause", ...).
    pub calls: Mutex<Vec<String>>,
    pub position: Mutex<Duration>,
    senders: Mutex<Vec<UnboundedSender<OutputEvent>>>,
    pub dropped_handles: AtomicUsize,
}

impl OutputProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn last_opened(&self) -> Option<String> {
        self.opened.lock().last().cloned()
    }

    pub fn set_position(&self, position: Duration) {
        *self.position.lock() = position;
    }

    /// Emits an event from the most recently opened output.
    pub fn emit(&self, event: OutputEvent) {
        if let Some(sender) = self.senders.lock().last() {
            sender.send(event).ok();
        }
    }
}

pub struct ProbeOutput {
    probe: Arc<OutputProbe>,
    /// When set, `open` fails with a device error.
    pub refuse: Mutex<bool>,
}

impl ProbeOutput {
    pub fn new(probe: Arc<OutputProbe>) -> Self {
        Self {
            probe,
            refuse: Mutex::new(false),
        }
    }
}

#[async_trait]
impl AudioOutput for ProbeOutput {
    async fn open(
        &self,
        source: MediaSource,
        events: UnboundedSender<OutputEvent>,
    ) -> host_bridge::Result<Box<dyn OutputHandle>> {
        if *self.refuse.lock() {
            return Err(BridgeError::Device("device refused".into()));
        }
        let description = match &source {
            MediaSource::Url(url) => url.clone(),
            MediaSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        };
        self.probe.opened.lock().push(description);
        self.probe.senders.lock().push(events);
        Ok(Box::new(ProbeHandle {
            probe: self.probe.clone(),
        }))
    }
}

struct ProbeHandle {
    probe: Arc<OutputProbe>,
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.probe.dropped_handles.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl OutputHandle for ProbeHandle {
    async fn play(&self) -> host_bridge::Result<()> {
        self.probe.calls.lock().push("play".into());
        Ok(())
    }

    async fn pause(&self) -> host_bridge::Result<()> {
        self.probe.calls.lock().push("pause".into());
        Ok(())
    }

    async fn stop(&self) -> host_bridge::Result<()> {
        self.probe.calls.lock().push("stop".into());
        Ok(())
    }

    async fn seek(&self, position: Duration) -> host_bridge::Result<()> {
        self.probe
            .calls
            .lock()
            .push(format!("seek:{}", position.as_secs()));
        *self.probe.position.lock() = position;
        Ok(())
    }

    async fn position(&self) -> host_bridge::Result<Duration> {
        Ok(*self.probe.position.lock())
    }

    async fn set_volume(&self, volume: f32) -> host_bridge::Result<()> {
        self.probe.calls.lock().push(format!("volume:{volume:.1}"));
        Ok(())
    }

    async fn fade(&self, from: f32, to: f32, _duration: Duration) -> host_bridge::Result<()> {
        self.probe
            .calls
            .lock()
            .push(format!("fade:{from:.1}->{to:.1}"));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sinks, session, fetcher, store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifications {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifications {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.messages.lock().len()
    }
}

impl NotificationSink for RecordingNotifications {
    fn notify(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    /// `(track id, source id, elapsed seconds)` per scrobble.
    pub scrobbles: Mutex<Vec<(u64, u64, u64)>>,
    pub now_playing: Mutex<Vec<u64>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ListeningReporter for RecordingReporter {
    async fn scrobble(
        &self,
        track: &Track,
        source_id: u64,
        elapsed_secs: u64,
    ) -> host_bridge::Result<()> {
        self.scrobbles
            .lock()
            .push((track.id.0, source_id, elapsed_secs));
        Ok(())
    }

    async fn now_playing(&self, track: &Track) -> host_bridge::Result<()> {
        self.now_playing.lock().push(track.id.0);
        Ok(())
    }
}

pub struct FakeSession {
    state: Mutex<(bool, SubscriptionTier)>,
}

impl FakeSession {
    pub fn guest() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new((false, SubscriptionTier::Free)),
        })
    }

    pub fn free() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new((true, SubscriptionTier::Free)),
        })
    }

    pub fn paid() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new((true, SubscriptionTier::Paid)),
        })
    }
}

impl SessionInfo for FakeSession {
    fn is_authenticated(&self) -> bool {
        self.state.lock().0
    }

    fn subscription(&self) -> SubscriptionTier {
        self.state.lock().1
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    pub fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> host_bridge::Result<Bytes> {
        self.fetched.lock().push(url.to_string());
        Ok(Bytes::from(vec![0u8; 1024]))
    }
}

/// Key-value store that counts writes, for debounce assertions.
pub struct CountingStore {
    inner: MemoryKeyValueStore,
    pub puts: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryKeyValueStore::new(),
            puts: AtomicUsize::new(0),
        })
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn get(&self, key: &str) -> host_bridge::Result<Option<Bytes>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes) -> host_bridge::Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> host_bridge::Result<()> {
        self.inner.delete(key).await
    }

    async fn scan(&self, prefix: &str) -> host_bridge::Result<Vec<(String, Bytes)>> {
        self.inner.scan(prefix).await
    }
}
