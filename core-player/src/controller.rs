//! # Playback Controller
//!
//! The state machine that owns the output device and ties queue, resolver,
//! personal FM, and persistence together:
//!
//! ```text
//! Idle → Loading → Playing ⇄ Paused      (Loading reachable from any
//!                  ↓                       state on track replacement)
//!               Stopped                   (queue yielded no further track)
//! ```
//!
//! Exactly one output instance is owned at any time. Replacing it fully
//! releases the previous instance (and with it any transient decoded-data
//! buffers) before the new one is created. A newer `replace` logically
//! supersedes an older one: in-flight resolutions are never cancelled,
//! their results are discarded by an identity check on the wanted track.
//!
//! Every state-changing command records a fresh [`PlaybackSnapshot`]
//! through the debounced persistence adapter and emits an [`EngineEvent`]
//! for host-side consumers.

use crate::cache::{CacheStats, SourceCache};
use crate::error::{PlayerError, Result};
use crate::fm::PersonalFmEngine;
use crate::model::{PlayerPhase, PlaylistKind, PlaylistSource, UnplayableAction};
use crate::persistence::{PersistenceAdapter, PlaybackSnapshot};
use crate::queue::QueueState;
use crate::resolver::{Resolution, SourceResolver};
use chrono::Utc;
use core_runtime::config::EngineConfig;
use core_runtime::events::{EngineEvent, EventBus};
use host_bridge::{
    MediaSource, NowPlayingUpdate, OutputError, OutputEvent, OutputHandle, RepeatMode, Track,
    TrackId,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Progress is re-read from the output once per second.
const PROGRESS_TICK: Duration = Duration::from_secs(1);
/// The snapshot is only re-persisted when the position moved this far.
const PROGRESS_SAVE_THRESHOLD_SECS: u64 = 3;

struct PlayerState {
    phase: PlayerPhase,
    playing: bool,
    enabled: bool,
    personal_fm: bool,
    queue: QueueState,
    current_track: Option<Track>,
    /// Identity guard: the track id the most recent replacement wants.
    /// Resolutions that finish after a newer replacement see a mismatch
    /// here and drop their result.
    wanted: Option<TrackId>,
    progress_secs: u64,
    last_saved_progress: u64,
    volume: f32,
    volume_before_mute: f32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            phase: PlayerPhase::Idle,
            playing: false,
            enabled: false,
            personal_fm: false,
            queue: QueueState::new(),
            current_track: None,
            wanted: None,
            progress_secs: 0,
            last_saved_progress: 0,
            volume: 1.0,
            volume_before_mute: 1.0,
        }
    }
}

struct ControllerInner {
    config: EngineConfig,
    events: EventBus,
    cache: Arc<SourceCache>,
    resolver: SourceResolver,
    fm: PersonalFmEngine,
    persistence: PersistenceAdapter,
    state: Mutex<PlayerState>,
    output: tokio::sync::Mutex<Option<Box<dyn OutputHandle>>>,
    /// Bumped on every output swap so event pumps of released outputs
    /// stop dispatching.
    output_epoch: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// The playback controller. Cheap to clone; clones share one engine.
///
/// Construct inside a Tokio runtime (background tasks are spawned), then
/// call [`init`](Self::init) once to restore the previous session before
/// issuing playback commands, and [`shutdown`](Self::shutdown) to flush
/// state on the way out.
#[derive(Clone)]
pub struct PlayerController {
    inner: Arc<ControllerInner>,
}

impl PlayerController {
    pub fn new(config: EngineConfig) -> Self {
        let cache = Arc::new(SourceCache::new(
            config.store.clone(),
            config.cache_limit_bytes,
        ));
        let resolver = SourceResolver::new(&config, cache.clone());
        let fm = PersonalFmEngine::new(
            config.metadata.clone(),
            config.fm_retry_budget,
            config.fm_retry_delay,
        );
        let persistence = PersistenceAdapter::new(config.store.clone(), config.persist_debounce);

        Self {
            inner: Arc::new(ControllerInner {
                config,
                events: EventBus::default(),
                cache,
                resolver,
                fm,
                persistence,
                state: Mutex::new(PlayerState::default()),
                output: tokio::sync::Mutex::new(None),
                output_epoch: AtomicU64::new(0),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Restores persisted state (including the last seek position),
    /// primes the personal-FM feed, and starts the progress tick. Nothing
    /// autoplays; the restored track sits paused at its old position.
    pub async fn init(&self) -> Result<()> {
        match self.inner.cache.hydrate().await {
            Ok(stats) => {
                debug!(records = stats.records, bytes = stats.total_bytes, "cache ready")
            }
            Err(e) => warn!(error = %e, "cache hydration failed; starting with empty counters"),
        }

        match self.inner.persistence.restore().await {
            Ok(Some(snapshot)) => self.apply_snapshot(snapshot).await,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "snapshot restore failed; starting fresh"),
        }

        self.inner.fm.prime();
        self.spawn_progress_tick();
        info!("player initialized");
        Ok(())
    }

    async fn apply_snapshot(&self, snapshot: PlaybackSnapshot) {
        let resume_position = snapshot.progress_secs;
        let resume_track = {
            let mut state = self.inner.state.lock();
            state.queue = snapshot.queue;
            state.personal_fm = snapshot.personal_fm;
            state.volume = snapshot.volume.clamp(0.0, 1.0);
            state.progress_secs = resume_position;
            state.last_saved_progress = resume_position;
            state.current_track = snapshot.current_track.clone();
            state.enabled = snapshot.current_track.is_some();
            snapshot.current_track
        };
        self.inner.fm.restore(snapshot.fm_current, snapshot.fm_next);

        if let Some(track) = resume_track {
            debug!(track_id = %track.id, position_secs = resume_position, "restoring session");
            let replaced = self
                .replace_current_track(track.id, false, UnplayableAction::PlayNext)
                .await
                .unwrap_or(false);
            if replaced {
                self.seek(resume_position).await.ok();
            }
        }
    }

    /// Stops the output, flushes the snapshot, and tears down background
    /// tasks.
    pub async fn shutdown(&self) {
        info!("shutting down player");
        let tasks: Vec<JoinHandle<()>> = self.inner.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }

        {
            let mut slot = self.inner.output.lock().await;
            if let Some(output) = slot.take() {
                output.stop().await.ok();
            }
        }
        {
            let mut state = self.inner.state.lock();
            state.playing = false;
            state.phase = PlayerPhase::Idle;
        }

        let snapshot = self.snapshot();
        self.inner.persistence.flush(snapshot).await;
        self.inner.persistence.shutdown();
    }

    // ------------------------------------------------------------------
    // Track replacement
    // ------------------------------------------------------------------

    /// Replaces the current track: scrobbles the outgoing one, fetches
    /// metadata, resolves audio, and swaps the output. Returns whether the
    /// output was actually swapped; `false` when a newer replacement
    /// superseded this one or every source came up empty.
    pub async fn replace_current_track(
        &self,
        id: TrackId,
        autoplay: bool,
        on_unplayable: UnplayableAction,
    ) -> Result<bool> {
        let outgoing = {
            let state = self.inner.state.lock();
            if autoplay {
                state
                    .current_track
                    .clone()
                    .map(|track| (track, state.queue.source().id))
            } else {
                None
            }
        };
        if let Some((track, source_id)) = outgoing {
            let elapsed = self.current_position_secs().await;
            self.spawn_scrobble(track, source_id, elapsed);
        }

        {
            let mut state = self.inner.state.lock();
            state.wanted = Some(id);
            state.phase = PlayerPhase::Loading;
        }

        let track = match self.inner.config.metadata.track_detail(id).await {
            Ok(track) => track,
            Err(e) => {
                warn!(track_id = %id, error = %e, "metadata lookup failed");
                self.handle_unplayable(None, on_unplayable);
                return Ok(false);
            }
        };

        {
            let mut state = self.inner.state.lock();
            state.current_track = Some(track.clone());
            state.progress_secs = 0;
            state.enabled = true;
        }
        self.inner
            .events
            .emit(EngineEvent::TrackChanged {
                track: track.clone(),
            })
            .ok();
        self.push_media_update();

        self.replace_track_audio(track, autoplay, true, on_unplayable)
            .await
    }

    /// Resolves audio for `track` and, if this replacement is still the
    /// wanted one, swaps the output to it.
    async fn replace_track_audio(
        &self,
        track: Track,
        autoplay: bool,
        prefetch_next: bool,
        on_unplayable: UnplayableAction,
    ) -> Result<bool> {
        match self.inner.resolver.resolve(&track).await {
            Resolution::Source(source) => {
                let still_wanted = self.inner.state.lock().wanted == Some(track.id);
                let mut replaced = false;
                if still_wanted {
                    match self.install_output(source.media).await {
                        Ok(()) => {
                            if autoplay {
                                self.play().await?;
                            } else {
                                let mut state = self.inner.state.lock();
                                state.phase = PlayerPhase::Paused;
                                state.playing = false;
                            }
                            replaced = true;
                        }
                        Err(e) => {
                            warn!(track_id = %track.id, error = %e, "output refused resolved source");
                            self.handle_unplayable(Some(&track), on_unplayable);
                        }
                    }
                } else {
                    trace!(track_id = %track.id, "stale resolution discarded");
                }
                if prefetch_next {
                    self.spawn_prefetch_next();
                }
                self.persist();
                Ok(replaced)
            }
            Resolution::Unavailable => {
                self.handle_unplayable(Some(&track), on_unplayable);
                Ok(false)
            }
        }
    }

    /// Notifies once per exhausted track and applies the caller-specified
    /// fallback on a fresh task (which also keeps the replace/advance
    /// call chain from recursing).
    fn handle_unplayable(&self, track: Option<&Track>, action: UnplayableAction) {
        match track {
            Some(track) => {
                self.inner
                    .config
                    .notifications
                    .notify(&format!("Cannot play {}", track.title));
                self.inner
                    .events
                    .emit(EngineEvent::ResolutionFailed { track_id: track.id })
                    .ok();
            }
            None => self.inner.config.notifications.notify("Cannot play this track"),
        }

        let controller = self.clone();
        self.push_task(tokio::spawn(async move {
            let result = match action {
                UnplayableAction::PlayNext => controller.play_next().await,
                UnplayableAction::PlayPrev => controller.play_prev().await,
            };
            if let Err(e) = result {
                warn!(error = %e, "unplayable fallback failed");
            }
        }));
    }

    /// Swaps the output device: releases the previous instance first, then
    /// opens the new one and wires its event pump.
    async fn install_output(&self, media: MediaSource) -> Result<()> {
        {
            let mut slot = self.inner.output.lock().await;
            if let Some(previous) = slot.take() {
                previous.stop().await.ok();
            }
        }
        let epoch = self.inner.output_epoch.fetch_add(1, Ordering::AcqRel) + 1;

        let volume = self.inner.state.lock().volume;
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = self
            .inner
            .config
            .output
            .open(media, sender)
            .await
            .map_err(|e| PlayerError::Output(e.to_string()))?;
        handle.set_volume(volume).await.ok();
        *self.inner.output.lock().await = Some(handle);

        let controller = self.clone();
        self.push_task(tokio::spawn(controller.output_pump(receiver, epoch)));
        Ok(())
    }

    /// Event pump for an open output. Returned as a boxed future so the
    /// compiler does not have to resolve the (acyclic but deep) auto-trait
    /// obligation that `install_output` spawning this pump would otherwise
    /// form with the dispatch/replace call chain.
    fn output_pump(
        self,
        mut receiver: mpsc::UnboundedReceiver<OutputEvent>,
        epoch: u64,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async move {
            while let Some(event) = receiver.recv().await {
                if self.inner.output_epoch.load(Ordering::Acquire) != epoch {
                    break;
                }
                self.dispatch_output_event(event).await;
            }
        })
    }

    async fn dispatch_output_event(&self, event: OutputEvent) {
        match event {
            OutputEvent::Ended => self.handle_track_ended().await,
            OutputEvent::Failed(error) => self.handle_output_error(error).await,
        }
    }

    /// Natural end of track: finalize the scrobble, then replay
    /// (`repeat == one`, non-FM) or advance.
    async fn handle_track_ended(&self) {
        let (finished, source_id, repeat_one, personal_fm) = {
            let state = self.inner.state.lock();
            (
                state.current_track.clone(),
                state.queue.source().id,
                state.queue.repeat() == RepeatMode::One,
                state.personal_fm,
            )
        };
        let Some(track) = finished else { return };

        self.inner
            .events
            .emit(EngineEvent::TrackCompleted { track_id: track.id })
            .ok();
        let elapsed = track.duration_secs();
        self.spawn_scrobble(track.clone(), source_id, elapsed);

        if repeat_one && !personal_fm {
            self.replace_current_track(track.id, true, UnplayableAction::PlayNext)
                .await
                .ok();
        } else if let Err(e) = self.play_next().await {
            warn!(error = %e, "advance after track end failed");
        }
    }

    /// Output error recovery per class: decode and unsupported-format
    /// errors skip forward; anything else re-resolves the same track and
    /// restores the seek position, but only if the track identity is
    /// unchanged.
    async fn handle_output_error(&self, error: OutputError) {
        match error {
            OutputError::Decode(reason) => {
                debug!(reason = %reason, "decode failure; skipping to next track");
                self.play_next().await.ok();
            }
            OutputError::UnsupportedFormat(reason) => {
                debug!(reason = %reason, "unsupported format; skipping");
                self.inner
                    .config
                    .notifications
                    .notify("Cannot play: unsupported audio format");
                self.play_next().await.ok();
            }
            OutputError::Other(reason) => {
                warn!(reason = %reason, "output failed; reloading current track");
                let (track, position) = {
                    let state = self.inner.state.lock();
                    (state.current_track.clone(), state.progress_secs)
                };
                let Some(track) = track else { return };
                let reloaded = self
                    .replace_track_audio(track, false, false, UnplayableAction::PlayNext)
                    .await;
                if let Ok(true) = reloaded {
                    self.seek(position).await.ok();
                    self.play().await.ok();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Starts playback with a fade-in; the `playing` flag flips only after
    /// the fade completes.
    pub async fn play(&self) -> Result<()> {
        if self.inner.state.lock().playing {
            return Ok(());
        }
        let fade = self.inner.config.fade_duration;
        let volume = self.inner.state.lock().volume;

        {
            let slot = self.inner.output.lock().await;
            let Some(output) = slot.as_ref() else {
                return Ok(());
            };
            output
                .play()
                .await
                .map_err(|e| PlayerError::Output(e.to_string()))?;
            output
                .fade(0.0, volume, fade)
                .await
                .map_err(|e| PlayerError::Output(e.to_string()))?;
        }

        let track = {
            let mut state = self.inner.state.lock();
            state.playing = true;
            state.enabled = true;
            state.phase = PlayerPhase::Playing;
            state.current_track.clone()
        };

        if let Some(track) = track {
            self.inner
                .events
                .emit(EngineEvent::PlaybackStarted { track_id: track.id })
                .ok();
            if let Some(reporter) = self.inner.config.reporter.clone() {
                self.push_task(tokio::spawn(async move {
                    if let Err(e) = reporter.now_playing(&track).await {
                        trace!(error = %e, "now-playing report failed");
                    }
                }));
            }
        }
        self.push_media_update();
        self.persist();
        Ok(())
    }

    /// Pauses with a fade-out; flags flip after the fade.
    pub async fn pause(&self) -> Result<()> {
        let fade = self.inner.config.fade_duration;
        let volume = self.inner.state.lock().volume;

        {
            let slot = self.inner.output.lock().await;
            let Some(output) = slot.as_ref() else {
                return Ok(());
            };
            output
                .fade(volume, 0.0, fade)
                .await
                .map_err(|e| PlayerError::Output(e.to_string()))?;
            output
                .pause()
                .await
                .map_err(|e| PlayerError::Output(e.to_string()))?;
        }

        let track_id = {
            let mut state = self.inner.state.lock();
            state.playing = false;
            state.phase = PlayerPhase::Paused;
            state.current_track.as_ref().map(|t| t.id)
        };
        self.inner
            .events
            .emit(EngineEvent::PlaybackPaused { track_id })
            .ok();
        self.push_media_update();
        self.persist();
        Ok(())
    }

    pub async fn play_or_pause(&self) -> Result<()> {
        if self.inner.state.lock().playing {
            self.pause().await
        } else {
            self.play().await
        }
    }

    /// Terminal stop after queue exhaustion.
    async fn enter_stopped(&self) {
        {
            let slot = self.inner.output.lock().await;
            if let Some(output) = slot.as_ref() {
                output.stop().await.ok();
            }
        }
        {
            let mut state = self.inner.state.lock();
            state.playing = false;
            state.phase = PlayerPhase::Stopped;
        }
        self.inner.events.emit(EngineEvent::PlaybackStopped).ok();
        self.push_media_update();
        self.persist();
    }

    pub async fn seek(&self, position_secs: u64) -> Result<()> {
        {
            let slot = self.inner.output.lock().await;
            let Some(output) = slot.as_ref() else {
                return Ok(());
            };
            output
                .seek(Duration::from_secs(position_secs))
                .await
                .map_err(|e| PlayerError::Output(e.to_string()))?;
        }
        let track = {
            let mut state = self.inner.state.lock();
            state.progress_secs = position_secs;
            state.current_track.clone()
        };
        if let Some(track) = track {
            self.inner
                .events
                .emit(EngineEvent::PositionChanged {
                    track_id: track.id,
                    position_secs,
                    duration_secs: track.duration_secs(),
                })
                .ok();
        }
        self.push_media_update();
        Ok(())
    }

    pub async fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        {
            self.inner.state.lock().volume = volume;
        }
        {
            let slot = self.inner.output.lock().await;
            if let Some(output) = slot.as_ref() {
                output.set_volume(volume).await.ok();
            }
        }
        self.persist();
    }

    /// Mutes, or restores the pre-mute volume when already muted.
    pub async fn toggle_mute(&self) {
        let target = {
            let mut state = self.inner.state.lock();
            if state.volume == 0.0 {
                state.volume_before_mute
            } else {
                state.volume_before_mute = state.volume;
                0.0
            }
        };
        self.set_volume(target).await;
    }

    // ------------------------------------------------------------------
    // Queue navigation
    // ------------------------------------------------------------------

    /// Advances to the next track, personal-FM aware. Returns `false`
    /// when traversal is exhausted (playback stops) or the FM feed had
    /// nothing to offer.
    pub async fn play_next(&self) -> Result<bool> {
        let personal_fm = self.inner.state.lock().personal_fm;
        if personal_fm {
            self.play_next_fm_track().await
        } else {
            self.play_next_queue_track().await
        }
    }

    async fn play_next_queue_track(&self) -> Result<bool> {
        let next = self.inner.state.lock().queue.advance();
        match next {
            Some(id) => {
                self.replace_current_track(id, true, UnplayableAction::PlayNext)
                    .await?;
                Ok(true)
            }
            None => {
                debug!("queue exhausted; stopping playback");
                self.enter_stopped().await;
                Ok(false)
            }
        }
    }

    /// Steps back to the previous track.
    pub async fn play_prev(&self) -> Result<bool> {
        let prev = self.inner.state.lock().queue.retreat();
        match prev {
            Some(id) => {
                self.replace_current_track(id, true, UnplayableAction::PlayPrev)
                    .await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replaces the whole queue and starts playing. `start_at = None`
    /// starts from the head of the (possibly shuffled) list.
    pub async fn replace_playlist(
        &self,
        ids: Vec<TrackId>,
        source: PlaylistSource,
        start_at: Option<TrackId>,
    ) -> Result<bool> {
        if ids.is_empty() {
            return Ok(false);
        }

        let (was_fm, first) = {
            let mut state = self.inner.state.lock();
            let was_fm = state.personal_fm;
            state.personal_fm = false;
            state.queue.set_active_list(ids);
            state.queue.set_source(source);
            if state.queue.shuffle() {
                state.queue.shuffle_around(start_at);
            }
            let first = match start_at {
                Some(id) => {
                    state.queue.set_current_by_id(id);
                    Some(id)
                }
                None => state.queue.current_id(),
            };
            (was_fm, first)
        };
        if was_fm {
            self.inner
                .events
                .emit(EngineEvent::PersonalFmChanged { active: false })
                .ok();
        }

        let Some(first) = first else { return Ok(false) };
        self.replace_current_track(first, true, UnplayableAction::PlayNext)
            .await
    }

    pub async fn play_album(&self, album_id: u64, start_at: Option<TrackId>) -> Result<bool> {
        let ids = self.inner.config.metadata.album_tracks(album_id).await?;
        self.replace_playlist(
            ids,
            PlaylistSource {
                kind: PlaylistKind::Album,
                id: album_id,
            },
            start_at,
        )
        .await
    }

    pub async fn play_playlist(&self, playlist_id: u64, start_at: Option<TrackId>) -> Result<bool> {
        let ids = self
            .inner
            .config
            .metadata
            .playlist_tracks(playlist_id)
            .await?;
        self.replace_playlist(
            ids,
            PlaylistSource {
                kind: PlaylistKind::Playlist,
                id: playlist_id,
            },
            start_at,
        )
        .await
    }

    pub async fn play_artist(&self, artist_id: u64, start_at: Option<TrackId>) -> Result<bool> {
        let ids = self.inner.config.metadata.artist_tracks(artist_id).await?;
        self.replace_playlist(
            ids,
            PlaylistSource {
                kind: PlaylistKind::Artist,
                id: artist_id,
            },
            start_at,
        )
        .await
    }

    /// Jumps to a specific entry of the active queue.
    pub async fn play_track_in_queue(&self, id: TrackId) -> Result<bool> {
        {
            self.inner.state.lock().queue.set_current_by_id(id);
        }
        self.replace_current_track(id, true, UnplayableAction::PlayNext)
            .await
    }

    pub async fn add_to_play_next(&self, id: TrackId, play_now: bool) -> Result<()> {
        {
            self.inner.state.lock().queue.push_play_next(id);
        }
        self.persist();
        if play_now {
            self.play_next().await?;
        }
        Ok(())
    }

    pub fn remove_from_play_next(&self, index: usize) -> Option<TrackId> {
        let removed = self.inner.state.lock().queue.remove_from_play_next(index);
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    pub fn clear_play_next(&self) {
        {
            self.inner.state.lock().queue.clear_play_next();
        }
        self.persist();
    }

    // ------------------------------------------------------------------
    // Personal FM
    // ------------------------------------------------------------------

    /// Switches to personal-FM mode, resuming the feed's current track or
    /// advancing into a fresh one.
    pub async fn play_personal_fm(&self) -> Result<bool> {
        let (was_fm, current_track_id) = {
            let mut state = self.inner.state.lock();
            let was = state.personal_fm;
            state.personal_fm = true;
            (was, state.current_track.as_ref().map(|t| t.id))
        };
        if !was_fm {
            self.inner
                .events
                .emit(EngineEvent::PersonalFmChanged { active: true })
                .ok();
        }

        match self.inner.fm.current() {
            Some(track) if Some(track.id) != current_track_id => {
                self.replace_current_track(track.id, true, UnplayableAction::PlayNext)
                    .await?;
                Ok(true)
            }
            Some(_) => {
                self.play_or_pause().await?;
                Ok(true)
            }
            None => self.play_next_fm_track().await,
        }
    }

    async fn play_next_fm_track(&self) -> Result<bool> {
        match self.inner.fm.advance().await {
            Ok(Some(track)) => {
                self.replace_current_track(track.id, true, UnplayableAction::PlayNext)
                    .await?;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(PlayerError::FmExhausted { attempts }) => {
                warn!(attempts, "personal fm feed exhausted");
                self.inner
                    .config
                    .notifications
                    .notify("Personal FM is unavailable right now, try again later");
                self.inner.events.emit(EngineEvent::PersonalFmExhausted).ok();
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Skips the current feed track and reports it as trashed.
    pub async fn move_to_fm_trash(&self) -> Result<bool> {
        {
            self.inner.state.lock().personal_fm = true;
        }
        let trashed = self.inner.fm.current_id();
        let advanced = self.play_next_fm_track().await?;
        if advanced {
            if let Some(id) = trashed {
                let gateway = self.inner.config.metadata.clone();
                self.push_task(tokio::spawn(async move {
                    if let Err(e) = gateway.fm_trash(id).await {
                        debug!(track_id = %id, error = %e, "fm trash report failed");
                    }
                }));
            }
        }
        Ok(advanced)
    }

    // ------------------------------------------------------------------
    // Mode switches (no-ops in personal-FM mode)
    // ------------------------------------------------------------------

    pub fn set_repeat(&self, mode: RepeatMode) {
        {
            let mut state = self.inner.state.lock();
            if state.personal_fm {
                return;
            }
            state.queue.set_repeat(mode);
        }
        self.emit_modes();
        self.persist();
    }

    /// Cycles off → on → one → off.
    pub fn switch_repeat_mode(&self) {
        let next = match self.repeat_mode() {
            RepeatMode::Off => RepeatMode::On,
            RepeatMode::On => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        };
        self.set_repeat(next);
    }

    pub fn set_shuffle(&self, enabled: bool) {
        {
            let mut state = self.inner.state.lock();
            if state.personal_fm {
                return;
            }
            let current = state.current_track.as_ref().map(|t| t.id);
            state.queue.set_shuffle(enabled, current);
        }
        self.emit_modes();
        self.persist();
    }

    pub fn switch_shuffle(&self) {
        let enabled = !self.shuffle();
        self.set_shuffle(enabled);
    }

    pub fn set_reversed(&self, reversed: bool) {
        {
            let mut state = self.inner.state.lock();
            if state.personal_fm {
                return;
            }
            state.queue.set_reversed(reversed);
        }
        self.emit_modes();
        self.persist();
    }

    pub fn switch_reversed(&self) {
        let reversed = !self.reversed();
        self.set_reversed(reversed);
    }

    fn emit_modes(&self) {
        let (repeat, shuffle, reversed) = {
            let state = self.inner.state.lock();
            (
                state.queue.repeat(),
                state.queue.shuffle(),
                state.queue.reversed(),
            )
        };
        self.inner
            .events
            .emit(EngineEvent::ModesChanged {
                repeat,
                shuffle,
                reversed,
            })
            .ok();
    }

    // ------------------------------------------------------------------
    // Background work
    // ------------------------------------------------------------------

    fn spawn_progress_tick(&self) {
        let controller = self.clone();
        self.push_task(tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_TICK);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                controller.sync_progress().await;
            }
        }));
    }

    async fn sync_progress(&self) {
        let position = {
            let slot = self.inner.output.lock().await;
            match slot.as_ref() {
                Some(output) => output.position().await.ok(),
                None => None,
            }
        };
        let Some(position) = position else { return };
        let secs = position.as_secs();

        let (track, playing, should_save) = {
            let mut state = self.inner.state.lock();
            state.progress_secs = secs;
            let should_save =
                secs.abs_diff(state.last_saved_progress) >= PROGRESS_SAVE_THRESHOLD_SECS;
            if should_save {
                state.last_saved_progress = secs;
            }
            (state.current_track.clone(), state.playing, should_save)
        };

        if playing {
            if let Some(track) = &track {
                self.inner
                    .events
                    .emit(EngineEvent::PositionChanged {
                        track_id: track.id,
                        position_secs: secs,
                        duration_secs: track.duration_secs(),
                    })
                    .ok();
            }
        }
        if should_save {
            self.persist();
        }
    }

    /// Resolves the upcoming track in the background so its source is warm
    /// (and, with auto-cache on, downloaded) before it is needed.
    fn spawn_prefetch_next(&self) {
        let controller = self.clone();
        self.push_task(tokio::spawn(async move {
            let next_id = {
                let state = controller.inner.state.lock();
                if state.personal_fm {
                    controller.inner.fm.peek_next().map(|t| t.id)
                } else {
                    state.queue.peek_next().map(|(id, _)| id)
                }
            };
            let Some(id) = next_id else { return };
            if controller.inner.fm.current_id() == Some(id) {
                return;
            }
            match controller.inner.config.metadata.track_detail(id).await {
                Ok(track) => {
                    let _ = controller.inner.resolver.resolve(&track).await;
                }
                Err(e) => trace!(track_id = %id, error = %e, "prefetch metadata failed"),
            }
        }));
    }

    fn spawn_scrobble(&self, track: Track, source_id: u64, elapsed_secs: u64) {
        let Some(reporter) = self.inner.config.reporter.clone() else {
            return;
        };
        self.push_task(tokio::spawn(async move {
            if let Err(e) = reporter.scrobble(&track, source_id, elapsed_secs).await {
                trace!(track_id = %track.id, error = %e, "scrobble failed");
            }
        }));
    }

    fn push_task(&self, task: JoinHandle<()>) {
        let mut tasks = self.inner.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    fn push_media_update(&self) {
        let Some(media) = &self.inner.config.media_integration else {
            return;
        };
        let update = {
            let state = self.inner.state.lock();
            NowPlayingUpdate {
                track: state.current_track.clone(),
                playing: state.playing,
                position_secs: state.progress_secs,
            }
        };
        media.playback_changed(&update);
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn snapshot(&self) -> PlaybackSnapshot {
        let state = self.inner.state.lock();
        PlaybackSnapshot {
            queue: state.queue.clone(),
            current_track: state.current_track.clone(),
            progress_secs: state.progress_secs,
            volume: state.volume,
            personal_fm: state.personal_fm,
            fm_current: self.inner.fm.current(),
            fm_next: self.inner.fm.peek_next(),
            saved_at: Utc::now(),
        }
    }

    fn persist(&self) {
        self.inner.persistence.record(self.snapshot());
    }

    /// Destroys the durable snapshot. The only way persisted state dies.
    pub async fn reset_persisted_state(&self) -> Result<()> {
        self.inner.persistence.reset().await
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn events(&self) -> EventBus {
        self.inner.events.clone()
    }

    pub fn phase(&self) -> PlayerPhase {
        self.inner.state.lock().phase
    }

    pub fn is_playing(&self) -> bool {
        self.inner.state.lock().playing
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    pub fn is_personal_fm(&self) -> bool {
        self.inner.state.lock().personal_fm
    }

    pub fn current_track(&self) -> Option<Track> {
        self.inner.state.lock().current_track.clone()
    }

    pub fn current_track_id(&self) -> Option<TrackId> {
        self.inner.state.lock().current_track.as_ref().map(|t| t.id)
    }

    pub fn progress_secs(&self) -> u64 {
        self.inner.state.lock().progress_secs
    }

    pub fn volume(&self) -> f32 {
        self.inner.state.lock().volume
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.inner.state.lock().queue.repeat()
    }

    pub fn shuffle(&self) -> bool {
        self.inner.state.lock().queue.shuffle()
    }

    pub fn reversed(&self) -> bool {
        self.inner.state.lock().queue.reversed()
    }

    pub fn playlist_source(&self) -> PlaylistSource {
        self.inner.state.lock().queue.source()
    }

    pub fn play_next_ids(&self) -> Vec<TrackId> {
        self.inner.state.lock().queue.play_next_list().collect()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.inner.cache.clear().await
    }

    async fn current_position_secs(&self) -> u64 {
        let position = {
            let slot = self.inner.output.lock().await;
            match slot.as_ref() {
                Some(output) => output.position().await.ok(),
                None => None,
            }
        };
        match position {
            Some(position) => position.as_secs(),
            None => self.inner.state.lock().progress_secs,
        }
    }
}
