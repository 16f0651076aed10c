//! # Personal FM Engine
//!
//! A continuously-advancing single-track recommendation feed with one-step
//! lookahead prefetch. The engine keeps the current feed track plus one
//! prefetched `next`; promoting `next` immediately starts a guarded
//! background fetch for its replacement so the feed stays one step ahead.
//!
//! Cold starts (and lost lookaheads) retry the feed fetch on a fixed
//! budget with a fixed delay between attempts. Exhausting the budget
//! surfaces a single failure and leaves the engine in `Off`.

use crate::error::{PlayerError, Result};
use host_bridge::{MetadataGateway, Track, TrackId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Observable engine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmPhase {
    /// No feed track loaded.
    Off,
    /// Current track loaded; lookahead may or may not be filled.
    Loaded,
    /// Current track loaded and the lookahead fetch is in flight.
    LoadingNext,
}

#[derive(Default)]
struct FmState {
    current: Option<Track>,
    next: Option<Track>,
    loading_current: bool,
    loading_next: bool,
}

struct FmInner {
    gateway: Arc<dyn MetadataGateway>,
    retry_budget: u32,
    retry_delay: Duration,
    state: Mutex<FmState>,
}

/// One-step-lookahead feed engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PersonalFmEngine {
    inner: Arc<FmInner>,
}

impl PersonalFmEngine {
    pub fn new(gateway: Arc<dyn MetadataGateway>, retry_budget: u32, retry_delay: Duration) -> Self {
        Self {
            inner: Arc::new(FmInner {
                gateway,
                retry_budget,
                retry_delay,
                state: Mutex::new(FmState::default()),
            }),
        }
    }

    pub fn phase(&self) -> FmPhase {
        let state = self.inner.state.lock();
        if state.current.is_none() {
            FmPhase::Off
        } else if state.loading_next {
            FmPhase::LoadingNext
        } else {
            FmPhase::Loaded
        }
    }

    pub fn current(&self) -> Option<Track> {
        self.inner.state.lock().current.clone()
    }

    pub fn peek_next(&self) -> Option<Track> {
        self.inner.state.lock().next.clone()
    }

    /// Reinstates feed state from a restored snapshot. Loading flags are
    /// transient and start cleared.
    pub fn restore(&self, current: Option<Track>, next: Option<Track>) {
        let mut state = self.inner.state.lock();
        state.current = current;
        state.next = next;
        state.loading_current = false;
        state.loading_next = false;
    }

    /// Clears the feed back to `Off`.
    pub fn clear(&self) {
        self.restore(None, None);
    }

    /// Fills current + lookahead in the background when the feed is cold
    /// or inconsistent. A lookahead equal to the current track counts as
    /// inconsistent and forces a refetch.
    pub fn prime(&self) {
        let needs_fill = {
            let state = self.inner.state.lock();
            let same_id = match (&state.current, &state.next) {
                (Some(current), Some(next)) => current.id == next.id,
                _ => false,
            };
            state.current.is_none() || state.next.is_none() || same_id
        };
        if !needs_fill {
            return;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            match inner.gateway.personal_fm().await {
                Ok(batch) => {
                    let mut tracks = batch.into_iter();
                    let current = tracks.next();
                    let next = tracks.next();
                    let mut state = inner.state.lock();
                    if let Some(current) = current {
                        state.next = match next {
                            Some(next) if next.id != current.id => Some(next),
                            _ => None,
                        };
                        state.current = Some(current);
                    }
                }
                Err(e) => debug!(error = %e, "personal fm prime failed"),
            }
        });
    }

    /// Advances the feed and returns the new current track.
    ///
    /// `Ok(None)` means nothing happened: a fetch is already in flight, or
    /// the lookahead duplicates the current track (treated as
    /// not-advanceable). `Err(FmExhausted)` means the cold-start retry
    /// budget ran out; the engine is back in `Off`.
    pub async fn advance(&self) -> Result<Option<Track>> {
        enum Plan {
            Busy,
            Promote(Track),
            ColdFetch,
        }

        let plan = {
            let mut state = self.inner.state.lock();
            if state.loading_current {
                Plan::Busy
            } else {
                match state.next.take() {
                    Some(next) => {
                        let duplicate =
                            state.current.as_ref().map(|c| c.id) == Some(next.id);
                        if duplicate {
                            // Lookahead equals current: refuse to promote.
                            state.next = Some(next);
                            Plan::Busy
                        } else {
                            state.current = Some(next.clone());
                            Plan::Promote(next)
                        }
                    }
                    None => {
                        state.loading_current = true;
                        Plan::ColdFetch
                    }
                }
            }
        };

        let promoted = match plan {
            Plan::Busy => return Ok(None),
            Plan::Promote(track) => track,
            Plan::ColdFetch => {
                let fetched = self.fetch_current_with_retry().await;
                let mut state = self.inner.state.lock();
                state.loading_current = false;
                match fetched {
                    Ok(track) => {
                        state.current = Some(track.clone());
                        track
                    }
                    Err(e) => {
                        // Budget exhausted: back to Off.
                        state.current = None;
                        state.next = None;
                        return Err(e);
                    }
                }
            }
        };

        self.spawn_load_next();
        Ok(Some(promoted))
    }

    /// Cold-start fetch with the fixed retry budget and inter-attempt
    /// delay. Empty batches and feed errors both consume an attempt.
    async fn fetch_current_with_retry(&self) -> Result<Track> {
        let budget = self.inner.retry_budget;
        for attempt in 1..=budget {
            match self.inner.gateway.personal_fm().await {
                Ok(batch) => {
                    if let Some(track) = batch.into_iter().next() {
                        return Ok(track);
                    }
                    debug!(attempt, budget, "personal fm returned an empty batch");
                }
                Err(e) => {
                    debug!(attempt, budget, error = %e, "personal fm fetch failed");
                }
            }
            if attempt < budget {
                tokio::time::sleep(self.inner.retry_delay).await;
            }
        }

        warn!(budget, "personal fm feed exhausted its retry budget");
        Err(PlayerError::FmExhausted { attempts: budget })
    }

    /// Single-flight lookahead fetch; at most one in flight at a time.
    fn spawn_load_next(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.loading_next {
                return;
            }
            state.loading_next = true;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let result = inner.gateway.personal_fm().await;
            let mut state = inner.state.lock();
            state.loading_next = false;
            match result {
                Ok(batch) => {
                    state.next = batch.into_iter().next();
                }
                Err(e) => {
                    state.next = None;
                    debug!(error = %e, "personal fm lookahead fetch failed");
                }
            }
        });
    }

    /// Id of the current feed track, for trash reporting.
    pub fn current_id(&self) -> Option<TrackId> {
        self.inner.state.lock().current.as_ref().map(|t| t.id)
    }
}
