//! # Queue State
//!
//! Ordered and shuffled track-id lists, the current-position pointer, the
//! priority play-next override queue, and the repeat/shuffle/reversed mode
//! flags.
//!
//! Invariants:
//! - the shuffled list is always a permutation of the plain list;
//! - the current index addresses whichever list the shuffle flag selects;
//! - a track served from the play-next queue leaves the main index
//!   untouched, so normal traversal later resumes from the previously
//!   active position, not from the override track.

use crate::model::PlaylistSource;
use host_bridge::{RepeatMode, TrackId};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Where an upcoming track comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePosition {
    /// Normal traversal; the payload is the index in the active list.
    InList(usize),
    /// Head of the play-next override queue.
    PlayNext,
}

/// The play queue. Serializable wholesale into the playback snapshot;
/// nothing in here is transient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QueueState {
    list: Vec<TrackId>,
    shuffled_list: Vec<TrackId>,
    current: usize,
    shuffled_current: usize,
    play_next: VecDeque<TrackId>,
    repeat: RepeatMode,
    shuffle: bool,
    reversed: bool,
    source: PlaylistSource,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the active list, resetting both position pointers. The
    /// shuffled list starts as an identity copy until `shuffle_around`
    /// rebuilds it.
    pub fn set_active_list(&mut self, ids: Vec<TrackId>) {
        self.shuffled_list = ids.clone();
        self.list = ids;
        self.current = 0;
        self.shuffled_current = 0;
    }

    /// The list selected by the shuffle flag.
    pub fn active_list(&self) -> &[TrackId] {
        if self.shuffle {
            &self.shuffled_list
        } else {
            &self.list
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    fn current_index(&self) -> usize {
        if self.shuffle {
            self.shuffled_current
        } else {
            self.current
        }
    }

    fn set_current_index(&mut self, index: usize) {
        if self.shuffle {
            self.shuffled_current = index;
        } else {
            self.current = index;
        }
    }

    /// Id at the current position of the active list, if any.
    pub fn current_id(&self) -> Option<TrackId> {
        self.active_list().get(self.current_index()).copied()
    }

    /// Points the current position at `id` within the active list.
    /// Returns false when the id is not in the list.
    pub fn set_current_by_id(&mut self, id: TrackId) -> bool {
        match self.active_list().iter().position(|&t| t == id) {
            Some(index) => {
                self.set_current_index(index);
                true
            }
            None => false,
        }
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Toggles shuffle. When enabling, the list is reshuffled around the
    /// currently playing track; either way the current pointer is re-synced
    /// so it keeps addressing that track in the newly active list.
    pub fn set_shuffle(&mut self, enabled: bool, current_track: Option<TrackId>) {
        self.shuffle = enabled;
        if enabled {
            self.shuffle_around(current_track);
        }
        if let Some(id) = current_track {
            self.set_current_by_id(id);
        }
    }

    pub fn reversed(&self) -> bool {
        self.reversed
    }

    pub fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
    }

    pub fn source(&self) -> PlaylistSource {
        self.source
    }

    pub fn set_source(&mut self, source: PlaylistSource) {
        self.source = source;
    }

    /// Rebuilds the shuffled list as a fresh random permutation of the
    /// plain list. A concrete pivot is forced to index 0; `None` leaves the
    /// permutation unconstrained.
    pub fn shuffle_around(&mut self, pivot: Option<TrackId>) {
        let mut rng = rand::thread_rng();
        match pivot {
            Some(pivot) if self.list.contains(&pivot) => {
                let mut rest: Vec<TrackId> =
                    self.list.iter().copied().filter(|&t| t != pivot).collect();
                rest.shuffle(&mut rng);
                let mut shuffled = Vec::with_capacity(self.list.len());
                shuffled.push(pivot);
                shuffled.extend(rest);
                self.shuffled_list = shuffled;
            }
            _ => {
                let mut shuffled = self.list.clone();
                shuffled.shuffle(&mut rng);
                self.shuffled_list = shuffled;
            }
        }
        self.shuffled_current = 0;
    }

    /// The upcoming track without mutating anything. `None` is the
    /// terminal "no further track" signal.
    pub fn peek_next(&self) -> Option<(TrackId, QueuePosition)> {
        if let Some(&id) = self.play_next.front() {
            return Some((id, QueuePosition::PlayNext));
        }

        let list = self.active_list();
        if list.is_empty() {
            return None;
        }

        let current = self.current_index();
        if self.repeat == RepeatMode::On {
            if self.reversed && current == 0 {
                let last = list.len() - 1;
                return Some((list[last], QueuePosition::InList(last)));
            }
            if current + 1 == list.len() {
                return Some((list[0], QueuePosition::InList(0)));
            }
        }

        let next = if self.reversed {
            current.checked_sub(1)?
        } else {
            current + 1
        };
        list.get(next).map(|&id| (id, QueuePosition::InList(next)))
    }

    /// The previous track without mutating anything. Mirrors `peek_next`
    /// but never consults the play-next queue.
    pub fn peek_prev(&self) -> Option<(TrackId, usize)> {
        let list = self.active_list();
        if list.is_empty() {
            return None;
        }

        let current = self.current_index();
        if self.repeat == RepeatMode::On {
            if !self.reversed && current == 0 {
                let last = list.len() - 1;
                return Some((list[last], last));
            }
            if self.reversed && current + 1 == list.len() {
                return Some((list[0], 0));
            }
        }

        let prev = if self.reversed {
            current + 1
        } else {
            current.checked_sub(1)?
        };
        list.get(prev).map(|&id| (id, prev))
    }

    /// Moves to the next track and returns its id; the play-next queue
    /// takes priority and leaves the main index unchanged.
    pub fn advance(&mut self) -> Option<TrackId> {
        match self.peek_next()? {
            (id, QueuePosition::PlayNext) => {
                self.play_next.pop_front();
                Some(id)
            }
            (id, QueuePosition::InList(index)) => {
                self.set_current_index(index);
                Some(id)
            }
        }
    }

    /// Moves to the previous track and returns its id.
    pub fn retreat(&mut self) -> Option<TrackId> {
        let (id, index) = self.peek_prev()?;
        self.set_current_index(index);
        Some(id)
    }

    pub fn push_play_next(&mut self, id: TrackId) {
        self.play_next.push_back(id);
    }

    pub fn pop_play_next(&mut self) -> Option<TrackId> {
        self.play_next.pop_front()
    }

    /// Removes one entry by position in the play-next queue.
    pub fn remove_from_play_next(&mut self, index: usize) -> Option<TrackId> {
        self.play_next.remove(index)
    }

    pub fn clear_play_next(&mut self) {
        self.play_next.clear();
    }

    pub fn play_next_list(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.play_next.iter().copied()
    }
}
