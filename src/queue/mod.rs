//! Play queue
//!
//! Holds logical tracks and a cursor. It never talks to sources itself: the
//! caller reads `current_track()` after moving the cursor and hands it to
//! `SourceManager::play_track`.

use crate::sources::Track;
use rand::seq::SliceRandom;

#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    current: Option<usize>,
    repeat: bool,
    shuffle: bool,
    /// Play order over `tracks` indices while shuffling.
    order: Vec<usize>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue and point at the first track.
    pub fn replace(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.current = if self.tracks.is_empty() { None } else { Some(0) };
        self.rebuild_order();
    }

    pub fn add(&mut self, track: Track) {
        self.tracks.push(track);
        if self.current.is_none() {
            self.current = Some(0);
        }
        self.rebuild_order();
    }

    /// Insert right after the current track.
    pub fn play_next(&mut self, track: Track) {
        let at = self.current.map_or(0, |c| c + 1);
        self.tracks.insert(at, track);
        if self.current.is_none() {
            self.current = Some(0);
        }
        self.rebuild_order();
    }

    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        let track = self.tracks.remove(index);

        if let Some(current) = self.current {
            if self.tracks.is_empty() {
                self.current = None;
            } else if index < current || current >= self.tracks.len() {
                self.current = Some(current - 1);
            }
        }

        self.rebuild_order();
        Some(track)
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = None;
        self.order.clear();
    }

    pub fn set_current(&mut self, index: usize) -> Option<&Track> {
        if index >= self.tracks.len() {
            return None;
        }
        self.current = Some(index);
        self.tracks.get(index)
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Repeat the current track when it ends.
    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
        self.rebuild_order();
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Move to the next track. Stays put at the end of the queue.
    pub fn skip(&mut self) -> Option<&Track> {
        let next = self.step(1)?;
        self.current = Some(next);
        self.tracks.get(next)
    }

    /// Move to the previous track. Stays put at the start of the queue.
    pub fn previous(&mut self) -> Option<&Track> {
        let prev = self.step(-1)?;
        self.current = Some(prev);
        self.tracks.get(prev)
    }

    /// What to play once the current track has ended, if anything.
    pub fn advance_after_end(&mut self) -> Option<&Track> {
        if self.repeat {
            return self.current_track();
        }
        self.skip()
    }

    fn step(&self, delta: isize) -> Option<usize> {
        let current = self.current?;
        if self.shuffle && !self.order.is_empty() {
            let pos = self.order.iter().position(|&i| i == current)?;
            let target = pos.checked_add_signed(delta)?;
            self.order.get(target).copied()
        } else {
            let target = current.checked_add_signed(delta)?;
            (target < self.tracks.len()).then_some(target)
        }
    }

    fn rebuild_order(&mut self) {
        if !self.shuffle || self.tracks.is_empty() {
            self.order.clear();
            return;
        }

        self.order = (0..self.tracks.len()).collect();
        self.order.shuffle(&mut rand::rng());

        // The playing track stays first so everything else is still ahead.
        if let Some(current) = self.current
            && let Some(pos) = self.order.iter().position(|&i| i == current)
        {
            self.order.swap(0, pos);
        }
    }
}
