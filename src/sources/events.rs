//! Playback event bus
//!
//! Three independent channels: time updates `(position, duration)` in
//! seconds, play/pause status changes, and playback errors. Delivery is
//! synchronous, on the caller of `emit_*`, in subscription order. Nothing is
//! buffered or coalesced.

use super::types::PlayStatus;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

pub type TimeUpdateCallback = Arc<dyn Fn(f64, f64) + Send + Sync>;
pub type PlayPauseCallback = Arc<dyn Fn(PlayStatus) + Send + Sync>;
pub type PlaybackErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    time: Vec<(u64, TimeUpdateCallback)>,
    play_pause: Vec<(u64, PlayPauseCallback)>,
    error: Vec<(u64, PlaybackErrorCallback)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Channel {
    Time,
    PlayPause,
    Error,
}

/// In-process publish/subscribe for playback notifications.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Listeners>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (time, play_pause) = self.listener_count();
        f.debug_struct("EventBus")
            .field("time_listeners", &time)
            .field("play_pause_listeners", &play_pause)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn on_time_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(f64, f64) + Send + Sync + 'static,
    {
        let mut l = self.lock();
        l.next_id += 1;
        let id = l.next_id;
        l.time.push((id, Arc::new(callback)));
        tracing::debug!(listeners = l.time.len(), "time update listener added");
        Subscription::new(&self.listeners, Channel::Time, id)
    }

    pub fn on_play_pause<F>(&self, callback: F) -> Subscription
    where
        F: Fn(PlayStatus) + Send + Sync + 'static,
    {
        let mut l = self.lock();
        l.next_id += 1;
        let id = l.next_id;
        l.play_pause.push((id, Arc::new(callback)));
        tracing::debug!(listeners = l.play_pause.len(), "play/pause listener added");
        Subscription::new(&self.listeners, Channel::PlayPause, id)
    }

    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut l = self.lock();
        l.next_id += 1;
        let id = l.next_id;
        l.error.push((id, Arc::new(callback)));
        Subscription::new(&self.listeners, Channel::Error, id)
    }

    pub fn emit_time_update(&self, position: f64, duration: f64) {
        // Snapshot so listeners may (un)subscribe while being called.
        let snapshot: Vec<TimeUpdateCallback> =
            self.lock().time.iter().map(|(_, cb)| cb.clone()).collect();
        for cb in snapshot {
            cb(position, duration);
        }
    }

    pub fn emit_play_pause(&self, status: PlayStatus) {
        let snapshot: Vec<PlayPauseCallback> = self
            .lock()
            .play_pause
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in snapshot {
            cb(status);
        }
    }

    pub fn emit_error(&self, message: &str) {
        let snapshot: Vec<PlaybackErrorCallback> =
            self.lock().error.iter().map(|(_, cb)| cb.clone()).collect();
        for cb in snapshot {
            cb(message);
        }
    }

    /// `(time listeners, play/pause listeners)`
    pub fn listener_count(&self) -> (usize, usize) {
        let l = self.lock();
        (l.time.len(), l.play_pause.len())
    }

    pub fn error_listener_count(&self) -> usize {
        self.lock().error.len()
    }
}

/// Handle returned by every registration; dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    listeners: Weak<Mutex<Listeners>>,
    channel: Channel,
    id: u64,
}

impl Subscription {
    fn new(listeners: &Arc<Mutex<Listeners>>, channel: Channel, id: u64) -> Self {
        Self {
            listeners: Arc::downgrade(listeners),
            channel,
            id,
        }
    }

    /// A handle that is not attached to any bus. Dropping it does nothing.
    pub fn detached() -> Self {
        Self {
            listeners: Weak::new(),
            channel: Channel::Time,
            id: 0,
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        let mut l = listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match self.channel {
            Channel::Time => {
                l.time.retain(|(id, _)| *id != self.id);
                tracing::debug!(listeners = l.time.len(), "time update listener removed");
            }
            Channel::PlayPause => {
                l.play_pause.retain(|(id, _)| *id != self.id);
                tracing::debug!(listeners = l.play_pause.len(), "play/pause listener removed");
            }
            Channel::Error => l.error.retain(|(id, _)| *id != self.id),
        }
    }
}
