//! Source orchestration
//!
//! `SourceManager` owns the registered backends and decides which one drives
//! playback. It is created once at startup and handed to whoever needs it
//! (it is a cheap `Clone`). Only the manager mutates the active-source pointer
//! and the current-track snapshot; backends talk back exclusively through the
//! listeners the manager registers on them.

use super::events::{EventBus, Subscription};
use super::merge::merge_search_results;
use super::settings::{self, SettingsReader};
use super::types::{
    AlbumDetails, ArtistDetails, Lyrics, NO_LYRICS_FOUND, PlayStatus, Playlist, PlaylistDetails,
    SearchResults, SourceId, Track,
};
use super::{Result, Source, SourceError};
use crate::lyrics::LyricsFallback;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;
use tokio::sync::{OnceCell, watch};

/// Upper bound on waiting for sources to come up, both for the bootstrap
/// itself and for any operation waiting on it.
pub const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(10);

/// Tag used on lyrics errors produced by the manager itself.
const MANAGER_TAG: &str = "sources";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The track was handed to this source.
    Started(SourceId),
    /// No preferred source can serve the track (or it is not linked).
    NoAvailableSource,
    /// A newer play request arrived before this one got its turn.
    Superseded,
}

/// What playback is currently on, independent of the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentTrack {
    /// Id as the caller knows the track.
    pub id: String,
    /// Id on the source actually playing it.
    pub native_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    pub source: SourceId,
    /// Seconds.
    pub position: f64,
}

/// A source whose SDK signals readiness asynchronously.
pub struct PendingSource {
    pub source: Arc<dyn Source>,
    pub ready: watch::Receiver<bool>,
}

/// Sources to bring up during [`SourceManager::initialize_sources`].
#[derive(Default)]
pub struct SourceBootstrap {
    sources: Vec<Arc<dyn Source>>,
    native: Option<PendingSource>,
}

impl SourceBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register immediately.
    pub fn with_source(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(source);
        self
    }

    /// Register once `ready` flips to true, unless that takes longer than
    /// [`BOOTSTRAP_TIMEOUT`].
    pub fn with_native(mut self, source: Arc<dyn Source>, ready: watch::Receiver<bool>) -> Self {
        self.native = Some(PendingSource { source, ready });
        self
    }
}

struct PlaybackState {
    active: Option<SourceId>,
    current: Option<CurrentTrack>,
    position: f64,
    duration: f64,
    status: PlayStatus,
    /// Listeners on the active source; dropping them detaches.
    relays: Vec<Subscription>,
}

struct Inner {
    settings: Arc<dyn SettingsReader>,
    fallback: Arc<dyn LyricsFallback>,
    registry: RwLock<Vec<Arc<dyn Source>>>,
    state: Mutex<PlaybackState>,
    bus: EventBus,
    ready_tx: watch::Sender<bool>,
    bootstrap: OnceCell<()>,
    switch_lock: tokio::sync::Mutex<()>,
    play_requests: AtomicU64,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, PlaybackState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Relays drop events from a source that is no longer active: a late
    // event can still be in flight after a switch detached its listeners.

    fn relay_time(&self, from: &SourceId, position: f64, duration: f64) {
        {
            let mut state = self.state();
            if state.active.as_ref() != Some(from) {
                return;
            }
            state.position = position;
            state.duration = duration;
        }
        self.bus.emit_time_update(position, duration);
    }

    fn relay_status(&self, from: &SourceId, status: PlayStatus) {
        {
            let mut state = self.state();
            if state.active.as_ref() != Some(from) {
                return;
            }
            state.status = status;
        }
        self.bus.emit_play_pause(status);
    }

    fn relay_error(&self, from: &SourceId, message: &str) {
        {
            let mut state = self.state();
            if state.active.as_ref() != Some(from) {
                return;
            }
            state.status = PlayStatus::Paused;
        }
        tracing::warn!(source = %from, "{message}");
        self.bus.emit_error(message);
    }
}

#[derive(Clone)]
pub struct SourceManager {
    inner: Arc<Inner>,
}

impl SourceManager {
    pub fn new(settings: Arc<dyn SettingsReader>, fallback: Arc<dyn LyricsFallback>) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                settings,
                fallback,
                registry: RwLock::new(Vec::new()),
                state: Mutex::new(PlaybackState {
                    active: None,
                    current: None,
                    position: 0.0,
                    duration: 0.0,
                    status: PlayStatus::Paused,
                    relays: Vec::new(),
                }),
                bus: EventBus::new(),
                ready_tx,
                bootstrap: OnceCell::new(),
                switch_lock: tokio::sync::Mutex::new(()),
                play_requests: AtomicU64::new(0),
            }),
        }
    }

    // Registry

    /// Add a source, or replace the instance registered under the same id.
    pub fn register(&self, source: Arc<dyn Source>) {
        let id = source.id();
        let mut registry = self.inner.registry.write().unwrap_or_else(|e| e.into_inner());
        match registry.iter_mut().find(|s| s.id() == id) {
            Some(slot) => *slot = source,
            None => registry.push(source),
        }
        tracing::info!(source = %id, "source registered");
    }

    pub fn registered(&self) -> Vec<SourceId> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|s| s.id())
            .collect()
    }

    fn source(&self, id: &SourceId) -> Option<Arc<dyn Source>> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|s| s.id() == *id)
            .cloned()
    }

    fn active(&self) -> Option<Arc<dyn Source>> {
        let id = self.inner.state().active.clone()?;
        self.source(&id)
    }

    /// Sources in search order: by priority, then the rest by registration.
    fn fan_out_order(&self) -> Vec<Arc<dyn Source>> {
        let priority = settings::source_priority(self.inner.settings.as_ref());
        let registry = self
            .inner
            .registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let mut ordered: Vec<Arc<dyn Source>> = priority
            .iter()
            .filter_map(|tag| registry.iter().find(|s| s.id() == *tag).cloned())
            .collect();
        ordered.extend(
            registry
                .into_iter()
                .filter(|s| !priority.contains(&s.id())),
        );
        ordered
    }

    // Bootstrap

    /// Bring up the configured sources and open the gate every other
    /// operation waits on. Only the first call does any work.
    pub async fn initialize_sources(&self, plan: SourceBootstrap) {
        self.inner
            .bootstrap
            .get_or_init(|| async move {
                for source in plan.sources {
                    self.register(source);
                }

                if let Some(PendingSource { source, mut ready }) = plan.native {
                    let id = source.id();
                    let outcome = tokio::time::timeout(BOOTSTRAP_TIMEOUT, ready.wait_for(|r| *r))
                        .await
                        .map(|r| r.is_ok());
                    match outcome {
                        Ok(true) => self.register(source),
                        Ok(false) => {
                            tracing::warn!(source = %id, "readiness signal dropped; continuing without it")
                        }
                        Err(_) => tracing::warn!(
                            source = %id,
                            "not ready after {BOOTSTRAP_TIMEOUT:?}; continuing without it"
                        ),
                    }
                }

                self.inner.ready_tx.send_replace(true);
                tracing::info!(sources = ?self.registered(), "sources initialized");
            })
            .await;
    }

    pub fn is_initialized(&self) -> bool {
        *self.inner.ready_tx.borrow()
    }

    /// Wait for the bootstrap, at most [`BOOTSTRAP_TIMEOUT`]. Once that
    /// bound has passed the bootstrap counts as complete for every caller.
    pub async fn ready(&self) {
        let mut rx = self.inner.ready_tx.subscribe();
        let timed_out = tokio::time::timeout(BOOTSTRAP_TIMEOUT, rx.wait_for(|r| *r))
            .await
            .is_err();
        if timed_out {
            tracing::warn!("sources not initialized after {BOOTSTRAP_TIMEOUT:?}; using what is registered");
            self.inner.ready_tx.send_replace(true);
        }
    }

    // Playback

    /// Play a logical track on the first preferred source that can serve it.
    ///
    /// Calls are serialized. If newer calls are already waiting when this one
    /// gets its turn, it steps aside and returns [`PlayOutcome::Superseded`].
    /// Errors from the chosen source's `play_track` are returned as-is.
    pub async fn play_track(&self, track: &Track) -> Result<PlayOutcome> {
        self.ready().await;

        let ticket = self.inner.play_requests.fetch_add(1, Ordering::SeqCst) + 1;
        let _turn = self.inner.switch_lock.lock().await;
        if self.inner.play_requests.load(Ordering::SeqCst) != ticket {
            tracing::debug!(track = %track.id, "play request superseded");
            return Ok(PlayOutcome::Superseded);
        }

        let priority = settings::source_priority(self.inner.settings.as_ref());
        let Some(id) = settings::select_source(track, &priority, |tag| self.source(tag).is_some())
        else {
            tracing::info!(
                track = %track.id,
                available = ?track.available_sources,
                "no available source"
            );
            return Ok(PlayOutcome::NoAvailableSource);
        };
        let Some(source) = self.source(&id) else {
            return Ok(PlayOutcome::NoAvailableSource);
        };

        let previous = self.inner.state().active.clone();
        let switching = previous.as_ref() != Some(&id);

        if switching {
            if let Some(prev) = previous.as_ref().and_then(|p| self.source(p)) {
                if let Err(e) = prev.pause().await {
                    tracing::warn!(source = %prev.id(), "pause on switch failed: {e}");
                }
            }
            tracing::info!(from = ?previous, to = %id, "switching source");
        }

        let native_id = track.native_id(&id).to_string();
        {
            let relays = if switching {
                self.attach(&source)
            } else {
                Vec::new()
            };
            let mut state = self.inner.state();
            if switching {
                // Replacing drops the old listeners before the new ones are live.
                state.relays = relays;
            }
            state.active = Some(id.clone());
            state.position = 0.0;
            state.duration = 0.0;
            state.current = Some(CurrentTrack {
                id: track.id.clone(),
                native_id: native_id.clone(),
                title: track.title.clone(),
                artist: track.artist.clone(),
                album: track.album.clone(),
                duration_ms: track.duration_ms,
                source: id.clone(),
                position: 0.0,
            });
        }

        tracing::info!(source = %id, track = %native_id, title = %track.title, "play");
        source.play_track(&native_id).await.inspect_err(|e| {
            tracing::warn!(source = %id, track = %native_id, "play failed: {e}");
        })?;
        Ok(PlayOutcome::Started(id))
    }

    fn attach(&self, source: &Arc<dyn Source>) -> Vec<Subscription> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let id = source.id();
        let time = {
            let (weak, id) = (weak.clone(), id.clone());
            source.on_time_update(Arc::new(move |position, duration| {
                if let Some(inner) = weak.upgrade() {
                    inner.relay_time(&id, position, duration);
                }
            }))
        };
        let status = {
            let (weak, id) = (weak.clone(), id.clone());
            source.on_play_pause(Arc::new(move |status| {
                if let Some(inner) = weak.upgrade() {
                    inner.relay_status(&id, status);
                }
            }))
        };
        let error = source.on_error(Arc::new(move |message| {
            if let Some(inner) = weak.upgrade() {
                inner.relay_error(&id, message);
            }
        }));
        vec![time, status, error]
    }

    async fn forward<F, Fut>(&self, operation: &'static str, call: F)
    where
        F: FnOnce(Arc<dyn Source>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.ready().await;
        let Some(source) = self.active() else {
            tracing::debug!("{operation}: no active source");
            return;
        };
        let id = source.id();
        if let Err(e) = call(source).await {
            tracing::warn!(source = %id, "{operation} failed: {e}");
        }
    }

    pub async fn pause(&self) {
        self.forward("pause", |s| async move { s.pause().await }).await
    }

    pub async fn resume(&self) {
        self.forward("play", |s| async move { s.play().await }).await
    }

    pub async fn seek(&self, position_secs: f64) {
        if !position_secs.is_finite() {
            return;
        }
        self.forward("seek", |s| async move { s.seek(position_secs.max(0.0)).await })
            .await
    }

    pub async fn set_volume(&self, volume: f64) {
        if !volume.is_finite() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.forward("set volume", |s| async move { s.set_volume(volume).await })
            .await
    }

    pub async fn set_repeat(&self, enabled: bool) {
        self.forward("set repeat", |s| async move { s.set_repeat(enabled).await })
            .await
    }

    // Search

    /// Query every registered source concurrently and merge the results.
    /// A failing source contributes nothing.
    pub async fn search(&self, query: &str) -> SearchResults {
        self.ready().await;

        let sources = self.fan_out_order();
        let queries = sources.iter().map(|source| async move {
            let id = source.id();
            match source.search(query).await {
                Ok(results) => (id, results),
                Err(e) => {
                    tracing::warn!(source = %id, query, "search failed: {e}");
                    (id, SearchResults::default())
                }
            }
        });
        let per_source = futures::future::join_all(queries).await;
        merge_search_results(per_source)
    }

    // Lyrics

    /// Lyrics from the active source, or from the fallback provider when the
    /// source has none or only unsynced ones.
    ///
    /// A successful fallback result wins over unsynced source lyrics even if
    /// it is itself unsynced.
    pub async fn get_lyrics(&self, track_id: &str) -> Lyrics {
        self.ready().await;

        let Some(source) = self.active() else {
            return Lyrics::error("No active source", MANAGER_TAG);
        };
        let current = self.inner.state().current.clone();
        let native_id = current
            .as_ref()
            .filter(|c| c.id == track_id)
            .map_or(track_id, |c| c.native_id.as_str());

        let primary = match source.get_lyrics(native_id).await {
            Ok(lyrics) => lyrics,
            Err(e) => Lyrics::error(e.to_string(), source.id().to_string()),
        };
        if !wants_fallback(&primary) {
            return primary;
        }
        let Some(current) = current else {
            return primary;
        };

        let fallback = self
            .inner
            .fallback
            .fetch_by_metadata(&current.title, &current.artist, &current.album)
            .await;
        if fallback.is_error() {
            tracing::debug!(title = %current.title, "fallback lyrics unavailable");
            primary
        } else {
            fallback
        }
    }

    // Catalog

    fn registered_source(&self, id: &SourceId) -> Result<Arc<dyn Source>> {
        self.source(id)
            .ok_or_else(|| SourceError::NotRegistered(id.clone()))
    }

    pub async fn get_song(&self, source: &SourceId, track_id: &str) -> Result<Track> {
        self.ready().await;
        self.registered_source(source)?.get_song(track_id).await
    }

    pub async fn get_album(&self, source: &SourceId, album_id: &str) -> Result<AlbumDetails> {
        self.ready().await;
        self.registered_source(source)?.get_album(album_id).await
    }

    pub async fn get_artist(&self, source: &SourceId, artist_id: &str) -> Result<ArtistDetails> {
        self.ready().await;
        self.registered_source(source)?.get_artist(artist_id).await
    }

    pub async fn get_playlist(
        &self,
        source: &SourceId,
        playlist_id: &str,
    ) -> Result<PlaylistDetails> {
        self.ready().await;
        self.registered_source(source)?
            .get_playlist(playlist_id)
            .await
    }

    /// Library playlists of every registered source, in search order.
    /// Sources without playlists, or failing ones, contribute nothing.
    pub async fn get_playlists(&self) -> Vec<Playlist> {
        self.ready().await;

        let sources = self.fan_out_order();
        let lists = sources.iter().map(|source| async move {
            match source.get_playlists().await {
                Ok(playlists) => playlists,
                Err(SourceError::Unsupported { .. }) => Vec::new(),
                Err(e) => {
                    tracing::warn!(source = %source.id(), "playlists failed: {e}");
                    Vec::new()
                }
            }
        });
        futures::future::join_all(lists)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    // Events and state

    pub fn on_time_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(f64, f64) + Send + Sync + 'static,
    {
        self.inner.bus.on_time_update(callback)
    }

    pub fn on_play_pause<F>(&self, callback: F) -> Subscription
    where
        F: Fn(PlayStatus) + Send + Sync + 'static,
    {
        self.inner.bus.on_play_pause(callback)
    }

    /// Playback failures of the active source, e.g. a stream that cannot be
    /// opened. Status drops to paused; retrying means playing a track again.
    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.bus.on_error(callback)
    }

    pub fn active_source(&self) -> Option<SourceId> {
        self.inner.state().active.clone()
    }

    pub fn current_track(&self) -> Option<CurrentTrack> {
        let state = self.inner.state();
        state.current.clone().map(|mut c| {
            c.position = state.position;
            c
        })
    }

    pub fn position(&self) -> f64 {
        self.inner.state().position
    }

    pub fn duration(&self) -> f64 {
        self.inner.state().duration
    }

    pub fn play_status(&self) -> PlayStatus {
        self.inner.state().status
    }
}

impl std::fmt::Debug for SourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceManager")
            .field("registered", &self.registered())
            .field("active", &self.active_source())
            .finish()
    }
}

/// Source lyrics that should be replaced by a fallback lookup if possible.
pub fn wants_fallback(lyrics: &Lyrics) -> bool {
    match lyrics {
        Lyrics::Error { message, .. } => message == NO_LYRICS_FOUND,
        Lyrics::Text(text) => !text.synced,
    }
}

/// `m:ss` for a position in seconds.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total_ms = (seconds * 1000.0).round() as u64;
    let total_secs = total_ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}
