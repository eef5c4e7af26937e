pub mod actions;
pub mod events;
pub mod state;

use crate::config::Config;
use crate::input;
use crate::lyrics::{LrclibClient, LyricsFallback};
use crate::queue::Queue;
use crate::sources::musickit::MusicKitSource;
use crate::sources::navidrome::NavidromeSource;
use crate::sources::settings::{
    self, ACTIVE_SERVER_KEY, SOURCE_PRIORITY_KEY, ServerConnection, TIDAL_SESSION_KEY,
    TidalSession,
};
use crate::sources::tidal::TidalSource;
use crate::sources::{
    Lyrics, PlayOutcome, PlayStatus, SearchResults, SourceBootstrap, SourceId, SourceManager,
    Subscription, Track,
};
use crate::storage::Storage;
use actions::Action;
use anyhow::Context;
use events::{Event, PlayerEvent};
use state::SessionState;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    pub shuffle: bool,
    pub repeat: bool,
}

/// Application wiring: persisted settings, the source manager and the
/// lyrics fallback, built once from the config.
pub struct App {
    cfg: Config,
    storage: Arc<Storage>,
    lrclib: Arc<LrclibClient>,
    manager: SourceManager,
}

impl App {
    pub fn new(cfg: Config) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::open(&cfg.database_path()).context("open settings store")?);
        Self::with_storage(cfg, storage)
    }

    pub fn with_storage(cfg: Config, storage: Arc<Storage>) -> anyhow::Result<Self> {
        let lrclib = Arc::new(
            LrclibClient::with_base_url(cfg.lyrics.lrclib_url.clone())
                .context("create lrclib client")?,
        );
        let manager = SourceManager::new(storage.clone(), lrclib.clone());
        Ok(Self {
            cfg,
            storage,
            lrclib,
            manager,
        })
    }

    pub fn manager(&self) -> &SourceManager {
        &self.manager
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Sources this process can construct on its own from persisted settings.
    pub fn bootstrap_plan(&self) -> anyhow::Result<SourceBootstrap> {
        let mut plan = SourceBootstrap::new();
        let player = self.cfg.mpv_options();

        match NavidromeSource::from_settings(self.storage.as_ref(), player.clone())
            .context("load active server")?
        {
            Some(source) => plan = plan.with_source(Arc::new(source)),
            None => tracing::info!("no active server configured"),
        }
        match TidalSource::from_settings(self.storage.as_ref(), player)
            .context("load tidal session")?
        {
            Some(source) => plan = plan.with_source(Arc::new(source)),
            None => tracing::debug!("tidal not linked"),
        }
        Ok(plan)
    }

    /// Bring up the configured sources.
    pub async fn start(&self) -> anyhow::Result<()> {
        if self.cfg.sources.musickit {
            tracing::warn!("musickit enabled but no bridge is available in this process");
        }
        let plan = self.bootstrap_plan()?;
        self.manager.initialize_sources(plan).await;
        Ok(())
    }

    /// Like [`App::start`], for hosts embedding the MusicKit SDK.
    pub async fn start_with_musickit(
        &self,
        source: Arc<MusicKitSource>,
        ready: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let plan = self.bootstrap_plan()?.with_native(source, ready);
        self.manager.initialize_sources(plan).await;
        Ok(())
    }

    pub async fn search(&self, query: &str) -> SearchResults {
        self.manager.search(query).await
    }

    /// Direct LRCLIB lookup, independent of playback.
    pub async fn lookup_lyrics(&self, title: &str, artist: &str, album: &str) -> Lyrics {
        self.lrclib.fetch_by_metadata(title, artist, album).await
    }

    // Persisted source settings

    pub fn set_server(&self, server: &ServerConnection) -> anyhow::Result<()> {
        self.storage.set_json(ACTIVE_SERVER_KEY, server)
    }

    pub fn clear_server(&self) -> anyhow::Result<bool> {
        self.storage.remove_item(ACTIVE_SERVER_KEY)
    }

    pub fn server(&self) -> anyhow::Result<Option<ServerConnection>> {
        settings::active_server(self.storage.as_ref())
    }

    pub fn priority(&self) -> Vec<SourceId> {
        settings::source_priority(self.storage.as_ref())
    }

    pub fn set_priority(&self, tags: &[String]) -> anyhow::Result<Vec<SourceId>> {
        let priority = parse_priority(tags)?;
        self.storage.set_json(SOURCE_PRIORITY_KEY, &priority)?;
        Ok(priority)
    }

    pub fn link_tidal(&self, session: &TidalSession) -> anyhow::Result<()> {
        self.storage.set_json(TIDAL_SESSION_KEY, session)
    }

    pub fn unlink_tidal(&self) -> anyhow::Result<bool> {
        self.storage.remove_item(TIDAL_SESSION_KEY)
    }

    // Interactive playback

    /// Play `tracks` in order, reading transport commands from stdin until
    /// the queue runs out or the user quits.
    pub async fn run_session(
        &self,
        tracks: Vec<Track>,
        options: SessionOptions,
    ) -> anyhow::Result<()> {
        let mut queue = Queue::new();
        queue.replace(tracks);
        queue.set_shuffle(options.shuffle);
        queue.set_repeat(options.repeat);
        let mut state = SessionState::new(self.cfg.volume());

        let (tx, mut rx) = mpsc::channel::<Event>(256);
        let (mut player_rx, _subscriptions) = subscribe_player(&self.manager, &tx);
        input::spawn_input_task(tx);
        println!("{}", actions::HELP);

        if !self.play_current(&mut queue, &mut state).await {
            println!("Nothing in the queue can be played.");
            return Ok(());
        }

        loop {
            let event = tokio::select! {
                biased;
                Some(event) = player_rx.recv() => Event::Player(event),
                Some(event) = rx.recv() => event,
                else => break,
            };
            match event {
                Event::Player(PlayerEvent::Status(PlayStatus::Ended)) => {
                    if queue.advance_after_end().is_none() {
                        println!("End of queue.");
                        break;
                    }
                    if !self.play_current(&mut queue, &mut state).await {
                        break;
                    }
                }
                Event::Player(PlayerEvent::Status(status)) => {
                    if status != state.status {
                        println!("[{status}]");
                    }
                    state.status = status;
                }
                Event::Player(PlayerEvent::Position { position, duration }) => {
                    for line in state.progress(position, duration) {
                        println!("{line}");
                    }
                }
                Event::Player(PlayerEvent::Error(message)) => {
                    println!("{message}");
                    if queue.skip().is_none() {
                        println!("End of queue.");
                        break;
                    }
                    if !self.play_current(&mut queue, &mut state).await {
                        break;
                    }
                }
                Event::Input(action) => {
                    if !self.handle_action(action, &mut queue, &mut state).await {
                        break;
                    }
                }
                Event::InputClosed => break,
            }
        }

        self.manager.pause().await;
        Ok(())
    }

    /// Returns false when the session should end.
    async fn handle_action(
        &self,
        action: Action,
        queue: &mut Queue,
        state: &mut SessionState,
    ) -> bool {
        match action {
            Action::Quit => return false,
            Action::TogglePause => {
                if state.status == PlayStatus::Playing {
                    self.manager.pause().await;
                } else {
                    self.manager.resume().await;
                }
            }
            Action::PlayNext => {
                if queue.skip().is_some() {
                    self.play_current(queue, state).await;
                } else {
                    println!("Already at the last track.");
                }
            }
            Action::PlayPrev => {
                if queue.previous().is_some() {
                    self.play_current(queue, state).await;
                } else {
                    self.manager.seek(0.0).await;
                }
            }
            Action::Seek(delta) => {
                let target = (self.manager.position() + delta).max(0.0);
                self.manager.seek(target).await;
            }
            Action::SeekTo(position) => self.manager.seek(position).await,
            Action::VolumeUp | Action::VolumeDown => {
                let steps = if action == Action::VolumeUp { 1 } else { -1 };
                let volume = state.adjust_volume(steps);
                self.manager.set_volume(volume).await;
                println!("volume {:.0}%", volume * 100.0);
            }
            Action::ToggleRepeat => {
                let repeat = !queue.repeat();
                queue.set_repeat(repeat);
                self.manager.set_repeat(repeat).await;
                println!("repeat {}", if repeat { "on" } else { "off" });
            }
            Action::ShowLyrics => println!("{}", state.lyrics_block()),
            Action::ShowQueue => print_queue(queue),
            Action::Help => println!("{}", actions::HELP),
        }
        true
    }

    /// Start the queue's current track, skipping forward past tracks no
    /// source can play. Returns false if nothing could be started.
    async fn play_current(&self, queue: &mut Queue, state: &mut SessionState) -> bool {
        loop {
            let Some(track) = queue.current_track().cloned() else {
                return false;
            };
            match self.manager.play_track(&track).await {
                Ok(PlayOutcome::Started(source)) => {
                    println!("▶ {} - {} [{source}]", track.title, track.artist);
                    self.manager.set_volume(state.volume).await;
                    if queue.repeat() {
                        self.manager.set_repeat(true).await;
                    }
                    state.track_started(self.manager.get_lyrics(&track.id).await);
                    return true;
                }
                Ok(PlayOutcome::Superseded) => return true,
                Ok(PlayOutcome::NoAvailableSource) => {
                    println!("skipping {}: no available source", track.title);
                }
                Err(e) => {
                    tracing::warn!(track = %track.id, "play failed: {e}");
                    println!("skipping {}: {e}", track.title);
                }
            }
            if queue.skip().is_none() {
                return false;
            }
        }
    }
}

/// Manager notifications for a play session. Status changes and playback
/// errors go through their own unbounded channel so an `Ended` is never
/// lost. Time updates share the bounded session channel and are dropped
/// when it is full; the next update supersedes them.
fn subscribe_player(
    manager: &SourceManager,
    tx: &mpsc::Sender<Event>,
) -> (mpsc::UnboundedReceiver<PlayerEvent>, Vec<Subscription>) {
    let (player_tx, player_rx) = mpsc::unbounded_channel();
    let status = {
        let player_tx = player_tx.clone();
        manager.on_play_pause(move |status| {
            let _ = player_tx.send(PlayerEvent::Status(status));
        })
    };
    let error = manager.on_error(move |message| {
        let _ = player_tx.send(PlayerEvent::Error(message.to_string()));
    });
    let time = {
        let tx = tx.clone();
        manager.on_time_update(move |position, duration| {
            let _ = tx.try_send(Event::Player(PlayerEvent::Position { position, duration }));
        })
    };
    (player_rx, vec![status, error, time])
}

/// Validate a priority list given on the command line.
pub fn parse_priority(tags: &[String]) -> anyhow::Result<Vec<SourceId>> {
    let mut priority: Vec<SourceId> = Vec::new();
    for tag in tags.iter().map(|t| t.trim()) {
        anyhow::ensure!(!tag.is_empty(), "empty source name");
        let id = SourceId::from(tag);
        anyhow::ensure!(!priority.contains(&id), "{tag} listed twice");
        priority.push(id);
    }
    anyhow::ensure!(!priority.is_empty(), "priority list is empty");
    let known = settings::default_priority();
    for id in priority.iter().filter(|id| !known.contains(id)) {
        tracing::warn!(source = %id, "not a built-in source; it will never match");
    }
    Ok(priority)
}

pub fn print_queue(queue: &Queue) {
    for (i, t) in queue.tracks().iter().enumerate() {
        let marker = if queue.current_index() == Some(i) { ">" } else { " " };
        println!("{marker}{:02}. {} - {}", i + 1, t.title, t.artist);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        App::with_storage(Config::default(), storage).unwrap()
    }

    #[test]
    fn priority_must_be_unique_and_non_empty() {
        let tags = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(
            parse_priority(&tags(&["tidal", " navidrome "])).unwrap(),
            vec![SourceId::tidal(), SourceId::navidrome()]
        );
        assert!(parse_priority(&tags(&[])).is_err());
        assert!(parse_priority(&tags(&["tidal", "tidal"])).is_err());
        assert!(parse_priority(&tags(&["", "tidal"])).is_err());
    }

    #[test]
    fn settings_commands_persist() {
        let app = app();
        assert_eq!(app.priority(), settings::default_priority());

        app.set_priority(&["musicKit".to_string(), "navidrome".to_string()])
            .unwrap();
        assert_eq!(
            app.priority(),
            vec![SourceId::musickit(), SourceId::navidrome()]
        );

        let server = ServerConnection {
            url: "https://music.example".into(),
            username: "me".into(),
            hash: "h".into(),
            salt: "s".into(),
            id: String::new(),
        };
        app.set_server(&server).unwrap();
        assert_eq!(app.server().unwrap(), Some(server));
        assert!(app.clear_server().unwrap());
        assert_eq!(app.server().unwrap(), None);

        assert!(!app.unlink_tidal().unwrap());
    }

    struct BusSource {
        bus: crate::sources::EventBus,
    }

    #[async_trait::async_trait]
    impl crate::sources::Source for BusSource {
        fn id(&self) -> SourceId {
            SourceId::navidrome()
        }

        async fn play(&self) -> crate::sources::Result<()> {
            Ok(())
        }

        async fn pause(&self) -> crate::sources::Result<()> {
            Ok(())
        }

        async fn play_track(&self, _track_id: &str) -> crate::sources::Result<()> {
            Ok(())
        }

        async fn seek(&self, _position_secs: f64) -> crate::sources::Result<()> {
            Ok(())
        }

        async fn set_volume(&self, _volume: f64) -> crate::sources::Result<()> {
            Ok(())
        }

        async fn get_lyrics(&self, _track_id: &str) -> crate::sources::Result<Lyrics> {
            Ok(Lyrics::not_found("navidrome"))
        }

        async fn search(&self, _query: &str) -> crate::sources::Result<SearchResults> {
            Ok(SearchResults::default())
        }

        fn on_time_update(
            &self,
            callback: crate::sources::events::TimeUpdateCallback,
        ) -> Subscription {
            self.bus.on_time_update(move |p, d| callback(p, d))
        }

        fn on_play_pause(
            &self,
            callback: crate::sources::events::PlayPauseCallback,
        ) -> Subscription {
            self.bus.on_play_pause(move |s| callback(s))
        }

        fn on_error(&self, callback: crate::sources::events::PlaybackErrorCallback) -> Subscription {
            self.bus.on_error(move |m| callback(m))
        }
    }

    #[tokio::test]
    async fn end_and_error_survive_a_full_session_channel() {
        let app = app();
        let source = Arc::new(BusSource {
            bus: crate::sources::EventBus::new(),
        });
        app.manager()
            .initialize_sources(SourceBootstrap::new().with_source(source.clone()))
            .await;
        app.manager()
            .play_track(&Track::new(SourceId::navidrome(), "1", "Song", "Band"))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel::<Event>(1);
        tx.try_send(Event::InputClosed).unwrap();
        let (mut player_rx, subscriptions) = subscribe_player(app.manager(), &tx);

        source.bus.emit_time_update(3.0, 180.0);
        source.bus.emit_play_pause(PlayStatus::Ended);
        source.bus.emit_error("playback failed: loading failed");

        assert_eq!(
            player_rx.try_recv().unwrap(),
            PlayerEvent::Status(PlayStatus::Ended)
        );
        assert_eq!(
            player_rx.try_recv().unwrap(),
            PlayerEvent::Error("playback failed: loading failed".into())
        );
        assert_eq!(rx.try_recv().unwrap(), Event::InputClosed);
        assert!(rx.try_recv().is_err());

        drop(subscriptions);
        source.bus.emit_play_pause(PlayStatus::Playing);
        assert!(player_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn bootstrap_registers_linked_sources_only() {
        let app = app();
        app.link_tidal(&TidalSession {
            access_token: "tok".into(),
            country_code: "US".into(),
        })
        .unwrap();

        app.start().await.unwrap();

        assert!(app.manager().is_initialized());
        assert_eq!(app.manager().registered(), vec![SourceId::tidal()]);
    }
}
