//! Platform music SDK (MusicKit)
//!
//! The SDK lives in the host shell, not in this process. The host implements
//! [`MusicKitBridge`] to forward calls, and feeds SDK notifications back via
//! [`MusicKitSource::handle_state_change`] and
//! [`MusicKitSource::handle_time_change`]. Readiness is signalled separately
//! through the `watch` channel handed to `SourceBootstrap::with_native`.

use super::events::{EventBus, PlayPauseCallback, Subscription, TimeUpdateCallback};
use super::types::{Album, Artist, Lyrics, PlayStatus, SearchResults, SourceId, Track};
use super::{Result, Source, SourceError};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

const ARTWORK_SIZE: &str = "900x900";

/// SDK playback states the player reacts to. Everything else (loading,
/// buffering, seeking, ...) is ignored.
pub mod state {
    pub const PLAYING: i64 = 2;
    pub const PAUSED: i64 = 3;
    pub const ENDED: i64 = 10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    None = 0,
    One = 1,
}

/// Calls the host makes into the SDK on our behalf.
#[async_trait]
pub trait MusicKitBridge: Send + Sync {
    async fn set_queue(&self, song_id: &str) -> anyhow::Result<()>;
    async fn play(&self) -> anyhow::Result<()>;
    async fn pause(&self) -> anyhow::Result<()>;
    async fn seek_to_time(&self, seconds: f64) -> anyhow::Result<()>;
    async fn set_volume(&self, volume: f64) -> anyhow::Result<()>;
    async fn set_repeat_mode(&self, mode: RepeatMode) -> anyhow::Result<()>;
    /// Raw body of `GET /v1/catalog/{storefront}/search` for songs, albums
    /// and artists.
    async fn search(&self, term: &str, limit: u32) -> anyhow::Result<serde_json::Value>;
}

#[derive(Debug, Default, Deserialize)]
struct CatalogSearch {
    #[serde(default)]
    results: CatalogResults,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogResults {
    songs: Option<Resources<SongAttributes>>,
    albums: Option<Resources<AlbumAttributes>>,
    artists: Option<Resources<ArtistAttributes>>,
}

#[derive(Debug, Deserialize)]
struct Resources<A> {
    #[serde(default = "Vec::new")]
    data: Vec<Resource<A>>,
}

#[derive(Debug, Deserialize)]
struct Resource<A> {
    id: String,
    attributes: A,
}

#[derive(Debug, Default, Deserialize)]
struct Artwork {
    #[serde(default)]
    url: String,
}

impl Artwork {
    fn sized(&self) -> String {
        self.url.replace("{w}x{h}", ARTWORK_SIZE)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongAttributes {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist_name: String,
    #[serde(default)]
    album_name: String,
    #[serde(default)]
    duration_in_millis: u64,
    #[serde(default)]
    artwork: Artwork,
    #[serde(default)]
    release_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumAttributes {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist_name: String,
    #[serde(default)]
    artwork: Artwork,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    track_count: u32,
}

#[derive(Debug, Deserialize)]
struct ArtistAttributes {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artwork: Artwork,
}

/// Map an SDK playback-state code onto the bus status, if it is one we report.
pub fn status_for_state(code: i64) -> Option<PlayStatus> {
    match code {
        state::PLAYING => Some(PlayStatus::Playing),
        state::PAUSED => Some(PlayStatus::Paused),
        state::ENDED => Some(PlayStatus::Ended),
        _ => None,
    }
}

fn catalog_to_results(body: serde_json::Value) -> anyhow::Result<SearchResults> {
    let catalog: CatalogSearch = serde_json::from_value(body)?;
    let tag = SourceId::musickit();

    let songs = catalog
        .results
        .songs
        .map(|r| r.data)
        .unwrap_or_default()
        .into_iter()
        .map(|s| {
            let a = s.attributes;
            let mut track = Track::new(tag.clone(), s.id, a.name, a.artist_name)
                .with_album(a.album_name)
                .with_duration_ms(a.duration_in_millis);
            track.quality = "lossless".to_string();
            track.image_url = a.artwork.sized();
            track.release_date = a.release_date;
            track
        })
        .collect();

    // Singles show up as one-track albums; the song entry already covers them.
    let albums = catalog
        .results
        .albums
        .map(|r| r.data)
        .unwrap_or_default()
        .into_iter()
        .filter(|a| a.attributes.track_count > 1)
        .map(|a| Album {
            id: a.id,
            image_url: a.attributes.artwork.sized(),
            title: a.attributes.name,
            artist: a.attributes.artist_name,
            release_date: a.attributes.release_date,
            source: tag.clone(),
        })
        .collect();

    let artists = catalog
        .results
        .artists
        .map(|r| r.data)
        .unwrap_or_default()
        .into_iter()
        .map(|a| Artist {
            id: a.id,
            image_url: a.attributes.artwork.sized(),
            name: a.attributes.name,
            source: tag.clone(),
        })
        .collect();

    Ok(SearchResults {
        songs,
        albums,
        artists,
    })
}

pub struct MusicKitSource {
    bridge: Arc<dyn MusicKitBridge>,
    bus: EventBus,
}

impl MusicKitSource {
    pub fn new(bridge: Arc<dyn MusicKitBridge>) -> Self {
        Self {
            bridge,
            bus: EventBus::new(),
        }
    }

    /// `playbackStateDidChange` from the SDK.
    pub fn handle_state_change(&self, code: i64) {
        match status_for_state(code) {
            Some(status) => self.bus.emit_play_pause(status),
            None => tracing::trace!(code, "ignoring musickit playback state"),
        }
    }

    /// `playbackTimeDidChange` from the SDK, both values in seconds.
    pub fn handle_time_change(&self, current: f64, duration: f64) {
        self.bus.emit_time_update(current, duration);
    }

    fn player_error(e: anyhow::Error) -> SourceError {
        SourceError::Player(e.context("musickit"))
    }
}

#[async_trait]
impl Source for MusicKitSource {
    fn id(&self) -> SourceId {
        SourceId::musickit()
    }

    async fn play(&self) -> Result<()> {
        self.bridge.play().await.map_err(Self::player_error)
    }

    async fn pause(&self) -> Result<()> {
        self.bridge.pause().await.map_err(Self::player_error)
    }

    async fn play_track(&self, track_id: &str) -> Result<()> {
        self.bridge
            .set_queue(track_id)
            .await
            .map_err(Self::player_error)?;
        self.bridge.play().await.map_err(Self::player_error)
    }

    async fn seek(&self, position_secs: f64) -> Result<()> {
        self.bridge
            .seek_to_time(position_secs)
            .await
            .map_err(Self::player_error)
    }

    async fn set_volume(&self, volume: f64) -> Result<()> {
        self.bridge
            .set_volume(volume)
            .await
            .map_err(Self::player_error)
    }

    async fn set_repeat(&self, enabled: bool) -> Result<()> {
        let mode = if enabled {
            RepeatMode::One
        } else {
            RepeatMode::None
        };
        self.bridge
            .set_repeat_mode(mode)
            .await
            .map_err(Self::player_error)
    }

    /// The SDK has no lyrics endpoint; callers fall back to LRCLIB.
    async fn get_lyrics(&self, _track_id: &str) -> Result<Lyrics> {
        Ok(Lyrics::not_found(SourceId::MUSICKIT))
    }

    async fn search(&self, query: &str) -> Result<SearchResults> {
        let body = self
            .bridge
            .search(query, 25)
            .await
            .map_err(|e| SourceError::api(&self.id(), format!("{e:#}")))?;
        catalog_to_results(body)
            .map_err(|e| SourceError::api(&self.id(), format!("malformed catalog response: {e}")))
    }

    fn on_time_update(&self, callback: TimeUpdateCallback) -> Subscription {
        self.bus
            .on_time_update(move |position, duration| callback(position, duration))
    }

    fn on_play_pause(&self, callback: PlayPauseCallback) -> Subscription {
        self.bus.on_play_pause(move |status| callback(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::NO_LYRICS_FOUND;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBridge {
        calls: Mutex<Vec<String>>,
        catalog: serde_json::Value,
    }

    impl RecordingBridge {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    #[async_trait]
    impl MusicKitBridge for RecordingBridge {
        async fn set_queue(&self, song_id: &str) -> anyhow::Result<()> {
            self.record(format!("set_queue:{song_id}"))
        }
        async fn play(&self) -> anyhow::Result<()> {
            self.record("play".into())
        }
        async fn pause(&self) -> anyhow::Result<()> {
            self.record("pause".into())
        }
        async fn seek_to_time(&self, seconds: f64) -> anyhow::Result<()> {
            self.record(format!("seek:{seconds}"))
        }
        async fn set_volume(&self, volume: f64) -> anyhow::Result<()> {
            self.record(format!("volume:{volume}"))
        }
        async fn set_repeat_mode(&self, mode: RepeatMode) -> anyhow::Result<()> {
            self.record(format!("repeat:{}", mode as i32))
        }
        async fn search(&self, term: &str, limit: u32) -> anyhow::Result<serde_json::Value> {
            self.record(format!("search:{term}:{limit}"))?;
            Ok(self.catalog.clone())
        }
    }

    #[test]
    fn maps_only_known_state_codes() {
        assert_eq!(status_for_state(2), Some(PlayStatus::Playing));
        assert_eq!(status_for_state(3), Some(PlayStatus::Paused));
        assert_eq!(status_for_state(10), Some(PlayStatus::Ended));
        for ignored in [0, 1, 4, 5, 8, 9] {
            assert_eq!(status_for_state(ignored), None);
        }
    }

    #[test]
    fn sdk_notifications_reach_subscribers() {
        let source = MusicKitSource::new(Arc::new(RecordingBridge::default()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _status = {
            let seen = seen.clone();
            source.on_play_pause(Arc::new(move |s: PlayStatus| seen.lock().unwrap().push(s)))
        };
        let times = Arc::new(Mutex::new(Vec::new()));
        let _time = {
            let times = times.clone();
            source.on_time_update(Arc::new(move |p: f64, d: f64| times.lock().unwrap().push((p, d))))
        };

        source.handle_state_change(2);
        source.handle_state_change(8);
        source.handle_state_change(10);
        source.handle_time_change(3.0, 180.0);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![PlayStatus::Playing, PlayStatus::Ended]
        );
        assert_eq!(*times.lock().unwrap(), vec![(3.0, 180.0)]);
    }

    #[tokio::test]
    async fn play_track_queues_then_plays() {
        let bridge = Arc::new(RecordingBridge::default());
        let source = MusicKitSource::new(bridge.clone());

        source.play_track("1440").await.unwrap();
        source.set_repeat(true).await.unwrap();
        source.set_repeat(false).await.unwrap();

        assert_eq!(
            bridge.calls(),
            vec!["set_queue:1440", "play", "repeat:1", "repeat:0"]
        );
    }

    #[tokio::test]
    async fn never_has_lyrics() {
        let source = MusicKitSource::new(Arc::new(RecordingBridge::default()));
        let lyrics = source.get_lyrics("1440").await.unwrap();
        let Lyrics::Error { message, source } = lyrics else {
            panic!("expected error value");
        };
        assert_eq!(message, NO_LYRICS_FOUND);
        assert_eq!(source, "musicKit");
    }

    #[tokio::test]
    async fn search_maps_catalog_and_drops_singles() {
        let bridge = Arc::new(RecordingBridge {
            catalog: serde_json::json!({
                "results": {
                    "songs": {"data": [{
                        "id": "1440", "type": "songs",
                        "attributes": {
                            "name": "Blue", "artistName": "Band", "albumName": "Colours",
                            "durationInMillis": 215000, "releaseDate": "1999-05-01",
                            "artwork": {"url": "https://img.example/{w}x{h}bb.jpg"}
                        }
                    }]},
                    "albums": {"data": [
                        {"id": "a1", "attributes": {"name": "Colours", "artistName": "Band", "trackCount": 11,
                                                    "artwork": {"url": "x/{w}x{h}.jpg"}}},
                        {"id": "a2", "attributes": {"name": "Blue - Single", "artistName": "Band", "trackCount": 1}}
                    ]}
                },
                "meta": {"results": {"order": ["songs", "albums"]}}
            }),
            ..Default::default()
        });
        let source = MusicKitSource::new(bridge.clone());

        let results = source.search("blue").await.unwrap();

        assert_eq!(bridge.calls(), vec!["search:blue:25"]);
        assert_eq!(results.songs.len(), 1);
        assert_eq!(results.songs[0].id, "1440");
        assert_eq!(results.songs[0].duration_ms, 215_000);
        assert_eq!(
            results.songs[0].image_url,
            "https://img.example/900x900bb.jpg"
        );
        assert_eq!(results.albums.len(), 1);
        assert_eq!(results.albums[0].id, "a1");
        assert!(results.artists.is_empty());
    }
}
