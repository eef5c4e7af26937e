//! Backend sources and the orchestration layer on top of them.
//!
//! Every backend (Subsonic server, streaming service, platform SDK) sits
//! behind the [`Source`] trait. [`manager::SourceManager`] picks which one
//! plays a given track and exposes a single transport/search/lyrics API.

pub mod events;
pub mod manager;
pub mod merge;
pub mod musickit;
pub mod navidrome;
pub mod settings;
pub mod tidal;
pub mod types;

pub use events::{EventBus, Subscription};
pub use manager::{PlayOutcome, SourceBootstrap, SourceManager, format_time};
pub use types::{
    Album, AlbumDetails, Artist, ArtistDetails, LyricLine, Lyrics, LyricsKind, LyricsText,
    NO_LYRICS_FOUND, PlayStatus, Playlist, PlaylistDetails, SearchResults, SourceId, Track,
};

use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The backend cannot express this operation at all.
    #[error("{source_id} does not support {operation}")]
    Unsupported {
        source_id: SourceId,
        operation: &'static str,
    },

    /// The backend's SDK or player has not finished starting.
    #[error("{0} is not ready")]
    NotReady(SourceId),

    /// No source with this tag is registered (not linked, or unknown).
    #[error("{0} is not available")]
    NotRegistered(SourceId),

    #[error("{source_id} request failed: {error}")]
    Http {
        source_id: SourceId,
        #[source]
        error: reqwest::Error,
    },

    /// The backend answered, but with an error payload.
    #[error("{source_id}: {message}")]
    Api { source_id: SourceId, message: String },

    #[error("player error: {0:#}")]
    Player(anyhow::Error),
}

impl SourceError {
    pub fn unsupported(source_id: &SourceId, operation: &'static str) -> Self {
        Self::Unsupported {
            source_id: source_id.clone(),
            operation,
        }
    }

    pub fn api(source_id: &SourceId, message: impl Into<String>) -> Self {
        Self::Api {
            source_id: source_id.clone(),
            message: message.into(),
        }
    }

    pub fn http(source_id: &SourceId, error: reqwest::Error) -> Self {
        Self::Http {
            source_id: source_id.clone(),
            error,
        }
    }
}

/// The contract every backend implements.
///
/// Lyrics and search report "nothing there" as values (`Lyrics::Error`,
/// empty lists); `Err` is reserved for transport, auth and unsupported calls.
/// `play`/`pause` must be idempotent and a no-op when nothing is loaded.
#[async_trait]
pub trait Source: Send + Sync {
    fn id(&self) -> SourceId;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Load and start `track_id` (this backend's native id), replacing
    /// whatever was loaded before.
    async fn play_track(&self, track_id: &str) -> Result<()>;

    /// Absolute position in seconds. The backend clamps to `[0, duration]`.
    async fn seek(&self, position_secs: f64) -> Result<()>;

    /// `volume` in `[0, 1]`.
    async fn set_volume(&self, volume: f64) -> Result<()>;

    /// Single-track repeat.
    async fn set_repeat(&self, _enabled: bool) -> Result<()> {
        Err(SourceError::unsupported(&self.id(), "repeat"))
    }

    async fn get_lyrics(&self, track_id: &str) -> Result<Lyrics>;

    async fn search(&self, query: &str) -> Result<SearchResults>;

    // Catalog lookups. Ids are this backend's native ids.

    async fn get_song(&self, _track_id: &str) -> Result<Track> {
        Err(SourceError::unsupported(&self.id(), "song lookup"))
    }

    async fn get_album(&self, _album_id: &str) -> Result<AlbumDetails> {
        Err(SourceError::unsupported(&self.id(), "album lookup"))
    }

    async fn get_artist(&self, _artist_id: &str) -> Result<ArtistDetails> {
        Err(SourceError::unsupported(&self.id(), "artist lookup"))
    }

    async fn get_playlists(&self) -> Result<Vec<Playlist>> {
        Err(SourceError::unsupported(&self.id(), "playlists"))
    }

    async fn get_playlist(&self, _playlist_id: &str) -> Result<PlaylistDetails> {
        Err(SourceError::unsupported(&self.id(), "playlist lookup"))
    }

    fn on_time_update(&self, callback: events::TimeUpdateCallback) -> Subscription;

    fn on_play_pause(&self, callback: events::PlayPauseCallback) -> Subscription;

    /// Playback failures after `play_track` returned, such as a stream that
    /// cannot be opened. Backends without a local player never report any.
    fn on_error(&self, _callback: events::PlaybackErrorCallback) -> Subscription {
        Subscription::detached()
    }
}
