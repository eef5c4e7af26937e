use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Message adapters use when a track has no lyrics at all.
///
/// The orchestrator matches on this exact text to decide whether to try the
/// fallback provider, so adapters must not vary it.
pub const NO_LYRICS_FOUND: &str = "No lyrics found";

/// Stable key naming one backend ("navidrome", "tidal", "musicKit", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub const NAVIDROME: &'static str = "navidrome";
    pub const TIDAL: &'static str = "tidal";
    pub const MUSICKIT: &'static str = "musicKit";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn navidrome() -> Self {
        Self::new(Self::NAVIDROME)
    }

    pub fn tidal() -> Self {
        Self::new(Self::TIDAL)
    }

    pub fn musickit() -> Self {
        Self::new(Self::MUSICKIT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl PartialEq<&str> for SourceId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A logical track as surfaced to the UI.
///
/// `id` is only unique within `source`. `available_sources` lists every
/// backend known to serve the same recording; it always contains `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    pub quality: String,
    pub image_url: String,
    pub release_date: String,
    pub source: SourceId,
    pub available_sources: Vec<SourceId>,
    /// Native id of this recording on each backend that reported it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_ids: BTreeMap<SourceId, String>,
}

impl Track {
    /// Track freshly fetched from a single backend.
    pub fn new(
        source: SourceId,
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            source_ids: BTreeMap::from([(source.clone(), id.clone())]),
            id,
            title: title.into(),
            artist: artist.into(),
            album: String::new(),
            duration_ms: 0,
            quality: String::new(),
            image_url: String::new(),
            release_date: String::new(),
            available_sources: vec![source.clone()],
            source,
        }
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Id to hand to `source` when playing or fetching lyrics there.
    pub fn native_id(&self, source: &SourceId) -> &str {
        self.source_ids.get(source).map_or(self.id.as_str(), String::as_str)
    }

    /// Key used to recognise the same recording across backends.
    pub fn merge_key(&self) -> String {
        format!("{}|{}", self.title.to_lowercase(), self.artist.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub image_url: String,
    pub release_date: String,
    pub source: SourceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub source: SourceId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub songs: Vec<Track>,
    pub albums: Vec<Album>,
    pub artists: Vec<Artist>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty() && self.albums.is_empty() && self.artists.is_empty()
    }
}

/// An album page: header plus tracks in disc order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumDetails {
    #[serde(flatten)]
    pub album: Album,
    pub genres: Vec<String>,
    pub is_single: bool,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistDetails {
    #[serde(flatten)]
    pub artist: Artist,
    pub albums: Vec<Album>,
    pub top_songs: Vec<Track>,
}

/// A playlist as listed in the library; tracks are fetched separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub source: SourceId,
    pub track_count: u32,
    pub owner: String,
    pub is_public: bool,
    /// Last modification, as the backend reports it.
    pub last_modified: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDetails {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LyricsKind {
    Synced,
    Unsynced,
    Instrumental,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    /// Offset from the start of the track, when the provider has timing.
    pub start_ms: Option<u64>,
    pub value: String,
}

impl LyricLine {
    pub fn timed(start_ms: u64, value: impl Into<String>) -> Self {
        Self {
            start_ms: Some(start_ms),
            value: value.into(),
        }
    }

    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            start_ms: None,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsText {
    pub lines: Vec<LyricLine>,
    pub synced: bool,
    pub kind: Option<LyricsKind>,
    pub source: String,
}

impl LyricsText {
    /// True only when every line can be highlighted against playback time.
    pub fn is_timed(&self) -> bool {
        self.synced && !self.lines.is_empty() && self.lines.iter().all(|l| l.start_ms.is_some())
    }

    /// Lines in display order, ignoring timing.
    pub fn display_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.value.as_str())
    }

    /// Index of the line active at `position_ms`, if the lyrics are timed.
    pub fn line_at(&self, position_ms: u64) -> Option<usize> {
        if !self.is_timed() {
            return None;
        }
        self.lines
            .iter()
            .rposition(|l| l.start_ms.is_some_and(|s| s <= position_ms))
    }
}

/// Result of a lyrics lookup. Unavailability is a value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Lyrics {
    Error { message: String, source: String },
    Text(LyricsText),
}

impl Lyrics {
    pub fn error(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn not_found(source: impl Into<String>) -> Self {
        Self::error(NO_LYRICS_FOUND, source)
    }

    pub fn synced(lines: Vec<LyricLine>, source: impl Into<String>) -> Self {
        Self::Text(LyricsText {
            lines,
            synced: true,
            kind: Some(LyricsKind::Synced),
            source: source.into(),
        })
    }

    pub fn unsynced(lines: Vec<LyricLine>, source: impl Into<String>) -> Self {
        Self::Text(LyricsText {
            lines,
            synced: false,
            kind: Some(LyricsKind::Unsynced),
            source: source.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Error { source, .. } => source,
            Self::Text(t) => &t.source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayStatus {
    Playing,
    Paused,
    Ended,
}

impl fmt::Display for PlayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Ended => "ended",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_track_is_available_from_its_own_source() {
        let t = Track::new(SourceId::navidrome(), "1", "Song", "Band");
        assert_eq!(t.available_sources, vec![SourceId::navidrome()]);
    }

    #[test]
    fn native_id_falls_back_to_canonical_id() {
        let mut t = Track::new("nav".into(), "n1", "Song", "Band");
        t.source_ids.insert("tk".into(), "t7".into());
        assert_eq!(t.native_id(&"tk".into()), "t7");
        assert_eq!(t.native_id(&"nav".into()), "n1");
        assert_eq!(t.native_id(&"other".into()), "n1");
    }

    #[test]
    fn merge_key_ignores_case() {
        let a = Track::new("nav".into(), "1", "Hello World", "ARTIST");
        let b = Track::new("tk".into(), "x9", "hello world", "artist");
        assert_eq!(a.merge_key(), b.merge_key());
    }

    #[test]
    fn untimed_lines_render_as_plain_text() {
        let Lyrics::Text(text) = Lyrics::synced(
            vec![LyricLine::timed(1000, "one"), LyricLine::plain("two")],
            "test",
        ) else {
            panic!("expected text");
        };
        assert!(!text.is_timed());
        assert_eq!(text.display_lines().collect::<Vec<_>>(), vec!["one", "two"]);
        assert_eq!(text.line_at(5000), None);
    }

    #[test]
    fn line_at_picks_last_started_line() {
        let Lyrics::Text(text) = Lyrics::synced(
            vec![
                LyricLine::timed(1000, "a"),
                LyricLine::timed(2000, "b"),
                LyricLine::timed(3000, "c"),
            ],
            "test",
        ) else {
            panic!("expected text");
        };
        assert_eq!(text.line_at(500), None);
        assert_eq!(text.line_at(2500), Some(1));
        assert_eq!(text.line_at(9000), Some(2));
    }
}
