//! Subsonic-compatible server (Navidrome)
//!
//! Metadata and lyrics come from the Subsonic REST API; audio is streamed
//! from `rest/stream` into a local mpv instance.
//! API reference: https://www.subsonic.org/pages/api.jsp

use super::events::{PlayPauseCallback, PlaybackErrorCallback, Subscription, TimeUpdateCallback};
use super::settings::{self, ServerConnection, SettingsReader};
use super::types::{
    Album, AlbumDetails, Artist, ArtistDetails, LyricLine, Lyrics, Playlist, PlaylistDetails,
    SearchResults, SourceId, Track,
};
use super::{Result, Source, SourceError};
use crate::player::{LazyMpv, MpvOptions};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

const API_VERSION: &str = "1.13.0";
const CLIENT_NAME: &str = "amplitune";
const LYRICS_SOURCE: &str = "Navidrome";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "subsonic-response")]
    response: SubsonicResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubsonicResponse {
    status: String,
    error: Option<SubsonicError>,
    search_result3: Option<SearchResult3>,
    lyrics_list: Option<LyricsList>,
    song: Option<SongEntry>,
    album: Option<AlbumWithSongs>,
    artist: Option<ArtistWithAlbums>,
    playlists: Option<PlaylistList>,
    playlist: Option<PlaylistWithSongs>,
}

#[derive(Debug, Deserialize)]
struct SubsonicError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult3 {
    #[serde(default)]
    song: Vec<SongEntry>,
    #[serde(default)]
    album: Vec<AlbumEntry>,
    #[serde(default)]
    artist: Vec<ArtistEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongEntry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    album: String,
    /// Seconds.
    #[serde(default)]
    duration: u64,
    cover_art: Option<String>,
    year: Option<i32>,
    suffix: Option<String>,
    bit_rate: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumEntry {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist: String,
    cover_art: Option<String>,
    year: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtistEntry {
    id: String,
    #[serde(default)]
    name: String,
    cover_art: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumWithSongs {
    #[serde(flatten)]
    entry: AlbumEntry,
    #[serde(default)]
    song_count: u32,
    genre: Option<String>,
    #[serde(default)]
    song: Vec<SongEntry>,
}

#[derive(Debug, Deserialize)]
struct ArtistWithAlbums {
    #[serde(flatten)]
    entry: ArtistEntry,
    #[serde(default)]
    album: Vec<AlbumEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaylistList {
    #[serde(default)]
    playlist: Vec<PlaylistEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistEntry {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    song_count: u32,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    changed: String,
    cover_art: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistWithSongs {
    #[serde(flatten)]
    info: PlaylistEntry,
    #[serde(default, rename = "entry")]
    songs: Vec<SongEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LyricsList {
    #[serde(default)]
    structured_lyrics: Vec<StructuredLyrics>,
}

#[derive(Debug, Deserialize)]
struct StructuredLyrics {
    #[serde(default)]
    synced: bool,
    #[serde(default)]
    line: Vec<StructuredLine>,
}

#[derive(Debug, Deserialize)]
struct StructuredLine {
    /// Milliseconds, present when the lyrics are synced.
    start: Option<u64>,
    #[serde(default)]
    value: String,
}

pub struct NavidromeSource {
    server: ServerConnection,
    http: reqwest::Client,
    player: LazyMpv,
}

impl NavidromeSource {
    pub fn new(server: ServerConnection, player: MpvOptions) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("build subsonic http client")?;
        Ok(Self {
            server,
            http,
            player: LazyMpv::new(SourceId::NAVIDROME, player),
        })
    }

    /// Adapter for the persisted active server, if one is configured.
    pub fn from_settings(
        reader: &dyn SettingsReader,
        player: MpvOptions,
    ) -> anyhow::Result<Option<Self>> {
        match settings::active_server(reader)? {
            Some(server) => Ok(Some(Self::new(server, player)?)),
            None => Ok(None),
        }
    }

    fn tag() -> SourceId {
        SourceId::navidrome()
    }

    /// `{server}/rest/{endpoint}` with auth and format parameters.
    fn rest_url(&self, endpoint: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/rest/{}?u={}&t={}&s={}&v={API_VERSION}&c={CLIENT_NAME}&f=json",
            self.server.url.trim_end_matches('/'),
            endpoint,
            urlencoding::encode(&self.server.username),
            urlencoding::encode(&self.server.hash),
            urlencoding::encode(&self.server.salt),
        );
        for (k, v) in params {
            url.push('&');
            url.push_str(k);
            url.push('=');
            url.push_str(&urlencoding::encode(v));
        }
        url
    }

    fn cover_art_url(&self, cover_art: Option<&str>) -> String {
        cover_art
            .map(|id| self.rest_url("getCoverArt", &[("id", id)]))
            .unwrap_or_default()
    }

    async fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<SubsonicResponse> {
        let url = self.rest_url(endpoint, params);
        let envelope: Envelope = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SourceError::http(&Self::tag(), e))?
            .json()
            .await
            .map_err(|e| SourceError::http(&Self::tag(), e))?;
        Ok(envelope.response)
    }

    fn song_to_track(&self, song: SongEntry) -> Track {
        let quality = match (song.suffix.as_deref(), song.bit_rate) {
            (Some(suffix), Some(rate)) => format!("{suffix} {rate}kbps"),
            (Some(suffix), None) => suffix.to_string(),
            _ => String::new(),
        };
        let mut track = Track::new(Self::tag(), song.id, song.title, song.artist)
            .with_album(song.album)
            .with_duration_ms(song.duration * 1000);
        track.quality = quality;
        track.image_url = self.cover_art_url(song.cover_art.as_deref());
        track.release_date = song.year.map(|y| y.to_string()).unwrap_or_default();
        track
    }

    fn album_from_entry(&self, a: AlbumEntry) -> Album {
        Album {
            image_url: self.cover_art_url(a.cover_art.as_deref()),
            release_date: a.year.map(|y| y.to_string()).unwrap_or_default(),
            id: a.id,
            title: a.name,
            artist: a.artist,
            source: Self::tag(),
        }
    }

    fn artist_from_entry(&self, a: ArtistEntry) -> Artist {
        Artist {
            image_url: self.cover_art_url(a.cover_art.as_deref()),
            id: a.id,
            name: a.name,
            source: Self::tag(),
        }
    }

    fn playlist_from_entry(&self, p: PlaylistEntry) -> Playlist {
        Playlist {
            image_url: self.cover_art_url(p.cover_art.as_deref()),
            id: p.id,
            name: p.name,
            source: Self::tag(),
            track_count: p.song_count,
            owner: p.owner,
            is_public: p.public,
            last_modified: p.changed,
        }
    }

    /// Call `endpoint` and pull one field out of a successful response.
    async fn fetch<T>(
        &self,
        endpoint: &str,
        id: &str,
        pick: impl FnOnce(SubsonicResponse) -> Option<T>,
    ) -> Result<T> {
        let response = self.call(endpoint, &[("id", id)]).await?;
        if response.status == "failed" {
            return Err(SourceError::api(&Self::tag(), failure_message(&response)));
        }
        pick(response)
            .ok_or_else(|| SourceError::api(&Self::tag(), format!("{endpoint}: empty response")))
    }
}

fn failure_message(response: &SubsonicResponse) -> String {
    response
        .error
        .as_ref()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .unwrap_or_else(|| "request failed".to_string())
}

fn structured_to_lyrics(list: LyricsList) -> Lyrics {
    let Some(first) = list.structured_lyrics.into_iter().next() else {
        return Lyrics::not_found(LYRICS_SOURCE);
    };
    if first.synced {
        let lines = first
            .line
            .into_iter()
            .map(|l| LyricLine {
                start_ms: l.start,
                value: l.value,
            })
            .collect();
        Lyrics::synced(lines, LYRICS_SOURCE)
    } else {
        let lines = first.line.into_iter().map(|l| LyricLine::plain(l.value)).collect();
        Lyrics::unsynced(lines, LYRICS_SOURCE)
    }
}

#[async_trait]
impl Source for NavidromeSource {
    fn id(&self) -> SourceId {
        Self::tag()
    }

    async fn play(&self) -> Result<()> {
        self.player.play().await.map_err(SourceError::Player)
    }

    async fn pause(&self) -> Result<()> {
        self.player.pause().await.map_err(SourceError::Player)
    }

    async fn play_track(&self, track_id: &str) -> Result<()> {
        let url = self.rest_url("stream", &[("id", track_id)]);
        self.player.load(&url).await.map_err(SourceError::Player)
    }

    async fn seek(&self, position_secs: f64) -> Result<()> {
        self.player
            .seek(position_secs)
            .await
            .map_err(SourceError::Player)
    }

    async fn set_volume(&self, volume: f64) -> Result<()> {
        self.player
            .set_volume(volume)
            .await
            .map_err(SourceError::Player)
    }

    async fn set_repeat(&self, enabled: bool) -> Result<()> {
        self.player
            .set_repeat(enabled)
            .await
            .map_err(SourceError::Player)
    }

    async fn get_lyrics(&self, track_id: &str) -> Result<Lyrics> {
        let response = self
            .call("getLyricsBySongId.view", &[("id", track_id)])
            .await?;
        if response.status == "failed" {
            return Ok(Lyrics::error(failure_message(&response), LYRICS_SOURCE));
        }
        Ok(structured_to_lyrics(response.lyrics_list.unwrap_or_default()))
    }

    async fn search(&self, query: &str) -> Result<SearchResults> {
        let response = self.call("search3", &[("query", query)]).await?;
        if response.status == "failed" {
            return Err(SourceError::api(&Self::tag(), failure_message(&response)));
        }
        let found = response.search_result3.unwrap_or_default();

        let songs = found
            .song
            .into_iter()
            .map(|s| self.song_to_track(s))
            .collect();
        let albums = found
            .album
            .into_iter()
            .map(|a| self.album_from_entry(a))
            .collect();
        let artists = found
            .artist
            .into_iter()
            .map(|a| self.artist_from_entry(a))
            .collect();

        Ok(SearchResults {
            songs,
            albums,
            artists,
        })
    }

    async fn get_song(&self, track_id: &str) -> Result<Track> {
        let song = self.fetch("getSong", track_id, |r| r.song).await?;
        Ok(self.song_to_track(song))
    }

    async fn get_album(&self, album_id: &str) -> Result<AlbumDetails> {
        let album = self.fetch("getAlbum", album_id, |r| r.album).await?;
        let tracks: Vec<Track> = album
            .song
            .into_iter()
            .map(|s| self.song_to_track(s))
            .collect();
        Ok(AlbumDetails {
            album: self.album_from_entry(album.entry),
            genres: album.genre.into_iter().collect(),
            is_single: album.song_count == 1,
            tracks,
        })
    }

    async fn get_artist(&self, artist_id: &str) -> Result<ArtistDetails> {
        let artist = self.fetch("getArtist", artist_id, |r| r.artist).await?;
        Ok(ArtistDetails {
            albums: artist
                .album
                .into_iter()
                .map(|a| self.album_from_entry(a))
                .collect(),
            artist: self.artist_from_entry(artist.entry),
            top_songs: Vec::new(),
        })
    }

    async fn get_playlists(&self) -> Result<Vec<Playlist>> {
        let response = self.call("getPlaylists", &[]).await?;
        if response.status == "failed" {
            return Err(SourceError::api(&Self::tag(), failure_message(&response)));
        }
        Ok(response
            .playlists
            .unwrap_or_default()
            .playlist
            .into_iter()
            .map(|p| self.playlist_from_entry(p))
            .collect())
    }

    async fn get_playlist(&self, playlist_id: &str) -> Result<PlaylistDetails> {
        let playlist = self.fetch("getPlaylist", playlist_id, |r| r.playlist).await?;
        Ok(PlaylistDetails {
            tracks: playlist
                .songs
                .into_iter()
                .map(|s| self.song_to_track(s))
                .collect(),
            playlist: self.playlist_from_entry(playlist.info),
        })
    }

    fn on_time_update(&self, callback: TimeUpdateCallback) -> Subscription {
        self.player
            .bus()
            .on_time_update(move |position, duration| callback(position, duration))
    }

    fn on_play_pause(&self, callback: PlayPauseCallback) -> Subscription {
        self.player.bus().on_play_pause(move |status| callback(status))
    }

    fn on_error(&self, callback: PlaybackErrorCallback) -> Subscription {
        self.player.bus().on_error(move |message| callback(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> NavidromeSource {
        NavidromeSource::new(
            ServerConnection {
                url: server.uri(),
                username: "alice".into(),
                hash: "26719a1196d2a940705a59634eb18eab".into(),
                salt: "c19b2d".into(),
                id: String::new(),
            },
            MpvOptions::default(),
        )
        .unwrap()
    }

    fn ok(body: serde_json::Value) -> ResponseTemplate {
        let mut response = serde_json::json!({"status": "ok", "version": "1.16.1"});
        if let (Some(r), Some(b)) = (response.as_object_mut(), body.as_object()) {
            r.extend(b.clone());
        }
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "subsonic-response": response }))
    }

    #[test]
    fn rest_url_carries_auth_parameters() {
        let source = NavidromeSource::new(
            ServerConnection {
                url: "https://music.example/".into(),
                username: "a b".into(),
                hash: "h".into(),
                salt: "s".into(),
                id: String::new(),
            },
            MpvOptions::default(),
        )
        .unwrap();
        assert_eq!(
            source.rest_url("stream", &[("id", "tr 1")]),
            "https://music.example/rest/stream?u=a%20b&t=h&s=s&v=1.13.0&c=amplitune&f=json&id=tr%201"
        );
    }

    #[tokio::test]
    async fn search_maps_songs_albums_and_artists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/search3"))
            .and(query_param("query", "blue"))
            .and(query_param("u", "alice"))
            .and(query_param("v", "1.13.0"))
            .and(query_param("f", "json"))
            .respond_with(ok(serde_json::json!({
                "searchResult3": {
                    "song": [{
                        "id": "s1", "title": "Blue", "artist": "Band", "album": "Colours",
                        "duration": 215, "coverArt": "al-1", "year": 1999,
                        "suffix": "flac", "bitRate": 900
                    }],
                    "album": [{"id": "al-1", "name": "Colours", "artist": "Band", "coverArt": "al-1"}],
                    "artist": [{"id": "ar-1", "name": "Band"}]
                }
            })))
            .mount(&server)
            .await;

        let results = source_for(&server).search("blue").await.unwrap();

        let song = &results.songs[0];
        assert_eq!(song.id, "s1");
        assert_eq!(song.duration_ms, 215_000);
        assert_eq!(song.source, SourceId::navidrome());
        assert_eq!(song.available_sources, vec![SourceId::navidrome()]);
        assert_eq!(song.quality, "flac 900kbps");
        assert_eq!(song.release_date, "1999");
        assert!(song.image_url.contains("/rest/getCoverArt?"));
        assert!(song.image_url.ends_with("&id=al-1"));
        assert_eq!(results.albums[0].title, "Colours");
        assert_eq!(results.artists[0].name, "Band");
        assert_eq!(results.artists[0].image_url, "");
    }

    #[tokio::test]
    async fn empty_search_result_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/search3"))
            .respond_with(ok(serde_json::json!({"searchResult3": {}})))
            .mount(&server)
            .await;

        assert!(source_for(&server).search("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_search_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/search3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "subsonic-response": {
                    "status": "failed",
                    "error": {"code": 40, "message": "Wrong username or password"}
                }
            })))
            .mount(&server)
            .await;

        let err = source_for(&server).search("x").await.unwrap_err();
        assert!(matches!(err, SourceError::Api { .. }));
        assert!(err.to_string().contains("Wrong username or password"));
    }

    #[tokio::test]
    async fn lyrics_are_fetched_without_a_loaded_track() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/getLyricsBySongId.view"))
            .and(query_param("id", "s9"))
            .respond_with(ok(serde_json::json!({
                "lyricsList": {"structuredLyrics": [{"synced": false, "line": [{"value": "hi"}]}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let lyrics = source_for(&server).get_lyrics("s9").await.unwrap();
        assert_eq!(
            lyrics,
            Lyrics::unsynced(vec![LyricLine::plain("hi")], LYRICS_SOURCE)
        );
    }

    #[tokio::test]
    async fn song_lookup_maps_the_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/getSong"))
            .and(query_param("id", "s1"))
            .respond_with(ok(serde_json::json!({
                "song": {"id": "s1", "title": "Blue", "artist": "Band", "album": "Colours", "duration": 61}
            })))
            .mount(&server)
            .await;

        let track = source_for(&server).get_song("s1").await.unwrap();
        assert_eq!(track.title, "Blue");
        assert_eq!(track.duration_ms, 61_000);
        assert_eq!(track.source, SourceId::navidrome());
    }

    #[tokio::test]
    async fn album_lookup_lists_tracks_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/getAlbum"))
            .and(query_param("id", "al-1"))
            .respond_with(ok(serde_json::json!({
                "album": {
                    "id": "al-1", "name": "Colours", "artist": "Band", "coverArt": "al-1",
                    "year": 1999, "songCount": 2, "genre": "Rock",
                    "song": [
                        {"id": "s1", "title": "Blue", "artist": "Band", "album": "Colours", "duration": 200},
                        {"id": "s2", "title": "Red", "artist": "Band", "album": "Colours", "duration": 180}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let album = source_for(&server).get_album("al-1").await.unwrap();

        assert_eq!(album.album.title, "Colours");
        assert_eq!(album.album.release_date, "1999");
        assert!(album.album.image_url.ends_with("&id=al-1"));
        assert_eq!(album.genres, vec!["Rock"]);
        assert!(!album.is_single);
        let ids: Vec<_> = album.tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn artist_lookup_lists_albums() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/getArtist"))
            .and(query_param("id", "ar-1"))
            .respond_with(ok(serde_json::json!({
                "artist": {
                    "id": "ar-1", "name": "Band", "albumCount": 1,
                    "album": [{"id": "al-1", "name": "Colours", "artist": "Band"}]
                }
            })))
            .mount(&server)
            .await;

        let artist = source_for(&server).get_artist("ar-1").await.unwrap();
        assert_eq!(artist.artist.name, "Band");
        assert_eq!(artist.albums.len(), 1);
        assert_eq!(artist.albums[0].id, "al-1");
    }

    #[tokio::test]
    async fn playlists_and_playlist_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/getPlaylists"))
            .respond_with(ok(serde_json::json!({
                "playlists": {"playlist": [{
                    "id": "pl-1", "name": "Drive", "songCount": 1, "owner": "alice",
                    "public": true, "changed": "2024-05-01T10:00:00Z"
                }]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/getPlaylist"))
            .and(query_param("id", "pl-1"))
            .respond_with(ok(serde_json::json!({
                "playlist": {
                    "id": "pl-1", "name": "Drive", "songCount": 1, "owner": "alice",
                    "entry": [{"id": "s1", "title": "Blue", "artist": "Band"}]
                }
            })))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let playlists = source.get_playlists().await.unwrap();
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].name, "Drive");
        assert_eq!(playlists[0].owner, "alice");
        assert!(playlists[0].is_public);

        let playlist = source.get_playlist("pl-1").await.unwrap();
        assert_eq!(playlist.playlist.track_count, 1);
        assert_eq!(playlist.tracks[0].title, "Blue");
    }

    #[tokio::test]
    async fn missing_album_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/getAlbum"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "subsonic-response": {
                    "status": "failed",
                    "error": {"code": 70, "message": "Album not found"}
                }
            })))
            .mount(&server)
            .await;

        let err = source_for(&server).get_album("nope").await.unwrap_err();
        assert!(err.to_string().contains("Album not found"));
    }

    #[tokio::test]
    async fn synced_lyrics_keep_line_offsets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/getLyricsBySongId.view"))
            .and(query_param("id", "s1"))
            .respond_with(ok(serde_json::json!({
                "lyricsList": {"structuredLyrics": [{
                    "lang": "eng", "synced": true,
                    "line": [{"start": 0, "value": "one"}, {"start": 2500, "value": "two"}]
                }]}
            })))
            .mount(&server)
            .await;

        let lyrics = source_for(&server).get_lyrics("s1").await.unwrap();

        assert_eq!(
            lyrics,
            Lyrics::synced(
                vec![LyricLine::timed(0, "one"), LyricLine::timed(2500, "two")],
                LYRICS_SOURCE
            )
        );
    }

    #[tokio::test]
    async fn missing_lyrics_use_the_shared_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/getLyricsBySongId.view"))
            .respond_with(ok(serde_json::json!({"lyricsList": {}})))
            .mount(&server)
            .await;

        assert_eq!(
            source_for(&server).get_lyrics("s1").await.unwrap(),
            Lyrics::not_found(LYRICS_SOURCE)
        );
    }

    #[test]
    fn unsynced_lyrics_drop_offsets() {
        let list = LyricsList {
            structured_lyrics: vec![StructuredLyrics {
                synced: false,
                line: vec![StructuredLine {
                    start: Some(10),
                    value: "words".into(),
                }],
            }],
        };
        assert_eq!(
            structured_to_lyrics(list),
            Lyrics::unsynced(vec![LyricLine::plain("words")], LYRICS_SOURCE)
        );
    }

    #[test]
    fn no_server_means_no_adapter() {
        let settings = crate::sources::settings::MemorySettings::new();
        assert!(
            NavidromeSource::from_settings(&settings, MpvOptions::default())
                .unwrap()
                .is_none()
        );
    }
}
