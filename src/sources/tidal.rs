//! TIDAL streaming service
//!
//! Uses the v1 REST API with the bearer token of a linked session. Every
//! request is scoped to the session's country. Streams resolve to a direct
//! URL that plays in this source's own mpv instance.

use super::events::{PlayPauseCallback, PlaybackErrorCallback, Subscription, TimeUpdateCallback};
use super::settings::{self, SettingsReader, TidalSession};
use super::types::{
    Album, AlbumDetails, Artist, ArtistDetails, Lyrics, SearchResults, SourceId, Track,
};
use super::{Result, Source, SourceError};
use crate::lyrics::parser;
use crate::player::{LazyMpv, MpvOptions};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

const LYRICS_SOURCE: &str = "TIDAL";
const IMAGE_BASE: &str = "https://resources.tidal.com/images";

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Page<TrackItem>,
    #[serde(default)]
    albums: Page<AlbumItem>,
    #[serde(default)]
    artists: Page<ArtistItem>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumRef {
    #[serde(default)]
    title: String,
    cover: Option<String>,
    #[serde(rename = "releaseDate")]
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackItem {
    id: u64,
    #[serde(default)]
    title: String,
    /// Seconds.
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    artists: Vec<NamedRef>,
    album: Option<AlbumRef>,
    audio_quality: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumItem {
    id: u64,
    #[serde(default)]
    title: String,
    cover: Option<String>,
    release_date: Option<String>,
    #[serde(default)]
    artists: Vec<NamedRef>,
    number_of_tracks: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    id: u64,
    #[serde(default)]
    name: String,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LyricsResponse {
    lyrics: Option<String>,
    subtitles: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaybackUrls {
    #[serde(default)]
    urls: Vec<String>,
}

fn join_artists(artists: &[NamedRef]) -> String {
    artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Image ids look like `a1b2-c3d4-...`; the CDN path uses `/` instead.
fn image_url(id: Option<&str>, size: u32) -> String {
    id.filter(|id| !id.is_empty())
        .map(|id| format!("{IMAGE_BASE}/{}/{size}x{size}.jpg", id.replace('-', "/")))
        .unwrap_or_default()
}

impl LyricsResponse {
    fn into_lyrics(self) -> Lyrics {
        if let Some(subtitles) = self.subtitles.as_deref()
            && !subtitles.trim().is_empty()
        {
            return Lyrics::synced(parser::parse_lrc(subtitles), LYRICS_SOURCE);
        }
        if let Some(text) = self.lyrics.as_deref()
            && !text.trim().is_empty()
        {
            return Lyrics::unsynced(parser::parse_plain(text), LYRICS_SOURCE);
        }
        Lyrics::not_found(LYRICS_SOURCE)
    }
}

pub struct TidalSource {
    session: TidalSession,
    http: reqwest::Client,
    base_url: String,
    player: LazyMpv,
}

impl TidalSource {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.tidal.com/v1";

    pub fn new(session: TidalSession, player: MpvOptions) -> anyhow::Result<Self> {
        Self::with_base_url(session, player, Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        session: TidalSession,
        player: MpvOptions,
        base_url: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("build tidal http client")?;
        Ok(Self {
            session,
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            player: LazyMpv::new(SourceId::TIDAL, player),
        })
    }

    /// Adapter for the linked session, if the account has been linked.
    pub fn from_settings(
        reader: &dyn SettingsReader,
        player: MpvOptions,
    ) -> anyhow::Result<Option<Self>> {
        match settings::tidal_session(reader)? {
            Some(session) => Ok(Some(Self::new(session, player)?)),
            None => Ok(None),
        }
    }

    fn tag() -> SourceId {
        SourceId::tidal()
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/{}?countryCode={}",
            self.base_url,
            path,
            urlencoding::encode(&self.session.country_code)
        );
        for (k, v) in params {
            url.push_str(&format!("&{k}={}", urlencoding::encode(v)));
        }
        url
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<reqwest::Response> {
        self.http
            .get(self.url(path, params))
            .bearer_auth(&self.session.access_token)
            .send()
            .await
            .map_err(|e| SourceError::http(&Self::tag(), e))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let response = self.get(path, params).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(SourceError::api(
                &Self::tag(),
                "session expired; link the account again",
            ));
        }
        response
            .error_for_status()
            .map_err(|e| SourceError::http(&Self::tag(), e))?
            .json()
            .await
            .map_err(|e| SourceError::http(&Self::tag(), e))
    }

    async fn stream_url(&self, track_id: &str) -> Result<String> {
        let urls: PlaybackUrls = self
            .get_json(
                &format!("tracks/{}/urlpostpaywall", urlencoding::encode(track_id)),
                &[
                    ("audioquality", "HIGH"),
                    ("urlusagemode", "STREAM"),
                    ("assetpresentation", "FULL"),
                ],
            )
            .await?;
        urls.urls
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::api(&Self::tag(), format!("no stream for track {track_id}")))
    }

    fn album_from_item(a: AlbumItem) -> Album {
        Album {
            id: a.id.to_string(),
            artist: join_artists(&a.artists),
            title: a.title,
            image_url: image_url(a.cover.as_deref(), 640),
            release_date: a.release_date.unwrap_or_default(),
            source: Self::tag(),
        }
    }

    fn artist_from_item(a: ArtistItem) -> Artist {
        Artist {
            id: a.id.to_string(),
            name: a.name,
            image_url: image_url(a.picture.as_deref(), 750),
            source: Self::tag(),
        }
    }

    fn track_from_item(item: TrackItem) -> Track {
        let artist = join_artists(&item.artists);
        let mut track = Track::new(Self::tag(), item.id.to_string(), item.title, artist)
            .with_duration_ms(item.duration * 1000);
        if let Some(album) = item.album {
            track.image_url = image_url(album.cover.as_deref(), 640);
            track.release_date = album.release_date.unwrap_or_default();
            track.album = album.title;
        }
        track.quality = item.audio_quality.unwrap_or_default();
        track
    }
}

#[async_trait]
impl Source for TidalSource {
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
        let url = self.stream_url(track_id).await?;
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
        let path = format!("tracks/{}/lyrics", urlencoding::encode(track_id));
        let response = self.get(&path, &[]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Lyrics::not_found(LYRICS_SOURCE));
        }
        let lyrics: LyricsResponse = response
            .error_for_status()
            .map_err(|e| SourceError::http(&Self::tag(), e))?
            .json()
            .await
            .map_err(|e| SourceError::http(&Self::tag(), e))?;
        Ok(lyrics.into_lyrics())
    }

    async fn search(&self, query: &str) -> Result<SearchResults> {
        let found: SearchResponse = self
            .get_json(
                "search",
                &[
                    ("query", query),
                    ("types", "TRACKS,ALBUMS,ARTISTS"),
                    ("limit", "25"),
                ],
            )
            .await?;

        let songs = found
            .tracks
            .items
            .into_iter()
            .map(Self::track_from_item)
            .collect();
        let albums = found
            .albums
            .items
            .into_iter()
            .map(Self::album_from_item)
            .collect();
        let artists = found
            .artists
            .items
            .into_iter()
            .map(Self::artist_from_item)
            .collect();

        Ok(SearchResults {
            songs,
            albums,
            artists,
        })
    }

    async fn get_song(&self, track_id: &str) -> Result<Track> {
        let item: TrackItem = self
            .get_json(&format!("tracks/{}", urlencoding::encode(track_id)), &[])
            .await?;
        Ok(Self::track_from_item(item))
    }

    async fn get_album(&self, album_id: &str) -> Result<AlbumDetails> {
        let id = urlencoding::encode(album_id);
        let album: AlbumItem = self.get_json(&format!("albums/{id}"), &[]).await?;
        let tracks: Page<TrackItem> = self
            .get_json(&format!("albums/{id}/tracks"), &[("limit", "100")])
            .await?;
        Ok(AlbumDetails {
            is_single: album.number_of_tracks == Some(1),
            album: Self::album_from_item(album),
            genres: Vec::new(),
            tracks: tracks.items.into_iter().map(Self::track_from_item).collect(),
        })
    }

    async fn get_artist(&self, artist_id: &str) -> Result<ArtistDetails> {
        let id = urlencoding::encode(artist_id);
        let artist: ArtistItem = self.get_json(&format!("artists/{id}"), &[]).await?;
        let albums: Page<AlbumItem> = self
            .get_json(&format!("artists/{id}/albums"), &[("limit", "50")])
            .await?;
        let top: Page<TrackItem> = self
            .get_json(&format!("artists/{id}/toptracks"), &[("limit", "10")])
            .await?;
        Ok(ArtistDetails {
            artist: Self::artist_from_item(artist),
            albums: albums.items.into_iter().map(Self::album_from_item).collect(),
            top_songs: top.items.into_iter().map(Self::track_from_item).collect(),
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
