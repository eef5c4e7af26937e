//! LRCLIB API client
//!
//! LRCLIB is a free, unauthenticated lyrics API that serves synchronized
//! (LRC format) and plain lyrics.
//! API Documentation: https://lrclib.net/docs

use super::{LyricsFallback, parser};
use crate::sources::Lyrics;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

/// Source tag carried by every result this client produces.
pub const LRCLIB_SOURCE: &str = "LRC-LIB";

/// LRCLIB API response
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LrclibResponse {
    #[serde(default)]
    pub track_name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub instrumental: bool,
    pub plain_lyrics: Option<String>,
    pub synced_lyrics: Option<String>,
}

impl LrclibResponse {
    /// Normalize into the common lyrics shape.
    pub fn into_lyrics(self) -> Lyrics {
        if let Some(synced) = self.synced_lyrics.as_deref()
            && !synced.trim().is_empty()
        {
            return Lyrics::synced(parser::parse_lrc(synced), LRCLIB_SOURCE);
        }
        if let Some(plain) = self.plain_lyrics.as_deref()
            && !plain.trim().is_empty()
        {
            return Lyrics::unsynced(parser::parse_plain(plain), LRCLIB_SOURCE);
        }
        if self.instrumental {
            return Lyrics::Text(crate::sources::LyricsText {
                lines: Vec::new(),
                synced: false,
                kind: Some(crate::sources::LyricsKind::Instrumental),
                source: LRCLIB_SOURCE.to_string(),
            });
        }
        Lyrics::not_found(LRCLIB_SOURCE)
    }
}

/// LRCLIB API client
#[derive(Debug, Clone)]
pub struct LrclibClient {
    client: reqwest::Client,
    base_url: String,
}

impl LrclibClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://lrclib.net/api";
    const CLIENT_ID: &'static str = "amplitune (https://github.com/Evan-2007/Amplitune)";

    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(Self::CLIENT_ID)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("build lrclib http client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get lyrics by track info: exact match first, then search.
    pub async fn get_lyrics(
        &self,
        track_name: &str,
        artist_name: &str,
        album_name: Option<&str>,
    ) -> anyhow::Result<Option<LrclibResponse>> {
        if let Some(lyrics) = self.get_exact(track_name, artist_name, album_name).await? {
            return Ok(Some(lyrics));
        }
        self.search(track_name, artist_name).await
    }

    async fn get_exact(
        &self,
        track_name: &str,
        artist_name: &str,
        album_name: Option<&str>,
    ) -> anyhow::Result<Option<LrclibResponse>> {
        let mut url = format!(
            "{}/get?track_name={}&artist_name={}",
            self.base_url,
            urlencoding::encode(track_name),
            urlencoding::encode(artist_name)
        );
        if let Some(album) = album_name.filter(|a| !a.is_empty()) {
            url.push_str(&format!("&album_name={}", urlencoding::encode(album)));
        }

        let response = self
            .client
            .get(&url)
            .header("Lrclib-Client", Self::CLIENT_ID)
            .send()
            .await
            .context("send lrclib get")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let lyrics = response
            .error_for_status()
            .context("lrclib get http status")?
            .json::<LrclibResponse>()
            .await
            .context("parse lrclib get json")?;
        Ok(Some(lyrics))
    }

    async fn search(
        &self,
        track_name: &str,
        artist_name: &str,
    ) -> anyhow::Result<Option<LrclibResponse>> {
        let url = format!(
            "{}/search?track_name={}&artist_name={}",
            self.base_url,
            urlencoding::encode(track_name),
            urlencoding::encode(artist_name)
        );

        let response = self
            .client
            .get(&url)
            .header("Lrclib-Client", Self::CLIENT_ID)
            .send()
            .await
            .context("send lrclib search")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let results: Vec<LrclibResponse> = response
            .error_for_status()
            .context("lrclib search http status")?
            .json()
            .await
            .context("parse lrclib search json")?;

        // Prefer a result with synced lyrics, otherwise take the top hit.
        let best = results
            .iter()
            .position(|r| r.synced_lyrics.as_deref().is_some_and(|s| !s.is_empty()))
            .unwrap_or(0);
        Ok(results.into_iter().nth(best))
    }
}

#[async_trait]
impl LyricsFallback for LrclibClient {
    async fn fetch_by_metadata(&self, title: &str, artist: &str, album: &str) -> Lyrics {
        match self.get_lyrics(title, artist, Some(album)).await {
            Ok(Some(found)) => found.into_lyrics(),
            Ok(None) => Lyrics::not_found(LRCLIB_SOURCE),
            Err(e) => {
                tracing::warn!("lrclib lookup for {title:?} by {artist:?} failed: {e:#}");
                Lyrics::error(format!("{e:#}"), LRCLIB_SOURCE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lrclib_body(synced: Option<&str>, plain: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "id": 1,
            "trackName": "Song",
            "artistName": "Band",
            "albumName": "Record",
            "duration": 180.0,
            "instrumental": false,
            "plainLyrics": plain,
            "syncedLyrics": synced,
        })
    }

    #[tokio::test]
    async fn exact_match_returns_synced_lines() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .and(query_param("track_name", "Song"))
            .and(query_param("artist_name", "Band"))
            .and(query_param("album_name", "Record"))
            .respond_with(ResponseTemplate::new(200).set_body_json(lrclib_body(
                Some("[00:01.00]Hello\n[00:02.50]World"),
                Some("Hello\nWorld"),
            )))
            .mount(&server)
            .await;

        let client = LrclibClient::with_base_url(server.uri()).unwrap();
        let lyrics = client.fetch_by_metadata("Song", "Band", "Record").await;

        let Lyrics::Text(text) = lyrics else {
            panic!("expected lyrics, got {lyrics:?}");
        };
        assert!(text.synced);
        assert_eq!(text.source, LRCLIB_SOURCE);
        assert_eq!(text.lines[1].start_ms, Some(2500));
        assert_eq!(text.lines[1].value, "World");
    }

    #[tokio::test]
    async fn falls_back_to_search_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": 404, "name": "TrackNotFound", "message": "Failed to find specified track"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                lrclib_body(None, Some("plain only")),
                lrclib_body(Some("[00:03.00]timed"), None),
            ])))
            .mount(&server)
            .await;

        let client = LrclibClient::with_base_url(server.uri()).unwrap();
        let Lyrics::Text(text) = client.fetch_by_metadata("Song", "Band", "").await else {
            panic!("expected lyrics");
        };
        assert!(text.synced);
        assert_eq!(text.lines[0].value, "timed");
    }

    #[tokio::test]
    async fn nothing_found_is_an_error_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = LrclibClient::with_base_url(server.uri()).unwrap();
        let lyrics = client.fetch_by_metadata("Song", "Band", "Record").await;
        assert_eq!(lyrics, Lyrics::not_found(LRCLIB_SOURCE));
    }

    #[tokio::test]
    async fn server_failure_is_an_error_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = LrclibClient::with_base_url(server.uri()).unwrap();
        let lyrics = client.fetch_by_metadata("Song", "Band", "Record").await;
        assert!(lyrics.is_error());
        assert_eq!(lyrics.source(), LRCLIB_SOURCE);
    }

    #[test]
    fn plain_only_response_is_unsynced() {
        let resp = LrclibResponse {
            plain_lyrics: Some("a\nb".into()),
            ..Default::default()
        };
        let Lyrics::Text(text) = resp.into_lyrics() else {
            panic!("expected lyrics");
        };
        assert!(!text.synced);
        assert_eq!(text.lines.len(), 2);
    }

    #[test]
    fn instrumental_has_no_lines() {
        let resp = LrclibResponse {
            instrumental: true,
            ..Default::default()
        };
        let Lyrics::Text(text) = resp.into_lyrics() else {
            panic!("expected lyrics");
        };
        assert_eq!(text.kind, Some(crate::sources::LyricsKind::Instrumental));
        assert!(text.lines.is_empty());
    }
}
