//! Read-only view of persisted source settings.
//!
//! The orchestrator and adapters never touch storage directly; they are handed
//! a [`SettingsReader`] and go through the typed helpers below.

use super::types::{SourceId, Track};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

pub const ACTIVE_SERVER_KEY: &str = "activeServer";
pub const SOURCE_PRIORITY_KEY: &str = "sourcePriority";
pub const TIDAL_SESSION_KEY: &str = "tidalSession";

pub trait SettingsReader: Send + Sync {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;
}

/// In-memory settings, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySettings {
    items: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_item(&self, key: impl Into<String>, value: impl Into<String>) {
        self.items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value.into());
    }
}

impl SettingsReader for MemorySettings {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }
}

pub fn default_priority() -> Vec<SourceId> {
    vec![SourceId::navidrome(), SourceId::tidal(), SourceId::musickit()]
}

/// Preferred source order. Missing or unreadable values fall back to the
/// default order.
pub fn source_priority(reader: &dyn SettingsReader) -> Vec<SourceId> {
    let raw = match reader.get_item(SOURCE_PRIORITY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return default_priority(),
        Err(e) => {
            tracing::warn!("read {SOURCE_PRIORITY_KEY}: {e:#}");
            return default_priority();
        }
    };
    match serde_json::from_str::<Vec<SourceId>>(&raw) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!("malformed {SOURCE_PRIORITY_KEY} {raw:?}: {e}");
            default_priority()
        }
    }
}

/// Connection to the self-hosted Subsonic-compatible server.
///
/// `hash` is the Subsonic token (`md5(password + salt)`), computed when the
/// account was linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConnection {
    pub url: String,
    pub username: String,
    pub hash: String,
    pub salt: String,
    #[serde(default)]
    pub id: String,
}

pub fn active_server(reader: &dyn SettingsReader) -> anyhow::Result<Option<ServerConnection>> {
    read_json(reader, ACTIVE_SERVER_KEY)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TidalSession {
    pub access_token: String,
    #[serde(default = "default_country")]
    pub country_code: String,
}

fn default_country() -> String {
    "US".to_string()
}

pub fn tidal_session(reader: &dyn SettingsReader) -> anyhow::Result<Option<TidalSession>> {
    read_json(reader, TIDAL_SESSION_KEY)
}

fn read_json<T: serde::de::DeserializeOwned>(
    reader: &dyn SettingsReader,
    key: &str,
) -> anyhow::Result<Option<T>> {
    let Some(raw) = reader.get_item(key)? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&raw).with_context(|| format!("parse {key}"))?;
    Ok(Some(value))
}

/// First tag in `priority` that the track can be served from and that has a
/// registered adapter.
pub fn select_source(
    track: &Track,
    priority: &[SourceId],
    is_registered: impl Fn(&SourceId) -> bool,
) -> Option<SourceId> {
    priority
        .iter()
        .find(|tag| track.available_sources.contains(tag))
        .filter(|tag| is_registered(*tag))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_on(sources: &[&str]) -> Track {
        let mut t = Track::new(sources[0].into(), "1", "Song", "Band");
        t.available_sources = sources.iter().map(|s| SourceId::from(*s)).collect();
        t
    }

    #[test]
    fn selects_first_priority_tag_the_track_has() {
        let priority: Vec<SourceId> = ["A", "B", "C"].into_iter().map(SourceId::from).collect();
        let t = track_on(&["C", "B"]);
        assert_eq!(select_source(&t, &priority, |_| true), Some("B".into()));
    }

    #[test]
    fn no_overlap_selects_nothing() {
        let priority = default_priority();
        let t = track_on(&["youtube"]);
        assert_eq!(select_source(&t, &priority, |_| true), None);
    }

    #[test]
    fn matched_but_unregistered_selects_nothing() {
        let priority: Vec<SourceId> = ["A", "B"].into_iter().map(SourceId::from).collect();
        let t = track_on(&["A", "B"]);
        assert_eq!(select_source(&t, &priority, |tag| *tag != "A"), None);
    }

    #[test]
    fn priority_defaults_when_missing_or_malformed() {
        let settings = MemorySettings::new();
        assert_eq!(source_priority(&settings), default_priority());

        settings.set_item(SOURCE_PRIORITY_KEY, "not json");
        assert_eq!(source_priority(&settings), default_priority());

        settings.set_item(SOURCE_PRIORITY_KEY, r#"["tidal","navidrome"]"#);
        assert_eq!(
            source_priority(&settings),
            vec![SourceId::tidal(), SourceId::navidrome()]
        );
    }

    #[test]
    fn reads_active_server() {
        let settings = MemorySettings::new();
        assert!(active_server(&settings).unwrap().is_none());

        settings.set_item(
            ACTIVE_SERVER_KEY,
            r#"{"url":"https://music.example","username":"me","hash":"abc","salt":"xyz"}"#,
        );
        let server = active_server(&settings).unwrap().unwrap();
        assert_eq!(server.url, "https://music.example");
        assert_eq!(server.salt, "xyz");
    }

    #[test]
    fn tidal_session_defaults_country() {
        let settings = MemorySettings::new();
        settings.set_item(TIDAL_SESSION_KEY, r#"{"accessToken":"tok"}"#);
        let session = tidal_session(&settings).unwrap().unwrap();
        assert_eq!(session.country_code, "US");
    }
}
