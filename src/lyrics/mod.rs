//! Secondary lyrics lookup by track metadata
//!
//! This module provides:
//! - LRCLIB API client used when a backend has no (or only unsynced) lyrics
//! - LRC format parser producing the common line model

pub mod lrclib;
pub mod parser;

pub use lrclib::{LRCLIB_SOURCE, LrclibClient};

use crate::sources::Lyrics;
use async_trait::async_trait;

/// Lyrics provider keyed by title/artist/album rather than a backend id.
///
/// Implementations never fail: every problem is reported as `Lyrics::Error`.
#[async_trait]
pub trait LyricsFallback: Send + Sync {
    async fn fetch_by_metadata(&self, title: &str, artist: &str, album: &str) -> Lyrics;
}
