use crate::lyrics::LrclibClient;
use crate::player::MpvOptions;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub player: PlayerConfig,
    pub lyrics: LyricsConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// mpv audio device name (see `mpv --audio-device=help`)
    pub audio_device: Option<String>,
    /// Volume level (0-100)
    pub volume: u8,
    /// Write mpv's log next to the database.
    pub mpv_log: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    pub lrclib_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Wait for a MusicKit bridge during startup. Only hosts that embed the
    /// SDK set this.
    pub musickit: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|p| p.data_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("amplitune"));
        Self { data_dir }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            audio_device: None,
            volume: 80,
            mpv_log: false,
        }
    }
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            lrclib_url: LrclibClient::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Config {
    pub fn database_path(&self) -> PathBuf {
        self.paths.data_dir.join("amplitune.sqlite3")
    }

    pub fn mpv_options(&self) -> MpvOptions {
        MpvOptions {
            audio_device: self.player.audio_device.clone(),
            log_file: self
                .player
                .mpv_log
                .then(|| self.paths.data_dir.join("mpv.log")),
        }
    }

    /// Configured volume on the `[0, 1]` scale sources use.
    pub fn volume(&self) -> f64 {
        f64::from(self.player.volume.min(100)) / 100.0
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "amplitune", "amplitune")
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj = project_dirs().context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

fn resolve(override_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match override_path {
        Some(p) => Ok(p.to_path_buf()),
        None => default_config_path(),
    }
}

fn write(cfg: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

pub fn save(cfg: &Config, override_path: Option<&Path>) -> anyhow::Result<()> {
    write(cfg, &resolve(override_path)?)
}

/// Read the config file, creating it with defaults on first run.
pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = resolve(override_path)?;

    if !path.exists() {
        let cfg = Config::default();
        write(&cfg, &path)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str::<Config>(&raw).with_context(|| format!("parse {}", path.display()))
}
