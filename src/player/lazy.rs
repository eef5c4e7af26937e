use super::mpv::{MpvOptions, MpvPlayer};
use crate::sources::EventBus;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;

/// An mpv instance that is only started by the first `load`.
///
/// Transport calls made before that are no-ops; volume and loop settings are
/// remembered and applied when the process comes up.
#[derive(Debug)]
pub struct LazyMpv {
    name: &'static str,
    options: MpvOptions,
    bus: EventBus,
    player: OnceCell<MpvPlayer>,
    volume: Mutex<Option<f64>>,
    repeat: AtomicBool,
}

impl LazyMpv {
    pub fn new(name: &'static str, options: MpvOptions) -> Self {
        Self {
            name,
            options,
            bus: EventBus::new(),
            player: OnceCell::new(),
            volume: Mutex::new(None),
            repeat: AtomicBool::new(false),
        }
    }

    /// Bus the player publishes progress and status on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn is_started(&self) -> bool {
        self.player.initialized()
    }

    pub async fn load(&self, url: &str) -> anyhow::Result<()> {
        let player = self.player.get_or_try_init(|| self.start()).await?;
        player.load_url(url).await
    }

    async fn start(&self) -> anyhow::Result<MpvPlayer> {
        let player = MpvPlayer::spawn(self.name, &self.options, self.bus.clone()).await?;
        let volume = *self.volume.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(volume) = volume {
            player.set_volume(volume).await?;
        }
        if self.repeat.load(Ordering::Relaxed) {
            player.set_loop(true).await?;
        }
        Ok(player)
    }

    pub async fn play(&self) -> anyhow::Result<()> {
        match self.player.get() {
            Some(p) => p.play().await,
            None => Ok(()),
        }
    }

    pub async fn pause(&self) -> anyhow::Result<()> {
        match self.player.get() {
            Some(p) => p.pause().await,
            None => Ok(()),
        }
    }

    pub async fn seek(&self, seconds: f64) -> anyhow::Result<()> {
        match self.player.get() {
            Some(p) => p.seek_absolute(seconds).await,
            None => Ok(()),
        }
    }

    pub async fn set_volume(&self, volume: f64) -> anyhow::Result<()> {
        *self.volume.lock().unwrap_or_else(|e| e.into_inner()) = Some(volume);
        match self.player.get() {
            Some(p) => p.set_volume(volume).await,
            None => Ok(()),
        }
    }

    pub async fn set_repeat(&self, enabled: bool) -> anyhow::Result<()> {
        self.repeat.store(enabled, Ordering::Relaxed);
        match self.player.get() {
            Some(p) => p.set_loop(enabled).await,
            None => Ok(()),
        }
    }
}
