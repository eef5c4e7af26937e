use crate::sources::{EventBus, PlayStatus};
use anyhow::Context;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
    process::{Child, Command},
};

/// Process-level knobs shared by every mpv instance.
#[derive(Debug, Clone, Default)]
pub struct MpvOptions {
    pub audio_device: Option<String>,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Progress {
    position: f64,
    duration: f64,
}

/// One headless mpv process driven over its JSON IPC socket.
///
/// Property changes are pushed onto the [`EventBus`] handed to `spawn`:
/// `time-pos` and `duration` as time updates, `pause` and end of file as
/// play/pause changes, a file that fails to load or play as an error.
#[derive(Debug)]
pub struct MpvPlayer {
    child: Child,
    socket_path: PathBuf,
    writer: tokio::sync::Mutex<tokio::io::WriteHalf<UnixStream>>,
    request_id: AtomicU64,
    progress: Arc<Mutex<Progress>>,
}

impl MpvPlayer {
    /// `name` keeps the IPC socket apart from other instances (one per source).
    pub async fn spawn(name: &str, options: &MpvOptions, bus: EventBus) -> anyhow::Result<Self> {
        let socket_path =
            std::env::temp_dir().join(format!("amplitune-{name}-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&socket_path);

        let mut cmd = Command::new("mpv");
        cmd.args([
            "--no-video",
            "--idle=yes",
            "--input-terminal=no",
            "--really-quiet",
            "--audio-channels=stereo",
        ]);
        if let Some(dev) = &options.audio_device {
            cmd.arg(format!("--audio-device={dev}"));
        }
        if let Some(p) = &options.log_file {
            cmd.arg(format!("--log-file={}", p.display()));
        }
        let child = cmd
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("spawn mpv")?;

        let stream = connect_with_retry(&socket_path).await?;
        let (reader, writer) = tokio::io::split(stream);

        let progress = Arc::new(Mutex::new(Progress::default()));
        tokio::spawn(read_events_loop(
            reader,
            name.to_string(),
            bus,
            progress.clone(),
        ));

        let this = Self {
            child,
            socket_path,
            writer: tokio::sync::Mutex::new(writer),
            request_id: AtomicU64::new(1),
            progress,
        };

        this.command(json!({"command":["request_log_messages", "warn"]}))
            .await?;
        this.command(json!({"command":["observe_property", 1, "time-pos"]}))
            .await?;
        this.command(json!({"command":["observe_property", 2, "duration"]}))
            .await?;
        this.command(json!({"command":["observe_property", 3, "pause"]}))
            .await?;

        tracing::info!(instance = name, "mpv started");
        Ok(this)
    }

    pub async fn load_url(&self, url: &str) -> anyhow::Result<()> {
        {
            let mut p = self.progress();
            *p = Progress::default();
        }
        self.command(json!({"command":["loadfile", url, "replace"]}))
            .await?;
        self.play().await
    }

    pub async fn play(&self) -> anyhow::Result<()> {
        self.command(json!({"command":["set_property", "pause", false]}))
            .await
    }

    pub async fn pause(&self) -> anyhow::Result<()> {
        self.command(json!({"command":["set_property", "pause", true]}))
            .await
    }

    /// Seek to an absolute position, clamped to the loaded file.
    pub async fn seek_absolute(&self, seconds: f64) -> anyhow::Result<()> {
        let target = clamp_seek(seconds, self.progress().duration);
        self.command(json!({"command":["seek", target, "absolute"]}))
            .await
    }

    /// `volume` in `[0, 1]`, mapped onto mpv's 0-100 scale.
    pub async fn set_volume(&self, volume: f64) -> anyhow::Result<()> {
        let volume_0_100 = (volume.clamp(0.0, 1.0) * 100.0).round();
        self.command(json!({"command":["set_property", "volume", volume_0_100]}))
            .await
    }

    /// Loop the current file forever, or stop looping.
    pub async fn set_loop(&self, enabled: bool) -> anyhow::Result<()> {
        let value = if enabled { "inf" } else { "no" };
        self.command(json!({"command":["set_property", "loop-file", value]}))
            .await
    }

    pub fn position(&self) -> f64 {
        self.progress().position
    }

    pub fn duration(&self) -> f64 {
        self.progress().duration
    }

    fn progress(&self) -> std::sync::MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn command(&self, mut v: serde_json::Value) -> anyhow::Result<()> {
        // Tag requests so we can get structured errors back on the IPC stream.
        if v.get("request_id").is_none() {
            let id = self.request_id.fetch_add(1, Ordering::Relaxed);
            if let serde_json::Value::Object(ref mut o) = v {
                o.insert("request_id".to_string(), serde_json::Value::from(id));
            }
        }
        let mut w = self.writer.lock().await;
        let mut line = serde_json::to_vec(&v).context("encode mpv json")?;
        line.push(b'\n');
        w.write_all(&line).await.context("write mpv ipc")?;
        w.flush().await.context("flush mpv ipc")?;
        Ok(())
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

fn clamp_seek(seconds: f64, duration: f64) -> f64 {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    if duration > 0.0 {
        seconds.min(duration)
    } else {
        seconds
    }
}

async fn connect_with_retry(path: &Path) -> anyhow::Result<UnixStream> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        match UnixStream::connect(path).await {
            Ok(s) => return Ok(s),
            Err(e) => {
                if tokio::time::Instant::now() > deadline {
                    return Err(e)
                        .with_context(|| format!("connect to mpv ipc {}", path.display()));
                }
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
}

async fn read_events_loop(
    reader: tokio::io::ReadHalf<UnixStream>,
    name: String,
    bus: EventBus,
    progress: Arc<Mutex<Progress>>,
) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(v) = serde_json::from_str::<serde_json::Value>(&line) else {
            continue;
        };
        if let Some(err) = v.get("error").and_then(|e| e.as_str())
            && v.get("request_id").is_some()
            && err != "success"
        {
            tracing::warn!(instance = %name, "mpv ipc error: {err}");
        }
        let Some(event) = map_mpv_event(&v) else {
            continue;
        };
        match event {
            MpvEvent::Position(seconds) => {
                let p = update_progress(&progress, |p| p.position = seconds);
                bus.emit_time_update(p.position, p.duration);
            }
            MpvEvent::Duration(seconds) => {
                let p = update_progress(&progress, |p| p.duration = seconds);
                bus.emit_time_update(p.position, p.duration);
            }
            MpvEvent::Status(status) => bus.emit_play_pause(status),
            MpvEvent::Failed(message) => {
                tracing::warn!(instance = %name, "{message}");
                bus.emit_error(&message);
            }
            MpvEvent::Log(message) => tracing::warn!(instance = %name, "{message}"),
        }
    }
    tracing::debug!(instance = %name, "mpv ipc closed");
}

fn update_progress(progress: &Mutex<Progress>, f: impl FnOnce(&mut Progress)) -> Progress {
    let mut p = progress.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut p);
    *p
}

#[derive(Debug, Clone, PartialEq)]
enum MpvEvent {
    Position(f64),
    Duration(f64),
    Status(PlayStatus),
    /// The loaded file stopped with an error; nothing is playing any more.
    Failed(String),
    Log(String),
}

fn map_mpv_event(v: &serde_json::Value) -> Option<MpvEvent> {
    match v.get("event")?.as_str()? {
        "property-change" => {
            let name = v.get("name")?.as_str()?;
            // `data` is absent while nothing is loaded.
            let data = v.get("data");
            match name {
                "time-pos" => Some(MpvEvent::Position(
                    data.and_then(|d| d.as_f64()).unwrap_or(0.0),
                )),
                "duration" => Some(MpvEvent::Duration(
                    data.and_then(|d| d.as_f64()).unwrap_or(0.0),
                )),
                "pause" => {
                    let paused = data.and_then(|d| d.as_bool()).unwrap_or(false);
                    Some(MpvEvent::Status(if paused {
                        PlayStatus::Paused
                    } else {
                        PlayStatus::Playing
                    }))
                }
                _ => None,
            }
        }
        "end-file" => match v.get("reason").and_then(|x| x.as_str()).unwrap_or("") {
            "eof" => Some(MpvEvent::Status(PlayStatus::Ended)),
            "error" => {
                let err = v.get("error").and_then(|x| x.as_str()).unwrap_or("unknown");
                Some(MpvEvent::Failed(format!("playback failed: {err}")))
            }
            // "stop" fires when loadfile replaces the current file.
            _ => None,
        },
        "log-message" => {
            let level = v.get("level")?.as_str().unwrap_or("info");
            let text = v.get("text")?.as_str().unwrap_or("").trim();
            if (level == "warn" || level == "error") && !text.is_empty() {
                Some(MpvEvent::Log(format!("mpv {level}: {text}")))
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_property_changes() {
        let pos = json!({"event":"property-change","id":1,"name":"time-pos","data":12.5});
        assert_eq!(map_mpv_event(&pos), Some(MpvEvent::Position(12.5)));

        let idle = json!({"event":"property-change","id":2,"name":"duration"});
        assert_eq!(map_mpv_event(&idle), Some(MpvEvent::Duration(0.0)));

        let paused = json!({"event":"property-change","id":3,"name":"pause","data":true});
        assert_eq!(
            map_mpv_event(&paused),
            Some(MpvEvent::Status(PlayStatus::Paused))
        );
    }

    #[test]
    fn only_natural_end_of_file_counts_as_ended() {
        let eof = json!({"event":"end-file","reason":"eof"});
        assert_eq!(map_mpv_event(&eof), Some(MpvEvent::Status(PlayStatus::Ended)));

        let replaced = json!({"event":"end-file","reason":"stop"});
        assert_eq!(map_mpv_event(&replaced), None);

        let failed = json!({"event":"end-file","reason":"error","error":"loading failed"});
        assert_eq!(
            map_mpv_event(&failed),
            Some(MpvEvent::Failed("playback failed: loading failed".into()))
        );
    }

    #[test]
    fn warnings_are_only_logged() {
        let warn = json!({"event":"log-message","level":"warn","text":"audio underrun\n"});
        assert_eq!(
            map_mpv_event(&warn),
            Some(MpvEvent::Log("mpv warn: audio underrun".into()))
        );
    }

    #[test]
    fn ignores_replies_and_quiet_logs() {
        assert_eq!(map_mpv_event(&json!({"request_id":4,"error":"success"})), None);
        let info = json!({"event":"log-message","level":"info","text":"hello"});
        assert_eq!(map_mpv_event(&info), None);
    }

    #[test]
    fn seek_is_clamped_to_the_file() {
        assert_eq!(clamp_seek(-4.0, 100.0), 0.0);
        assert_eq!(clamp_seek(150.0, 100.0), 100.0);
        assert_eq!(clamp_seek(42.0, 100.0), 42.0);
        // Unknown duration: only the lower bound applies.
        assert_eq!(clamp_seek(150.0, 0.0), 150.0);
        assert_eq!(clamp_seek(f64::NAN, 100.0), 0.0);
    }
}
