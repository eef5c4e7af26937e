use crate::sources::{Lyrics, LyricsText, PlayStatus, format_time};

const VOLUME_STEP: f64 = 0.05;

/// What a running play session prints and remembers between events.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub volume: f64,
    pub status: PlayStatus,
    pub lyrics: Option<LyricsText>,
    lyrics_note: Option<String>,
    last_second: Option<u64>,
    last_line: Option<usize>,
}

impl SessionState {
    pub fn new(volume: f64) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            status: PlayStatus::Paused,
            lyrics: None,
            lyrics_note: None,
            last_second: None,
            last_line: None,
        }
    }

    /// Reset per-track state for a freshly started track.
    pub fn track_started(&mut self, lyrics: Lyrics) {
        self.last_second = None;
        self.last_line = None;
        match lyrics {
            Lyrics::Text(text) => {
                self.lyrics_note = None;
                self.lyrics = Some(text);
            }
            Lyrics::Error { message, source } => {
                self.lyrics_note = Some(format!("{message} ({source})"));
                self.lyrics = None;
            }
        }
    }

    pub fn adjust_volume(&mut self, steps: i32) -> f64 {
        self.volume = (self.volume + f64::from(steps) * VOLUME_STEP).clamp(0.0, 1.0);
        // Avoid drift like 0.7500000000000001 in the display.
        self.volume = (self.volume * 100.0).round() / 100.0;
        self.volume
    }

    /// Lines to print for a progress update: the clock once per whole
    /// second, and the lyric line whenever a new one becomes active.
    pub fn progress(&mut self, position: f64, duration: f64) -> Vec<String> {
        let mut out = Vec::new();

        let second = if position.is_finite() && position > 0.0 {
            position as u64
        } else {
            0
        };
        if self.last_second != Some(second) {
            self.last_second = Some(second);
            out.push(format!("{} / {}", format_time(position), format_time(duration)));
        }

        if let Some(text) = &self.lyrics {
            let line = text.line_at((position.max(0.0) * 1000.0) as u64);
            if line.is_some() && line != self.last_line {
                self.last_line = line;
                if let Some(l) = line.and_then(|i| text.lines.get(i))
                    && !l.value.is_empty()
                {
                    out.push(format!("  ♪ {}", l.value));
                }
            }
        }

        out
    }

    /// Full lyrics for the `l` command.
    pub fn lyrics_block(&self) -> String {
        match (&self.lyrics, &self.lyrics_note) {
            (Some(text), _) if text.lines.is_empty() => format!("[instrumental] ({})", text.source),
            (Some(text), _) => {
                let mut out = format!("[{}] ({})\n", if text.synced { "synced" } else { "plain" }, text.source);
                for line in text.display_lines() {
                    out.push_str(line);
                    out.push('\n');
                }
                out
            }
            (None, Some(note)) => note.clone(),
            (None, None) => "no lyrics loaded".to_string(),
        }
    }
}
