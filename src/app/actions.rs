/// Commands accepted on stdin while a play session is running.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    TogglePause,
    PlayNext,
    PlayPrev,
    /// Relative seek in seconds.
    Seek(f64),
    /// Absolute seek in seconds.
    SeekTo(f64),
    VolumeUp,
    VolumeDown,
    ToggleRepeat,
    ShowLyrics,
    ShowQueue,
    Help,
}

pub const HELP: &str = "\
commands:
  <enter>/p   pause or resume
  n / b       next / previous track
  ] / [       seek +10s / -10s
  s <secs>    seek to position
  + / -       volume up / down
  r           toggle repeat
  l           show lyrics
  u           show queue
  q           quit";

const SEEK_STEP: f64 = 10.0;

/// Parse one input line. Unknown input yields `None`.
pub fn parse_action(line: &str) -> Option<Action> {
    let line = line.trim();
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, Some(arg.trim())),
        None => (line, None),
    };

    match (cmd, arg) {
        ("" | "p" | "pause", None) => Some(Action::TogglePause),
        ("q" | "quit" | "exit", None) => Some(Action::Quit),
        ("n" | "next", None) => Some(Action::PlayNext),
        ("b" | "prev" | "previous", None) => Some(Action::PlayPrev),
        ("]", None) => Some(Action::Seek(SEEK_STEP)),
        ("[", None) => Some(Action::Seek(-SEEK_STEP)),
        ("s" | "seek", Some(arg)) => arg
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite())
            .map(Action::SeekTo),
        ("+" | "=", None) => Some(Action::VolumeUp),
        ("-" | "_", None) => Some(Action::VolumeDown),
        ("r" | "repeat", None) => Some(Action::ToggleRepeat),
        ("l" | "lyrics", None) => Some(Action::ShowLyrics),
        ("u" | "queue", None) => Some(Action::ShowQueue),
        ("h" | "?" | "help", None) => Some(Action::Help),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_letter_commands() {
        assert_eq!(parse_action(""), Some(Action::TogglePause));
        assert_eq!(parse_action(" n "), Some(Action::PlayNext));
        assert_eq!(parse_action("]"), Some(Action::Seek(10.0)));
        assert_eq!(parse_action("["), Some(Action::Seek(-10.0)));
        assert_eq!(parse_action("q"), Some(Action::Quit));
    }

    #[test]
    fn parses_seek_position() {
        assert_eq!(parse_action("s 95.5"), Some(Action::SeekTo(95.5)));
        assert_eq!(parse_action("seek   30"), Some(Action::SeekTo(30.0)));
        assert_eq!(parse_action("s"), None);
        assert_eq!(parse_action("s abc"), None);
        assert_eq!(parse_action("s inf"), None);
    }

    #[test]
    fn rejects_unknown_input() {
        assert_eq!(parse_action("dance"), None);
        assert_eq!(parse_action("n now"), None);
    }
}
