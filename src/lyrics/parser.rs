//! LRC format parser
//!
//! Parses line-oriented, timestamp-prefixed lyrics:
//! [mm:ss.xx] Lyrics line here
//!
//! Example:
//! [00:12.34] Hello world
//! [00:15.00] Another line
//! [00:20.00][01:20.00] Repeated chorus

use crate::sources::LyricLine;

/// Parse LRC text into lines ordered by start time.
///
/// Lines without a timestamp are kept with no start time; they sort before
/// every timed line. Metadata tags like `[ar:Artist]` are dropped.
pub fn parse_lrc(content: &str) -> Vec<LyricLine> {
    let mut lines = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || is_metadata(line) {
            continue;
        }

        if let Some(timed) = parse_timed_line(line) {
            lines.extend(timed);
        } else if !line.starts_with('[') {
            lines.push(LyricLine::plain(line));
        }
    }

    // Stable: keeps the file order for equal stamps.
    lines.sort_by_key(|l| l.start_ms);
    lines
}

/// Plain lyrics, one entry per non-empty line, no timing.
pub fn parse_plain(content: &str) -> Vec<LyricLine> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(LyricLine::plain)
        .collect()
}

/// Metadata tag like [ti:Title]
fn is_metadata(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('[') else {
        return false;
    };
    let Some(end) = rest.find(']') else {
        return false;
    };
    let Some((tag, _)) = rest[..end].split_once(':') else {
        return false;
    };
    // Tags are short and alphabetic; timestamps start with digits.
    !tag.is_empty() && tag.len() <= 6 && tag.chars().all(|c| c.is_ascii_alphabetic())
}

/// [00:12.34]Lyrics or [00:12.34][00:15.00]Lyrics
fn parse_timed_line(line: &str) -> Option<Vec<LyricLine>> {
    let mut stamps = Vec::new();
    let mut rest = line;

    while let Some(inner) = rest.strip_prefix('[') {
        let Some(end) = inner.find(']') else {
            break;
        };
        let Some(ms) = parse_timestamp(&inner[..end]) else {
            break;
        };
        stamps.push(ms);
        rest = &inner[end + 1..];
    }

    if stamps.is_empty() {
        return None;
    }

    let text = rest.trim();
    Some(
        stamps
            .into_iter()
            .map(|ms| LyricLine::timed(ms, text))
            .collect(),
    )
}

/// "mm:ss", "mm:ss.xx", "mm:ss.xxx" or "mm:ss:xx" to milliseconds
pub(crate) fn parse_timestamp(s: &str) -> Option<u64> {
    let parts: Vec<&str> = s.trim().split([':', '.']).collect();

    let (min, sec, frac) = match parts.as_slice() {
        [m, s] => (*m, *s, None),
        [m, s, f] => (*m, *s, Some(*f)),
        _ => return None,
    };

    let min: u64 = min.parse().ok()?;
    let sec: u64 = sec.parse().ok()?;
    if sec >= 60 {
        return None;
    }
    let ms = match frac {
        None => 0,
        Some(f) => {
            let n: u64 = f.parse().ok()?;
            match f.len() {
                1 => n * 100,
                2 => n * 10,
                3 => n,
                _ => return None,
            }
        }
    };
    min.checked_mul(60_000)?.checked_add(sec * 1000 + ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:12"), Some(12000));
        assert_eq!(parse_timestamp("01:30"), Some(90000));
        assert_eq!(parse_timestamp("00:12.34"), Some(12340));
        assert_eq!(parse_timestamp("00:12.340"), Some(12340));
        assert_eq!(parse_timestamp("00:12:34"), Some(12340));
        assert_eq!(parse_timestamp("00:12.5"), Some(12500));
        assert_eq!(parse_timestamp("ar:Someone"), None);
        assert_eq!(parse_timestamp("00:75.00"), None);
    }

    #[test]
    fn test_parse_lrc() {
        let lrc = r#"
[ti:Test Song]
[ar:Test Artist]
[00:15.00]Second line
[00:12.34] First line
"#;
        let lines = parse_lrc(lrc);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], LyricLine::timed(12340, "First line"));
        assert_eq!(lines[1], LyricLine::timed(15000, "Second line"));
    }

    #[test]
    fn repeated_stamps_expand() {
        let lines = parse_lrc("[00:20.00][01:20.00]Chorus\n[00:30.00]Verse");
        let starts: Vec<_> = lines.iter().map(|l| l.start_ms).collect();
        assert_eq!(starts, vec![Some(20000), Some(30000), Some(80000)]);
        assert_eq!(lines[2].value, "Chorus");
    }

    #[test]
    fn empty_text_after_stamp_is_kept_as_gap() {
        let lines = parse_lrc("[00:01.00]Hi\n[00:03.00]\n[00:05.00]Bye");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].value, "");
    }

    #[test]
    fn unstamped_lines_have_no_start() {
        let lines = parse_lrc("just words\n[00:01.00]timed");
        assert_eq!(lines[0], LyricLine::plain("just words"));
        assert_eq!(lines[1].start_ms, Some(1000));
    }

    #[test]
    fn oversized_minutes_drop_the_line() {
        assert_eq!(parse_timestamp("99999999999999999:00.00"), None);
        assert_eq!(parse_timestamp("18446744073709551615:00"), None);

        let lines = parse_lrc("[99999999999999999:00.00]boom\n[00:01.00]ok");
        assert_eq!(lines, vec![LyricLine::timed(1000, "ok")]);
    }

    #[test]
    fn plain_lyrics_skip_blank_lines() {
        let lines = parse_plain("one\n\n  two  \n");
        assert_eq!(lines, vec![LyricLine::plain("one"), LyricLine::plain("two")]);
    }
}
