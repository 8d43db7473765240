//! Chapter metadata file generation for video remux (§4.6).
//!
//! `;FFMETADATA1` header, one `[CHAPTER]` block per chapter, `TIMEBASE=1/1`
//! (seconds). END of chapter *i* is START of chapter *i+1* minus one second,
//! except the last chapter's END which is the clip duration. A chapter
//! whose START is <= the previous chapter's START is skipped (monotonicity).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RawChapter {
    pub title: String,
    pub start: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChapterEntry {
    pub title: String,
    pub start: u64,
    pub end: u64,
}

/// Builds the END-filled, monotonicity-filtered chapter list from raw
/// (title, start) pairs and the clip's total duration.
pub fn build_chapter_entries(raw: &[RawChapter], duration: Duration) -> Vec<ChapterEntry> {
    let mut kept: Vec<(String, u64)> = Vec::new();
    for chapter in raw {
        let start = chapter.start.as_secs();
        if let Some((_, prev_start)) = kept.last() {
            if start <= *prev_start {
                continue;
            }
        }
        kept.push((chapter.title.clone(), start));
    }

    let duration_secs = duration.as_secs();
    let mut entries = Vec::with_capacity(kept.len());
    for (i, (title, start)) in kept.iter().enumerate() {
        let end = match kept.get(i + 1) {
            Some((_, next_start)) => next_start.saturating_sub(1),
            None => duration_secs,
        };
        entries.push(ChapterEntry { title: title.clone(), start: *start, end });
    }
    entries
}

/// Renders the `ffmetadata`-format chapters file consumed by the transcoder
/// via `-f ffmetadata -i <file> -map_metadata 1` (§4.6, §6).
pub fn render_ffmetadata(entries: &[ChapterEntry]) -> String {
    let mut out = String::from(";FFMETADATA1\n");
    for entry in entries {
        out.push_str("[CHAPTER]\n");
        out.push_str("TIMEBASE=1/1\n");
        out.push_str(&format!("START={}\n", entry.start));
        out.push_str(&format!("END={}\n", entry.end));
        out.push_str(&format!("TITLE={}\n", entry.title));
    }
    out
}

/// Extracts a duration from `ffmpeg`'s informational stderr via
/// `Duration: ([\d:.]+)`, e.g. `Duration: 01:02:03.45`.
pub fn parse_ffmpeg_duration(stderr: &str) -> Option<Duration> {
    let marker = "Duration: ";
    let start = stderr.find(marker)? + marker.len();
    let rest = &stderr[start..];
    let end = rest.find(|c: char| !(c.is_ascii_digit() || c == ':' || c == '.'))?;
    let token = &rest[..end];
    parse_hms(token)
}

fn parse_hms(token: &str) -> Option<Duration> {
    let mut parts = token.split(':');
    let h: f64 = parts.next()?.parse().ok()?;
    let m: f64 = parts.next()?.parse().ok()?;
    let s: f64 = parts.next()?.parse().ok()?;
    Some(Duration::from_secs_f64(h * 3600.0 + m * 60.0 + s))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str, secs: u64) -> RawChapter {
        RawChapter { title: title.to_string(), start: Duration::from_secs(secs) }
    }

    #[test]
    fn last_chapter_end_is_clip_duration() {
        let chapters = vec![raw("One", 0), raw("Two", 60)];
        let entries = build_chapter_entries(&chapters, Duration::from_secs(180));
        assert_eq!(entries[0].end, 59);
        assert_eq!(entries[1].end, 180);
    }

    #[test]
    fn non_monotonic_start_is_skipped() {
        let chapters = vec![raw("One", 0), raw("Bad", 0), raw("Two", 30)];
        let entries = build_chapter_entries(&chapters, Duration::from_secs(60));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].title, "Two");
    }

    #[test]
    fn renders_ffmetadata_header_and_blocks() {
        let entries = vec![ChapterEntry { title: "Intro".into(), start: 0, end: 59 }];
        let rendered = render_ffmetadata(&entries);
        assert!(rendered.starts_with(";FFMETADATA1\n"));
        assert!(rendered.contains("TIMEBASE=1/1"));
        assert!(rendered.contains("TITLE=Intro"));
    }

    #[test]
    fn parses_duration_from_ffmpeg_stderr() {
        let stderr = "ffmpeg version 6.0\n  Duration: 01:02:03.45, start: 0.0, bitrate: 128 kb/s\n";
        let d = parse_ffmpeg_duration(stderr).unwrap();
        assert!((d.as_secs_f64() - (3723.45)).abs() < 0.01);
    }

    #[test]
    fn missing_duration_yields_none() {
        assert!(parse_ffmpeg_duration("no duration here").is_none());
    }
}
