//! Subtitle file parsing.
//!
//! Two text formats are understood:
//!
//! - SubRip (`.srt`): numbered blocks with `HH:MM:SS,mmm --> HH:MM:SS,mmm`
//!   timings.
//! - MicroDVD (`.sub`): one `{start}{end}text` line per cue, timed in frames,
//!   with `|` separating lines. A leading `{1}{1}<fps>` line declares the
//!   frame rate the file was authored for.
//!
//! Both are small line-based formats and are parsed here directly rather
//! than through a subtitle crate; styling beyond `<tag>` and `{tag}` removal
//! is not kept.

use std::fs;
use std::path::Path;

use super::{Cue, CueTrack, SubtitleError};

/// Supported subtitle file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    SubRip,
    MicroDvd,
}

impl SubtitleFormat {
    /// Pick a format from the file extension, falling back to the contents.
    pub fn detect(path: &Path, contents: &str) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("srt") => SubtitleFormat::SubRip,
            Some("sub") => SubtitleFormat::MicroDvd,
            _ if contents.trim_start_matches('\u{feff}').trim_start().starts_with('{') => {
                SubtitleFormat::MicroDvd
            }
            _ => SubtitleFormat::SubRip,
        }
    }
}

/// Load a cue track from disk, aligned to `target_fps`.
///
/// Frame-based files are converted with their declared frame rate (or
/// `target_fps` if they declare none) and then re-timed for `target_fps`.
/// Every loaded track records `target_fps`, so rate changes during playback
/// re-time SubRip cues too.
pub fn load_cues<P: AsRef<Path>>(path: P, target_fps: f64) -> Result<CueTrack, SubtitleError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let format = SubtitleFormat::detect(path, &contents);
    log::debug!("loading {:?} subtitles from {}", format, path.display());

    let mut track = parse_cues(&contents, format, target_fps)?;
    track.align_to(target_fps);
    Ok(track)
}

/// Parse subtitle text in the given format.
pub fn parse_cues(
    contents: &str,
    format: SubtitleFormat,
    default_fps: f64,
) -> Result<CueTrack, SubtitleError> {
    let contents = contents.trim_start_matches('\u{feff}');
    match format {
        SubtitleFormat::SubRip => parse_subrip(contents),
        SubtitleFormat::MicroDvd => parse_microdvd(contents, default_fps),
    }
}

fn parse_subrip(contents: &str) -> Result<CueTrack, SubtitleError> {
    let mut cues = Vec::new();
    let mut lines = contents.lines().enumerate().peekable();

    while let Some((_, line)) = lines.peek() {
        if line.trim().is_empty() {
            lines.next();
            continue;
        }

        // Optional numeric counter, then the timing line.
        let (mut line_no, mut line) = lines.next().unwrap_or_default();
        if !line.contains("-->") {
            match lines.next() {
                Some(next) => (line_no, line) = next,
                None => break,
            }
        }

        let (start, end) = line.split_once("-->").ok_or_else(|| SubtitleError::Parse {
            line: line_no + 1,
            reason: format!("expected a timing line, found {:?}", line),
        })?;
        let start_ms = parse_timestamp(start).ok_or_else(|| SubtitleError::Parse {
            line: line_no + 1,
            reason: format!("invalid start time {:?}", start.trim()),
        })?;
        // Trailing position hints after the end time are ignored.
        let end = end.split_whitespace().next().unwrap_or_default();
        let end_ms = parse_timestamp(end).ok_or_else(|| SubtitleError::Parse {
            line: line_no + 1,
            reason: format!("invalid end time {:?}", end),
        })?;

        let mut text = Vec::new();
        while let Some((_, l)) = lines.peek() {
            if l.trim().is_empty() {
                break;
            }
            text.push(strip_tags(l.trim_end()));
            lines.next();
        }

        cues.push(Cue::new(start_ms, end_ms, text.join("\\N")));
    }

    Ok(CueTrack::new(cues, None))
}

/// Parse `HH:MM:SS,mmm` (a `.` separator is accepted too).
fn parse_timestamp(value: &str) -> Option<f64> {
    let value = value.trim();
    let (hms, millis) = value.split_once([',', '.']).unwrap_or((value, "0"));

    let mut parts = hms.split(':');
    let hours: u64 = parts.next()?.trim().parse().ok()?;
    let minutes: u64 = parts.next()?.trim().parse().ok()?;
    let seconds: u64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let millis: u64 = millis.trim().parse().ok()?;

    Some(((hours * 60 + minutes) * 60 + seconds) as f64 * 1000.0 + millis as f64)
}

/// Drop `<i>`-style markup and `{\an8}`-style override blocks.
fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut depth: Option<char> = None;
    for c in line.chars() {
        match (depth, c) {
            (None, '<') => depth = Some('>'),
            (None, '{') => depth = Some('}'),
            (Some(close), c) if c == close => depth = None,
            (Some(_), _) => {}
            (None, c) => out.push(c),
        }
    }
    out
}

fn parse_microdvd(contents: &str, default_fps: f64) -> Result<CueTrack, SubtitleError> {
    let mut entries = Vec::new();
    let mut declared_fps = None;

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parse_err = |reason: &str| SubtitleError::Parse {
            line: line_no + 1,
            reason: reason.to_string(),
        };

        let (start, rest) = braced_number(line).ok_or_else(|| parse_err("expected {start}"))?;
        let (end, text) = braced_number(rest).ok_or_else(|| parse_err("expected {end}"))?;

        if entries.is_empty() && declared_fps.is_none() && start == 1 && end == 1 {
            if let Ok(fps) = text.trim().parse::<f64>() {
                if fps > 0.0 {
                    declared_fps = Some(fps);
                    continue;
                }
            }
        }

        entries.push((start, end, strip_tags(text).replace('|', "\\N")));
    }

    let fps = declared_fps.unwrap_or(default_fps);
    if !(fps > 0.0) {
        return Err(SubtitleError::MissingFrameRate);
    }

    let cues = entries
        .into_iter()
        .map(|(start, end, text)| {
            Cue::new(
                start as f64 * 1000.0 / fps,
                end as f64 * 1000.0 / fps,
                text,
            )
        })
        .collect();

    Ok(CueTrack::new(cues, Some(fps)))
}

/// Split `{123}rest` into `(123, "rest")`.
fn braced_number(s: &str) -> Option<(u64, &str)> {
    let rest = s.strip_prefix('{')?;
    let (number, rest) = rest.split_once('}')?;
    Some((number.trim().parse().ok()?, rest))
}
