//! Subtitle cues, parsing and the activation window.

mod parse;
mod window;

pub use parse::*;
pub use window::*;

/// A timed caption entry. Times are milliseconds of playback time.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start_ms: f64,
    pub end_ms: f64,
    /// Caption text; `\N` marks a line break.
    pub text: String,
}

impl Cue {
    pub fn new(start_ms: f64, end_ms: f64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Split the text into display lines.
    pub fn lines(&self) -> Vec<String> {
        self.text
            .replace("\\N", "\n")
            .replace("\\n", "\n")
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// A time-sorted cue list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueTrack {
    cues: Vec<Cue>,
    /// Frame rate the cue times are aligned to, for frame-based formats.
    fps: Option<f64>,
}

impl CueTrack {
    /// Build a track, sorting cues by start time and dropping empty intervals.
    pub fn new(mut cues: Vec<Cue>, fps: Option<f64>) -> Self {
        let before = cues.len();
        cues.retain(|c| c.start_ms < c.end_ms);
        if cues.len() != before {
            log::debug!("dropped {} cues with empty intervals", before - cues.len());
        }
        cues.sort_by(|a, b| a.start_ms.total_cmp(&b.start_ms));
        Self { cues, fps }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Re-time cues authored against the recorded frame rate for `new_fps`.
    ///
    /// No-op when no frame rate has been recorded or `new_fps` is not
    /// positive. Order is preserved.
    pub fn transform_framerate(&mut self, new_fps: f64) {
        let Some(old_fps) = self.fps else {
            return;
        };
        if !(new_fps > 0.0) || old_fps == new_fps {
            return;
        }

        let ratio = old_fps / new_fps;
        for cue in &mut self.cues {
            cue.start_ms *= ratio;
            cue.end_ms *= ratio;
        }
        self.fps = Some(new_fps);
    }

    /// Align the track to `fps`.
    ///
    /// A track without a recorded frame rate (SubRip timings are absolute)
    /// adopts `fps` as is, so later rate changes re-time it like any
    /// frame-based track. Otherwise this is [`transform_framerate`].
    ///
    /// [`transform_framerate`]: CueTrack::transform_framerate
    pub fn align_to(&mut self, fps: f64) {
        if self.fps.is_none() {
            if fps > 0.0 {
                self.fps = Some(fps);
            }
        } else {
            self.transform_framerate(fps);
        }
    }
}

/// Subtitle loading errors.
#[derive(Debug, thiserror::Error)]
pub enum SubtitleError {
    #[error("Cannot read subtitles: {0}")]
    Io(#[from] std::io::Error),
    #[error("Line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("Frame-based subtitles need a positive frame rate")]
    MissingFrameRate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_lines() {
        let cue = Cue::new(0.0, 1.0, "first\\Nsecond\nthird");
        assert_eq!(cue.lines(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_track_sorts_and_filters() {
        let track = CueTrack::new(
            vec![
                Cue::new(500.0, 900.0, "b"),
                Cue::new(100.0, 100.0, "empty"),
                Cue::new(0.0, 400.0, "a"),
            ],
            None,
        );
        let texts: Vec<_> = track.cues().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_transform_framerate() {
        let mut track = CueTrack::new(vec![Cue::new(1000.0, 2000.0, "x")], Some(25.0));
        track.transform_framerate(50.0);
        assert_eq!(track.cues()[0].start_ms, 500.0);
        assert_eq!(track.cues()[0].end_ms, 1000.0);
        assert_eq!(track.fps(), Some(50.0));

        let mut untimed = CueTrack::new(vec![Cue::new(1000.0, 2000.0, "x")], None);
        untimed.transform_framerate(50.0);
        assert_eq!(untimed.cues()[0].start_ms, 1000.0);
        assert_eq!(untimed.fps(), None);
    }

    #[test]
    fn test_align_to_records_missing_rate() {
        let mut track = CueTrack::new(vec![Cue::new(12_000.0, 13_000.0, "x")], None);
        track.align_to(0.0);
        assert_eq!(track.fps(), None);

        track.align_to(10.0);
        assert_eq!(track.fps(), Some(10.0));
        assert_eq!(track.cues()[0].start_ms, 12_000.0);

        track.align_to(20.0);
        assert_eq!(track.fps(), Some(20.0));
        assert_eq!(track.cues()[0].start_ms, 6_000.0);
        assert_eq!(track.cues()[0].end_ms, 6_500.0);
    }
}
