//! Incremental tracking of on-screen cues.

use super::{Cue, CueTrack};

/// Forward-only sliding window over a time-sorted cue track.
///
/// Each [`update`](SubtitleWindow::update) only looks at cues that start
/// between the previous call and now, plus the cues already active, so the
/// cost per frame does not grow with the length of the track.
///
/// Times passed to `update` are expected to be non-decreasing. Going back in
/// time is tolerated but cues already passed will not reactivate.
#[derive(Debug, Clone)]
pub struct SubtitleWindow {
    track: CueTrack,
    /// Index of the next cue not yet considered.
    cursor: usize,
    /// Indices of active cues, in activation order.
    active: Vec<usize>,
    changed: bool,
    lines_stale: bool,
    cached_lines: Vec<Vec<String>>,
}

impl SubtitleWindow {
    pub fn new(track: CueTrack) -> Self {
        Self {
            track,
            cursor: 0,
            active: Vec::new(),
            changed: false,
            lines_stale: false,
            cached_lines: Vec::new(),
        }
    }

    /// Advance to `time_ms`. Returns whether the active set changed.
    pub fn update(&mut self, time_ms: f64) -> bool {
        let cues = self.track.cues();
        let prev_cursor = self.cursor;
        let prev_len = self.active.len();

        while self.cursor < cues.len() && cues[self.cursor].start_ms <= time_ms {
            self.active.push(self.cursor);
            self.cursor += 1;
        }
        self.active.retain(|&i| cues[i].end_ms > time_ms);

        self.changed = self.cursor != prev_cursor || self.active.len() != prev_len;
        self.lines_stale |= self.changed;
        self.changed
    }

    /// Whether the last update changed the active set.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Cues currently on screen, in activation order.
    pub fn active(&self) -> impl Iterator<Item = &Cue> + '_ {
        self.active.iter().map(|&i| &self.track.cues()[i])
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Display lines of each active cue.
    ///
    /// Recomputed only after the active set has changed.
    pub fn active_lines(&mut self) -> &[Vec<String>] {
        if self.lines_stale {
            self.cached_lines = self.active().map(Cue::lines).collect();
            self.lines_stale = false;
        }
        &self.cached_lines
    }

    /// Frame rate the cue times are aligned to, if any.
    pub fn fps(&self) -> Option<f64> {
        self.track.fps()
    }

    /// Re-time all cues for a new playback rate.
    ///
    /// No-op if the track carries no frame rate.
    pub fn rescale(&mut self, new_fps: f64) {
        self.track.transform_framerate(new_fps);
    }

    /// Align cues to the playback rate `fps`. See [`CueTrack::align_to`].
    pub fn align_to(&mut self, fps: f64) {
        self.track.align_to(fps);
    }

    pub fn track(&self) -> &CueTrack {
        &self.track
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn window() -> SubtitleWindow {
        SubtitleWindow::new(CueTrack::new(
            vec![Cue::new(0.0, 1000.0, "a"), Cue::new(500.0, 1500.0, "b")],
            None,
        ))
    }

    fn active_texts(w: &SubtitleWindow) -> Vec<String> {
        w.active().map(|c| c.text.clone()).collect()
    }

    #[test]
    fn test_window_sequence() {
        let mut w = window();

        assert!(w.update(200.0));
        assert_eq!(active_texts(&w), vec!["a"]);

        assert!(w.update(700.0));
        assert_eq!(active_texts(&w), vec!["a", "b"]);

        assert!(w.update(1200.0));
        assert_eq!(active_texts(&w), vec!["b"]);

        assert!(w.update(1600.0));
        assert!(active_texts(&w).is_empty());
    }

    #[test]
    fn test_unchanged_update() {
        let mut w = window();
        assert!(w.update(100.0));
        assert!(!w.update(150.0));
        assert!(!w.changed());
    }

    #[test]
    fn test_backwards_update_does_not_crash() {
        let mut w = window();
        w.update(1200.0);
        w.update(100.0);
        assert_eq!(active_texts(&w), vec!["b"]);
        w.update(2000.0);
        assert_eq!(w.active_len(), 0);
    }

    #[test]
    fn test_lines_cached_until_change() {
        let mut w = SubtitleWindow::new(CueTrack::new(
            vec![Cue::new(0.0, 1000.0, "top\\Nbottom")],
            None,
        ));
        w.update(10.0);
        assert_eq!(w.active_lines(), &[vec!["top".to_string(), "bottom".to_string()]]);
        w.update(20.0);
        assert_eq!(w.active_lines().len(), 1);
        w.update(1000.0);
        assert!(w.active_lines().is_empty());
    }

    #[test]
    fn test_rescale_keeps_window_state() {
        let mut w = SubtitleWindow::new(CueTrack::new(
            vec![Cue::new(0.0, 1000.0, "a"), Cue::new(2000.0, 3000.0, "b")],
            Some(10.0),
        ));
        w.update(500.0);
        w.rescale(20.0);
        // "b" now spans 1000..1500.
        assert!(w.update(1200.0));
        assert_eq!(active_texts(&w), vec!["b"]);
        assert_eq!(w.fps(), Some(20.0));
    }

    #[test]
    fn test_empty_track() {
        let mut w = SubtitleWindow::new(CueTrack::default());
        assert!(!w.update(1000.0));
        assert!(w.active_lines().is_empty());
    }

    proptest! {
        #[test]
        fn test_active_set_matches_intervals(
            spans in prop::collection::vec((0u32..5_000, 1u32..2_000), 0..30),
            mut times in prop::collection::vec(0u32..8_000, 1..40),
        ) {
            let cues: Vec<Cue> = spans
                .iter()
                .enumerate()
                .map(|(i, &(start, len))| {
                    Cue::new(start as f64, (start + len) as f64, i.to_string())
                })
                .collect();
            let mut w = SubtitleWindow::new(CueTrack::new(cues, None));
            times.sort_unstable();

            for &t in &times {
                let t = t as f64;
                w.update(t);
                let active: Vec<&Cue> = w.active().collect();
                prop_assert!(active.iter().all(|c| c.start_ms <= t && t < c.end_ms));
                prop_assert!(active.windows(2).all(|p| p[0].start_ms <= p[1].start_ms));

                let expected = w
                    .track()
                    .cues()
                    .iter()
                    .filter(|c| c.start_ms <= t && t < c.end_ms)
                    .count();
                prop_assert_eq!(w.active_len(), expected);
            }
        }
    }
}
