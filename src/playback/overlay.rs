//! Text overlays drawn on top of the glyph grid.
//!
//! Layout is computed as plain [`Placement`]s so it can be checked without a
//! terminal.

/// A run of text anchored at a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub col: usize,
    pub row: usize,
    pub text: String,
}

impl Placement {
    fn new(col: usize, row: usize, text: impl Into<String>) -> Self {
        Self {
            col,
            row,
            text: text.into(),
        }
    }
}

/// Playback progress shown in the status overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusInfo {
    pub frame: u64,
    pub total_frames: u64,
    pub elapsed_secs: f64,
    pub duration_secs: f64,
    pub measured_fps: Option<u32>,
    /// Seconds the last frame ran over its interval.
    pub frame_delta_secs: f64,
}

/// Format seconds as `mm:ss`, truncating fractions.
pub fn format_clock(secs: f64) -> String {
    let whole = secs.max(0.0) as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

/// Status lines in the top-left corner.
///
/// The playback clock is always shown. The frame counter is added in debug
/// and frame-advance modes; measured fps and the frame delta in debug mode.
pub fn status_placements(info: &StatusInfo, debug: bool, show_frame: bool) -> Vec<Placement> {
    let mut out = Vec::new();
    let mut row = 1;

    if debug || show_frame {
        out.push(Placement::new(
            2,
            row,
            format!(" Frame {} / {} ", info.frame, info.total_frames),
        ));
        row += 1;
    }

    out.push(Placement::new(
        3,
        row,
        format!(
            " {} / {} ",
            format_clock(info.elapsed_secs),
            format_clock(info.duration_secs)
        ),
    ));
    row += 2;

    if debug {
        if let Some(fps) = info.measured_fps.filter(|&f| f > 0) {
            out.push(Placement::new(4, row, format!(" FPS: {} ", fps)));
            row += 1;
        }
        let sign = if info.frame_delta_secs > 0.0 { '+' } else { '-' };
        out.push(Placement::new(
            4,
            row,
            format!(
                " Frame delta: {}{:.2}ms ",
                sign,
                info.frame_delta_secs.abs() * 1000.0
            ),
        ));
    }

    out
}

/// Subtitle lines for the active cues on a `cols` x `rows` screen.
///
/// The first cue's first line sits at row `5/6 * rows`; each later cue is
/// stacked above the previous one with a blank row between them. Lines are
/// centred and padded with a space on each side. Non-ASCII characters are
/// dropped and lines that would reach the last column end in `...`.
pub fn subtitle_placements(cues: &[Vec<String>], cols: usize, rows: usize) -> Vec<Placement> {
    let mut out = Vec::new();
    let center = cols / 2;
    let base = (rows * 5 / 6) as isize;
    let mut offset: isize = 0;

    for (i, lines) in cues.iter().enumerate() {
        let top = base + offset;

        for (k, line) in lines.iter().enumerate() {
            let row = top + k as isize;
            if row < 0 || row >= rows as isize {
                break;
            }

            let visible: String = line.chars().filter(char::is_ascii).collect();
            let col = center.saturating_sub(visible.len() / 2);
            let padded = format!(" {} ", visible);

            if col + padded.len() <= cols.saturating_sub(1) {
                out.push(Placement::new(col, row as usize, padded));
            } else if col + 3 <= cols.saturating_sub(1) {
                let keep = cols - 4 - col;
                out.push(Placement::new(
                    col,
                    row as usize,
                    format!("{}...", &padded[..keep]),
                ));
            }
        }

        offset -= 1;
        if let Some(next) = cues.get(i + 1) {
            offset -= next.len() as isize;
        }
    }

    out
}
