//! Title screen rendering.

use super::Placement;

/// Prompt shown before playback starts.
pub const START_PROMPT: &str = "Press any key to start...";

/// Renders a title as one or more lines of text.
pub trait Banner {
    fn render(&self, title: &str) -> Vec<String>;
}

/// The title as a single line.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainBanner;

impl Banner for PlainBanner {
    fn render(&self, title: &str) -> Vec<String> {
        vec![title.to_string()]
    }
}

/// The title inside an ASCII frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxBanner;

impl Banner for BoxBanner {
    fn render(&self, title: &str) -> Vec<String> {
        let width = title.chars().count() + 2;
        let edge = format!("+{}+", "-".repeat(width));
        vec![edge.clone(), format!("| {} |", title), edge]
    }
}

/// Layout of the start screen: the rendered title (if any), a blank row,
/// then the start prompt. Lines that start below the screen are dropped.
pub fn title_screen(banner: &dyn Banner, title: Option<&str>, rows: usize) -> Vec<Placement> {
    let mut lines = title.map(|t| banner.render(t)).unwrap_or_default();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(START_PROMPT.to_string());

    lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| Placement {
            col: 1,
            row: i + 1,
            text,
        })
        .filter(|p| p.row < rows && !p.text.is_empty())
        .collect()
}
