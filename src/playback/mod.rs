//! Terminal playback of frame containers.
//!
//! A [`Session`] drives a [`FrameSource`] onto a [`Surface`] at the pace of a
//! [`PlaybackClock`]. Rendering is single-threaded; the only suspension point
//! is the clock's per-iteration pacing sleep.

mod banner;
mod clock;
mod overlay;
mod session;

pub use banner::*;
pub use clock::*;
pub use overlay::*;
pub use session::*;

use std::io::{self, Read};

use crate::container::{ContainerError, ContainerReader};
use crate::raster::{Frame, GlyphGrid};
use crate::schema::ConfigError;

/// A key press, reduced to what the player reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Esc,
    /// Ctrl-C, delivered as a key while the terminal is in raw mode.
    Interrupt,
    Other,
}

impl Key {
    /// Whether this key ends playback.
    pub fn is_quit(self) -> bool {
        matches!(self, Key::Char('q') | Key::Char('Q') | Key::Esc | Key::Interrupt)
    }
}

/// Something the player can draw on.
pub trait Surface {
    /// Size in character cells as `(cols, rows)`.
    fn size(&self) -> io::Result<(u16, u16)>;
    fn clear(&mut self) -> io::Result<()>;
    /// Draw `grid` from the top-left corner.
    fn draw_grid(&mut self, grid: &GlyphGrid) -> io::Result<()>;
    /// Draw `text` starting at `(col, row)`. Text past the right edge is
    /// clipped.
    fn draw_text(&mut self, col: u16, row: u16, text: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Return a pending key press without blocking.
    fn poll_key(&mut self) -> io::Result<Option<Key>>;
    /// Block until a key is pressed.
    fn wait_key(&mut self) -> io::Result<Key>;
}

impl<S: Surface + ?Sized> Surface for &mut S {
    fn size(&self) -> io::Result<(u16, u16)> {
        (**self).size()
    }

    fn clear(&mut self) -> io::Result<()> {
        (**self).clear()
    }

    fn draw_grid(&mut self, grid: &GlyphGrid) -> io::Result<()> {
        (**self).draw_grid(grid)
    }

    fn draw_text(&mut self, col: u16, row: u16, text: &str) -> io::Result<()> {
        (**self).draw_text(col, row, text)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn poll_key(&mut self) -> io::Result<Option<Key>> {
        (**self).poll_key()
    }

    fn wait_key(&mut self) -> io::Result<Key> {
        (**self).wait_key()
    }
}

/// Sequential frame supplier for a session.
pub trait FrameSource {
    fn frame_count(&self) -> u64;
    fn fps(&self) -> f64;
    /// Decode frame `index`, dropping any frames before it.
    ///
    /// `None` once the stream has ended or `index` has already been passed.
    fn advance_to(&mut self, index: u64) -> Option<Result<Frame, ContainerError>>;
}

impl<R: Read> FrameSource for ContainerReader<R> {
    fn frame_count(&self) -> u64 {
        ContainerReader::frame_count(self) as u64
    }

    fn fps(&self) -> f64 {
        ContainerReader::fps(self) as f64
    }

    fn advance_to(&mut self, index: u64) -> Option<Result<Frame, ContainerError>> {
        let index = u32::try_from(index).ok()?;
        ContainerReader::advance_to(self, index)
    }
}

/// Playback errors.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("Terminal error: {0}")]
    Terminal(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
