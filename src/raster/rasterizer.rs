//! Luminance-to-glyph rasterization.
//!
//! A source frame of any size is resampled onto a character grid of any size
//! with bilinear interpolation, then each cell's luminance is gamma-corrected
//! and quantized to a glyph from the configured ramp.

use rayon::prelude::*;

use crate::schema::{ConfigError, RasterConfig};

use super::Frame;

/// Glyph emitted for cells that fall outside the source raster.
pub const BLANK_GLYPH: char = ' ';

/// A rows x cols grid of glyphs, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphGrid {
    cols: usize,
    rows: usize,
    cells: Vec<char>,
}

impl GlyphGrid {
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Glyph at column `x`, row `y`.
    pub fn get(&self, x: usize, y: usize) -> Option<char> {
        if x >= self.cols || y >= self.rows {
            return None;
        }
        Some(self.cells[y * self.cols + x])
    }

    /// One row of glyphs.
    pub fn row(&self, y: usize) -> &[char] {
        &self.cells[y * self.cols..(y + 1) * self.cols]
    }

    /// Iterate rows as strings, ready to print.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.rows).map(move |y| self.row(y).iter().collect())
    }

    pub fn cells(&self) -> &[char] {
        &self.cells
    }
}

/// Resamples frames onto a character grid.
///
/// The mapping is a pure function of the frame, target size and
/// configuration; identical inputs always yield identical grids.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    ramp: Vec<char>,
    inv_gamma: f32,
    invert: bool,
}

impl Rasterizer {
    /// Build a rasterizer from a validated configuration.
    pub fn new(config: &RasterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ramp: config.ramp.chars().collect(),
            inv_gamma: 1.0 / config.gamma,
            invert: config.invert,
        })
    }

    /// Glyphs ordered darkest to lightest.
    pub fn ramp(&self) -> &[char] {
        &self.ramp
    }

    /// Quantize an 8-bit intensity (as a float in `[0, 255]`) to a ramp index.
    #[inline]
    pub fn glyph_index(&self, color: f32) -> usize {
        let mut v = (color / 255.0).clamp(0.0, 1.0);
        if self.invert {
            v = 1.0 - v;
        }
        v = v.powf(self.inv_gamma);

        let last = self.ramp.len() - 1;
        ((v * last as f32).round() as usize).min(last)
    }

    /// Resample `frame` onto a `cols` x `rows` glyph grid.
    pub fn resample(&self, frame: &Frame, cols: usize, rows: usize) -> GlyphGrid {
        let mut cells = vec![BLANK_GLYPH; cols * rows];
        if cols == 0 || rows == 0 || frame.is_empty() {
            return GlyphGrid { cols, rows, cells };
        }

        let w_factor = frame.width() as f32 / cols as f32;
        let h_factor = frame.height() as f32 / rows as f32;

        cells
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cell) in row.iter_mut().enumerate() {
                    if let Some(color) = sample_bilinear(frame, x, y, w_factor, h_factor) {
                        *cell = self.ramp[self.glyph_index(color)];
                    }
                }
            });

        GlyphGrid { cols, rows, cells }
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Bilinear sample of the source pixel that target cell `(x, y)` maps onto.
///
/// Returns `None` when the cell maps entirely outside the source.
fn sample_bilinear(frame: &Frame, x: usize, y: usize, w_factor: f32, h_factor: f32) -> Option<f32> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;

    let mapped_x = x as f32 * w_factor;
    let mapped_y = y as f32 * h_factor;

    let x0 = mapped_x.floor() as usize;
    let y0 = mapped_y.floor() as usize;
    if x0 >= width || y0 >= height {
        return None;
    }
    let x1 = (mapped_x.ceil() as usize).min(width - 1);
    let y1 = (mapped_y.ceil() as usize).min(height - 1);

    let dx = mapped_x - x0 as f32;
    let dy = mapped_y - y0 as f32;

    let c11 = frame.get(x0, y0) as f32;
    let c21 = frame.get(x1, y0) as f32;
    let c12 = frame.get(x0, y1) as f32;
    let c22 = frame.get(x1, y1) as f32;

    let c1 = lerp(c11, c21, dx);
    let c2 = lerp(c12, c22, dx);
    Some(lerp(c1, c2, dy))
}
