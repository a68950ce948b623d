//! Raster module - Grayscale frames and glyph rasterization.

mod frame;
mod rasterizer;

pub use frame::*;
pub use rasterizer::*;
