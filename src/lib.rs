//! thba - grayscale video in a compact frame container, played back as text.
//!
//! Videos are encoded into a chunked container of 8-bit grayscale frames,
//! each optionally LZ4-compressed, and played in a terminal by resampling
//! every frame onto a glyph grid in time with a wall clock.
//!
//! # Architecture
//!
//! - `container`: Container header, chunk encoding, streaming reader and writer
//! - `raster`: Grayscale frames and the frame-to-glyph rasterizer
//! - `subtitle`: Subtitle parsing and the incremental cue window
//! - `playback`: Frame clock, overlays and the render loop
//! - `schema`: Configuration types
//! - `audio`, `video`, `terminal`: External players, decoders and the screen
//!
//! # Example
//!
//! ```rust,no_run
//! use thba::{
//!     container::{CompressionType, ContainerReader, encode},
//!     raster::{Frame, Rasterizer},
//!     schema::RasterConfig,
//! };
//!
//! // Thirty mid-gray 4x4 frames at 10 fps
//! let frames = vec![Frame::filled(4, 4, 128); 30];
//! let bytes = encode(&frames, 10, 4, 4, CompressionType::Lz4)?;
//!
//! let mut reader = ContainerReader::new(std::io::Cursor::new(bytes))?;
//! let rasterizer = Rasterizer::new(&RasterConfig::default())?;
//! for frame in reader.frames() {
//!     let grid = rasterizer.resample(&frame?, 8, 4);
//!     for line in grid.lines() {
//!         println!("{}", line);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audio;
pub mod container;
pub mod error;
pub mod playback;
pub mod raster;
pub mod schema;
pub mod subtitle;
pub mod terminal;
pub mod video;

// Re-export commonly used types
pub use container::{CompressionType, ContainerReader, ContainerWriter};
pub use error::Error;
pub use playback::{PlaybackClock, Session};
pub use raster::{Frame, Rasterizer};
pub use schema::{EncodeConfig, PlaybackConfig, RasterConfig};
