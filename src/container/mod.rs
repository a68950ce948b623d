//! Frame container encoding and decoding.
//!
//! A container stores a fixed-size grayscale frame sequence as
//! independently decodable chunks, so playback can decode one frame at a
//! time and skip frames it has fallen behind on without decompressing them.
//!
//! # File Format
//!
//! ```text
//! Header (18 bytes, integers big-endian):
//!   Magic: "thba" (4 bytes)
//!   Frame rate: u8 (1-255)
//!   Compression: u8 (0 = none, 1 = LZ4)
//!   Frame count: u32
//!   Width: u32
//!   Height: u32
//!
//! Chunks (frame count times):
//!   Length: u32
//!   Payload: width * height grayscale bytes, LZ4-compressed when enabled
//! ```
//!
//! Files from the earlier revision, which lack the compression byte, are
//! rejected as invalid.

mod format;
mod reader;
mod writer;

pub use format::{
    CONTAINER_MAGIC, Chunk, ChunkIndex, CompressionType, ContainerError, ContainerHeader,
};
pub use reader::{ContainerReader, FrameIterator};
pub use writer::{ContainerStats, ContainerWriter, encode};
