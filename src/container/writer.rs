//! Container writer for streaming frames to disk.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use super::format::{CompressionType, ContainerError, ContainerHeader};
use crate::raster::Frame;

/// Container writer that appends frames to any seekable sink.
///
/// The header is written up front with a zero frame count and rewritten by
/// [`ContainerWriter::finalize`].
///
/// Usage:
/// ```ignore
/// let mut writer = ContainerWriter::create("clip.thba", 10, 80, 60, CompressionType::Lz4)?;
/// while let Some(frame) = video.next_frame() {
///     writer.write_frame(&frame)?;
/// }
/// let stats = writer.finalize()?;
/// ```
pub struct ContainerWriter<W: Write + Seek> {
    writer: W,
    header: ContainerHeader,
    /// Stream position of the header, for the final rewrite.
    start: u64,
    frames_written: u32,
    payload_bytes: u64,
}

impl ContainerWriter<BufWriter<File>> {
    /// Create a container file, truncating any existing file.
    pub fn create<P: AsRef<Path>>(
        path: P,
        fps: u8,
        width: u32,
        height: u32,
        compression: CompressionType,
    ) -> Result<Self, ContainerError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), fps, width, height, compression)
    }
}

impl<W: Write + Seek> ContainerWriter<W> {
    /// Start a container on `writer` at its current position.
    pub fn new(
        mut writer: W,
        fps: u8,
        width: u32,
        height: u32,
        compression: CompressionType,
    ) -> Result<Self, ContainerError> {
        if fps == 0 {
            return Err(ContainerError::Encode {
                index: 0,
                reason: "frame rate must be at least 1".to_string(),
            });
        }
        if width == 0 || height == 0 {
            return Err(ContainerError::Encode {
                index: 0,
                reason: format!("invalid dimensions {}x{}", width, height),
            });
        }
        if !compression.fits_chunk(width, height) {
            return Err(ContainerError::Encode {
                index: 0,
                reason: format!("{}x{} frames exceed the chunk size limit", width, height),
            });
        }

        let header = ContainerHeader {
            fps,
            compression,
            frame_count: 0, // Will be updated on finalize
            width,
            height,
        };

        let start = writer.stream_position()?;
        header.write_to(&mut writer)?;

        Ok(Self {
            writer,
            header,
            start,
            frames_written: 0,
            payload_bytes: 0,
        })
    }

    /// Append one frame.
    ///
    /// Fails with [`ContainerError::Encode`] if the frame's dimensions differ
    /// from the container's.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), ContainerError> {
        let index = self.frames_written;
        if frame.width() != self.header.width || frame.height() != self.header.height {
            return Err(ContainerError::Encode {
                index,
                reason: format!(
                    "frame is {}x{}, container is {}x{}",
                    frame.width(),
                    frame.height(),
                    self.header.width,
                    self.header.height
                ),
            });
        }
        if index == u32::MAX {
            return Err(ContainerError::Encode {
                index,
                reason: "frame count exceeds u32 range".to_string(),
            });
        }

        let payload = self.header.compression.compress(frame.as_bytes());
        let len = u32::try_from(payload.len()).map_err(|_| ContainerError::Encode {
            index,
            reason: format!("chunk of {} bytes exceeds u32 range", payload.len()),
        })?;

        self.writer.write_all(&len.to_be_bytes())?;
        self.writer.write_all(&payload)?;

        self.frames_written += 1;
        self.payload_bytes += payload.len() as u64;
        Ok(())
    }

    /// Get number of frames written so far.
    pub fn frames_written(&self) -> u32 {
        self.frames_written
    }

    /// Finalize the container.
    ///
    /// Rewrites the header with the final frame count and flushes.
    pub fn finalize(self) -> Result<ContainerStats, ContainerError> {
        self.finalize_into_inner().map(|(_, stats)| stats)
    }

    /// Finalize and hand back the underlying sink.
    pub fn finalize_into_inner(mut self) -> Result<(W, ContainerStats), ContainerError> {
        let end = self.writer.stream_position()?;

        self.header.frame_count = self.frames_written;
        self.writer.seek(SeekFrom::Start(self.start))?;
        self.header.write_to(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        let stats = ContainerStats {
            frame_count: self.frames_written,
            total_bytes: end - self.start,
            average_chunk_size: if self.frames_written > 0 {
                self.payload_bytes / self.frames_written as u64
            } else {
                0
            },
            compression: self.header.compression,
        };
        log::info!("container finalized: {}", stats);

        Ok((self.writer, stats))
    }
}

/// Encode a frame sequence into an in-memory container.
pub fn encode<'a, I>(
    frames: I,
    fps: u8,
    width: u32,
    height: u32,
    compression: CompressionType,
) -> Result<Vec<u8>, ContainerError>
where
    I: IntoIterator<Item = &'a Frame>,
{
    let mut writer = ContainerWriter::new(Cursor::new(Vec::new()), fps, width, height, compression)?;
    for frame in frames {
        writer.write_frame(frame)?;
    }
    let (cursor, _) = writer.finalize_into_inner()?;
    Ok(cursor.into_inner())
}

/// Statistics from an encoding session.
#[derive(Debug, Clone)]
pub struct ContainerStats {
    /// Total frames written.
    pub frame_count: u32,
    /// Total container size in bytes.
    pub total_bytes: u64,
    /// Average payload size per chunk.
    pub average_chunk_size: u64,
    /// Compression used.
    pub compression: CompressionType,
}

impl std::fmt::Display for ContainerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} bytes total, {} bytes/chunk avg ({:?} compression)",
            self.frame_count, self.total_bytes, self.average_chunk_size, self.compression
        )
    }
}
