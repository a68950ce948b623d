//! Container reader for sequential and indexed frame access.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::format::{Chunk, ChunkIndex, ContainerError, ContainerHeader};
use crate::raster::Frame;

/// Reader over a container's chunks.
///
/// Chunks are read front to back; once consumed, a chunk can only be read
/// again by re-opening the source, unless the source is seekable and
/// [`ContainerReader::build_index`] has been called.
///
/// Usage:
/// ```ignore
/// let mut reader = ContainerReader::open("clip.thba")?;
/// println!("{} frames at {} fps", reader.frame_count(), reader.fps());
///
/// for frame in reader.frames() {
///     match frame {
///         Ok(frame) => draw(&frame),
///         Err(e) if e.is_recoverable() => log::warn!("{e}"),
///         Err(e) => return Err(e),
///     }
/// }
/// ```
pub struct ContainerReader<R> {
    reader: R,
    header: ContainerHeader,
    /// Index of the next chunk in the stream.
    next_index: u32,
    /// Set after an I/O error leaves the stream misaligned.
    exhausted: bool,
    /// Bytes consumed since the start of the header.
    consumed: u64,
    chunk_index: Option<Vec<ChunkIndex>>,
}

impl ContainerReader<BufReader<File>> {
    /// Open a container file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ContainerError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> ContainerReader<R> {
    /// Read and validate the header, leaving the stream at the first chunk.
    pub fn new(mut reader: R) -> Result<Self, ContainerError> {
        let header = ContainerHeader::read_from(&mut reader)?;
        log::debug!(
            "container: {} frames, {}x{}, {} fps, {:?} compression",
            header.frame_count,
            header.width,
            header.height,
            header.fps,
            header.compression
        );

        Ok(Self {
            reader,
            header,
            next_index: 0,
            exhausted: false,
            consumed: ContainerHeader::SIZE as u64,
            chunk_index: None,
        })
    }

    /// Get container header.
    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Get total number of frames.
    pub fn frame_count(&self) -> u32 {
        self.header.frame_count
    }

    /// Get stored frame rate.
    pub fn fps(&self) -> u8 {
        self.header.fps
    }

    /// Get raster dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.header.width, self.header.height)
    }

    /// Index of the next chunk the stream will yield.
    pub fn position(&self) -> u32 {
        self.next_index
    }

    fn has_next(&self) -> bool {
        !self.exhausted && self.next_index < self.header.frame_count
    }

    fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf4 = [0u8; 4];
        self.reader.read_exact(&mut buf4)?;
        self.consumed += 4;
        Ok(u32::from_be_bytes(buf4))
    }

    /// Read the next length-prefixed payload without decompressing it.
    ///
    /// Oversized payloads are consumed and reported as corrupt so the stream
    /// stays aligned on the following chunk.
    pub fn next_chunk(&mut self) -> Option<Result<Chunk, ContainerError>> {
        if !self.has_next() {
            return None;
        }
        let index = self.next_index;

        let result = (|| -> io::Result<Result<Chunk, ContainerError>> {
            let len = self.read_u32()? as usize;
            let limit = self
                .header
                .compression
                .max_payload_len(self.header.frame_size());

            if len > limit {
                discard(&mut self.reader, len as u64)?;
                self.consumed += len as u64;
                return Ok(Err(ContainerError::CorruptChunk {
                    index,
                    reason: format!("payload length {} exceeds limit {}", len, limit),
                }));
            }

            let mut payload = vec![0u8; len];
            self.reader.read_exact(&mut payload)?;
            self.consumed += len as u64;
            Ok(Ok(Chunk { index, payload }))
        })();

        Some(match result {
            Ok(chunk) => {
                self.next_index += 1;
                chunk
            }
            Err(e) => {
                self.exhausted = true;
                Err(ContainerError::Io(e))
            }
        })
    }

    /// Skip the next chunk without reading its payload into memory.
    ///
    /// Returns `Ok(false)` once the stream is exhausted.
    pub fn skip_chunk(&mut self) -> Result<bool, ContainerError> {
        if !self.has_next() {
            return Ok(false);
        }

        let skipped = self
            .read_u32()
            .and_then(|len| discard(&mut self.reader, len as u64).map(|()| len));
        match skipped {
            Ok(len) => {
                self.consumed += len as u64;
                self.next_index += 1;
                Ok(true)
            }
            Err(e) => {
                self.exhausted = true;
                Err(ContainerError::Io(e))
            }
        }
    }

    /// Decode the next frame in the stream.
    pub fn next_frame(&mut self) -> Option<Result<Frame, ContainerError>> {
        let header = self.header;
        self.next_chunk()
            .map(|chunk| chunk.and_then(|c| c.decode(&header)))
    }

    /// Decode frame `index`, skipping any chunks before it without
    /// decompressing them.
    ///
    /// Returns `None` if `index` is past the end of the stream or behind the
    /// current position.
    pub fn advance_to(&mut self, index: u32) -> Option<Result<Frame, ContainerError>> {
        if index < self.next_index {
            return None;
        }
        while self.next_index < index {
            match self.skip_chunk() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
        self.next_frame()
    }

    /// Create an iterator over the remaining frames.
    pub fn frames(&mut self) -> FrameIterator<'_, R> {
        FrameIterator { reader: self }
    }
}

impl<R: Read + Seek> ContainerReader<R> {
    /// Scan all chunk length prefixes to allow random access.
    ///
    /// Payloads are skipped, not decompressed. The stream position is
    /// restored afterwards. Offsets are absolute, so a container that does
    /// not start at offset 0 of the stream is indexed correctly.
    pub fn build_index(&mut self) -> Result<&[ChunkIndex], ContainerError> {
        if self.chunk_index.is_none() {
            if self.exhausted {
                return Err(ContainerError::Io(io::Error::other(
                    "stream position lost after a read error",
                )));
            }
            let resume = self.reader.stream_position()?;
            let start = resume.checked_sub(self.consumed).ok_or_else(|| {
                ContainerError::Io(io::Error::other("stream position precedes the header"))
            })?;
            let scanned = self.scan_chunks(start);
            self.reader.seek(SeekFrom::Start(resume))?;
            self.chunk_index = Some(scanned?);
        }

        Ok(self.chunk_index.as_deref().unwrap_or_default())
    }

    fn scan_chunks(&mut self, start: u64) -> Result<Vec<ChunkIndex>, ContainerError> {
        let len = self.reader.seek(SeekFrom::End(0))?;
        self.reader
            .seek(SeekFrom::Start(start + ContainerHeader::SIZE as u64))?;

        let mut entries = Vec::new();
        for i in 0..self.header.frame_count {
            let size = self.read_u32()?;
            let offset = self.reader.stream_position()?;
            if offset + size as u64 > len {
                return Err(ContainerError::InvalidFormat(format!(
                    "chunk {} runs past end of file",
                    i
                )));
            }
            self.reader.seek(SeekFrom::Current(size as i64))?;
            entries.push(ChunkIndex { offset, size });
        }
        Ok(entries)
    }

    /// Read a specific frame by index.
    ///
    /// Builds the chunk index on first use. Does not move the sequential
    /// stream position.
    pub fn read_frame(&mut self, frame_index: u32) -> Result<Frame, ContainerError> {
        if frame_index >= self.header.frame_count {
            return Err(ContainerError::FrameOutOfRange {
                index: frame_index,
                frame_count: self.header.frame_count,
            });
        }

        let entry = self.build_index()?[frame_index as usize];
        let resume = self.reader.stream_position()?;

        self.reader.seek(SeekFrom::Start(entry.offset))?;
        let mut payload = vec![0u8; entry.size as usize];
        self.reader.read_exact(&mut payload)?;
        self.reader.seek(SeekFrom::Start(resume))?;

        Chunk {
            index: frame_index,
            payload,
        }
        .decode(&self.header)
    }
}

fn discard<R: Read>(reader: &mut R, len: u64) -> io::Result<()> {
    let copied = io::copy(&mut reader.by_ref().take(len), &mut io::sink())?;
    if copied < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "chunk payload truncated",
        ));
    }
    Ok(())
}

/// Iterator over container frames.
///
/// Corrupt chunks are yielded as errors and iteration continues; an I/O
/// error ends the iteration after it is yielded.
pub struct FrameIterator<'a, R> {
    reader: &'a mut ContainerReader<R>,
}

impl<R: Read> Iterator for FrameIterator<'_, R> {
    type Item = Result<Frame, ContainerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_frame()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.reader.exhausted {
            return (0, Some(0));
        }
        let remaining = (self.reader.header.frame_count - self.reader.next_index) as usize;
        (0, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{CompressionType, ContainerWriter, encode};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn gradient_frames(count: u8, width: u32, height: u32) -> Vec<Frame> {
        (0..count)
            .map(|i| {
                let data = (0..width * height)
                    .map(|p| (p as u8).wrapping_mul(3).wrapping_add(i))
                    .collect();
                Frame::from_raw(width, height, data).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_reader_sequential() {
        let frames = gradient_frames(5, 8, 6);
        let bytes = encode(&frames, 12, 8, 6, CompressionType::Lz4).unwrap();

        let mut reader = ContainerReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.frame_count(), 5);
        assert_eq!(reader.fps(), 12);
        assert_eq!(reader.dimensions(), (8, 6));

        let decoded: Vec<Frame> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(decoded, frames);
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn test_advance_to_skips_chunks() {
        let frames = gradient_frames(10, 4, 4);
        let bytes = encode(&frames, 10, 4, 4, CompressionType::Lz4).unwrap();
        let mut reader = ContainerReader::new(Cursor::new(bytes)).unwrap();

        assert_eq!(reader.advance_to(0).unwrap().unwrap(), frames[0]);
        assert_eq!(reader.advance_to(4).unwrap().unwrap(), frames[4]);
        assert_eq!(reader.position(), 5);
        // Already consumed; the stream is forward-only.
        assert!(reader.advance_to(2).is_none());
        assert_eq!(reader.advance_to(9).unwrap().unwrap(), frames[9]);
        assert!(reader.advance_to(10).is_none());
    }

    #[test]
    fn test_corrupt_chunk_does_not_stop_stream() {
        let frames = gradient_frames(3, 4, 4);
        let mut bytes = encode(&frames, 10, 4, 4, CompressionType::None).unwrap();

        // Shrink the middle chunk's length prefix and drop a payload byte.
        let second = ContainerHeader::SIZE + 4 + 16;
        bytes[second..second + 4].copy_from_slice(&15u32.to_be_bytes());
        bytes.remove(second + 4);

        let mut reader = ContainerReader::new(Cursor::new(bytes)).unwrap();
        let results: Vec<_> = reader.frames().collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &frames[0]);
        assert!(matches!(
            results[1],
            Err(ContainerError::CorruptChunk { index: 1, .. })
        ));
        assert_eq!(results[2].as_ref().unwrap(), &frames[2]);
    }

    #[test]
    fn test_truncated_stream_ends_iteration() {
        let frames = gradient_frames(3, 4, 4);
        let mut bytes = encode(&frames, 10, 4, 4, CompressionType::None).unwrap();
        bytes.truncate(bytes.len() - 5);

        let mut reader = ContainerReader::new(Cursor::new(bytes)).unwrap();
        let results: Vec<_> = reader.frames().collect();
        assert_eq!(results.len(), 3);
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(ContainerError::Io(_))));
        assert!(reader.next_frame().is_none());
    }

    #[test]
    fn test_wrong_magic_reads_nothing() {
        let frames = gradient_frames(2, 4, 4);
        let mut bytes = encode(&frames, 10, 4, 4, CompressionType::Lz4).unwrap();
        bytes[0] = b'x';

        let err = ContainerReader::new(Cursor::new(bytes)).err().unwrap();
        assert!(matches!(err, ContainerError::InvalidFormat(_)));
    }

    #[test]
    fn test_indexed_random_access() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("indexed.thba");

        let frames = gradient_frames(6, 5, 3);
        {
            let mut writer =
                ContainerWriter::create(&path, 15, 5, 3, CompressionType::Lz4).unwrap();
            for frame in &frames {
                writer.write_frame(frame).unwrap();
            }
            writer.finalize().unwrap();
        }

        let mut reader = ContainerReader::open(&path).unwrap();
        assert_eq!(reader.build_index().unwrap().len(), 6);
        assert_eq!(reader.read_frame(5).unwrap(), frames[5]);
        assert_eq!(reader.read_frame(1).unwrap(), frames[1]);
        assert!(matches!(
            reader.read_frame(6),
            Err(ContainerError::FrameOutOfRange {
                index: 6,
                frame_count: 6
            })
        ));

        // Random access leaves the sequential cursor untouched.
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.next_frame().unwrap().unwrap(), frames[0]);
    }

    #[test]
    fn test_index_container_at_nonzero_offset() {
        let frames = gradient_frames(5, 4, 3);
        let mut sink = Cursor::new(b"prefix!".to_vec());
        sink.seek(SeekFrom::End(0)).unwrap();

        let mut writer = ContainerWriter::new(sink, 10, 4, 3, CompressionType::Lz4).unwrap();
        for frame in &frames {
            writer.write_frame(frame).unwrap();
        }
        let (sink, _) = writer.finalize_into_inner().unwrap();

        let mut source = Cursor::new(sink.into_inner());
        source.seek(SeekFrom::Start(7)).unwrap();
        let mut reader = ContainerReader::new(source).unwrap();
        assert_eq!(reader.next_frame().unwrap().unwrap(), frames[0]);

        let index = reader.build_index().unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index[0].offset, 7 + ContainerHeader::SIZE as u64 + 4);
        assert_eq!(reader.read_frame(3).unwrap(), frames[3]);
        assert_eq!(reader.read_frame(0).unwrap(), frames[0]);
        assert_eq!(reader.next_frame().unwrap().unwrap(), frames[1]);
    }

    #[test]
    fn test_oversized_header_is_invalid() {
        let mut bytes = b"thba".to_vec();
        bytes.extend_from_slice(&[10, 1]);
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 8]);

        let err = ContainerReader::new(Cursor::new(bytes)).err().unwrap();
        assert!(matches!(err, ContainerError::InvalidFormat(_)));
    }
}
