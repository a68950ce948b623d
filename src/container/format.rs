//! Binary format definitions for `.thba` containers.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::raster::Frame;

/// Magic bytes identifying a container.
pub const CONTAINER_MAGIC: &[u8; 4] = b"thba";

/// Compression applied to every chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionType {
    /// Raw grayscale bytes.
    None = 0,
    /// LZ4 block compression with a prepended little-endian size.
    #[default]
    Lz4 = 1,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Lz4),
            _ => None,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != CompressionType::None
    }

    /// Upper bound on the payload size for a raw chunk of `raw_len` bytes.
    ///
    /// Saturates at `usize::MAX`.
    pub fn max_payload_len(self, raw_len: usize) -> usize {
        match self {
            CompressionType::None => raw_len,
            // LZ4 worst case plus the 4-byte size prefix.
            CompressionType::Lz4 => raw_len.saturating_add(raw_len / 255).saturating_add(16 + 4),
        }
    }

    /// Whether a `width` x `height` frame always fits a u32 chunk length.
    pub fn fits_chunk(self, width: u32, height: u32) -> bool {
        usize::try_from(width as u64 * height as u64)
            .is_ok_and(|raw_len| self.max_payload_len(raw_len) <= u32::MAX as usize)
    }

    /// Compress one raw chunk.
    pub fn compress(self, raw: &[u8]) -> Vec<u8> {
        match self {
            CompressionType::None => raw.to_vec(),
            CompressionType::Lz4 => lz4_flex::compress_prepend_size(raw),
        }
    }

    /// Decompress one payload, which must expand to exactly `expected_len` bytes.
    pub fn decompress(self, payload: &[u8], expected_len: usize) -> Result<Vec<u8>, String> {
        match self {
            CompressionType::None => Ok(payload.to_vec()),
            CompressionType::Lz4 => {
                let (prefix, body) = payload
                    .split_first_chunk::<4>()
                    .ok_or_else(|| "payload shorter than its size prefix".to_string())?;
                let declared = u32::from_le_bytes(*prefix) as usize;
                if declared != expected_len {
                    return Err(format!(
                        "declares {} decompressed bytes, expected {}",
                        declared, expected_len
                    ));
                }
                lz4_flex::decompress(body, expected_len).map_err(|e| e.to_string())
            }
        }
    }
}

/// Container header.
///
/// ```text
/// offset 0  : magic "thba"      (4 bytes)
/// offset 4  : fps               (u8)
/// offset 5  : compression flag  (u8, 0 or 1)
/// offset 6  : frame count       (u32 BE)
/// offset 10 : width             (u32 BE)
/// offset 14 : height            (u32 BE)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Playback rate baked into the file.
    pub fps: u8,
    /// Chunk compression.
    pub compression: CompressionType,
    /// Number of chunks that follow the header.
    pub frame_count: u32,
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in pixels.
    pub height: u32,
}

impl ContainerHeader {
    /// Size of header in bytes.
    pub const SIZE: usize = 18;

    /// Size of one decompressed frame in bytes.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Playback length at the stored frame rate.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.fps as f64
    }

    /// Write header to output.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(CONTAINER_MAGIC)?;
        w.write_all(&[self.fps, self.compression as u8])?;
        w.write_all(&self.frame_count.to_be_bytes())?;
        w.write_all(&self.width.to_be_bytes())?;
        w.write_all(&self.height.to_be_bytes())?;
        Ok(())
    }

    /// Read header from input.
    ///
    /// The magic is checked before any other field is read.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, ContainerError> {
        let mut magic = [0u8; 4];
        read_header_bytes(r, &mut magic)?;
        if &magic != CONTAINER_MAGIC {
            return Err(ContainerError::InvalidFormat(
                "not a thba container (bad magic bytes)".to_string(),
            ));
        }

        let mut buf2 = [0u8; 2];
        let mut buf4 = [0u8; 4];

        read_header_bytes(r, &mut buf2)?;
        let fps = buf2[0];
        // Files from the earlier revision have no flag byte; the high byte of
        // their frame count sits here instead.
        let compression = CompressionType::from_u8(buf2[1]).ok_or_else(|| {
            ContainerError::InvalidFormat(format!(
                "unsupported format revision (compression flag {})",
                buf2[1]
            ))
        })?;

        read_header_bytes(r, &mut buf4)?;
        let frame_count = u32::from_be_bytes(buf4);

        read_header_bytes(r, &mut buf4)?;
        let width = u32::from_be_bytes(buf4);

        read_header_bytes(r, &mut buf4)?;
        let height = u32::from_be_bytes(buf4);

        if fps == 0 {
            return Err(ContainerError::InvalidFormat("frame rate is zero".to_string()));
        }
        if width == 0 || height == 0 {
            return Err(ContainerError::InvalidFormat(format!(
                "invalid dimensions {}x{}",
                width, height
            )));
        }
        if !compression.fits_chunk(width, height) {
            return Err(ContainerError::InvalidFormat(format!(
                "{}x{} frames exceed the chunk size limit",
                width, height
            )));
        }

        Ok(Self {
            fps,
            compression,
            frame_count,
            width,
            height,
        })
    }
}

fn read_header_bytes<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), ContainerError> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            ContainerError::InvalidFormat("truncated header".to_string())
        }
        _ => ContainerError::Io(e),
    })
}

/// Location of one chunk inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkIndex {
    /// Byte offset of the payload (after the length prefix).
    pub offset: u64,
    /// Payload size in bytes.
    pub size: u32,
}

/// One undecoded chunk payload.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Presentation index of this chunk.
    pub index: u32,
    /// Compressed (or raw) payload bytes.
    pub payload: Vec<u8>,
}

impl Chunk {
    /// Decompress and wrap the payload as a frame.
    pub fn decode(&self, header: &ContainerHeader) -> Result<Frame, ContainerError> {
        let expected = header.frame_size();
        let raw = header
            .compression
            .decompress(&self.payload, expected)
            .map_err(|reason| ContainerError::CorruptChunk {
                index: self.index,
                reason,
            })?;

        let actual = raw.len();
        Frame::from_raw(header.width, header.height, raw).ok_or_else(|| {
            ContainerError::CorruptChunk {
                index: self.index,
                reason: format!("decodes to {} bytes, expected {}", actual, expected),
            }
        })
    }
}

/// Container errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("Invalid container: {0}")]
    InvalidFormat(String),
    #[error("Corrupt chunk {index}: {reason}")]
    CorruptChunk { index: u32, reason: String },
    #[error("Cannot encode frame {index}: {reason}")]
    Encode { index: u32, reason: String },
    #[error("Frame index {index} out of range ({frame_count} frames)")]
    FrameOutOfRange { index: u32, frame_count: u32 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ContainerError {
    /// Whether the stream can continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ContainerError::CorruptChunk { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header() -> ContainerHeader {
        ContainerHeader {
            fps: 24,
            compression: CompressionType::Lz4,
            frame_count: 1000,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn test_header_layout() {
        let mut buf = Vec::new();
        header().write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), ContainerHeader::SIZE);
        assert_eq!(&buf[0..4], b"thba");
        assert_eq!(buf[4], 24);
        assert_eq!(buf[5], 1);
        assert_eq!(&buf[6..10], &1000u32.to_be_bytes());
        assert_eq!(&buf[10..14], &64u32.to_be_bytes());
        assert_eq!(&buf[14..18], &48u32.to_be_bytes());

        let decoded = ContainerHeader::read_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, header());
    }

    #[test]
    fn test_bad_magic_checked_first() {
        // Everything after the magic is garbage, but the magic error wins.
        let buf = b"THBA\x00\x09".to_vec();
        let err = ContainerHeader::read_from(&mut Cursor::new(&buf)).unwrap_err();
        match err {
            ContainerError::InvalidFormat(msg) => assert!(msg.contains("magic")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_earlier_revision_rejected() {
        // fps, then a big-endian frame count whose high byte is non-zero.
        let mut buf = b"thba".to_vec();
        buf.push(10);
        buf.extend_from_slice(&0x0200_0000u32.to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]);
        let err = ContainerHeader::read_from(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, ContainerError::InvalidFormat(_)));
    }

    #[test]
    fn test_truncated_header() {
        let buf = b"thba\x0a".to_vec();
        let err = ContainerHeader::read_from(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, ContainerError::InvalidFormat(_)));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut h = header();
        h.width = 0;
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        assert!(ContainerHeader::read_from(&mut Cursor::new(&buf)).is_err());
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        for compression in [CompressionType::None, CompressionType::Lz4] {
            let h = ContainerHeader {
                fps: 10,
                compression,
                frame_count: 1,
                width: u32::MAX,
                height: u32::MAX,
            };
            let mut buf = Vec::new();
            h.write_to(&mut buf).unwrap();
            let err = ContainerHeader::read_from(&mut Cursor::new(&buf)).unwrap_err();
            assert!(matches!(err, ContainerError::InvalidFormat(_)));
        }

        // Raw frames just under 4 GiB fit; their LZ4 worst case does not.
        assert!(CompressionType::None.fits_chunk(65_536, 65_535));
        assert!(!CompressionType::Lz4.fits_chunk(65_536, 65_535));
        assert_eq!(CompressionType::Lz4.max_payload_len(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_lz4_chunk_roundtrip() {
        let raw: Vec<u8> = (0..64 * 48).map(|i| (i % 13) as u8).collect();
        let payload = CompressionType::Lz4.compress(&raw);
        assert!(payload.len() < raw.len());
        assert!(payload.len() <= CompressionType::Lz4.max_payload_len(raw.len()));

        let chunk = Chunk { index: 3, payload };
        let frame = chunk.decode(&header()).unwrap();
        assert_eq!(frame.as_bytes(), &raw[..]);
    }

    #[test]
    fn test_chunk_wrong_size_is_corrupt() {
        let mut h = header();
        h.compression = CompressionType::None;
        let chunk = Chunk {
            index: 7,
            payload: vec![0u8; 10],
        };
        let err = chunk.decode(&h).unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(err, ContainerError::CorruptChunk { index: 7, .. }));

        let lz4 = Chunk {
            index: 8,
            payload: CompressionType::Lz4.compress(&[1u8; 10]),
        };
        assert!(lz4.decode(&header()).unwrap_err().is_recoverable());
    }

    #[test]
    fn test_garbage_lz4_payload_is_corrupt() {
        let mut payload = ((64 * 48) as u32).to_le_bytes().to_vec();
        payload.extend_from_slice(&[0xFF; 32]);
        let chunk = Chunk { index: 0, payload };
        assert!(chunk.decode(&header()).unwrap_err().is_recoverable());
    }
}
