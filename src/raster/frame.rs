//! Grayscale frame rasters.

use std::path::Path;

/// A single 8-bit grayscale raster, row-major.
///
/// Frames are decoded from one container chunk and owned by the caller for
/// the duration of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap raw intensity bytes.
    ///
    /// Returns `None` if `data.len() != width * height`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Create a frame where every pixel has the same intensity.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw intensity bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Intensity at `(x, y)`. Callers must stay in bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width as usize + x]
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write the frame as an 8-bit grayscale PNG.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), image::ImageError> {
        image::save_buffer_with_format(
            path,
            &self.data,
            self.width,
            self.height,
            image::ExtendedColorType::L8,
            image::ImageFormat::Png,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_rejects_wrong_length() {
        assert!(Frame::from_raw(4, 4, vec![0; 15]).is_none());
        assert!(Frame::from_raw(4, 4, vec![0; 16]).is_some());
    }

    #[test]
    fn test_get_is_row_major() {
        let frame = Frame::from_raw(3, 2, vec![0, 1, 2, 10, 11, 12]).unwrap();
        assert_eq!(frame.get(2, 0), 2);
        assert_eq!(frame.get(0, 1), 10);
        assert_eq!(frame.get(2, 1), 12);
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_0000.png");
        let frame = Frame::from_raw(3, 2, vec![0, 50, 100, 150, 200, 250]).unwrap();
        frame.save_png(&path).unwrap();

        let decoded = image::open(&path).unwrap().into_luma8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.into_raw(), frame.as_bytes());
    }
}
