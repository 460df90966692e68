//! Frame data structures for captured screen content

use image::{ImageFormat, ImageResult, RgbaImage};
use std::io::Cursor;
use std::time::Instant;

/// Minimal view of a raster image, independent of the capture backend
pub trait RasterImage {
    /// Image width in pixels
    fn width(&self) -> u32;
    /// Image height in pixels
    fn height(&self) -> u32;
    /// Raw RGBA pixel data, row major
    fn pixels(&self) -> &[u8];
    /// Encode the image as PNG bytes
    fn encode_png(&self) -> ImageResult<Vec<u8>>;
}

/// A captured frame from one display
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    image: RgbaImage,
    display_index: usize,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(image: RgbaImage, display_index: usize) -> Self {
        Self {
            image,
            display_index,
            timestamp: Instant::now(),
        }
    }

    /// Display the frame was captured from
    pub fn display_index(&self) -> usize {
        self.display_index
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl RasterImage for CapturedFrame {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    fn encode_png(&self) -> ImageResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_frame_exposes_raster_view() {
        let image = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]));
        let frame = CapturedFrame::new(image, 2);

        assert_eq!(frame.display_index(), 2);
        assert_eq!(frame.dimensions(), (4, 3));
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.pixels().len(), 4 * 3 * 4);
        assert_eq!(&frame.pixels()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_encode_png_has_png_signature() {
        let frame = CapturedFrame::new(RgbaImage::new(2, 2), 0);
        let png = frame.encode_png().unwrap();

        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
