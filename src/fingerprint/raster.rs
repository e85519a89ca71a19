//! Decoded pixel buffers
//!
//! A [`Raster`] is a row-major, tightly packed 8-bit buffer with either three
//! (RGB) or four (RGBA) channels per pixel. Rasters are produced from encoded
//! file bytes with the `image` crate, or from raw bytes when the caller
//! already has decoded pixels.

use crate::core::error::{Result, SimilarityError};
use image::DynamicImage;

/// Channel layout of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// Three bytes per pixel: red, green, blue
    Rgb,
    /// Four bytes per pixel: red, green, blue, alpha
    Rgba,
}

impl PixelLayout {
    /// Every layout the fingerprint engine accepts
    pub const SUPPORTED: [PixelLayout; 2] = [PixelLayout::Rgb, PixelLayout::Rgba];

    /// Bytes per pixel
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }

    /// Find the layout whose size matches `len` bytes for the given dimensions
    pub fn detect(width: u32, height: u32, len: usize) -> Option<Self> {
        let pixel_count = (width as usize).checked_mul(height as usize)?;
        Self::SUPPORTED
            .into_iter()
            .find(|layout| pixel_count.checked_mul(layout.channels()) == Some(len))
    }
}

/// A decoded image
#[derive(Debug, Clone)]
pub struct Raster {
    width: u32,
    height: u32,
    layout: PixelLayout,
    pixels: Vec<u8>,
}

impl Raster {
    /// Wrap raw pixels, detecting a 3- or 4-channel layout from the buffer size
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let layout =
            PixelLayout::detect(width, height, pixels.len()).ok_or(SimilarityError::InvalidRaster {
                width,
                height,
                len: pixels.len(),
            })?;

        Ok(Self {
            width,
            height,
            layout,
            pixels,
        })
    }

    /// Wrap raw pixels with a known layout, checking the buffer size
    pub fn with_layout(width: u32, height: u32, layout: PixelLayout, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|count| count.checked_mul(layout.channels()));

        if expected != Some(pixels.len()) {
            return Err(SimilarityError::InvalidRaster {
                width,
                height,
                len: pixels.len(),
            });
        }

        Ok(Self {
            width,
            height,
            layout,
            pixels,
        })
    }

    /// Decode encoded image bytes (PNG, JPEG, GIF, BMP)
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from_image(image))
    }

    /// Convert a decoded image, keeping an alpha channel only when it has one
    pub fn from_image(image: DynamicImage) -> Self {
        let width = image.width();
        let height = image.height();

        let (layout, pixels) = if image.color().has_alpha() {
            (PixelLayout::Rgba, image.into_rgba8().into_raw())
        } else {
            (PixelLayout::Rgb, image.into_rgb8().into_raw())
        };

        Self {
            width,
            height,
            layout,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Number of pixels (width * height)
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// RGB channels of the pixel at (x, y); alpha is ignored
    ///
    /// Callers must keep `x < width` and `y < height`.
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let stride = self.layout.channels();
        let offset = (y as usize * self.width as usize + x as usize) * stride;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]
    }

    /// Iterate over the rows of the raster as byte slices
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        let row_len = (self.width as usize * self.layout.channels()).max(1);
        self.pixels.chunks_exact(row_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn test_detect_layout() {
        assert_eq!(PixelLayout::detect(2, 2, 12), Some(PixelLayout::Rgb));
        assert_eq!(PixelLayout::detect(2, 2, 16), Some(PixelLayout::Rgba));
        assert_eq!(PixelLayout::detect(2, 2, 8), None);
        assert_eq!(PixelLayout::detect(2, 2, 13), None);
    }

    #[test]
    fn test_new_rejects_bad_length() {
        let err = Raster::new(3, 3, vec![0; 10]).unwrap_err();
        assert!(matches!(
            err,
            SimilarityError::InvalidRaster {
                width: 3,
                height: 3,
                len: 10
            }
        ));
    }

    #[test]
    fn test_with_layout_checks_length() {
        assert!(Raster::with_layout(2, 1, PixelLayout::Rgba, vec![0; 8]).is_ok());
        assert!(Raster::with_layout(2, 1, PixelLayout::Rgba, vec![0; 6]).is_err());
    }

    #[test]
    fn test_rgb_at_respects_stride() {
        // two RGBA pixels: red, then blue
        let raster = Raster::new(2, 1, vec![255, 0, 0, 10, 0, 0, 255, 20]).unwrap();
        assert_eq!(raster.layout(), PixelLayout::Rgba);
        assert_eq!(raster.rgb_at(0, 0), [255, 0, 0]);
        assert_eq!(raster.rgb_at(1, 0), [0, 0, 255]);
    }

    #[test]
    fn test_decode_png_rgb() {
        let image = RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let raster = Raster::decode(&bytes).unwrap();
        assert_eq!(raster.width(), 4);
        assert_eq!(raster.height(), 3);
        assert_eq!(raster.layout(), PixelLayout::Rgb);
        assert_eq!(raster.rgb_at(3, 2), [10, 20, 30]);
    }

    #[test]
    fn test_decode_png_with_alpha() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 128]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let raster = Raster::decode(&bytes).unwrap();
        assert_eq!(raster.layout(), PixelLayout::Rgba);
        assert_eq!(raster.pixels().len(), 16);
    }

    #[test]
    fn test_decode_garbage() {
        let err = Raster::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, SimilarityError::Decode(_)));
    }
}
