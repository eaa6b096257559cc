//! Raster decoding for basis, LUT and static texture images.
//!
//! Every image in a YXV file is a baseline JFIF stream. Decoding produces
//! RGBA pixel data; basis images are greyscale, so only one channel of the
//! result carries information, but the full RGBA layout is kept so callers
//! can treat all images alike.

mod jpeg;

pub use jpeg::decode_jpeg_to_rgba;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::error::{DecodeError, DecodeResult};

/// Index of the red channel in an RGBA pixel.
pub const RED: usize = 0;
/// Index of the green channel in an RGBA pixel.
pub const GREEN: usize = 1;

/// Decoded texture data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTexture {
    /// RGBA pixel data (4 bytes per pixel).
    pub data: Vec<u8>,
    /// Texture width in pixels.
    pub width: u32,
    /// Texture height in pixels.
    pub height: u32,
}

impl DecodedTexture {
    /// Create a new decoded texture.
    #[must_use]
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Check if the texture data size is valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 4
    }

    /// Number of pixels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Iterate over one channel of every pixel in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is not in `0..4`.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = u8> + '_ {
        assert!(channel < 4, "RGBA channel index {channel} out of range");
        self.data.iter().skip(channel).step_by(4).copied()
    }

    /// Return a copy scaled to `width` x `height` with bilinear filtering.
    ///
    /// A texture that already has the requested size is cloned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the pixel buffer does not match the dimensions.
    pub fn resized(&self, width: u32, height: u32) -> DecodeResult<Self> {
        if self.width == width && self.height == height {
            return Ok(self.clone());
        }
        let source = RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or(
            DecodeError::BufferTooSmall {
                expected: self.pixel_count() * 4,
                actual: self.data.len(),
            },
        )?;
        let scaled = imageops::resize(&source, width, height, FilterType::Triangle);
        Ok(Self::new(scaled.into_raw(), width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoded_texture_is_valid() {
        let texture = DecodedTexture::new(vec![0; 16], 2, 2);
        assert!(texture.is_valid());

        let invalid = DecodedTexture::new(vec![0; 15], 2, 2);
        assert!(!invalid.is_valid());
    }

    #[test]
    fn test_channel_iterates_pixels() {
        let texture = DecodedTexture::new(vec![1, 2, 3, 4, 5, 6, 7, 8], 2, 1);
        assert_eq!(texture.channel(RED).collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(texture.channel(GREEN).collect::<Vec<_>>(), vec![2, 6]);
        assert_eq!(texture.channel(3).collect::<Vec<_>>(), vec![4, 8]);
    }

    #[test]
    fn test_resized_same_size_is_identity() {
        let texture = DecodedTexture::new((0..16).collect(), 2, 2);
        assert_eq!(texture.resized(2, 2).unwrap(), texture);
    }

    #[test]
    fn test_resized_uniform_stays_uniform() {
        let texture = DecodedTexture::new([90, 140, 30, 255].repeat(4), 2, 2);
        let scaled = texture.resized(4, 3).unwrap();
        assert!(scaled.is_valid());
        assert_eq!((scaled.width, scaled.height), (4, 3));
        assert!(scaled.channel(RED).all(|v| v == 90));
        assert!(scaled.channel(GREEN).all(|v| v == 140));
    }

    #[test]
    fn test_resized_rejects_bad_buffer() {
        let texture = DecodedTexture::new(vec![0; 15], 2, 2);
        assert!(matches!(
            texture.resized(1, 1),
            Err(DecodeError::BufferTooSmall { .. })
        ));
    }
}
