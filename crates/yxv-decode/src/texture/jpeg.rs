//! JPEG decoding via the `image` crate.

use image::ImageFormat;

use super::DecodedTexture;
use crate::error::{DecodeError, DecodeResult};

/// Decode a JFIF stream to RGBA pixels.
///
/// Greyscale input is expanded so every output pixel has four bytes, with
/// the grey value replicated across red, green and blue.
///
/// # Errors
///
/// Returns [`DecodeError::Image`] if the stream is not a decodable JPEG.
pub fn decode_jpeg_to_rgba(data: &[u8]) -> DecodeResult<DecodedTexture> {
    let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg).map_err(|e| {
        DecodeError::Image {
            context: "jpeg",
            detail: e.to_string(),
        }
    })?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedTexture::new(rgba.into_raw(), width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{GREEN, RED};

    const GRAY_200: &[u8] = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../fixtures/gray_200.jpg"
    ));

    #[test]
    fn test_decode_fixture() {
        let texture = decode_jpeg_to_rgba(GRAY_200).unwrap();
        assert_eq!((texture.width, texture.height), (2, 2));
        assert!(texture.is_valid());
        for channel in [RED, GREEN] {
            assert!(texture.channel(channel).all(|v| v.abs_diff(200) <= 2));
        }
        assert!(texture.channel(3).all(|v| v == 255));
    }

    #[test]
    fn test_decode_garbage() {
        let result = decode_jpeg_to_rgba(&[0xFF, 0xD8, 0x00, 0x01]);
        assert!(matches!(result, Err(DecodeError::Image { .. })));
    }
}
