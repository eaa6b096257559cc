//! Lookup table row encoding.
//!
//! LUT coefficients are stored as signed bytes scaled by 128, so a stored
//! value `b` decodes to `b / 128.0` and covers `[-1, 1)`. `LUTJ` chunks carry
//! the same bytes in the green channel of a JPEG, offset by 128.

use crate::error::DecodeResult;
use crate::texture::{DecodedTexture, GREEN};

/// Scale between a stored signed byte and its coefficient value.
pub const COEFFICIENT_SCALE: f32 = 128.0;

/// Decode one stored byte to a coefficient.
#[must_use]
pub fn coefficient_from_byte(byte: i8) -> f32 {
    f32::from(byte) / COEFFICIENT_SCALE
}

/// Encode a coefficient as the nearest stored byte, saturating at the ends
/// of the signed range.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn coefficient_to_byte(value: f32) -> i8 {
    // The clamp keeps the value inside i8, so the cast cannot truncate.
    (value * COEFFICIENT_SCALE).round().clamp(-128.0, 127.0) as i8
}

/// Reinterpret raw payload bytes as signed LUT bytes.
#[must_use]
pub fn bytes_to_signed(bytes: &[u8]) -> Vec<i8> {
    bytes.iter().map(|&b| i8::from_ne_bytes([b])).collect()
}

/// Convert a green channel sample to a signed LUT byte (`green - 128`).
#[must_use]
pub fn green_to_signed(green: u8) -> i8 {
    i8::from_ne_bytes([green ^ 0x80])
}

/// Extract one LUT row of `width * height` signed bytes from a decoded image.
///
/// The image is scaled to the LUT grid first when its size differs.
pub fn green_channel_row(
    texture: &DecodedTexture,
    width: u32,
    height: u32,
) -> DecodeResult<Vec<i8>> {
    let texture = texture.resized(width, height)?;
    Ok(texture.channel(GREEN).map(green_to_signed).collect())
}
