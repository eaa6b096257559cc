//! Little-endian accessors over a raw byte buffer.
//!
//! Every multi-byte value in a YXV file is little-endian. Values are assembled
//! byte-wise with `from_le_bytes`, so reads are valid at any offset and never
//! depend on the alignment of the underlying allocation.

use glam::{DVec3, Vec3};

use crate::error::{DecodeError, DecodeResult};

/// A forward-only cursor over a byte slice.
///
/// The reader owns no data; it only tracks an offset into the borrowed slice.
/// Every read checks bounds and reports the `context` it was created with.
#[derive(Debug, Clone)]
pub struct ChunkReader<'a> {
    data: &'a [u8],
    offset: usize,
    context: &'static str,
}

impl<'a> ChunkReader<'a> {
    /// Create a reader positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8], context: &'static str) -> Self {
        Self {
            data,
            offset: 0,
            context,
        }
    }

    /// Create a reader positioned at `offset`.
    #[must_use]
    pub fn at(data: &'a [u8], offset: usize, context: &'static str) -> Self {
        Self {
            data,
            offset,
            context,
        }
    }

    /// Current offset into the buffer.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of bytes left after the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    /// Take the next `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(DecodeError::UnexpectedEof {
                context: self.context,
            })?;
        if end > self.data.len() {
            return Err(DecodeError::BufferTooSmall {
                expected: end,
                actual: self.data.len(),
            });
        }
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    /// Take everything after the cursor.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let start = self.offset.min(self.data.len());
        self.offset = self.data.len();
        &self.data[start..]
    }

    fn read_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read a four-character tag.
    pub fn read_tag(&mut self) -> DecodeResult<[u8; 4]> {
        self.read_array()
    }

    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> DecodeResult<f64> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Read a signed 32-bit count or index that must not be negative.
    pub fn read_count(&mut self) -> DecodeResult<usize> {
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| DecodeError::InvalidFormat {
            context: self.context,
            detail: format!("negative count {value}"),
        })
    }

    /// Read `count` consecutive `i32` values.
    pub fn read_i32s(&mut self, count: usize) -> DecodeResult<Vec<i32>> {
        let bytes = self.read_bytes(byte_len(count, 4, self.context)?)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Read `count` consecutive `f32` values.
    pub fn read_f32s(&mut self, count: usize) -> DecodeResult<Vec<f32>> {
        let bytes = self.read_bytes(byte_len(count, 4, self.context)?)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Read three `f32` values as a vector.
    pub fn read_vec3(&mut self) -> DecodeResult<Vec3> {
        Ok(Vec3::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    /// Read three `f64` values as a vector.
    pub fn read_dvec3(&mut self) -> DecodeResult<DVec3> {
        Ok(DVec3::new(
            self.read_f64()?,
            self.read_f64()?,
            self.read_f64()?,
        ))
    }
}

fn byte_len(count: usize, width: usize, context: &'static str) -> DecodeResult<usize> {
    count
        .checked_mul(width)
        .ok_or(DecodeError::UnexpectedEof { context })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers_little_endian() {
        let data = [0x01, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF];
        let mut reader = ChunkReader::new(&data, "test");
        assert_eq!(reader.read_u32().unwrap(), 1);
        assert_eq!(reader.read_i32().unwrap(), -1);
        assert_eq!(reader.offset(), 8);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_floats_unaligned() {
        // A leading pad byte puts every float at an odd offset.
        let mut data = vec![0xAA];
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&(-2.25f32).to_le_bytes());
        data.extend_from_slice(&std::f64::consts::PI.to_le_bytes());

        let mut reader = ChunkReader::at(&data, 1, "test");
        assert_eq!(reader.read_f32s(2).unwrap(), vec![1.5, -2.25]);
        assert_eq!(reader.read_f64().unwrap(), std::f64::consts::PI);
    }

    #[test]
    fn test_read_tag_and_rest() {
        let data = b"POS \x01\x02";
        let mut reader = ChunkReader::new(data, "test");
        assert_eq!(&reader.read_tag().unwrap(), b"POS ");
        assert_eq!(reader.read_rest(), &[1, 2]);
        assert!(reader.read_rest().is_empty());
    }

    #[test]
    fn test_read_past_end() {
        let data = [0u8; 3];
        let mut reader = ChunkReader::new(&data, "test");
        assert!(matches!(
            reader.read_u32(),
            Err(DecodeError::BufferTooSmall {
                expected: 4,
                actual: 3
            })
        ));
        // A failed read leaves the cursor where it was.
        assert_eq!(reader.offset(), 0);
    }

    #[test]
    fn test_read_count_rejects_negative() {
        let data = (-3i32).to_le_bytes();
        let mut reader = ChunkReader::new(&data, "test");
        assert!(matches!(
            reader.read_count(),
            Err(DecodeError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_read_vectors() {
        let mut data = Vec::new();
        for v in [1.0f32, 2.0, 3.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        for v in [-1.0f64, -2.0, -3.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let mut reader = ChunkReader::new(&data, "test");
        assert_eq!(reader.read_vec3().unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(reader.read_dvec3().unwrap(), DVec3::new(-1.0, -2.0, -3.0));
    }
}
