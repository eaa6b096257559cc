//! Chunk framing for the YXV container.
//!
//! A file starts with a 12-byte header (`PCAO`, total length, object count)
//! followed by a stream of chunks, each a 4-byte tag, a `u32` payload length
//! and the payload itself.

use std::fmt;

use crate::error::{DecodeError, DecodeResult};
use crate::reader::ChunkReader;

/// Size of the file header in bytes.
pub const FILE_HEADER_LEN: usize = 12;

/// Size of a chunk header (tag + length) in bytes.
pub const CHUNK_HEADER_LEN: usize = 8;

/// A four-character chunk code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    /// File header magic.
    pub const FILE_MAGIC: Self = Self(*b"PCAO");
    /// Object header.
    pub const POBJ: Self = Self(*b"POBJ");
    /// Format version.
    pub const VERS: Self = Self(*b"VERS");
    /// LUT angular range.
    pub const LUTR: Self = Self(*b"LUTR");
    /// Raw signed-byte LUT rows.
    pub const LUTB: Self = Self(*b"LUTB");
    /// LUT rows packed as JPEG images.
    pub const LUTJ: Self = Self(*b"LUTJ");
    /// Static fallback texture.
    pub const STAJ: Self = Self(*b"STAJ");
    /// Basis images packed as JPEG images.
    pub const BASJ: Self = Self(*b"BASJ");
    /// Position.
    pub const POS: Self = Self(*b"POS ");
    /// Euler rotation.
    pub const ROT: Self = Self(*b"ROT ");
    /// Scale.
    pub const SCA: Self = Self(*b"SCA ");
    /// Explicit rotation matrix.
    pub const EUA: Self = Self(*b"EUA ");
    /// Text geometry.
    pub const GEOA: Self = Self(*b"GEOA");
    /// Binary geometry.
    pub const GEOB: Self = Self(*b"GEOB");

    /// The raw tag bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", char::from(b))?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

/// A chunk's tag and payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub tag: Tag,
    pub length: u32,
}

impl ChunkHeader {
    /// Total size of the chunk including its header.
    #[must_use]
    pub fn total_len(&self) -> usize {
        CHUNK_HEADER_LEN + self.length as usize
    }
}

/// The 12-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub tag: Tag,
    pub length: u32,
    pub object_count: u32,
}

impl FileHeader {
    /// Whether the header carries the expected magic.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.tag == Tag::FILE_MAGIC
    }
}

/// Read a chunk header at `offset`.
///
/// # Errors
///
/// Returns [`DecodeError::BufferTooSmall`] if fewer than eight bytes remain.
pub fn read_chunk_header(data: &[u8], offset: usize) -> DecodeResult<ChunkHeader> {
    let mut reader = ChunkReader::at(data, offset, "chunk header");
    let tag = Tag(reader.read_tag()?);
    let length = reader.read_u32()?;
    Ok(ChunkHeader { tag, length })
}

/// Read the file header at the start of `data`.
///
/// The magic is not checked here; callers decide how to report a mismatch.
pub fn read_file_header(data: &[u8]) -> DecodeResult<FileHeader> {
    if data.len() < FILE_HEADER_LEN {
        return Err(DecodeError::BufferTooSmall {
            expected: FILE_HEADER_LEN,
            actual: data.len(),
        });
    }
    let mut reader = ChunkReader::new(data, "file header");
    Ok(FileHeader {
        tag: Tag(reader.read_tag()?),
        length: reader.read_u32()?,
        object_count: reader.read_u32()?,
    })
}
