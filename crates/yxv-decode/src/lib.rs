//! Decoding primitives for the YXV relightable model container.
//!
//! This crate holds the synchronous, I/O-free building blocks:
//!
//! - [`reader`]: little-endian accessors over raw bytes
//! - [`chunk`]: file header and chunk framing, tag constants
//! - [`segments`]: splitting of back-to-back JPEG streams
//! - [`geometry`]: `GEOA`/`GEOB` mesh decoding
//! - [`lut`]: signed-byte LUT coefficient encoding
//! - [`texture`]: JPEG decoding to RGBA
//!
//! Stateful parsing, object bookkeeping and atlas packing live in the `yxv`
//! crate.

pub mod chunk;
pub mod error;
pub mod geometry;
pub mod lut;
pub mod reader;
pub mod segments;
pub mod texture;

pub use chunk::{
    CHUNK_HEADER_LEN, ChunkHeader, FILE_HEADER_LEN, FileHeader, Tag, read_chunk_header,
    read_file_header,
};
pub use error::{DecodeError, DecodeResult};
pub use geometry::{Geometry, GeometrySource, decode_ascii_geometry, decode_binary_geometry};
pub use reader::ChunkReader;
pub use segments::{find_jpeg_segments, split_jpeg_segments};
pub use texture::{DecodedTexture, decode_jpeg_to_rgba};
