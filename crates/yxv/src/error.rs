//! Error types for the yxv crate.

use std::fmt;

use yxv_decode::{DecodeError, Tag};

/// Result type for yxv operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, loading or packing a model.
#[derive(Debug)]
pub enum Error {
    /// The file does not start with the container magic.
    InvalidHeader {
        /// The tag found where the magic was expected.
        tag: Tag,
        /// The total length claimed by the header.
        length: u32,
        /// The number of bytes actually available.
        buffer_len: usize,
    },
    /// The byte source finished before the last chunk was complete.
    Truncated {
        /// Offset of the incomplete header or chunk.
        offset: usize,
        /// Bytes needed to complete it.
        needed: usize,
        /// Bytes available from `offset`.
        available: usize,
    },
    /// A chunk handler failed to decode its payload.
    Chunk {
        /// The tag of the failing chunk.
        tag: Tag,
        /// The underlying decode failure.
        source: DecodeError,
    },
    /// A chunk referenced an object with no `POBJ` header.
    UnknownObject {
        tag: Tag,
        id: u32,
    },
    /// A second `POBJ` header used an id that already exists.
    DuplicateObject {
        id: u32,
    },
    /// A chunk referenced a channel the object does not have.
    InvalidChannel {
        id: u32,
        channel: usize,
        channels: usize,
    },
    /// A basis or LUT row index beyond the declared maximum.
    BasisOutOfRange {
        id: u32,
        channel: usize,
        index: usize,
        max_basis: usize,
    },
    /// LUT data did not cover the rows it claimed to hold.
    LutSize {
        id: u32,
        channel: usize,
        expected: usize,
        actual: usize,
    },
    /// A later buffer was shorter than the data already consumed.
    BufferShrunk {
        offset: usize,
        buffer_len: usize,
    },
    /// An image failed to decode. Parsed state is unaffected.
    Image {
        id: u32,
        channel: usize,
        index: usize,
        source: DecodeError,
    },
    /// A pack step needed an image that has not been decoded.
    MissingImage {
        channel: usize,
        index: usize,
    },
    /// A keyed resource failed to load.
    Resource {
        key: String,
        message: String,
    },
    /// The parser was used again after a fatal error.
    Poisoned,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHeader {
                tag,
                length,
                buffer_len,
            } => {
                write!(
                    f,
                    "invalid file header: tag \"{tag}\", length {length}, buffer length {buffer_len}"
                )
            }
            Error::Truncated {
                offset,
                needed,
                available,
            } => {
                write!(
                    f,
                    "truncated file: {needed} bytes needed at offset {offset}, {available} available"
                )
            }
            Error::Chunk { tag, source } => write!(f, "failed to handle {tag} chunk: {source}"),
            Error::UnknownObject { tag, id } => {
                write!(f, "{tag} chunk references unknown object {id}")
            }
            Error::DuplicateObject { id } => write!(f, "object {id} declared twice"),
            Error::InvalidChannel {
                id,
                channel,
                channels,
            } => {
                write!(
                    f,
                    "channel {channel} out of range for object {id} with {channels} channels"
                )
            }
            Error::BasisOutOfRange {
                id,
                channel,
                index,
                max_basis,
            } => {
                write!(
                    f,
                    "basis index {index} out of range for object {id} channel {channel} (max {max_basis})"
                )
            }
            Error::LutSize {
                id,
                channel,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "LUT data for object {id} channel {channel} has {actual} samples, expected {expected}"
                )
            }
            Error::BufferShrunk { offset, buffer_len } => {
                write!(
                    f,
                    "buffer of {buffer_len} bytes is shorter than the {offset} already parsed"
                )
            }
            Error::Image {
                id,
                channel,
                index,
                source,
            } => {
                write!(
                    f,
                    "failed to decode image {index} of object {id} channel {channel}: {source}"
                )
            }
            Error::MissingImage { channel, index } => {
                write!(f, "basis image {index} of channel {channel} is not decoded")
            }
            Error::Resource { key, message } => write!(f, "failed to load {key}: {message}"),
            Error::Poisoned => write!(f, "parser already failed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Chunk { source, .. } | Error::Image { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Error {
    /// Whether the error ends parsing of the file.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Image { .. } | Error::MissingImage { .. } | Error::Resource { .. }
        )
    }
}
