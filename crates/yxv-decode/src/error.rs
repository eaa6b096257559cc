//! Error types for decoding operations.

use std::fmt;

/// Errors that can occur while decoding chunk payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input buffer is too small for the expected data.
    BufferTooSmall { expected: usize, actual: usize },
    /// Invalid data format or structure.
    InvalidFormat {
        context: &'static str,
        detail: String,
    },
    /// A read ran past the end of the buffer.
    UnexpectedEof { context: &'static str },
    /// A packed JPEG blob did not split into the announced number of streams.
    SegmentCount {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The image decoder rejected a stream.
    Image {
        context: &'static str,
        detail: String,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall { expected, actual } => {
                write!(
                    f,
                    "buffer too small: expected {expected} bytes, got {actual}"
                )
            }
            Self::InvalidFormat { context, detail } => {
                write!(f, "invalid format in {context}: {detail}")
            }
            Self::UnexpectedEof { context } => {
                write!(f, "unexpected end of buffer in {context}")
            }
            Self::SegmentCount {
                context,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "wrong number of segments in {context}: had {actual}, expected {expected}"
                )
            }
            Self::Image { context, detail } => {
                write!(f, "failed to decode {context} image: {detail}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;
