//! Splitting of back-to-back JPEG streams.
//!
//! `LUTJ`, `BASJ` and `STAJ` payloads carry one or more JFIF streams packed
//! without a length table. A stream start is recognised by the SOI + APP0
//! marker pair followed by the `JFIF\0` identifier, and (except for the first
//! stream) by the previous stream's EOI marker immediately before it.

use crate::error::{DecodeError, DecodeResult};

const SOI_APP0: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];
const EOI: [u8; 2] = [0xFF, 0xD9];
const JFIF_ID: &[u8; 5] = b"JFIF\0";

fn is_stream_start(data: &[u8], i: usize) -> bool {
    let preceded_by_eoi = i == 0 || (i >= 2 && data[i - 2..i] == EOI);
    preceded_by_eoi && data[i..i + 4] == SOI_APP0 && data[i + 6..i + 11] == *JFIF_ID
}

/// Find the start offset of every JFIF stream in `data`.
///
/// The returned list ends with a sentinel equal to `data.len()`, so `N`
/// streams produce `N + 1` offsets and stream `k` spans
/// `offsets[k]..offsets[k + 1]`.
#[must_use]
pub fn find_jpeg_segments(data: &[u8]) -> Vec<usize> {
    let mut offsets: Vec<usize> = (0..data.len().saturating_sub(10))
        .filter(|&i| is_stream_start(data, i))
        .collect();
    offsets.push(data.len());
    offsets
}

/// Split `data` into exactly `expected` JPEG streams.
///
/// # Errors
///
/// Returns [`DecodeError::SegmentCount`] if the number of recovered offsets is
/// not `expected + 1`.
pub fn split_jpeg_segments<'a>(
    data: &'a [u8],
    expected: usize,
    context: &'static str,
) -> DecodeResult<Vec<&'a [u8]>> {
    let offsets = find_jpeg_segments(data);
    if offsets.len() != expected + 1 {
        return Err(DecodeError::SegmentCount {
            context,
            expected: expected + 1,
            actual: offsets.len(),
        });
    }
    Ok(offsets.windows(2).map(|w| &data[w[0]..w[1]]).collect())
}
