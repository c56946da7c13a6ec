//! Wire format for a single item stored in the payload region (§3.2, §6.5).
//!
//! A frame is `length(u32 LE) | payload | crc32(u32 LE)`, where `crc32`
//! covers the length prefix and the payload bytes — framing integrity, not
//! an assertion about the payload's own contents (a codec that wants
//! content integrity layers its own check on top).
//!
//! The special length value `0` is the wrap sentinel (§3.2 policy a): it
//! never prefixes a real payload and instead means "the rest of this
//! region is unused, the next frame starts at offset 0".

use crate::error::ConsumerError;

/// Length prefix, 4 bytes LE.
const LEN_PREFIX: usize = 4;
/// CRC32 trailer, 4 bytes LE.
const CRC_TRAILER: usize = 4;

/// Public alias of the length-prefix width, for callers that need to know
/// how many bytes a wrap sentinel occupies (e.g. to decide whether it fits
/// before the region boundary at all).
pub const LENGTH_PREFIX_LEN: usize = LEN_PREFIX;

/// A length value of zero in the length prefix marks the wrap sentinel.
pub const WRAP_SENTINEL: u32 = 0;

/// Total on-disk size of a frame carrying `payload_len` payload bytes.
#[must_use]
pub const fn framed_len(payload_len: usize) -> usize {
    LEN_PREFIX + payload_len + CRC_TRAILER
}

/// Encodes `payload` into a freshly-allocated frame buffer.
#[must_use]
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(framed_len(payload.len()));
    let len = payload.len() as u32;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

/// Result of successfully decoding one frame out of a byte window.
pub struct Decoded<'a> {
    /// The frame's payload bytes.
    pub payload: &'a [u8],
    /// Total bytes the frame occupied, including prefix and trailer.
    pub consumed: usize,
}

/// Attempts to decode one frame from the start of `window`, where `window`
/// holds all bytes currently visible between the consumer and producer
/// pointers (already unwrapped into linear order by the caller).
///
/// `capacity` is the payload region size, used to reject a declared length
/// that could never be a valid frame regardless of how much is visible.
pub fn decode(window: &[u8], capacity: u64) -> Result<Decoded<'_>, ConsumerError> {
    if window.len() < LEN_PREFIX {
        return Err(ConsumerError::Retry);
    }
    let declared = u32::from_le_bytes(window[0..4].try_into().unwrap());
    if declared == WRAP_SENTINEL {
        return Ok(Decoded {
            payload: &[],
            consumed: window.len(),
        });
    }
    let declared = u64::from(declared);
    if framed_len(declared as usize) as u64 > capacity {
        return Err(ConsumerError::LengthOverflow { declared, capacity });
    }
    let frame_len = framed_len(declared as usize);
    if window.len() < frame_len {
        return Err(ConsumerError::Truncated {
            declared,
            available: window.len().saturating_sub(LEN_PREFIX) as u64,
        });
    }
    let payload = &window[LEN_PREFIX..LEN_PREFIX + declared as usize];
    let expected = u32::from_le_bytes(
        window[LEN_PREFIX + declared as usize..frame_len]
            .try_into()
            .unwrap(),
    );
    let actual = crc32fast::hash(&window[0..LEN_PREFIX + declared as usize]);
    if expected != actual {
        return Err(ConsumerError::ChecksumMismatch { expected, actual });
    }
    Ok(Decoded {
        payload,
        consumed: frame_len,
    })
}
