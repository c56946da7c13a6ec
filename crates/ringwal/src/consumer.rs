//! The read side of the ring (§3, §4.3-§4.4).
//!
//! Like [`crate::producer::Producer`], `Consumer` is not `Clone`: exactly
//! one replay loop ever holds it, owned by the engine's background drain
//! task.

use std::sync::Arc;

use crate::error::ConsumerError;
use crate::frame;
use crate::ring::Ring;

/// One decoded frame together with the consumer position it would advance
/// to if accepted.
pub struct Item {
    /// The frame's payload bytes.
    pub payload: Vec<u8>,
    /// Consumer position after this frame (and any preceding wrap
    /// padding) is accepted.
    pub advance_to: u64,
}

/// Reads frames out of `[C, P)` without advancing the durable consumer
/// pointer itself — callers decide when a batch has been durably handled
/// and call [`Consumer::advance`] explicitly (§4.4), so that a crash
/// between decode and handler-commit replays the same frames again.
pub struct Consumer {
    ring: Arc<Ring>,
}

impl Consumer {
    pub(crate) fn new(ring: Arc<Ring>) -> Self {
        Self { ring }
    }

    /// Decodes the next frame starting at `from`, skipping transparently
    /// over a wrap sentinel if one is encountered. Returns
    /// [`ConsumerError::Retry`] if `from == producer_pos` (nothing new to
    /// read).
    pub async fn next_after(&self, from: u64) -> Result<Item, ConsumerError> {
        let mut pos = from;
        loop {
            let produced = self.ring.producer_pos();
            let avail = produced.wrapping_sub(pos);
            if avail == 0 {
                return Err(ConsumerError::Retry);
            }
            let until_wrap = self.ring.bytes_until_wrap(pos);
            let window_len = avail.min(until_wrap) as usize;

            if window_len < frame::LENGTH_PREFIX_LEN {
                // Not even a length prefix fits before the boundary: the
                // whole remainder is implicit wrap padding.
                pos += until_wrap;
                continue;
            }

            let raw = self.ring.read_payload(pos, window_len).await?;
            let decoded = frame::decode(&raw, self.ring.payload_len())?;
            if decoded.payload.is_empty() && decoded.consumed == raw.len() && window_len as u64 == until_wrap {
                // Wrap sentinel: skip to the region boundary and retry.
                pos += until_wrap;
                continue;
            }
            let advance_to = pos + decoded.consumed as u64;
            return Ok(Item {
                payload: decoded.payload.to_vec(),
                advance_to,
            });
        }
    }

    /// Reads every frame currently available starting at `from`, stopping
    /// when the producer pointer is reached. Used by the engine's replay
    /// and drain paths to build a batch for the handler.
    pub async fn read_batch(&self, from: u64) -> Result<Vec<Item>, ConsumerError> {
        let mut items = Vec::new();
        let mut pos = from;
        loop {
            match self.next_after(pos).await {
                Ok(item) => {
                    pos = item.advance_to;
                    items.push(item);
                }
                Err(ConsumerError::Retry) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(items)
    }

    /// Durably advances the consumer pointer to `new_pos`. Must only be
    /// called after every frame in `[old_consumer_pos, new_pos)` has been
    /// durably handled.
    pub(crate) async fn advance(&self, new_pos: u64) -> Result<(), crate::error::DeviceError> {
        self.ring.advance_consumer(new_pos).await
    }

    /// Current durable consumer pointer.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.ring.consumer_pos()
    }

    /// Durably sets the ring's suspend flag (§4.4). Does not wait for the
    /// producer to acknowledge — a push already past its suspend check
    /// may still land.
    pub async fn suspend(&self) -> Result<(), crate::error::DeviceError> {
        self.ring.suspend().await
    }

    /// Durably clears the ring's suspend flag (§4.4).
    pub async fn resume(&self) -> Result<(), crate::error::DeviceError> {
        self.ring.resume().await
    }

    /// `true` if the ring is currently suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.ring.is_suspended()
    }
}
