//! The write side of the ring (§3, §4.2).
//!
//! `Producer` is intentionally not `Clone` — the engine serializes all
//! pushes behind a single `tokio::sync::Mutex`, so only one producer-side
//! write is ever in flight at a time, mirroring the single-writer
//! discipline the teacher's in-memory channel enforces for its own
//! `Producer` type.

use std::sync::Arc;

use crate::error::ProducerError;
use crate::frame;
use crate::ring::Ring;

/// Writes framed payloads into the ring, advancing the durable producer
/// pointer only after the frame (and any wrap padding) is durable.
pub struct Producer {
    ring: Arc<Ring>,
}

impl Producer {
    pub(crate) fn new(ring: Arc<Ring>) -> Self {
        Self { ring }
    }

    /// Attempts to push one payload.
    ///
    /// On success, the frame is durable on the device and the durable
    /// producer pointer has been advanced past it; the returned `u64` is
    /// the producer position just past the frame (§4.3), the value a
    /// completion waiter blocks on until the consumer pointer reaches it.
    /// Returns [`ProducerError::Retry`] if there isn't currently enough
    /// free space; the caller is expected to wait for consumer progress
    /// and try again (the engine's `push` loop does this via
    /// [`tokio::sync::Notify`]).
    pub async fn push(&self, payload: &[u8]) -> Result<u64, ProducerError> {
        if payload.is_empty() {
            return Err(ProducerError::EmptyPayload);
        }
        if self.ring.is_suspended() {
            return Err(ProducerError::Suspended);
        }

        let frame = frame::encode(payload);
        let frame_len = frame.len() as u64;
        let capacity = self.ring.payload_len();
        if frame_len > capacity {
            return Err(ProducerError::TooBig {
                frame_len: frame.len(),
                capacity,
            });
        }

        let pos = self.ring.producer_pos();
        let until_wrap = self.ring.bytes_until_wrap(pos);

        let (needed, new_pos) = if frame_len <= until_wrap {
            (frame_len, pos + frame_len)
        } else {
            (until_wrap + frame_len, pos + until_wrap + frame_len)
        };

        if needed > self.ring.free() {
            return Err(ProducerError::Retry);
        }

        if frame_len <= until_wrap {
            self.ring.write_payload(pos, &frame).await?;
        } else if until_wrap >= frame::LENGTH_PREFIX_LEN as u64 {
            self.ring
                .write_payload(pos, &frame::WRAP_SENTINEL.to_le_bytes())
                .await?;
            self.ring.write_payload(pos + until_wrap, &frame).await?;
        } else {
            // Fewer bytes than a length prefix remain before the
            // boundary: there's no room to write a sentinel without
            // spilling past the payload region (`Ring::write_payload`
            // never wraps). The consumer already treats a window this
            // short as implicit padding (`Consumer::next_after`), so
            // just leave it unwritten and place the frame at the
            // wrapped offset.
            self.ring.write_payload(pos + until_wrap, &frame).await?;
        }
        self.ring.sync_payload().await?;
        self.ring.advance_producer(new_pos).await?;
        Ok(new_pos)
    }

    /// Bytes currently free for new frames.
    #[must_use]
    pub fn free_space(&self) -> u64 {
        self.ring.free()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SMALL_RING_CONFIG;
    use crate::device::{BlockDeviceBoxed, MemBlockDevice};

    async fn new_ring() -> Arc<Ring> {
        let device: Arc<dyn BlockDeviceBoxed> = Arc::new(MemBlockDevice::new(512, 9));
        Arc::new(Ring::create(device, &SMALL_RING_CONFIG).await.unwrap())
    }

    #[tokio::test]
    async fn pushes_small_frame_without_wrap() {
        let ring = new_ring().await;
        let producer = Producer::new(Arc::clone(&ring));
        producer.push(b"hello").await.unwrap();
        assert_eq!(ring.producer_pos(), frame::framed_len(5) as u64);
    }

    #[tokio::test]
    async fn rejects_empty_payload() {
        let ring = new_ring().await;
        let producer = Producer::new(ring);
        let err = producer.push(b"").await.unwrap_err();
        assert!(matches!(err, ProducerError::EmptyPayload));
    }

    #[tokio::test]
    async fn rejects_oversized_payload() {
        let ring = new_ring().await;
        let producer = Producer::new(ring);
        let huge = vec![0u8; 5000];
        let err = producer.push(&huge).await.unwrap_err();
        assert!(matches!(err, ProducerError::TooBig { .. }));
    }

    #[tokio::test]
    async fn retries_when_ring_is_full() {
        let ring = new_ring().await;
        let producer = Producer::new(Arc::clone(&ring));
        // payload_len is 4096; push frames until no more fit.
        let payload = vec![0u8; 100];
        loop {
            match producer.push(&payload).await {
                Ok(_) => continue,
                Err(ProducerError::Retry) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }

    #[tokio::test]
    async fn suspend_blocks_pushes_until_resumed() {
        let ring = new_ring().await;
        let producer = Producer::new(Arc::clone(&ring));
        ring.suspend().await.unwrap();
        assert!(matches!(producer.push(b"x").await, Err(ProducerError::Suspended)));
        ring.resume().await.unwrap();
        producer.push(b"x").await.unwrap();
    }

    #[tokio::test]
    async fn wraps_with_sentinel_when_frame_does_not_fit_before_boundary() {
        let ring = new_ring().await;
        let producer = Producer::new(Arc::clone(&ring));
        // payload_len = 4096. Push a frame that leaves less room than the
        // next frame needs, forcing a wrap.
        let filler_len = 4096 - frame::framed_len(10) - 2;
        producer.push(&vec![1u8; filler_len]).await.unwrap();
        let until_wrap = ring.bytes_until_wrap(ring.producer_pos());
        assert!(until_wrap < frame::framed_len(10) as u64);

        producer.push(&vec![2u8; 10]).await.unwrap();
        // producer pos should have wrapped past the region boundary once.
        assert!(ring.producer_pos() > 4096);
    }

    #[tokio::test]
    async fn wraps_without_a_sentinel_when_less_than_a_length_prefix_remains() {
        let ring = new_ring().await;
        let producer = Producer::new(Arc::clone(&ring));
        // payload_len = 4096. A 4086-byte payload frames to 4094 bytes,
        // leaving only 2 bytes before the boundary — not enough room for
        // even the 4-byte wrap sentinel.
        producer.push(&vec![1u8; 4086]).await.unwrap();
        let until_wrap = ring.bytes_until_wrap(ring.producer_pos());
        assert_eq!(until_wrap, 2);

        // Must not try to write a 4-byte sentinel into a 2-byte gap.
        producer.push(b"next").await.unwrap();
        assert!(ring.producer_pos() > 4096);
    }
}
