//! The durable ring itself: geometry, pointer state, and the sector-level
//! read/write helpers that [`crate::producer::Producer`] and
//! [`crate::consumer::Consumer`] build on (§2, §3).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::device::BlockDeviceBoxed;
use crate::error::{DeviceError, RingAttachError};
use crate::header::{self, Header};

/// Shared, attached ring state: geometry plus the in-memory cache of the
/// durable producer/consumer pointers.
///
/// The pointer caches (`producer_pos`, `consumer_pos`, `suspended`) are
/// readable lock-free at any time, but every *write* to the durable header
/// — a producer advance, a consumer advance, or a suspend/resume — goes
/// through `header_lock`. The producer advance runs under the engine's
/// push mutex and the consumer advance runs from the unrelated drain-loop
/// task, so without a shared lock here the two read-modify-write the same
/// header sector concurrently, each rebuilding it from a possibly-stale
/// cache of the other pointer; `header_lock` makes the three header
/// writers mutually exclusive so the durable header always reflects the
/// most recent value of whichever pointer it didn't just change.
pub struct Ring {
    device: Arc<dyn BlockDeviceBoxed>,
    header_sectors: u64,
    payload_len: u64,
    producer_pos: AtomicU64,
    consumer_pos: AtomicU64,
    suspended: AtomicBool,
    header_lock: Mutex<()>,
}

impl Ring {
    /// Initializes a fresh ring on `device`, overwriting any existing
    /// header. The device must have at least `config.total_sectors()`
    /// sectors.
    pub async fn create(device: Arc<dyn BlockDeviceBoxed>, config: &Config) -> Result<Self, RingAttachError> {
        if device.sector_count() < config.total_sectors() {
            return Err(RingAttachError::DeviceTooSmall {
                sectors: device.sector_count(),
                header_sectors: config.header_sectors,
            });
        }
        let payload_len = config.payload_len();
        let header = Header::new(payload_len);
        header::write_header(device.as_ref(), config.header_sectors, &header)
            .await
            .map_err(RingAttachError::Io)?;
        Ok(Self {
            device,
            header_sectors: config.header_sectors,
            payload_len,
            producer_pos: AtomicU64::new(0),
            consumer_pos: AtomicU64::new(0),
            suspended: AtomicBool::new(false),
            header_lock: Mutex::new(()),
        })
    }

    /// Attaches to an already-initialized ring, reading its durable header
    /// to recover the last-known producer/consumer pointers.
    pub async fn attach(device: Arc<dyn BlockDeviceBoxed>, header_sectors: u64) -> Result<Self, RingAttachError> {
        let header = header::read_header(device.as_ref(), header_sectors).await?;
        Ok(Self {
            device,
            header_sectors,
            payload_len: header.payload_len,
            producer_pos: AtomicU64::new(header.producer),
            consumer_pos: AtomicU64::new(header.consumer),
            suspended: AtomicBool::new(header.suspended),
            header_lock: Mutex::new(()),
        })
    }

    /// Usable payload region size in bytes (`L`).
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    /// Current cached producer pointer `P`.
    #[must_use]
    pub fn producer_pos(&self) -> u64 {
        self.producer_pos.load(Ordering::Acquire)
    }

    /// Current cached consumer pointer `C`.
    #[must_use]
    pub fn consumer_pos(&self) -> u64 {
        self.consumer_pos.load(Ordering::Acquire)
    }

    /// Bytes currently occupied by unconsumed frames: `P - C`.
    #[must_use]
    pub fn occupied(&self) -> u64 {
        self.producer_pos().wrapping_sub(self.consumer_pos())
    }

    /// Bytes currently free for new frames: `L - (P - C)`.
    #[must_use]
    pub fn free(&self) -> u64 {
        self.payload_len - self.occupied()
    }

    /// Storage offset (0-based, within the payload region) for byte
    /// position `pos`.
    fn offset_of(&self, pos: u64) -> u64 {
        pos % self.payload_len
    }

    /// Sector index (relative to the whole device, i.e. already including
    /// the header) containing payload byte offset `offset`.
    fn sector_of_offset(&self, offset: u64) -> u64 {
        self.header_sectors + offset / self.device.sector_size() as u64
    }

    /// Reads `len` payload bytes starting at linear position `pos`,
    /// without wrapping — callers must ensure `pos..pos+len` does not
    /// cross the region boundary (use [`Ring::bytes_until_wrap`] to size
    /// reads/writes that must respect the boundary).
    ///
    /// Performs a sector-aligned read-modify read: the minimal covering
    /// sector range is read from the device and the requested byte slice
    /// is copied out.
    pub(crate) async fn read_payload(&self, pos: u64, len: usize) -> Result<Vec<u8>, DeviceError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let sector_size = self.device.sector_size();
        let offset = self.offset_of(pos);
        let first_sector = self.sector_of_offset(offset);
        let last_byte_offset = offset + len as u64 - 1;
        let last_sector = self.sector_of_offset(last_byte_offset);
        let sector_span = (last_sector - first_sector + 1) as usize;

        let mut sector_buf = vec![0u8; sector_span * sector_size];
        self.device
            .read_sectors_boxed(first_sector, &mut sector_buf)
            .await?;

        let within_sector_start = (offset % sector_size as u64) as usize;
        Ok(sector_buf[within_sector_start..within_sector_start + len].to_vec())
    }

    /// Writes `bytes` at linear position `pos`, without wrapping (same
    /// boundary contract as [`Ring::read_payload`]).
    ///
    /// Performs a read-modify-write over the minimal covering sector
    /// range so that a write narrower than a sector doesn't clobber
    /// neighboring bytes.
    pub(crate) async fn write_payload(&self, pos: u64, bytes: &[u8]) -> Result<(), DeviceError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let sector_size = self.device.sector_size();
        let offset = self.offset_of(pos);
        let first_sector = self.sector_of_offset(offset);
        let last_byte_offset = offset + bytes.len() as u64 - 1;
        let last_sector = self.sector_of_offset(last_byte_offset);
        let sector_span = (last_sector - first_sector + 1) as usize;

        let mut sector_buf = vec![0u8; sector_span * sector_size];
        self.device
            .read_sectors_boxed(first_sector, &mut sector_buf)
            .await?;

        let within_sector_start = (offset % sector_size as u64) as usize;
        sector_buf[within_sector_start..within_sector_start + bytes.len()].copy_from_slice(bytes);

        self.device
            .write_sectors_boxed(first_sector, &sector_buf)
            .await
    }

    /// Blocks until payload writes issued so far are durable.
    pub(crate) async fn sync_payload(&self) -> Result<(), DeviceError> {
        self.device.sync_boxed().await
    }

    /// Bytes remaining in the payload region before linear position `pos`
    /// would wrap past the region boundary.
    pub(crate) fn bytes_until_wrap(&self, pos: u64) -> u64 {
        self.payload_len - self.offset_of(pos)
    }

    /// Durably advances the producer pointer to `new_pos` and updates the
    /// in-memory cache. Called only after the frame's payload bytes (and
    /// any wrap sentinel) are already durable (§3.3's two-phase protocol).
    pub(crate) async fn advance_producer(&self, new_pos: u64) -> Result<(), DeviceError> {
        let _guard = self.header_lock.lock().await;
        let header = Header {
            version: header::VERSION,
            payload_len: self.payload_len,
            producer: new_pos,
            consumer: self.consumer_pos(),
            suspended: self.is_suspended(),
        };
        header::write_header(self.device.as_ref(), self.header_sectors, &header).await?;
        self.producer_pos.store(new_pos, Ordering::Release);
        Ok(())
    }

    /// Durably advances the consumer pointer to `new_pos` and updates the
    /// in-memory cache. Called only after the handler has durably
    /// accepted every frame up to `new_pos` (§4.4).
    pub(crate) async fn advance_consumer(&self, new_pos: u64) -> Result<(), DeviceError> {
        let _guard = self.header_lock.lock().await;
        let header = Header {
            version: header::VERSION,
            payload_len: self.payload_len,
            producer: self.producer_pos(),
            consumer: new_pos,
            suspended: self.is_suspended(),
        };
        header::write_header(self.device.as_ref(), self.header_sectors, &header).await?;
        self.consumer_pos.store(new_pos, Ordering::Release);
        Ok(())
    }

    /// `true` if the ring is currently suspended (§3.1, §4.4): a suspended
    /// ring rejects new pushes with [`crate::error::ProducerError::Suspended`]
    /// until [`Ring::resume`] is called, durably, on either side of a
    /// restart.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    /// Durably sets the suspend flag (§4.4). Does not wait for the
    /// producer to acknowledge — a push already in flight when this
    /// returns may still land.
    pub(crate) async fn suspend(&self) -> Result<(), DeviceError> {
        self.set_suspended(true).await
    }

    /// Durably clears the suspend flag (§4.4).
    pub(crate) async fn resume(&self) -> Result<(), DeviceError> {
        self.set_suspended(false).await
    }

    async fn set_suspended(&self, value: bool) -> Result<(), DeviceError> {
        let _guard = self.header_lock.lock().await;
        let header = Header {
            version: header::VERSION,
            payload_len: self.payload_len,
            producer: self.producer_pos(),
            consumer: self.consumer_pos(),
            suspended: value,
        };
        header::write_header(self.device.as_ref(), self.header_sectors, &header).await?;
        self.suspended.store(value, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemBlockDevice;

    fn small_config() -> Config {
        crate::config::SMALL_RING_CONFIG
    }

    #[tokio::test]
    async fn create_then_attach_recovers_pointers() {
        let device: Arc<dyn BlockDeviceBoxed> = Arc::new(MemBlockDevice::new(512, 9));
        let cfg = small_config();
        {
            let ring = Ring::create(Arc::clone(&device), &cfg).await.unwrap();
            ring.advance_producer(100).await.unwrap();
            ring.advance_consumer(40).await.unwrap();
        }
        let ring = Ring::attach(device, cfg.header_sectors).await.unwrap();
        assert_eq!(ring.producer_pos(), 100);
        assert_eq!(ring.consumer_pos(), 40);
        assert_eq!(ring.occupied(), 60);
    }

    #[tokio::test]
    async fn write_then_read_payload_round_trips() {
        let device: Arc<dyn BlockDeviceBoxed> = Arc::new(MemBlockDevice::new(512, 9));
        let cfg = small_config();
        let ring = Ring::create(device, &cfg).await.unwrap();

        let bytes = b"hello, ring";
        ring.write_payload(10, bytes).await.unwrap();
        let read = ring.read_payload(10, bytes.len()).await.unwrap();
        assert_eq!(read, bytes);
    }

    #[tokio::test]
    async fn bytes_until_wrap_accounts_for_offset() {
        let device: Arc<dyn BlockDeviceBoxed> = Arc::new(MemBlockDevice::new(512, 9));
        let cfg = small_config();
        let ring = Ring::create(device, &cfg).await.unwrap();
        assert_eq!(ring.bytes_until_wrap(0), 4096);
        assert_eq!(ring.bytes_until_wrap(4090), 6);
        assert_eq!(ring.bytes_until_wrap(4096), 4096);
    }

    use proptest::prelude::*;

    proptest! {
        /// After any sequence of producer/consumer pointer advances that
        /// individually respect the ring's invariants, `0 <= C <= P` and
        /// `P - C <= L` continue to hold (§3.3, §8.1).
        #[test]
        fn pointers_stay_within_bounds(
            ops in proptest::collection::vec((any::<bool>(), 1u64..200), 0..100)
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let cfg = small_config();
                let device: Arc<dyn BlockDeviceBoxed> = Arc::new(MemBlockDevice::new(512, cfg.total_sectors()));
                let ring = Ring::create(device, &cfg).await.unwrap();
                let l = cfg.payload_len();

                for (advance_producer, amount) in ops {
                    if advance_producer {
                        let candidate = ring.producer_pos() + amount;
                        if candidate - ring.consumer_pos() <= l {
                            ring.advance_producer(candidate).await.unwrap();
                        }
                    } else {
                        let candidate = (ring.consumer_pos() + amount).min(ring.producer_pos());
                        ring.advance_consumer(candidate).await.unwrap();
                    }
                    prop_assert!(ring.consumer_pos() <= ring.producer_pos());
                    prop_assert!(ring.producer_pos() - ring.consumer_pos() <= l);
                }
                Ok(())
            })?;
        }
    }
}
