//! The fixed-size header stored in the ring's first [`Config::header_sectors`]
//! sectors (§3.1, §6.5).
//!
//! [`Config::header_sectors`]: crate::config::Config::header_sectors

use crate::error::{DeviceError, RingAttachError};

/// Magic bytes identifying an initialized ring header.
const MAGIC: [u8; 4] = *b"RWAL";

/// The only on-disk layout this build understands: sentinel-zero wrap,
/// length+payload+CRC32 framing (§6.5).
pub const VERSION: u32 = 1;

/// Byte length of the encoded header. Must not exceed
/// `header_sectors * sector_size`.
pub const ENCODED_LEN: usize = 4 + 4 + 8 + 8 + 8 + 1;

/// The durable producer/consumer pointers and ring identity.
///
/// `producer` and `consumer` are monotonically increasing byte counts, not
/// offsets — the storage offset of a position `pos` is `pos % payload_len`
/// (§2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// On-disk layout version.
    pub version: u32,
    /// Size of the payload region in bytes (`L`), fixed at `create` time.
    pub payload_len: u64,
    /// Monotonic producer pointer `P`.
    pub producer: u64,
    /// Monotonic consumer pointer `C`.
    pub consumer: u64,
    /// Suspend/resume flag (§3.1, §4.4). Set by [`Consumer::suspend`] and
    /// cleared by [`Consumer::resume`], surviving a crash so a suspended
    /// ring stays suspended after restart until explicitly resumed.
    ///
    /// [`Consumer::suspend`]: crate::consumer::Consumer::suspend
    /// [`Consumer::resume`]: crate::consumer::Consumer::resume
    pub suspended: bool,
}

impl Header {
    /// Builds a fresh header for a newly-created ring.
    pub(crate) fn new(payload_len: u64) -> Self {
        Self {
            version: VERSION,
            payload_len,
            producer: 0,
            consumer: 0,
            suspended: false,
        }
    }

    /// Encodes the header into `buf`, which must be at least
    /// [`ENCODED_LEN`] bytes. Unused trailing bytes (out to the sector
    /// boundary) are left untouched by this call; callers zero-fill the
    /// sector before encoding into it.
    pub(crate) fn encode(&self, buf: &mut [u8]) {
        assert!(buf.len() >= ENCODED_LEN, "header buffer too small");
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[16..24].copy_from_slice(&self.producer.to_le_bytes());
        buf[24..32].copy_from_slice(&self.consumer.to_le_bytes());
        buf[32] = u8::from(self.suspended);
    }

    /// Decodes a header from `buf`, validating the magic and version.
    pub(crate) fn decode(buf: &[u8]) -> Result<Self, RingAttachError> {
        assert!(buf.len() >= ENCODED_LEN, "header buffer too small");
        if buf[0..4] != MAGIC {
            return Err(RingAttachError::NotInitialized);
        }
        let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        if version != VERSION {
            return Err(RingAttachError::UnsupportedVersion(version));
        }
        let payload_len = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let producer = u64::from_le_bytes(buf[16..24].try_into().unwrap());
        let consumer = u64::from_le_bytes(buf[24..32].try_into().unwrap());
        let suspended = buf[32] != 0;
        Ok(Self {
            version,
            payload_len,
            producer,
            consumer,
            suspended,
        })
    }
}

/// Reads and decodes the header from the first `header_sectors` sectors of
/// `device`.
pub(crate) async fn read_header(
    device: &(impl crate::device::BlockDevice + ?Sized),
    header_sectors: u64,
) -> Result<Header, RingAttachError> {
    let sector_size = device.sector_size();
    let sector_count = device.sector_count();
    if sector_count < header_sectors {
        return Err(RingAttachError::DeviceTooSmall {
            sectors: sector_count,
            header_sectors,
        });
    }
    let mut buf = vec![0u8; sector_size * header_sectors as usize];
    device
        .read_sectors(0, &mut buf)
        .await
        .map_err(RingAttachError::Io)?;
    Header::decode(&buf)
}

/// Encodes and durably writes `header` to the first `header_sectors`
/// sectors of `device`.
pub(crate) async fn write_header(
    device: &(impl crate::device::BlockDevice + ?Sized),
    header_sectors: u64,
    header: &Header,
) -> Result<(), DeviceError> {
    let sector_size = device.sector_size();
    let mut buf = vec![0u8; sector_size * header_sectors as usize];
    header.encode(&mut buf);
    device.write_sectors(0, &buf).await?;
    device.sync().await
}
