//! The block-device abstraction the ring is built on.
//!
//! `BlockDevice` uses a native `async fn` in its trait definition, which
//! makes the trait itself not object-safe. [`BlockDeviceBoxed`] is the
//! dyn-compatible counterpart, with a blanket impl covering every
//! `BlockDevice`, following the same split used for `SpanExporter` /
//! `SpanExporterBoxed`.

use std::future::Future;
use std::pin::Pin;

use crate::error::DeviceError;

/// A randomly-addressable, sector-granular block device.
///
/// Implementations are free to be backed by a file, a raw disk, or memory;
/// the ring never assumes anything about the medium beyond sector size and
/// sector count, and the durability guarantee of [`BlockDevice::sync`].
pub trait BlockDevice: Send + Sync {
    /// Size of one sector, in bytes. Constant for the lifetime of the
    /// device.
    fn sector_size(&self) -> usize;

    /// Total number of sectors on the device.
    fn sector_count(&self) -> u64;

    /// Reads `buf.len() / sector_size()` whole sectors starting at sector
    /// `start` into `buf`.
    ///
    /// `buf.len()` must be an exact multiple of [`BlockDevice::sector_size`].
    fn read_sectors(
        &self,
        start: u64,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Writes whole sectors from `buf` starting at sector `start`.
    ///
    /// `buf.len()` must be an exact multiple of [`BlockDevice::sector_size`].
    /// Does not itself guarantee durability; call [`BlockDevice::sync`]
    /// after any write whose durability matters.
    fn write_sectors(
        &self,
        start: u64,
        buf: &[u8],
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Blocks until all writes issued so far are durable.
    fn sync(&self) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe counterpart of [`BlockDevice`], for callers that need
/// `Arc<dyn BlockDeviceBoxed>` rather than a generic parameter.
pub trait BlockDeviceBoxed: Send + Sync {
    /// See [`BlockDevice::sector_size`].
    fn sector_size(&self) -> usize;

    /// See [`BlockDevice::sector_count`].
    fn sector_count(&self) -> u64;

    /// See [`BlockDevice::read_sectors`].
    fn read_sectors_boxed<'a>(&'a self, start: u64, buf: &'a mut [u8]) -> BoxFuture<'a, Result<(), DeviceError>>;

    /// See [`BlockDevice::write_sectors`].
    fn write_sectors_boxed<'a>(&'a self, start: u64, buf: &'a [u8]) -> BoxFuture<'a, Result<(), DeviceError>>;

    /// See [`BlockDevice::sync`].
    fn sync_boxed<'a>(&'a self) -> BoxFuture<'a, Result<(), DeviceError>>;
}

impl<T: BlockDevice> BlockDeviceBoxed for T {
    fn sector_size(&self) -> usize {
        BlockDevice::sector_size(self)
    }

    fn sector_count(&self) -> u64 {
        BlockDevice::sector_count(self)
    }

    fn read_sectors_boxed<'a>(&'a self, start: u64, buf: &'a mut [u8]) -> BoxFuture<'a, Result<(), DeviceError>> {
        Box::pin(BlockDevice::read_sectors(self, start, buf))
    }

    fn write_sectors_boxed<'a>(&'a self, start: u64, buf: &'a [u8]) -> BoxFuture<'a, Result<(), DeviceError>> {
        Box::pin(BlockDevice::write_sectors(self, start, buf))
    }

    fn sync_boxed<'a>(&'a self) -> BoxFuture<'a, Result<(), DeviceError>> {
        Box::pin(BlockDevice::sync(self))
    }
}

/// Checks that `start..start + buf_len/sector_size` sectors fit within
/// `sector_count`, returning [`DeviceError::OutOfBounds`] if not.
pub(crate) fn check_bounds(sector_size: usize, sector_count: u64, start: u64, buf_len: usize) -> Result<(), DeviceError> {
    assert_eq!(buf_len % sector_size, 0, "buffer length must be a sector multiple");
    let count = (buf_len / sector_size) as u64;
    let end = start.checked_add(count).expect("sector range overflow");
    if end > sector_count {
        return Err(DeviceError::OutOfBounds {
            start,
            end,
            capacity: sector_count,
        });
    }
    Ok(())
}

#[cfg(feature = "file-device")]
mod file {
    use std::io::SeekFrom;
    use std::path::Path;

    use tokio::fs::{File, OpenOptions};
    use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
    use tokio::sync::Mutex;

    use super::{check_bounds, BlockDevice, DeviceError};

    /// A [`BlockDevice`] backed by a plain file, sized to a fixed number of
    /// sectors at creation time.
    ///
    /// Durability is provided by `File::sync_data`, which on Unix maps to
    /// `fdatasync` — flushing file contents without necessarily flushing
    /// metadata that the ring does not depend on.
    pub struct FileBlockDevice {
        file: Mutex<File>,
        sector_size: usize,
        sector_count: u64,
    }

    impl FileBlockDevice {
        /// Opens (creating if needed) a file at `path` and resizes it to
        /// hold exactly `sector_count` sectors of `sector_size` bytes.
        pub async fn open(path: impl AsRef<Path>, sector_size: usize, sector_count: u64) -> Result<Self, DeviceError> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .await?;
            let len = sector_size as u64 * sector_count;
            file.set_len(len).await?;
            Ok(Self {
                file: Mutex::new(file),
                sector_size,
                sector_count,
            })
        }
    }

    impl BlockDevice for FileBlockDevice {
        fn sector_size(&self) -> usize {
            self.sector_size
        }

        fn sector_count(&self) -> u64 {
            self.sector_count
        }

        async fn read_sectors(&self, start: u64, buf: &mut [u8]) -> Result<(), DeviceError> {
            check_bounds(self.sector_size, self.sector_count, start, buf.len())?;
            let mut file = self.file.lock().await;
            file.seek(SeekFrom::Start(start * self.sector_size as u64)).await?;
            file.read_exact(buf).await?;
            Ok(())
        }

        async fn write_sectors(&self, start: u64, buf: &[u8]) -> Result<(), DeviceError> {
            check_bounds(self.sector_size, self.sector_count, start, buf.len())?;
            let mut file = self.file.lock().await;
            file.seek(SeekFrom::Start(start * self.sector_size as u64)).await?;
            file.write_all(buf).await?;
            Ok(())
        }

        async fn sync(&self) -> Result<(), DeviceError> {
            let file = self.file.lock().await;
            file.sync_data().await?;
            Ok(())
        }
    }
}

#[cfg(feature = "file-device")]
pub use file::FileBlockDevice;

/// An in-memory [`BlockDevice`], useful for tests that don't need an actual
/// file on disk.
pub struct MemBlockDevice {
    data: tokio::sync::Mutex<Vec<u8>>,
    sector_size: usize,
    sector_count: u64,
}

impl MemBlockDevice {
    /// Creates a zeroed in-memory device with the given geometry.
    #[must_use]
    pub fn new(sector_size: usize, sector_count: u64) -> Self {
        Self {
            data: tokio::sync::Mutex::new(vec![0u8; sector_size * sector_count as usize]),
            sector_size,
            sector_count,
        }
    }
}

impl BlockDevice for MemBlockDevice {
    fn sector_size(&self) -> usize {
        self.sector_size
    }

    fn sector_count(&self) -> u64 {
        self.sector_count
    }

    async fn read_sectors(&self, start: u64, buf: &mut [u8]) -> Result<(), DeviceError> {
        check_bounds(self.sector_size, self.sector_count, start, buf.len())?;
        let data = self.data.lock().await;
        let offset = start as usize * self.sector_size;
        buf.copy_from_slice(&data[offset..offset + buf.len()]);
        Ok(())
    }

    async fn write_sectors(&self, start: u64, buf: &[u8]) -> Result<(), DeviceError> {
        check_bounds(self.sector_size, self.sector_count, start, buf.len())?;
        let mut data = self.data.lock().await;
        let offset = start as usize * self.sector_size;
        data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    async fn sync(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}
