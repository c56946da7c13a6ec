//! A [`BlockDevice`] decorator that can be told to stop accepting writes
//! after a fixed number of sector writes, modeling a crash mid-stream.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use ringwal::device::BlockDevice;
use ringwal::error::DeviceError;

/// Sentinel meaning "never crash" for [`CrashInjectingDevice`]'s
/// crash-point counter, which otherwise has to be an `AtomicU64` so the
/// point can be armed after construction (see [`CrashInjectingDevice::arm`]).
const NEVER: u64 = u64::MAX;

/// Wraps an inner [`BlockDevice`] and fails every write once a configured
/// number of writes have already gone through.
///
/// Every producer push and every consumer commit in `ringwal` boils down
/// to a small, fixed count of `write_sectors` calls — one or two payload
/// writes followed by exactly one header write (§3.3, §4.4). Picking
/// `crash_after = N` and letting a workload run to completion against this
/// device therefore reproduces "the process died right after the Nth
/// sector write landed" deterministically; sweeping `N` across every
/// value from `0` to the total write count a workload issues covers every
/// point at which a crash could have interrupted a two-phase write,
/// without ever killing a real process.
///
/// Reads are never faulted: bytes that made it through `write_sectors`
/// before the crash threshold stay exactly as written, the same way bytes
/// already on disk survive a real power loss.
pub struct CrashInjectingDevice<D> {
    inner: D,
    crash_after: AtomicU64,
    writes_issued: AtomicU64,
    crashed: AtomicBool,
}

impl<D> CrashInjectingDevice<D> {
    /// Wraps `inner` with no crash point configured; behaves exactly like
    /// `inner` until [`CrashInjectingDevice::arm`] is called.
    #[must_use]
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            crash_after: AtomicU64::new(NEVER),
            writes_issued: AtomicU64::new(0),
            crashed: AtomicBool::new(false),
        }
    }

    /// Wraps `inner`, failing every `write_sectors` call after the
    /// `crash_after`-th one has already succeeded.
    #[must_use]
    pub fn with_crash_after(inner: D, crash_after: u64) -> Self {
        Self {
            inner,
            crash_after: AtomicU64::new(crash_after),
            writes_issued: AtomicU64::new(0),
            crashed: AtomicBool::new(false),
        }
    }

    /// (Re-)arms the crash point: the next write once
    /// [`CrashInjectingDevice::writes_issued`] exceeds `crash_after` fails.
    ///
    /// Lets a caller finish some unconditionally-must-succeed setup (like
    /// initializing a ring's header) before turning on fault injection,
    /// by arming relative to the writes already issued — e.g.
    /// `device.arm(device.writes_issued() + n)` crashes after `n` more
    /// writes land.
    pub fn arm(&self, crash_after: u64) {
        self.crash_after.store(crash_after, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
    }

    /// Total `write_sectors` calls that have reached this device so far,
    /// including ones that were rejected because the crash point had
    /// already passed.
    #[must_use]
    pub fn writes_issued(&self) -> u64 {
        self.writes_issued.load(Ordering::SeqCst)
    }

    /// `true` once the configured crash point has been reached.
    #[must_use]
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    fn simulated_crash_error() -> DeviceError {
        DeviceError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "simulated crash: device stopped accepting writes",
        ))
    }
}

impl<D: BlockDevice> BlockDevice for CrashInjectingDevice<D> {
    fn sector_size(&self) -> usize {
        self.inner.sector_size()
    }

    fn sector_count(&self) -> u64 {
        self.inner.sector_count()
    }

    async fn read_sectors(&self, start: u64, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.inner.read_sectors(start, buf).await
    }

    async fn write_sectors(&self, start: u64, buf: &[u8]) -> Result<(), DeviceError> {
        let issued = self.writes_issued.fetch_add(1, Ordering::SeqCst) + 1;
        if issued > self.crash_after.load(Ordering::SeqCst) {
            self.crashed.store(true, Ordering::SeqCst);
            return Err(Self::simulated_crash_error());
        }
        self.inner.write_sectors(start, buf).await
    }

    async fn sync(&self) -> Result<(), DeviceError> {
        if self.crashed.load(Ordering::SeqCst) {
            return Err(Self::simulated_crash_error());
        }
        self.inner.sync().await
    }
}
