//! A reusable crash-sweep harness: push a fixed workload through a
//! [`CrashInjectingDevice`] at every possible crash point, then reattach a
//! fresh journal against the surviving bytes and check recovery held.

use std::sync::{Arc, Mutex};

use ringwal::codec::RawBytesCodec;
use ringwal::config::Config;
use ringwal::device::{BlockDevice, MemBlockDevice};
use ringwal::handler::JournalHandler;
use ringwal::Journal;

use crate::device::CrashInjectingDevice;

/// Collects every batch a [`Journal`] hands it, in delivery order.
///
/// Delivery order is not necessarily the push order across independent
/// producers, but for the single-producer sweep this harness drives it is
/// — which is what the report's duplicate/missing checks rely on.
pub struct CollectingHandler {
    received: Mutex<Vec<Vec<u8>>>,
}

impl CollectingHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().expect("poisoned").clone()
    }
}

impl Default for CollectingHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl JournalHandler<Vec<u8>> for CollectingHandler {
    async fn handle_batch(&self, batch: &[Vec<u8>]) -> Result<(), String> {
        self.received.lock().expect("poisoned").extend_from_slice(batch);
        Ok(())
    }
}

/// A handler that never returns, used to pin the consumer pointer at its
/// starting position for the duration of a crashing run.
///
/// Without this, the background drain loop can race ahead of the
/// injected crash and durably commit some items before the crash point is
/// even reached, which would make "what the recovery run replays" a
/// suffix of `payloads` starting wherever the first run's consumer left
/// off rather than a clean prefix. Pinning the consumer keeps every
/// durably-pushed item undrained until the crashing run ends, so the
/// recovery run's replay is exactly the prefix of `payloads` that made it
/// to disk before the crash — nothing more, nothing less.
struct BlockingHandler;

impl JournalHandler<Vec<u8>> for BlockingHandler {
    async fn handle_batch(&self, _batch: &[Vec<u8>]) -> Result<(), String> {
        std::future::pending().await
    }
}

/// Outcome of one [`run_crash_sweep`] point.
#[derive(Debug, Clone)]
pub struct CrashPointResult {
    /// The crash point this result is for (writes allowed through).
    pub crash_after: u64,
    /// Writes the crashing run actually issued before it gave up (equal
    /// to `crash_after` if the workload needed more writes than that, or
    /// fewer if the whole workload fit in `crash_after` writes and never
    /// hit the injected failure at all).
    pub writes_issued: u64,
    /// Items the recovered journal's handler observed after reattaching.
    pub recovered_items: Vec<Vec<u8>>,
}

/// Summary across every crash point a sweep tried.
#[derive(Debug, Clone)]
pub struct CrashSweepReport {
    pub points: Vec<CrashPointResult>,
}

/// Runs `payloads` through a fresh ring, killing the device after exactly
/// `crash_after` sector writes, then reattaches a clean (non-crashing)
/// journal against the same bytes and drains it to completion.
///
/// The crashing run's own handler never lets the consumer pointer move
/// (see [`BlockingHandler`]), so everything durably appended before the
/// crash is still undrained when the recovery run starts. That makes
/// `recovered_items` exactly equal to the prefix of `payloads` whose
/// frames made it to disk before the injected crash (§8.1, §8.3.3) — no
/// reordering, no gaps, and no duplicates, since the recovery run never
/// crashes mid-replay.
pub async fn run_crash_sweep(config: Config, payloads: &[Vec<u8>], crash_after: u64) -> CrashPointResult {
    let raw = MemBlockDevice::new(config.sector_size, config.total_sectors());
    // Unarmed at first: initializing the ring's header must always
    // succeed, or there would be nothing to crash mid-operation against.
    // `crash_after` is counted from the writes the actual workload below
    // issues, not from this setup write.
    let crashing: Arc<CrashInjectingDevice<MemBlockDevice>> = Arc::new(CrashInjectingDevice::new(raw));

    {
        let journal = Journal::<Vec<u8>>::create(Arc::clone(&crashing), config, Arc::new(RawBytesCodec), Arc::new(BlockingHandler))
            .await
            .expect("create against a fresh, not-yet-crashed device cannot fail");
        crashing.arm(crashing.writes_issued().saturating_add(crash_after));

        for payload in payloads {
            // A push racing the injected crash point is expected to fail;
            // that's the point of the sweep. Anything durable before the
            // failure must still be there once we reattach below.
            let _ = journal.push(payload).await;
        }
        // Dropped without shutdown(): simulates the process dying with
        // the background drain loop still (maybe) running.
    }

    let writes_issued = crashing.writes_issued();

    // Reattach through a non-crashing device sharing the same bytes —
    // `CrashInjectingDevice::new` with no crash point configured passes
    // every call straight through, so this models a fresh, healthy
    // process starting up against the disk image left behind.
    let recovering = Arc::new(CrashInjectingDevice::new(inner_snapshot(&crashing).await));
    let handler = Arc::new(CollectingHandler::new());
    let journal = Journal::<Vec<u8>>::attach(
        recovering,
        config.header_sectors,
        config.enable_metrics,
        Arc::new(RawBytesCodec),
        Arc::clone(&handler),
    )
    .await
    .expect("attach against a valid header cannot fail");

    // Let the drain loop run to quiescence: nothing more will ever land
    // on this device, so once the consumer catches up to the producer
    // there is nothing left to wait for.
    for _ in 0..200 {
        if journal.consumer_pos() >= journal.producer_pos() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    journal.shutdown().await;

    CrashPointResult {
        crash_after,
        writes_issued,
        recovered_items: handler.received(),
    }
}

/// Runs [`run_crash_sweep`] once for every crash point in `0..=max_writes`,
/// exhaustively covering every point at which a crash could land in the
/// write stream `payloads` produces (§8.1, §8.3.3). `max_writes` should be
/// comfortably above the total `write_sectors` calls the workload could
/// ever issue; points past the workload's natural completion just recover
/// everything and add no further coverage.
pub async fn run_full_sweep(config: Config, payloads: &[Vec<u8>], max_writes: u64) -> CrashSweepReport {
    let mut points = Vec::with_capacity((max_writes + 1) as usize);
    for crash_after in 0..=max_writes {
        points.push(run_crash_sweep(config, payloads, crash_after).await);
    }
    CrashSweepReport { points }
}

/// Reads out a full copy of the bytes behind a [`CrashInjectingDevice`]
/// wrapping a [`MemBlockDevice`], as a fresh [`MemBlockDevice`] with no
/// crash point — standing in for "plug the same disk into a machine that
/// isn't crashing". Reads never fault (only writes do), so this succeeds
/// even after `device` has already crashed.
async fn inner_snapshot(device: &CrashInjectingDevice<MemBlockDevice>) -> MemBlockDevice {
    let sector_size = device.sector_size();
    let sector_count = device.sector_count();
    let snapshot = MemBlockDevice::new(sector_size, sector_count);

    let mut buf = vec![0u8; sector_size * sector_count as usize];
    device.read_sectors(0, &mut buf).await.expect("reading a crashed device never fails");
    snapshot.write_sectors(0, &buf).await.expect("writing a fresh device never fails");
    snapshot
}
