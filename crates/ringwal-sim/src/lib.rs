//! Deterministic crash-injection testing for `ringwal`.
//!
//! [`CrashInjectingDevice`] wraps any `ringwal` [`ringwal::device::BlockDevice`]
//! and lets a caller choose exactly how many sector writes land before the
//! device stops accepting more, modeling a crash at a precise point in the
//! write stream instead of actually killing a process. [`run_crash_sweep`]
//! drives one workload through such a device at a chosen crash point and
//! reattaches a fresh journal against whatever survived, the same shape a
//! real restart-after-crash takes.
//!
//! A test that sweeps `crash_after` across every write count a workload
//! issues exercises "crash right after any single `write_sectors` call"
//! exhaustively — which, because every push and every consumer commit
//! reduces to one or two payload writes followed by exactly one header
//! write, covers both halves of the two-phase durability protocol's crash
//! window: payload durable but pointer not yet advanced, and neither
//! durable yet.

pub mod device;
pub mod scenario;

pub use device::CrashInjectingDevice;
pub use scenario::{run_crash_sweep, run_full_sweep, CollectingHandler, CrashPointResult, CrashSweepReport};
