//! The journal engine: ties the ring, codec, and handler together into the
//! single public entry point described in §4.5.
//!
//! Concurrency follows the teacher's `ringmpsc-stream` shape: a push-side
//! `tokio::sync::Mutex` serializes writers, a pair of `tokio::sync::Notify`
//! handles wake a blocked pusher when space frees up and wake the drain
//! loop when new data lands, and shutdown is cooperative — a flag plus an
//! awaited `JoinHandle`, never a detached task (§1.1, §9).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::codec::OperationCodec;
use crate::config::Config;
use crate::consumer::Consumer;
use crate::device::BlockDeviceBoxed;
use crate::error::{JournalError, ProducerError};
use crate::handler::JournalHandlerBoxed;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::producer::Producer;
use crate::ring::Ring;

/// How long the drain loop waits on its own timer between notifications,
/// as a backstop against a missed wakeup (mirrors the teacher's
/// belt-and-suspenders polling alongside `Notify`).
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long the drain loop waits before retrying a batch the handler
/// rejected, so a failing handler doesn't spin a CPU core.
const HANDLER_RETRY_BACKOFF: Duration = Duration::from_millis(100);

struct Shared {
    ring: Arc<Ring>,
    push_mutex: Mutex<Producer>,
    data_notify: Notify,
    space_notify: Notify,
    metrics: Metrics,
    metrics_enabled: bool,
    please_shutdown: AtomicBool,
    failed: AtomicBool,
}

impl Shared {
    fn record(&self, f: impl FnOnce(&Metrics)) {
        if self.metrics_enabled {
            f(&self.metrics);
        }
    }
}

/// Returned by [`Journal::push`]; blocks until the pushed operation has
/// been durably consumed, i.e. `C_done >= position` (§4.5.2, §6.4).
///
/// Dropping a `CompletionWaiter` without calling [`CompletionWaiter::wait`]
/// is harmless — the push it reports on already happened; this is purely
/// an opt-in confirmation that the handler has applied it.
#[must_use = "a CompletionWaiter does nothing until `.wait()` is awaited"]
pub struct CompletionWaiter {
    shared: Arc<Shared>,
    position: u64,
}

impl CompletionWaiter {
    /// Blocks until the handler has processed the pushed item and the
    /// consumer pointer has been durably advanced past it, or until the
    /// engine enters its failed state (in which case this returns without
    /// the item ever having been applied — callers should check
    /// [`Journal::is_failed`] after a failed wait if that distinction
    /// matters).
    pub async fn wait(&self) {
        loop {
            if self.shared.ring.consumer_pos() >= self.position {
                return;
            }
            if self.shared.failed.load(Ordering::Acquire) {
                return;
            }
            tokio::select! {
                () = self.shared.space_notify.notified() => {}
                () = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
            }
        }
    }

    /// The producer position this waiter is blocking on.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }
}

/// A running write-ahead journal.
///
/// Cloning a `Journal` shares the same underlying engine and background
/// drain task; drop all clones (or call [`Journal::shutdown`] explicitly)
/// to stop it.
pub struct Journal<T> {
    shared: Arc<Shared>,
    codec: Arc<dyn OperationCodec<T>>,
    drain_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<T> Clone for Journal<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            codec: Arc::clone(&self.codec),
            drain_task: Arc::clone(&self.drain_task),
        }
    }
}

impl<T: Send + Sync + 'static> Journal<T> {
    /// Creates a fresh ring on `device` and starts the journal on it.
    pub async fn create(
        device: Arc<dyn BlockDeviceBoxed>,
        config: Config,
        codec: Arc<dyn OperationCodec<T>>,
        handler: Arc<dyn JournalHandlerBoxed<T>>,
    ) -> Result<Self, JournalError> {
        let enable_metrics = config.enable_metrics;
        let ring = Arc::new(Ring::create(device, &config).await?);
        Ok(Self::start_with_ring(ring, enable_metrics, codec, handler))
    }

    /// Attaches to an existing ring on `device`, recovering the durable
    /// producer/consumer pointers from its header, and starts the
    /// journal's drain loop from the recovered consumer position — which
    /// is exactly how crash recovery happens: there is no separate replay
    /// phase distinct from steady-state draining (§4.5).
    pub async fn attach(
        device: Arc<dyn BlockDeviceBoxed>,
        header_sectors: u64,
        enable_metrics: bool,
        codec: Arc<dyn OperationCodec<T>>,
        handler: Arc<dyn JournalHandlerBoxed<T>>,
    ) -> Result<Self, JournalError> {
        let ring = Arc::new(Ring::attach(device, header_sectors).await?);
        Ok(Self::start_with_ring(ring, enable_metrics, codec, handler))
    }

    fn start_with_ring(
        ring: Arc<Ring>,
        enable_metrics: bool,
        codec: Arc<dyn OperationCodec<T>>,
        handler: Arc<dyn JournalHandlerBoxed<T>>,
    ) -> Self {
        let producer = Producer::new(Arc::clone(&ring));
        let consumer = Consumer::new(Arc::clone(&ring));

        let shared = Arc::new(Shared {
            ring,
            push_mutex: Mutex::new(producer),
            data_notify: Notify::new(),
            space_notify: Notify::new(),
            metrics: Metrics::new(),
            metrics_enabled: enable_metrics,
            please_shutdown: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        });

        let task_shared = Arc::clone(&shared);
        let task_codec = Arc::clone(&codec);
        let drain_task = tokio::spawn(drain_loop(task_shared, consumer, task_codec, handler));

        Self {
            shared,
            codec,
            drain_task: Arc::new(Mutex::new(Some(drain_task))),
        }
    }

    /// Encodes and durably appends one operation, retrying internally
    /// while the ring is full until space frees up (§4.2), and returns a
    /// [`CompletionWaiter`] the caller can await to block until the
    /// handler has actually applied it (§4.5.2, §6.4). Durable append and
    /// handler application are distinct events — this call only blocks
    /// for the former; await the returned waiter for the latter.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Shutdown`] if shutdown has begun,
    /// [`JournalError::Failed`] if the engine has already hit a fatal
    /// replay error, [`JournalError::TooBig`] if the encoded operation can
    /// never fit in the ring, and [`JournalError::Io`] for a block-device
    /// failure (the engine remains usable after an `Io` error from
    /// `push`).
    pub async fn push(&self, op: &T) -> Result<CompletionWaiter, JournalError> {
        if self.shared.failed.load(Ordering::Acquire) {
            return Err(JournalError::Failed);
        }
        if self.shared.please_shutdown.load(Ordering::Acquire) {
            return Err(JournalError::Shutdown);
        }

        let bytes = self
            .codec
            .encode(op)
            .map_err(|e| JournalError::Parse(e.to_string()))?;

        loop {
            let producer = self.shared.push_mutex.lock().await;
            match producer.push(&bytes).await {
                Ok(position) => {
                    drop(producer);
                    let frame_bytes = bytes.len() as u64;
                    self.shared.record(|m| {
                        m.add_push();
                        m.add_bytes_written(frame_bytes);
                    });
                    self.shared.data_notify.notify_waiters();
                    return Ok(CompletionWaiter {
                        shared: Arc::clone(&self.shared),
                        position,
                    });
                }
                Err(ProducerError::Retry) => {
                    drop(producer);
                    self.shared.record(Metrics::add_push_retry);
                }
                Err(ProducerError::TooBig { frame_len, capacity }) => {
                    return Err(JournalError::TooBig { frame_len, capacity });
                }
                Err(ProducerError::Suspended) => {
                    drop(producer);
                    self.shared.record(Metrics::add_push_retry);
                }
                Err(ProducerError::EmptyPayload) => {
                    return Err(JournalError::Parse("codec produced an empty frame".to_string()));
                }
                Err(ProducerError::Io(e)) => {
                    return Err(JournalError::Io(e));
                }
            }

            if self.shared.please_shutdown.load(Ordering::Acquire) {
                return Err(JournalError::Shutdown);
            }
            // Wait for the drain loop to free space (or for a suspend to
            // be lifted) before retrying. A timeout backstop covers the
            // race where space frees between the failed push above and
            // this wait starting — `Notify::notify_waiters` only wakes
            // tasks already parked, not ones that arrive afterward.
            tokio::select! {
                () = self.shared.space_notify.notified() => {}
                () = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
            }
        }
    }

    /// Begins a graceful shutdown: no further pushes are accepted, and
    /// this call waits for the drain loop to finish handling everything
    /// already durable before returning.
    pub async fn shutdown(&self) {
        self.shared.please_shutdown.store(true, Ordering::Release);
        self.shared.data_notify.notify_waiters();
        let mut slot = self.drain_task.lock().await;
        if let Some(handle) = slot.take() {
            if let Err(e) = handle.await {
                eprintln!("ringwal: drain task panicked during shutdown: {e}");
            }
        }
    }

    /// `true` if the engine has hit a fatal replay error and can no
    /// longer make progress (§7).
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.shared.failed.load(Ordering::Acquire)
    }

    /// A snapshot of the engine's running counters. Counters are zeroed
    /// throughout if [`Config::enable_metrics`] was `false` at start time
    /// — this call itself is always cheap either way.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Current durable producer pointer, mostly useful for tests and
    /// diagnostics.
    #[must_use]
    pub fn producer_pos(&self) -> u64 {
        self.shared.ring.producer_pos()
    }

    /// Current durable consumer pointer.
    #[must_use]
    pub fn consumer_pos(&self) -> u64 {
        self.shared.ring.consumer_pos()
    }
}

async fn drain_loop<T: Send + Sync + 'static>(
    shared: Arc<Shared>,
    consumer: Consumer,
    codec: Arc<dyn OperationCodec<T>>,
    handler: Arc<dyn JournalHandlerBoxed<T>>,
) {
    loop {
        if shared.failed.load(Ordering::Acquire) {
            return;
        }

        let batch = match consumer.read_batch(consumer.position()).await {
            Ok(batch) => batch,
            Err(e) => {
                eprintln!("ringwal: fatal framing error during replay: {e}");
                shared.failed.store(true, Ordering::Release);
                return;
            }
        };

        if batch.is_empty() {
            if shared.please_shutdown.load(Ordering::Acquire) {
                return;
            }
            tokio::select! {
                () = shared.data_notify.notified() => {}
                () = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
            }
            continue;
        }

        let mut decoded = Vec::with_capacity(batch.len());
        for item in &batch {
            match codec.decode(&item.payload) {
                Ok(op) => decoded.push(op),
                Err(e) => {
                    eprintln!("ringwal: fatal decode error during replay: {e}");
                    shared.failed.store(true, Ordering::Release);
                    return;
                }
            }
        }

        let advance_to = batch.last().expect("batch checked non-empty above").advance_to;
        match handler.handle_batch_boxed(&decoded).await {
            Ok(()) => {
                if let Err(e) = consumer.advance(advance_to).await {
                    eprintln!("ringwal: fatal i/o error advancing consumer pointer: {e}");
                    shared.failed.store(true, Ordering::Release);
                    return;
                }
                let frame_count = decoded.len() as u64;
                shared.record(|m| {
                    m.add_replayed_batch();
                    m.add_replayed_frames(frame_count);
                });
                shared.space_notify.notify_waiters();
            }
            Err(msg) => {
                eprintln!("ringwal: handler rejected a batch of {} item(s): {msg}", decoded.len());
                shared.record(Metrics::add_handler_failure);
                tokio::time::sleep(HANDLER_RETRY_BACKOFF).await;
            }
        }
    }
}
