//! End-to-end integration tests against an in-memory block device,
//! covering the scenarios in spec §8.3.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ringwal::codec::RawBytesCodec;
use ringwal::config::Config;
use ringwal::device::{BlockDeviceBoxed, MemBlockDevice};
use ringwal::error::JournalError;
use ringwal::handler::JournalHandler;
use ringwal::{frame, Journal};
use tokio::sync::Mutex;

struct CollectingHandler {
    received: Mutex<Vec<Vec<u8>>>,
}

impl CollectingHandler {
    fn new() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
        }
    }
}

impl JournalHandler<Vec<u8>> for CollectingHandler {
    async fn handle_batch(&self, batch: &[Vec<u8>]) -> Result<(), String> {
        let mut received = self.received.lock().await;
        received.extend(batch.iter().cloned());
        Ok(())
    }
}

fn mem_device(sector_size: usize, sector_count: u64) -> Arc<dyn BlockDeviceBoxed> {
    Arc::new(MemBlockDevice::new(sector_size, sector_count))
}

/// Scenario 1: round-trip a single item through a small ring.
#[tokio::test]
async fn round_trip_single_item() {
    let handler = Arc::new(CollectingHandler::new());
    let journal = Journal::<Vec<u8>>::create(
        mem_device(512, 9), // 512-byte header + 4096-byte payload
        Config::default(),
        Arc::new(RawBytesCodec),
        handler.clone(),
    )
    .await
    .unwrap();

    let waiter = journal.push(&b"hello".to_vec()).await.unwrap();
    waiter.wait().await;

    assert_eq!(journal.consumer_pos(), journal.producer_pos());
    let received = handler.received.lock().await;
    assert_eq!(*received, vec![b"hello".to_vec()]);
    journal.shutdown().await;
}

/// Scenario 4: an oversized item is rejected and the producer pointer is
/// untouched.
#[tokio::test]
async fn too_big_item_is_rejected_without_advancing_producer() {
    let handler = Arc::new(CollectingHandler::new());
    // header_sectors=1, payload_sectors=1 => L = 512 bytes.
    let config = Config::new(512, 1, 1, false);
    let journal = Journal::<Vec<u8>>::create(mem_device(512, 2), config, Arc::new(RawBytesCodec), handler)
        .await
        .unwrap();

    let before = journal.producer_pos();
    let huge = vec![0u8; 1024];
    let err = journal.push(&huge).await.unwrap_err();
    assert!(matches!(err, JournalError::TooBig { .. }));
    assert_eq!(journal.producer_pos(), before);
    journal.shutdown().await;
}

/// A push that leaves fewer than a length-prefix's worth of bytes before
/// the payload region boundary must still wrap cleanly instead of trying
/// to write a wrap sentinel past the end of the region.
#[tokio::test]
async fn wraps_cleanly_when_less_than_a_length_prefix_remains_before_the_boundary() {
    let handler = Arc::new(CollectingHandler::new());
    let journal = Journal::<Vec<u8>>::create(
        mem_device(512, 9), // default 4096-byte payload region
        Config::default(),
        Arc::new(RawBytesCodec),
        handler.clone(),
    )
    .await
    .unwrap();

    // 4086-byte payload frames to 4094 bytes, leaving exactly 2 bytes
    // before the 4096-byte boundary — less than the 4-byte wrap sentinel.
    let w1 = journal.push(&vec![1u8; 4086]).await.unwrap();
    let w2 = journal.push(&b"next".to_vec()).await.unwrap();
    w1.wait().await;
    w2.wait().await;

    journal.shutdown().await;
    let received = handler.received.lock().await;
    assert_eq!(received.len(), 2);
    assert_eq!(received[0], vec![1u8; 4086]);
    assert_eq!(received[1], b"next".to_vec());
}

/// Scenario 3: a journal that crashes (is dropped without `shutdown`)
/// after only partial drain replays the undrained suffix on restart, and
/// never re-delivers what was already durably consumed.
#[tokio::test]
async fn crash_recovery_replays_only_undrained_items() {
    let device = mem_device(512, 9);

    {
        let handler = Arc::new(CollectingHandler::new());
        let journal = Journal::<Vec<u8>>::create(
            Arc::clone(&device),
            Config::default(),
            Arc::new(RawBytesCodec),
            handler.clone(),
        )
        .await
        .unwrap();

        // Push A and let it drain, then push B and C without waiting —
        // simulate a crash by dropping the journal (no shutdown) right
        // after they're durable but possibly before the drain loop has
        // run again.
        let wa = journal.push(&b"A".to_vec()).await.unwrap();
        wa.wait().await;
        journal.push(&b"B".to_vec()).await.unwrap();
        journal.push(&b"C".to_vec()).await.unwrap();
        // No shutdown(): drop the handle as if the process died here.
    }

    let handler = Arc::new(CollectingHandler::new());
    let journal = Journal::<Vec<u8>>::attach(device, 1, false, Arc::new(RawBytesCodec), handler.clone())
        .await
        .unwrap();

    // Give the freshly spawned drain loop a moment to replay.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    journal.shutdown().await;

    let received = handler.received.lock().await;
    assert_eq!(*received, vec![b"B".to_vec(), b"C".to_vec()]);
}

/// Scenario 2: backpressure — a full ring makes further pushes wait for
/// consumer progress, and once the handler catches up every push still
/// completes in order.
#[tokio::test]
async fn backpressure_releases_pushes_in_order_once_drained() {
    struct Gate {
        released: std::sync::atomic::AtomicBool,
        received: Mutex<Vec<Vec<u8>>>,
    }

    impl JournalHandler<Vec<u8>> for Gate {
        async fn handle_batch(&self, batch: &[Vec<u8>]) -> Result<(), String> {
            while !self.released.load(Ordering::Acquire) {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            let mut received = self.received.lock().await;
            received.extend(batch.iter().cloned());
            Ok(())
        }
    }

    let handler = Arc::new(Gate {
        released: std::sync::atomic::AtomicBool::new(false),
        received: Mutex::new(Vec::new()),
    });

    // Payload region sized to hold exactly 3 frames of a fixed item size
    // (a small sector size keeps the region tight enough that a 4th frame
    // genuinely doesn't fit).
    let item_len = 64;
    let frame_len = frame::framed_len(item_len);
    let payload_bytes = (frame_len * 3) as u64;
    let sector_size = 64usize;
    let payload_sectors = payload_bytes.div_ceil(sector_size as u64);
    let config = Config::new(sector_size, 1, payload_sectors, false);

    let journal = Journal::<Vec<u8>>::create(
        mem_device(sector_size, 1 + payload_sectors),
        config,
        Arc::new(RawBytesCodec),
        handler.clone(),
    )
    .await
    .unwrap();

    let mut waiters = Vec::new();
    for i in 0..5u8 {
        let item = vec![i; item_len];
        let journal = journal.clone();
        waiters.push(tokio::spawn(async move { journal.push(&item).await }));
    }

    // Give the first three a chance to land and the last two to start
    // retrying against a full ring.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    handler.released.store(true, Ordering::Release);

    let mut completions = Vec::new();
    for w in waiters {
        completions.push(w.await.unwrap().unwrap());
    }
    for c in &completions {
        c.wait().await;
    }

    journal.shutdown().await;
    let received = handler.received.lock().await;
    assert_eq!(received.len(), 5);
    for (i, item) in received.iter().enumerate() {
        assert_eq!(item, &vec![i as u8; item_len]);
    }
}

/// Scenario 6: pushing enough equal-sized items to wrap the payload
/// region at least once still round-trips every item in order.
#[tokio::test]
async fn wraparound_round_trips_every_item() {
    let handler = Arc::new(CollectingHandler::new());
    // 64-byte sectors, 11 payload sectors => 704-byte region. Each 64-byte
    // item frames to 72 bytes, so the 10th push (648 bytes in) leaves only
    // 56 bytes before the boundary and must wrap.
    let config = Config::new(64, 1, 11, false);
    let journal = Journal::<Vec<u8>>::create(mem_device(64, 12), config, Arc::new(RawBytesCodec), handler.clone())
        .await
        .unwrap();

    let item_len = 64;
    let n = 20;
    for i in 0..n {
        let item = vec![(i % 256) as u8; item_len];
        journal.push(&item).await.unwrap();
    }
    // 20 * 72 = 1440 bytes of frames, well past the 704-byte region: the
    // producer pointer must have wrapped at least once.
    assert!(journal.producer_pos() > config.payload_len());
    journal.shutdown().await;

    let received = handler.received.lock().await;
    assert_eq!(received.len(), n);
    for (i, item) in received.iter().enumerate() {
        assert_eq!(item, &vec![(i % 256) as u8; item_len]);
    }
}

/// Scenario 5: ten concurrent pushers each see their own items delivered
/// in ascending per-task sequence order (global interleaving across
/// tasks is unspecified).
#[tokio::test]
async fn per_task_ordering_survives_concurrent_pushers() {
    struct TaggedHandler {
        received: Mutex<Vec<(u8, u32)>>,
    }

    impl JournalHandler<(u8, u32)> for TaggedHandler {
        async fn handle_batch(&self, batch: &[(u8, u32)]) -> Result<(), String> {
            let mut received = self.received.lock().await;
            received.extend_from_slice(batch);
            Ok(())
        }
    }

    struct TupleCodec;
    impl ringwal::OperationCodec<(u8, u32)> for TupleCodec {
        fn encode(&self, op: &(u8, u32)) -> Result<Vec<u8>, ringwal::error::CodecError> {
            let mut buf = Vec::with_capacity(5);
            buf.push(op.0);
            buf.extend_from_slice(&op.1.to_le_bytes());
            Ok(buf)
        }

        fn decode(&self, bytes: &[u8]) -> Result<(u8, u32), ringwal::error::CodecError> {
            if bytes.len() != 5 {
                return Err(ringwal::error::CodecError::Decode("bad length".to_string()));
            }
            let task_id = bytes[0];
            let seq = u32::from_le_bytes(bytes[1..5].try_into().unwrap());
            Ok((task_id, seq))
        }
    }

    let handler = Arc::new(TaggedHandler {
        received: Mutex::new(Vec::new()),
    });
    let journal = Journal::<(u8, u32)>::create(
        mem_device(4096, 33), // large payload region: plenty of room for 1000 small frames
        Config::new(4096, 1, 32, false),
        Arc::new(TupleCodec),
        handler.clone(),
    )
    .await
    .unwrap();

    let tasks: Vec<_> = (0..10u8)
        .map(|task_id| {
            let journal = journal.clone();
            tokio::spawn(async move {
                for seq in 0..100u32 {
                    journal.push(&(task_id, seq)).await.unwrap();
                }
            })
        })
        .collect();

    for t in tasks {
        t.await.unwrap();
    }
    journal.shutdown().await;

    let received = handler.received.lock().await;
    let mut last_seq_per_task = [None; 10];
    for &(task_id, seq) in received.iter() {
        let last = &mut last_seq_per_task[task_id as usize];
        if let Some(prev) = *last {
            assert!(seq > prev, "task {task_id} saw seq {seq} after {prev}");
        }
        *last = Some(seq);
    }
    for (task_id, last) in last_seq_per_task.iter().enumerate() {
        assert_eq!(*last, Some(99), "task {task_id} missing items");
    }
}

/// Applying replay twice in a row (simulated by attaching twice) does not
/// re-deliver already-consumed items (§8.2 idempotence of the consumer
/// pointer).
#[tokio::test]
async fn repeated_replay_does_not_duplicate_consumed_items() {
    let device = mem_device(512, 9);
    let calls = Arc::new(AtomicUsize::new(0));

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        received: Mutex<Vec<Vec<u8>>>,
    }

    impl JournalHandler<Vec<u8>> for CountingHandler {
        async fn handle_batch(&self, batch: &[Vec<u8>]) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut received = self.received.lock().await;
            received.extend(batch.iter().cloned());
            Ok(())
        }
    }

    {
        let handler = Arc::new(CountingHandler {
            calls: Arc::clone(&calls),
            received: Mutex::new(Vec::new()),
        });
        let journal = Journal::<Vec<u8>>::create(
            Arc::clone(&device),
            Config::default(),
            Arc::new(RawBytesCodec),
            handler,
        )
        .await
        .unwrap();
        let w = journal.push(&b"x".to_vec()).await.unwrap();
        w.wait().await;
        journal.shutdown().await;
    }

    // Re-attaching twice in a row replays from the durable consumer
    // pointer each time; since it already advanced past "x", neither
    // attach should redeliver it.
    for _ in 0..2 {
        let handler = Arc::new(CountingHandler {
            calls: Arc::clone(&calls),
            received: Mutex::new(Vec::new()),
        });
        let journal = Journal::<Vec<u8>>::attach(Arc::clone(&device), 1, false, Arc::new(RawBytesCodec), handler.clone())
            .await
            .unwrap();
        journal.shutdown().await;
        assert!(handler.received.lock().await.is_empty());
    }
}
