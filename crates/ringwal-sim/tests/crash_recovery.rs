//! Sweeps the crash point across an entire workload's write stream and
//! checks that recovery never reorders, drops, or fabricates an item no
//! matter where the simulated crash lands — including squarely between a
//! frame's payload write and its header advance (the exact window §3.3's
//! two-phase write protocol exists to make safe).

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use ringwal::config::Config;
use ringwal_sim::run_full_sweep;

/// Generates `count` payloads of varying length, each starting with its
/// own index so a human (or an assertion) can tell at a glance which
/// payload is which without comparing whole byte vectors.
fn make_payloads(count: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let len = rng.gen_range(4..48);
            let mut payload = vec![0u8; len];
            rng.fill(&mut payload[..]);
            payload[0] = i as u8;
            payload
        })
        .collect()
}

#[tokio::test]
async fn crash_at_every_write_point_recovers_a_clean_prefix_no_wrap() {
    // Payload region comfortably holds all items without wrapping or
    // backpressure, isolating the crash-injection behavior itself.
    let config = Config::new(512, 1, 8, false);
    let payloads = make_payloads(12, 1);

    // Generous upper bound: at most 2 payload writes (wrap sentinel +
    // frame) plus one header write per push.
    let max_writes = payloads.len() as u64 * 3 + 4;
    let report = run_full_sweep(config, &payloads, max_writes).await;

    for point in &report.points {
        assert!(
            payloads.starts_with(&point.recovered_items),
            "crash_after={}: recovered {:?} is not a prefix of the pushed payloads",
            point.crash_after,
            point.recovered_items
        );
    }
    assert_eq!(
        report.points.last().unwrap().recovered_items,
        payloads,
        "the highest crash point should have let every push complete"
    );
}

#[tokio::test]
async fn crash_at_every_write_point_recovers_a_clean_prefix_with_small_sectors() {
    // Narrower sectors than the no-wrap case above, exercising sector-
    // spanning frame writes under crash injection with different geometry.
    // The pinned consumer (see `BlockingHandler`) means the producer
    // position never advances past the payload region in this harness, so
    // this does not exercise wraparound itself — `ringwal`'s own
    // integration tests cover that under normal operation instead.
    let config = Config::new(64, 1, 11, false);
    let payloads = make_payloads(10, 2);

    let max_writes = payloads.len() as u64 * 3 + 4;
    let report = run_full_sweep(config, &payloads, max_writes).await;

    for point in &report.points {
        assert!(
            payloads.starts_with(&point.recovered_items),
            "crash_after={}: recovered {:?} is not a prefix of the pushed payloads",
            point.crash_after,
            point.recovered_items
        );
    }
    assert_eq!(report.points.last().unwrap().recovered_items, payloads);
}

#[tokio::test]
async fn crash_before_the_first_write_recovers_nothing() {
    let config = Config::new(512, 1, 8, false);
    let payloads = make_payloads(5, 3);
    let report = run_full_sweep(config, &payloads, 0).await;
    assert!(report.points[0].recovered_items.is_empty());
}
