//! End-to-end demo: `start` / `push` / `shutdown` against a real
//! file-backed device, recovering into an in-memory key-value store.
//!
//! Run with: `cargo run -p ringwal-store --bin ringwal-store-demo`

use std::sync::Arc;

use ringwal::codec::BincodeCodec;
use ringwal::config::Config;
use ringwal::device::FileBlockDevice;
use ringwal::Journal;
use ringwal_store::{KvOp, MapStore, RecoveryStoreHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== ringwal-store demo ===\n");

    let path = std::env::temp_dir().join(format!("ringwal-store-demo-{}.img", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let config = Config::default();

    println!("--- First run: apply three writes and a delete ---");
    {
        let device = Arc::new(FileBlockDevice::open(&path, config.sector_size, config.total_sectors()).await?);
        let store = Arc::new(MapStore::new());
        let journal = Journal::create(
            device,
            config,
            Arc::new(BincodeCodec::<KvOp>::new()),
            Arc::new(RecoveryStoreHandler::new(Arc::clone(&store))),
        )
        .await?;

        let w1 = journal.push(&KvOp::set("balance:alice", b"100".to_vec())).await?;
        let w2 = journal.push(&KvOp::set("balance:bob", b"50".to_vec())).await?;
        let w3 = journal.push(&KvOp::set("balance:alice", b"75".to_vec())).await?;
        let w4 = journal.push(&KvOp::delete("balance:bob")).await?;
        for w in [w1, w2, w3, w4] {
            w.wait().await;
        }

        println!("alice={:?} bob={:?}", store.get("balance:alice").await, store.get("balance:bob").await);
        journal.shutdown().await;
    }

    println!("\n--- Second run: reattach into a fresh store, replay should be a no-op ---");
    {
        let device = Arc::new(FileBlockDevice::open(&path, config.sector_size, config.total_sectors()).await?);
        let store = Arc::new(MapStore::new());
        let journal = Journal::attach(
            device,
            config.header_sectors,
            config.enable_metrics,
            Arc::new(BincodeCodec::<KvOp>::new()),
            Arc::new(RecoveryStoreHandler::new(Arc::clone(&store))),
        )
        .await?;

        println!(
            "producer={} consumer={} (store has {} key(s) because everything was already drained)",
            journal.producer_pos(),
            journal.consumer_pos(),
            store.len().await
        );
        journal.shutdown().await;
    }

    let _ = std::fs::remove_file(&path);
    println!("\n=== demo complete ===");
    Ok(())
}
