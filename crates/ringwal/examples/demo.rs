//! A minimal walkthrough of pushing, draining, and reading back metrics,
//! entirely in memory (no file device required).
//!
//! Run with: `cargo run -p ringwal --example demo`

use std::sync::Arc;

use ringwal::codec::RawBytesCodec;
use ringwal::config::SMALL_RING_CONFIG;
use ringwal::device::MemBlockDevice;
use ringwal::handler::JournalHandler;
use ringwal::Journal;

struct EchoHandler;

impl JournalHandler<Vec<u8>> for EchoHandler {
    async fn handle_batch(&self, batch: &[Vec<u8>]) -> Result<(), String> {
        println!("handler received {} item(s)", batch.len());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = SMALL_RING_CONFIG;
    config.enable_metrics = true;
    let device = Arc::new(MemBlockDevice::new(config.sector_size, config.total_sectors()));

    let journal = Journal::create(device, config, Arc::new(RawBytesCodec), Arc::new(EchoHandler)).await?;

    for n in 0..5 {
        let waiter = journal.push(&format!("item-{n}").into_bytes()).await?;
        waiter.wait().await;
    }

    let snapshot = journal.metrics();
    println!(
        "pushes={} replayed_frames={} replayed_batches={}",
        snapshot.pushes, snapshot.replayed_frames, snapshot.replayed_batches
    );

    journal.shutdown().await;
    Ok(())
}
