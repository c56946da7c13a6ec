//! Demonstration of the ringwal journal against a real file-backed device.
//!
//! Run with: `cargo run -p ringwal --bin ringwal-demo`

use std::sync::Arc;

use ringwal::codec::RawBytesCodec;
use ringwal::config::Config;
use ringwal::device::FileBlockDevice;
use ringwal::handler::JournalHandler;
use ringwal::Journal;

struct PrintingHandler;

impl JournalHandler<Vec<u8>> for PrintingHandler {
    async fn handle_batch(&self, batch: &[Vec<u8>]) -> Result<(), String> {
        for item in batch {
            println!("  replayed: {}", String::from_utf8_lossy(item));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== ringwal demo ===\n");

    let path = std::env::temp_dir().join(format!("ringwal-demo-{}.img", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let config = Config::default();

    println!("--- First run: push three items, wait for all three, then shut down ---");
    {
        let device = Arc::new(FileBlockDevice::open(&path, config.sector_size, config.total_sectors()).await?);
        let journal = Journal::create(device, config, Arc::new(RawBytesCodec), Arc::new(PrintingHandler)).await?;

        let w1 = journal.push(&b"order-1".to_vec()).await?;
        let w2 = journal.push(&b"order-2".to_vec()).await?;
        let w3 = journal.push(&b"order-3".to_vec()).await?;
        w1.wait().await;
        w2.wait().await;
        w3.wait().await;
        println!("producer={} consumer={}", journal.producer_pos(), journal.consumer_pos());
        journal.shutdown().await;
    }

    println!("\n--- Second run: reattach and confirm nothing left to replay ---");
    {
        let device = Arc::new(FileBlockDevice::open(&path, config.sector_size, config.total_sectors()).await?);
        let journal = Journal::attach(
            device,
            config.header_sectors,
            config.enable_metrics,
            Arc::new(RawBytesCodec),
            Arc::new(PrintingHandler),
        )
        .await?;
        println!("producer={} consumer={}", journal.producer_pos(), journal.consumer_pos());
        journal.shutdown().await;
    }

    let _ = std::fs::remove_file(&path);
    println!("\n=== demo complete ===");
    Ok(())
}
