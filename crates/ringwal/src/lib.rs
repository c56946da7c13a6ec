//! A crash-safe write-ahead journal backed by a durable ring buffer on a
//! block device.
//!
//! `ringwal` gives at-least-once execution of client operations across
//! process crashes: [`Journal::push`] durably appends an encoded
//! operation before returning, and a background drain loop replays every
//! durable operation to a [`JournalHandler`] — including, transparently,
//! whatever was pushed but not yet handled before the last crash. The
//! handler must be idempotent: an operation may be delivered more than
//! once if a crash lands between it being handled and the consumer
//! pointer that marks it handled becoming durable.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ringwal::{codec::RawBytesCodec, config::Config, device::FileBlockDevice, Journal};
//!
//! # struct EchoHandler;
//! # impl ringwal::handler::JournalHandler<Vec<u8>> for EchoHandler {
//! #     async fn handle_batch(&self, batch: &[Vec<u8>]) -> Result<(), String> {
//! #         println!("replaying {} item(s)", batch.len());
//! #         Ok(())
//! #     }
//! # }
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let device = Arc::new(FileBlockDevice::open("./journal.img", config.sector_size, config.total_sectors()).await?);
//! let journal = Journal::create(device, config, Arc::new(RawBytesCodec), Arc::new(EchoHandler)).await?;
//! journal.push(&b"hello".to_vec()).await?.wait().await;
//! journal.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod consumer;
pub mod device;
pub mod engine;
pub mod error;
pub mod frame;
pub mod handler;
pub mod header;
pub mod metrics;
pub mod producer;
pub mod ring;

pub use codec::OperationCodec;
pub use config::Config;
pub use consumer::{Consumer, Item};
pub use device::{BlockDevice, BlockDeviceBoxed};
pub use engine::{CompletionWaiter, Journal};
pub use error::{CodecError, ConsumerError, DeviceError, JournalError, ProducerError, RingAttachError};
pub use handler::{JournalHandler, JournalHandlerBoxed};
pub use metrics::{Metrics, MetricsSnapshot};
pub use producer::Producer;
pub use ring::Ring;
