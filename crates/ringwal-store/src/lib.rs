//! Bridges a [`ringwal::Journal`] to durable application state.
//!
//! `ringwal` requires its handler to be idempotent (§6.3 of the journal's
//! own design) but otherwise has no opinion about what that state looks
//! like. This crate supplies a small [`RecoveryStore`] trait for "the
//! thing a replayed operation gets applied to" plus an in-memory
//! reference implementation, [`MapStore`], together with the
//! [`RecoveryStoreHandler`] adapter that turns any `RecoveryStore` into a
//! [`ringwal::JournalHandler`].

pub mod handler;
pub mod op;
pub mod store;

pub use handler::RecoveryStoreHandler;
pub use op::KvOp;
pub use store::{MapStore, RecoveryStore};
