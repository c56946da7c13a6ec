//! Adapts a [`RecoveryStore`] into a [`ringwal::JournalHandler`].

use std::marker::PhantomData;
use std::sync::Arc;

use ringwal::JournalHandler;

use crate::store::RecoveryStore;

/// Applies each operation in a replayed batch, in order, to a shared
/// [`RecoveryStore`].
///
/// Operations within a batch are applied sequentially rather than
/// concurrently: the store has no cross-key ordering guarantees of its
/// own, and `ringwal` only guarantees handler-visible ordering for
/// operations applied in sequence (§5).
pub struct RecoveryStoreHandler<S, Op> {
    store: Arc<S>,
    _marker: PhantomData<fn(Op)>,
}

impl<S, Op> RecoveryStoreHandler<S, Op> {
    /// Wraps `store` so it can be handed to [`ringwal::Journal::create`]
    /// or [`ringwal::Journal::attach`] as the handler.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }
}

impl<S: RecoveryStore<Op>, Op: Send + Sync> JournalHandler<Op> for RecoveryStoreHandler<S, Op> {
    async fn handle_batch(&self, batch: &[Op]) -> Result<(), String> {
        for op in batch {
            self.store.apply(op).await?;
        }
        Ok(())
    }
}
