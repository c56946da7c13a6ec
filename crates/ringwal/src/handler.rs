//! The client-supplied callback that receives replayed operations (§4.4,
//! §5).
//!
//! Like [`crate::device::BlockDevice`], `JournalHandler` is defined with a
//! native `async fn` and paired with an object-safe boxed counterpart,
//! following the same split the teacher's `SpanExporter` /
//! `SpanExporterBoxed` use.

use std::future::Future;
use std::pin::Pin;

/// Applies a batch of replayed operations to durable state.
///
/// Implementations must be idempotent: the same batch (or a superset of
/// it, on overlapping replay after a crash between decode and
/// [`crate::consumer::Consumer::advance`]) may be delivered more than
/// once (§1, §7).
pub trait JournalHandler<T>: Send + Sync {
    /// Applies every operation in `batch`, in order.
    ///
    /// Returning an error marks the current replay attempt as failed: the
    /// consumer pointer is not advanced, so the same batch is retried on
    /// the next replay (§7). The engine does not retry automatically
    /// within a single replay call.
    fn handle_batch(&self, batch: &[T]) -> impl Future<Output = Result<(), String>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe counterpart of [`JournalHandler`].
pub trait JournalHandlerBoxed<T>: Send + Sync {
    /// See [`JournalHandler::handle_batch`].
    fn handle_batch_boxed<'a>(&'a self, batch: &'a [T]) -> BoxFuture<'a, Result<(), String>>;
}

impl<T, H: JournalHandler<T>> JournalHandlerBoxed<T> for H {
    fn handle_batch_boxed<'a>(&'a self, batch: &'a [T]) -> BoxFuture<'a, Result<(), String>> {
        Box::pin(JournalHandler::handle_batch(self, batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        seen: Arc<AtomicUsize>,
    }

    impl JournalHandler<u64> for CountingHandler {
        async fn handle_batch(&self, batch: &[u64]) -> Result<(), String> {
            self.seen.fetch_add(batch.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn boxed_handler_dispatches_through_trait_object() {
        let seen = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler { seen: Arc::clone(&seen) };
        let boxed: Box<dyn JournalHandlerBoxed<u64>> = Box::new(handler);
        boxed.handle_batch_boxed(&[1, 2, 3]).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
