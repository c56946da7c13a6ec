//! The [`RecoveryStore`] trait and its in-memory reference implementation.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::RwLock;

use crate::op::KvOp;

/// Durable state that replayed operations are applied to.
///
/// Implementations must be idempotent in the sense `ringwal` requires of
/// any handler (§6.3): [`RecoveryStore::apply`] may be called with the
/// same operation more than once across a crash/restart boundary, and the
/// observable state after N applications must equal the state after one.
pub trait RecoveryStore<Op>: Send + Sync {
    /// Applies one operation to durable state.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the operation could not be applied; this fails
    /// the enclosing replay batch and the journal retries it (§7).
    fn apply(&self, op: &Op) -> impl Future<Output = Result<(), String>> + Send;
}

/// An in-memory key-value store, the reference [`RecoveryStore`]
/// implementation for [`KvOp`].
///
/// Every [`RecoveryStore::apply`] call is naturally idempotent: writing
/// the same key/value pair twice, or deleting an absent key, both leave
/// the map in the same state as the first call.
#[derive(Debug, Default)]
pub struct MapStore {
    map: RwLock<HashMap<String, Vec<u8>>>,
}

impl MapStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the current value for `key`, if set.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.map.read().await.get(key).cloned()
    }

    /// Number of keys currently present.
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    /// `true` if the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl RecoveryStore<KvOp> for MapStore {
    async fn apply(&self, op: &KvOp) -> Result<(), String> {
        let mut map = self.map.write().await;
        match op {
            KvOp::Set { key, value } => {
                map.insert(key.clone(), value.clone());
            }
            KvOp::Delete { key } => {
                map.remove(key);
            }
        }
        Ok(())
    }
}
