//! The operation type replayed through a [`crate::store::RecoveryStore`].
//!
//! `KvOp` is deliberately the simplest operation whose replay is
//! idempotent *by construction*, with no separate deduplication bookkeeping
//! needed: re-applying `Set { key, value }` or `Delete { key }` any number
//! of times converges to the same state as applying it once.

use serde::{Deserialize, Serialize};

/// A single mutation against a key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KvOp {
    /// Sets `key` to `value`, overwriting any prior value.
    Set {
        /// The key to write.
        key: String,
        /// The value to store.
        value: Vec<u8>,
    },
    /// Removes `key`, if present.
    Delete {
        /// The key to remove.
        key: String,
    },
}

impl KvOp {
    /// Convenience constructor for [`KvOp::Set`].
    #[must_use]
    pub fn set(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Convenience constructor for [`KvOp::Delete`].
    #[must_use]
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bincode() {
        let op = KvOp::set("account:42", b"balance=100".to_vec());
        let bytes = bincode::serialize(&op).unwrap();
        let decoded: KvOp = bincode::deserialize(&bytes).unwrap();
        assert_eq!(op, decoded);
    }
}
