//! Translates client operations to and from the bytes stored in frames
//! (§4.2, §5).
//!
//! Encoding and decoding are pure, CPU-bound transforms, so unlike
//! [`crate::device::BlockDevice`] and [`crate::handler::JournalHandler`]
//! this trait stays synchronous — there's no I/O to hold a task open for.

use crate::error::CodecError;

/// Converts an operation of type `T` to and from the bytes a frame
/// carries as its payload.
pub trait OperationCodec<T>: Send + Sync {
    /// Encodes `op` into its on-disk byte representation.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if `op` cannot be represented.
    fn encode(&self, op: &T) -> Result<Vec<u8>, CodecError>;

    /// Decodes a frame's payload bytes back into an operation.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if `bytes` is not a valid encoding.
    /// A decode failure during replay is treated as fatal corruption
    /// (§7) — the engine never attempts to skip past a bad frame.
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

#[cfg(feature = "bincode-codec")]
mod bincode_codec {
    use std::marker::PhantomData;

    use serde::{de::DeserializeOwned, Serialize};

    use super::{CodecError, OperationCodec};

    /// A reference [`OperationCodec`] built on `bincode`, for any `T` that
    /// implements `serde::Serialize`/`DeserializeOwned`.
    pub struct BincodeCodec<T> {
        _marker: PhantomData<fn() -> T>,
    }

    impl<T> BincodeCodec<T> {
        /// Creates a new codec instance. Stateless; cheap to construct per
        /// call if desired.
        #[must_use]
        pub fn new() -> Self {
            Self { _marker: PhantomData }
        }
    }

    impl<T> Default for BincodeCodec<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<T: Serialize + DeserializeOwned + Send + Sync> OperationCodec<T> for BincodeCodec<T> {
        fn encode(&self, op: &T) -> Result<Vec<u8>, CodecError> {
            bincode::serialize(op).map_err(|e| CodecError::Encode(e.to_string()))
        }

        fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
            bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
        }
    }
}

#[cfg(feature = "bincode-codec")]
pub use bincode_codec::BincodeCodec;

/// A codec for payloads that are already raw bytes — an identity
/// transform, useful when the client manages its own serialization.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawBytesCodec;

impl OperationCodec<Vec<u8>> for RawBytesCodec {
    fn encode(&self, op: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(op.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}
