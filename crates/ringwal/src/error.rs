//! Error types for the journal and its lower layers.
//!
//! Each layer gets its own enum so that callers close to the ring (producer,
//! consumer) can match on retry-able conditions without pulling in the
//! engine's vocabulary, while the engine's [`JournalError`] is the only type
//! that ever crosses the public `push`/`shutdown` boundary.

use thiserror::Error;

/// Failure of a sector read or write against a [`crate::device::BlockDevice`].
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The underlying device returned an I/O error.
    #[error("block device i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A read or write addressed sectors outside the device's capacity.
    #[error("sector range [{start}, {end}) is out of bounds (device has {capacity} sectors)")]
    OutOfBounds {
        /// First sector requested.
        start: u64,
        /// One past the last sector requested.
        end: u64,
        /// Total sectors on the device.
        capacity: u64,
    },
}

/// Failure attaching to or creating the on-disk ring layout.
#[derive(Debug, Error)]
pub enum RingAttachError {
    /// The header sector's magic bytes did not match; the ring has never
    /// been initialized with [`crate::ring::Ring::create`].
    #[error("ring header not found (bad magic) — has create() been called on this device?")]
    NotInitialized,

    /// The on-disk version is not one this build understands.
    #[error("unsupported on-disk ring version {0}")]
    UnsupportedVersion(u32),

    /// The device is too small to hold even the header.
    #[error("device has {sectors} sectors, smaller than the {header_sectors}-sector header")]
    DeviceTooSmall {
        /// Sectors actually available.
        sectors: u64,
        /// Sectors the header occupies.
        header_sectors: u64,
    },

    /// A sector I/O error occurred while reading or writing the header.
    #[error(transparent)]
    Io(#[from] DeviceError),
}

/// Outcome of [`crate::producer::Producer::push`].
#[derive(Debug, Error)]
pub enum ProducerError {
    /// The framed item can never fit in the ring, regardless of drain
    /// progress: `frame_len > L`.
    #[error("item frames to {frame_len} bytes, exceeding ring payload capacity of {capacity} bytes")]
    TooBig {
        /// Size of the frame (length prefix + payload + CRC trailer).
        frame_len: usize,
        /// Usable payload region size, in bytes.
        capacity: u64,
    },

    /// The ring's suspend flag is set.
    #[error("ring is suspended")]
    Suspended,

    /// Not enough free space exists right now; the caller should wait for
    /// the consumer to advance and retry.
    #[error("ring has insufficient free space, retry after consumer progress")]
    Retry,

    /// The caller tried to push a zero-length payload. Disallowed because
    /// the wire format uses a zero length prefix as the wrap sentinel
    /// (§3.2 policy a); an empty payload would be indistinguishable from
    /// it.
    #[error("payload must be non-empty")]
    EmptyPayload,

    /// A sector I/O error occurred.
    #[error(transparent)]
    Io(#[from] DeviceError),
}

/// Outcome of reading the next frame via [`crate::consumer::Consumer`].
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// No frames are currently visible in `[C, P)`.
    #[error("no frames available between consumer and producer pointers")]
    Retry,

    /// The frame's declared length runs past the producer pointer — the
    /// header is corrupt, or a frame was read concurrently with an
    /// in-progress (not-yet-advanced) write.
    #[error("frame declares {declared} payload bytes but only {available} are visible")]
    Truncated {
        /// Bytes the frame header claims to hold.
        declared: u64,
        /// Bytes actually visible before the producer pointer.
        available: u64,
    },

    /// The frame's declared length exceeds the entire payload region —
    /// cannot possibly be a well-formed frame.
    #[error("frame declares {declared} payload bytes, exceeding ring payload capacity of {capacity} bytes")]
    LengthOverflow {
        /// Bytes the frame header claims to hold.
        declared: u64,
        /// Usable payload region size, in bytes.
        capacity: u64,
    },

    /// The frame's CRC32 trailer does not match the length+payload bytes.
    #[error("frame crc32 mismatch: expected {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch {
        /// CRC32 stored in the frame trailer.
        expected: u32,
        /// CRC32 computed over the bytes actually read.
        actual: u32,
    },

    /// A sector I/O error occurred.
    #[error(transparent)]
    Io(#[from] DeviceError),
}

impl ConsumerError {
    /// Returns `true` for conditions that indicate on-disk corruption or a
    /// framing bug, as opposed to a transient I/O failure.
    #[must_use]
    pub fn is_framing_error(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. } | Self::LengthOverflow { .. } | Self::ChecksumMismatch { .. }
        )
    }
}

/// The only error type that crosses the engine's public surface (§6.4).
///
/// Every lower-layer error is absorbed into one of these variants before
/// reaching a caller: `Retry`/`Suspended` are handled internally by waiting
/// (never surfaced), and everything else maps onto §7's error taxonomy.
#[derive(Debug, Error)]
pub enum JournalError {
    /// A block-device failure reached the engine. If raised from `push`,
    /// the engine remains usable for future pushes; if raised from replay,
    /// it is fatal (see [`JournalError::Failed`]).
    #[error("i/o error: {0}")]
    Io(#[from] DeviceError),

    /// The operation can never fit in the ring, regardless of drain
    /// progress. Permanent for this item only; the engine is unaffected.
    #[error("operation encodes to {frame_len} bytes, exceeding ring payload capacity of {capacity} bytes")]
    TooBig {
        /// Size of the frame once encoded.
        frame_len: usize,
        /// Usable payload region size, in bytes.
        capacity: u64,
    },

    /// `push` was called after `shutdown` had already begun.
    #[error("journal is shutting down, no further pushes are accepted")]
    Shutdown,

    /// A frame in `[C, P)` failed to decode or failed its CRC check during
    /// replay. Fatal: the engine detaches the consumer and stops (§7).
    #[error("fatal parse error during replay: {0}")]
    Parse(String),

    /// The client handler returned an error for a replayed batch. Fatal for
    /// the current replay: `C` is not advanced, so the same items are
    /// retried on the next replay (§7).
    #[error("handler rejected a batch: {0}")]
    Handler(String),

    /// The engine has already entered its failed state (a prior fatal
    /// [`JournalError::Parse`], [`JournalError::Handler`], or durable-advance
    /// failure) and can no longer make progress.
    #[error("journal has failed and can no longer accept pushes or replay")]
    Failed,
}

/// Failure encoding or decoding an operation via
/// [`crate::codec::OperationCodec`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// Encoding the operation into bytes failed.
    #[error("failed to encode operation: {0}")]
    Encode(String),

    /// Decoding bytes back into an operation failed.
    #[error("failed to decode operation: {0}")]
    Decode(String),
}

impl From<RingAttachError> for JournalError {
    fn from(e: RingAttachError) -> Self {
        match e {
            RingAttachError::Io(io) => JournalError::Io(io),
            other => JournalError::Parse(other.to_string()),
        }
    }
}
