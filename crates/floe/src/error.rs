use thiserror::Error;

/// A result type defaulting to the crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `floe` can emit.
///
/// The `InvalidDatacenterId` and `InvalidWorkerId` variants are only produced
/// at construction time; once a generator exists, its configuration can no
/// longer be rejected. `ClockMovedBackward` is produced by every allocation
/// that observes a regressed clock and is never retried internally.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum Error {
    /// The datacenter ID does not fit in the ID layout's datacenter field.
    #[error("datacenter ID can't be greater than {max} or less than 0; got {datacenter_id}")]
    InvalidDatacenterId {
        /// The rejected datacenter ID.
        datacenter_id: u64,
        /// The largest datacenter ID the layout can encode.
        max: u64,
    },

    /// The worker ID does not fit in the ID layout's worker field.
    #[error("worker ID can't be greater than {max} or less than 0; got {worker_id}")]
    InvalidWorkerId {
        /// The rejected worker ID.
        worker_id: u64,
        /// The largest worker ID the layout can encode.
        max: u64,
    },

    /// The wall clock reported a millisecond earlier than the last allocation.
    ///
    /// The failed call leaves the generator state untouched; whether to retry,
    /// abort, or escalate is the caller's decision.
    #[error("clock moved backward: now {now}ms is behind the last allocation at {last}ms")]
    ClockMovedBackward {
        /// The regressed reading, in milliseconds since the Unix epoch.
        now: u64,
        /// The millisecond recorded by the last successful allocation.
        last: u64,
    },

    /// The operation failed because the lock was **poisoned**.
    ///
    /// This occurs when a thread panics while holding the lock. When the
    /// `parking-lot` feature is enabled, mutexes do **not** poison, so this
    /// variant is not available.
    #[cfg(not(feature = "parking-lot"))]
    #[error("generator state lock is poisoned")]
    LockPoisoned,
}

#[cfg(not(feature = "parking-lot"))]
use std::sync::{MutexGuard, PoisonError};

#[cfg(not(feature = "parking-lot"))]
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}
