use core::fmt;
use core::hint;
use core::marker::PhantomData;
use core::time::Duration;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Result, SnowflakeId, TimeSource,
    generator::Mutex,
    validator::{validate_datacenter_id, validate_worker_id},
};

/// Mutable allocation state, owned exclusively by the generator's mutex.
///
/// `last_millis` is `None` until the first successful allocation; `sequence`
/// is only meaningful relative to the millisecond stored in `last_millis`.
#[derive(Debug)]
struct AllocationState {
    last_millis: Option<u64>,
    sequence: u64,
}

/// A lock-based Snowflake ID generator suitable for multi-threaded
/// environments.
///
/// Each call to [`next_id`] packs the current wall-clock millisecond (offset
/// by the configured epoch), the datacenter ID, the worker ID, and a
/// per-millisecond sequence counter into one 64-bit identifier. For a single
/// generator instance, successive IDs are strictly increasing as unsigned
/// integers as long as the wall clock does not regress.
///
/// The generator wraps its state in an [`Arc<Mutex<_>>`], allowing safe
/// shared use across threads. The whole allocation runs as one critical
/// section: a clock read plus integer arithmetic, so the coarse lock is cheap
/// relative to a finer-grained scheme.
///
/// One instance corresponds to one `(datacenter_id, worker_id)` pair.
/// Multiple instances may coexist in a process, but deployments must assign
/// distinct pairs to preserve global uniqueness; that coordination lives
/// outside this crate.
///
/// [`next_id`]: Self::next_id
pub struct SnowflakeGenerator<ID, T>
where
    ID: SnowflakeId,
    T: TimeSource,
{
    datacenter_id: u64,
    worker_id: u64,
    epoch_millis: u64,
    state: Arc<Mutex<AllocationState>>,
    time: T,
    _id: PhantomData<ID>,
}

impl<ID, T> Clone for SnowflakeGenerator<ID, T>
where
    ID: SnowflakeId,
    T: TimeSource + Clone,
{
    fn clone(&self) -> Self {
        Self {
            datacenter_id: self.datacenter_id,
            worker_id: self.worker_id,
            epoch_millis: self.epoch_millis,
            state: Arc::clone(&self.state),
            time: self.time.clone(),
            _id: PhantomData,
        }
    }
}

impl<ID, T> fmt::Debug for SnowflakeGenerator<ID, T>
where
    ID: SnowflakeId,
    T: TimeSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeGenerator")
            .field("datacenter_id", &self.datacenter_id)
            .field("worker_id", &self.worker_id)
            .field("epoch_millis", &self.epoch_millis)
            .finish_non_exhaustive()
    }
}

impl<ID, T> SnowflakeGenerator<ID, T>
where
    ID: SnowflakeId,
    T: TimeSource,
{
    /// Creates a new generator for one `(datacenter_id, worker_id)` pair.
    ///
    /// Both IDs are validated against the bit widths of the `ID` layout
    /// before any identifier can be produced; an out-of-range value fails
    /// construction immediately. The `epoch` (a point in time expressed as a
    /// [`Duration`] since the Unix epoch, e.g. [`CUSTOM_EPOCH`]) is stored
    /// verbatim and subtracted from every clock reading so the timestamp
    /// field stays small for longer. An epoch in the future is not rejected;
    /// it produces nonsensical timestamp fields and is the caller's
    /// responsibility.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDatacenterId`] if `datacenter_id` exceeds the
    ///   layout's datacenter field.
    /// - [`Error::InvalidWorkerId`] if `worker_id` exceeds the layout's
    ///   worker field.
    ///
    /// # Example
    ///
    /// ```
    /// use floe::{CUSTOM_EPOCH, SnowflakeClassicId, SnowflakeGenerator, WallClock};
    ///
    /// let generator =
    ///     SnowflakeGenerator::<SnowflakeClassicId, _>::new(1, 1, CUSTOM_EPOCH, WallClock)
    ///         .expect("IDs in range");
    /// let id = generator.next_id().expect("clock did not regress");
    /// assert_eq!(id.datacenter_id(), 1);
    /// ```
    ///
    /// [`CUSTOM_EPOCH`]: crate::CUSTOM_EPOCH
    pub fn new(datacenter_id: u64, worker_id: u64, epoch: Duration, time: T) -> Result<Self> {
        validate_datacenter_id::<ID>(datacenter_id)?;
        validate_worker_id::<ID>(worker_id)?;

        Ok(Self {
            datacenter_id,
            worker_id,
            epoch_millis: epoch.as_millis() as u64,
            state: Arc::new(Mutex::new(AllocationState {
                last_millis: None,
                sequence: 0,
            })),
            time,
            _id: PhantomData,
        })
    }

    /// Returns the configured datacenter ID.
    pub fn datacenter_id(&self) -> u64 {
        self.datacenter_id
    }

    /// Returns the configured worker ID.
    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    /// Returns the configured epoch as a [`Duration`] since the Unix epoch.
    pub fn epoch(&self) -> Duration {
        Duration::from_millis(self.epoch_millis)
    }

    /// Allocates the next identifier.
    ///
    /// Within one millisecond the sequence counter increments; when the
    /// millisecond advances the counter resets to zero. If a millisecond's
    /// sequence space is exhausted, the call busy-polls the clock until it
    /// advances and allocates from the new millisecond; exhaustion is never
    /// surfaced to the caller.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockMovedBackward`] if the clock reads earlier than the
    ///   last successful allocation. The failed call does not modify the
    ///   generator state, and the error is surfaced on every regressed call
    ///   rather than retried internally.
    /// - [`Error::LockPoisoned`] if a thread panicked while holding the state
    ///   lock (std mutex builds only).
    ///
    /// [`Error::LockPoisoned`]: crate::Error#variant.LockPoisoned
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn next_id(&self) -> Result<ID> {
        let mut state = {
            #[cfg(feature = "parking-lot")]
            {
                self.state.lock()
            }
            #[cfg(not(feature = "parking-lot"))]
            {
                self.state.lock()?
            }
        };

        // The clock must be read inside the critical section: a reading taken
        // before the lock could be older than the `last_millis` another
        // thread just recorded, which would look like a regression.
        let now = self.time.current_millis();

        let effective = match state.last_millis {
            Some(last) if now < last => return Err(Self::cold_clock_behind(now, last)),
            Some(last) if now == last => {
                state.sequence = (state.sequence + 1) & ID::max_sequence();
                if state.sequence == 0 {
                    // Sequence space for this millisecond is exhausted. The
                    // wait for the next millisecond is expected to be short
                    // and rare, so busy-poll the clock instead of paying a
                    // scheduler round trip for a sub-millisecond sleep. The
                    // wait has no upper bound; a frozen clock stalls it.
                    self.spin_until_after(last)
                } else {
                    last
                }
            }
            _ => {
                state.sequence = 0;
                now
            }
        };
        state.last_millis = Some(effective);

        // A future epoch yields a wrapped, nonsensical timestamp field; epoch
        // sanity is owned by the caller, not checked per allocation.
        let timestamp = effective.wrapping_sub(self.epoch_millis);
        Ok(ID::from_components(
            timestamp,
            self.datacenter_id,
            self.worker_id,
            state.sequence,
        ))
    }

    /// Busy-polls the time source until it reads strictly past `last`.
    fn spin_until_after(&self, last: u64) -> u64 {
        let mut now = self.time.current_millis();
        while now <= last {
            hint::spin_loop();
            now = self.time.current_millis();
        }
        now
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(now: u64, last: u64) -> Error {
        Error::ClockMovedBackward { now, last }
    }
}
