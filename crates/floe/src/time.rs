use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Custom epoch: Wednesday, January 1, 2025 00:00:00 UTC
pub const CUSTOM_EPOCH: Duration = Duration::from_millis(1_735_689_600_000);

/// Twitter epoch: Thursday, November 4, 2010 1:42:54.657 UTC
pub const TWITTER_EPOCH: Duration = Duration::from_millis(1_288_834_974_657);

/// A source of millisecond-resolution wall-clock readings.
///
/// This abstraction allows you to plug in the real system clock or a mocked
/// time source in tests. Readings are **milliseconds since the Unix epoch**
/// and are not assumed to be monotonic: the generator detects regression
/// explicitly instead of relying on the OS for monotonic time.
///
/// # Example
///
/// ```
/// use floe::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current wall-clock time in milliseconds since the Unix
    /// epoch.
    fn current_millis(&self) -> u64;
}

/// The default production time source, backed by [`SystemTime`].
///
/// Wall-clock time can be adjusted externally (NTP corrections, manual
/// changes), so readings may regress between calls. The generator surfaces
/// that case as [`Error::ClockMovedBackward`] rather than papering over it.
///
/// [`Error::ClockMovedBackward`]: crate::Error::ClockMovedBackward
#[derive(Clone, Copy, Debug, Default)]
pub struct WallClock;

impl TimeSource for WallClock {
    fn current_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("System clock before UNIX_EPOCH")
            .as_millis() as u64
    }
}
