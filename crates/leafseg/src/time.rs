use std::time::{SystemTime, UNIX_EPOCH};

/// A source of wall-clock milliseconds.
///
/// This abstraction lets the composer run against the real system clock in
/// production and a fixed or scripted source in tests.
///
/// # Example
///
/// ```
/// use leafseg::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> i64 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn current_millis(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Default, Copy, Clone)]
pub struct WallClock;

impl TimeSource for WallClock {
    fn current_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX_EPOCH")
            .as_millis() as i64
    }
}
