//! Time sources for freshness checks.
//!
//! The engine never reads the wall clock directly. It asks a [`Clock`] for a
//! [`Timestamp`] so that tests can move time forward without sleeping.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// A point in time, in milliseconds since the owning clock's origin.
///
/// Timestamps from different clocks are not comparable.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hubcache::cache::Timestamp;
///
/// let written = Timestamp::from_millis(1_000);
/// let now = Timestamp::from_millis(1_500);
/// assert_eq!(now.elapsed_since(written), Duration::from_millis(500));
/// assert_eq!(written.elapsed_since(now), Duration::ZERO);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The clock origin.
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp `millis` milliseconds after the origin.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the offset from the origin in milliseconds.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Time elapsed between `earlier` and `self`, saturating at zero.
    pub fn elapsed_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Supplies the current time to the cache engine.
///
/// Implementations must be monotonically non-decreasing for the lifetime of
/// the process.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

impl<C: Clock> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Monotonic clock backed by [`tokio::time::Instant`].
///
/// The origin is captured at construction. Because it reads tokio's clock,
/// it follows `tokio::time::pause` and `advance` inside tests.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is "now".
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = self.origin.elapsed().as_millis();
        Timestamp(u64::try_from(millis).unwrap_or(u64::MAX))
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give another to the cache.
///
/// # Examples
///
/// ```
/// use hubcache::cache::{Clock, ManualClock, Timestamp};
///
/// let clock = ManualClock::new();
/// let handle = clock.clone();
/// clock.advance_millis(250);
/// assert_eq!(handle.now(), Timestamp::from_millis(250));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock starting at [`Timestamp::ZERO`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.advance_millis(millis);
    }

    /// Moves the clock forward by `millis` milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        // fetch_update never fails when the closure always returns Some
        let _ = self
            .now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(millis))
            });
    }

    /// Jumps to `at`. Moving backwards is ignored to keep the clock monotonic.
    pub fn set(&self, at: Timestamp) {
        self.now.fetch_max(at.as_millis(), Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_starts_at_zero() {
        assert_eq!(ManualClock::new().now(), Timestamp::ZERO);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(Duration::from_millis(1500));
        assert_eq!(other.now().as_millis(), 1500);
    }

    #[test]
    fn manual_clock_set_never_moves_backwards() {
        let clock = ManualClock::new();
        clock.set(Timestamp::from_millis(900));
        clock.set(Timestamp::from_millis(100));
        assert_eq!(clock.now().as_millis(), 900);
    }

    #[test]
    fn elapsed_saturates() {
        let early = Timestamp::from_millis(10);
        let late = Timestamp::from_millis(40);
        assert_eq!(late.elapsed_since(early), Duration::from_millis(30));
        assert_eq!(early.elapsed_since(late), Duration::ZERO);
    }

    #[test]
    fn arc_clock_delegates() {
        let clock = Arc::new(ManualClock::new());
        clock.advance_millis(7);
        assert_eq!(Clock::now(&clock).as_millis(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn system_clock_follows_paused_tokio_time() {
        let clock = SystemClock::new();
        tokio::time::advance(Duration::from_millis(1200)).await;
        assert!(clock.now().as_millis() >= 1200);
    }

    #[test]
    fn display_in_millis() {
        assert_eq!(Timestamp::from_millis(42).to_string(), "42ms");
    }
}
