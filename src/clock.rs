//! Time source abstraction.
//!
//! Every component reads the current time through a [`Clock`] so that window
//! and expiry behavior can be driven deterministically in tests.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};

/// A source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Default shared clock (system time).
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can keep one handle
/// and hand another to the component under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// Create a clock frozen at the given unix timestamp (seconds).
    ///
    /// Out-of-range timestamps fall back to the unix epoch.
    pub fn at_unix(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// Move the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = instant;
    }

    /// Move the clock forward.
    pub fn advance(&self, by: std::time::Duration) {
        let delta = Duration::seconds(by.as_secs() as i64)
            + Duration::nanoseconds(i64::from(by.subsec_nanos()));
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }

    /// Move the clock backward.
    pub fn rewind(&self, by: std::time::Duration) {
        let delta = Duration::seconds(by.as_secs() as i64)
            + Duration::nanoseconds(i64::from(by.subsec_nanos()));
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now -= delta;
    }

    /// Shared handle to this clock.
    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Longest window, lifetime or period any configuration accepts (ten years).
pub const MAX_PERIOD_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Convert a number of seconds into a chrono duration, saturating on overflow.
pub(crate) fn seconds(secs: u64) -> Duration {
    Duration::try_seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
        .unwrap_or_else(|| Duration::days(365 * 1_000))
}

/// Whole seconds in `delta`, rounded up and never negative.
pub(crate) fn ceil_secs(delta: Duration) -> u64 {
    if delta <= Duration::zero() {
        return 0;
    }
    let whole = delta.num_seconds();
    let has_fraction = delta - Duration::seconds(whole) > Duration::zero();
    (whole + i64::from(has_fraction)) as u64
}
