//! Fixed-window token bucket.

use super::config::LimitRule;
use chrono::{DateTime, Duration, Utc};

/// Per-key counter state.
///
/// The window snaps forward to the time of the first call made after it
/// elapsed; missed windows are not replayed. Up to twice the capacity can be
/// admitted across a window boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    capacity: u32,
    refill_period: Duration,
    tokens_remaining: u32,
    window_started_at: DateTime<Utc>,
}

impl Bucket {
    /// A full bucket whose first window starts at `now`.
    pub fn new(rule: LimitRule, now: DateTime<Utc>) -> Self {
        Self {
            capacity: rule.capacity,
            refill_period: rule.window(),
            tokens_remaining: rule.capacity,
            window_started_at: now,
        }
    }

    /// Start a new full window if the current one has elapsed.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        if now - self.window_started_at >= self.refill_period {
            self.tokens_remaining = self.capacity;
            self.window_started_at = now;
        }
    }

    /// Refresh, then take one token if any are left.
    pub fn try_consume(&mut self, now: DateTime<Utc>) -> bool {
        self.refresh(now);
        if self.tokens_remaining > 0 {
            self.tokens_remaining -= 1;
            true
        } else {
            false
        }
    }

    /// Refresh, then report the tokens left without consuming.
    pub fn available(&mut self, now: DateTime<Utc>) -> u32 {
        self.refresh(now);
        self.tokens_remaining
    }

    /// Time until the current window ends.
    ///
    /// A window ending past the representable range reports its full length.
    pub fn reset_after(&self, now: DateTime<Utc>) -> Duration {
        match self.window_started_at.checked_add_signed(self.refill_period) {
            Some(end) => (end - now).max(Duration::zero()),
            None => self.refill_period,
        }
    }

    /// Whether the window elapsed, so the next call would see a full bucket.
    pub fn is_idle(&self, now: DateTime<Utc>) -> bool {
        now - self.window_started_at >= self.refill_period
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_period(&self) -> Duration {
        self.refill_period
    }

    pub fn tokens_remaining(&self) -> u32 {
        self.tokens_remaining
    }

    pub fn window_started_at(&self) -> DateTime<Utc> {
        self.window_started_at
    }
}
