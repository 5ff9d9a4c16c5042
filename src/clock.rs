//! Wall-clock sources for the rest timer.
//!
//! Countdown end times are absolute timestamps, so everything that needs
//! "now" goes through the [`Clock`] trait. [`SystemClock`] reads the real
//! wall clock; [`ManualClock`] only moves when told to.
//!
//! tokio timers run on a monotonic clock that does not advance while the
//! host is suspended. Timers that must fire at a wall-clock time sleep
//! through [`sleep_until_wall`], which re-reads the wall clock at least
//! once per [`WALL_CLOCK_RECHECK`].

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

/// Longest stretch a wall-clock timer sleeps without looking at the clock.
pub(crate) const WALL_CLOCK_RECHECK: std::time::Duration = std::time::Duration::from_secs(1);

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only advances when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward (or backward, for a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    /// Moves the clock forward by whole seconds.
    pub fn advance_secs(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sleeps until `deadline` passes or `clock` reaches `wall`, whichever is first.
///
/// Without a `wall` time this is a plain `sleep_until(deadline)`.
pub(crate) async fn sleep_until_wall(
    clock: &dyn Clock,
    wall: Option<DateTime<Utc>>,
    deadline: Instant,
) {
    let Some(wall) = wall else {
        tokio::time::sleep_until(deadline).await;
        return;
    };
    loop {
        let now = Instant::now();
        if now >= deadline || clock.now() >= wall {
            return;
        }
        tokio::time::sleep((deadline - now).min(WALL_CLOCK_RECHECK)).await;
    }
}

/// The tokio deadline `after` from now, capped at a far-future instant.
pub(crate) fn deadline_after(after: std::time::Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .unwrap_or_else(|| now + std::time::Duration::from_secs(86_400 * 365 * 30))
}

/// The wall-clock time `after` from now, if representable.
pub(crate) fn wall_after(clock: &dyn Clock, after: std::time::Duration) -> Option<DateTime<Utc>> {
    let after = Duration::from_std(after).ok()?;
    clock.now().checked_add_signed(after)
}
