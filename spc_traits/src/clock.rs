use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Clock abstraction shared by the generation, sampling and monitor loops.
///
/// - now(): monotonic Instant used for pacing
/// - timestamp(): wall-clock time stamped onto readings and measurements
/// - sleep(): sleeps for the provided duration (implementations may simulate)
/// - ms_since(): helper to compute elapsed milliseconds from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn timestamp(&self) -> DateTime<Utc>;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        dur.as_millis() as u64
    }
}

/// Longest single sleep taken by [`sleep_while`] before re-checking its condition.
pub const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Sleep for `total` on `clock`, in slices of at most [`SLEEP_SLICE`], returning
/// early (with `false`) as soon as `keep_going` turns false.
pub fn sleep_while<C: Clock + ?Sized>(
    clock: &C,
    total: Duration,
    mut keep_going: impl FnMut() -> bool,
) -> bool {
    let mut left = total;
    while !left.is_zero() {
        if !keep_going() {
            return false;
        }
        let step = left.min(SLEEP_SLICE);
        clock.sleep(step);
        left -= step;
    }
    keep_going()
}

/// Real-time clock backed by `std::time::Instant` and the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Deterministic clock whose time only moves when told to.
///
/// now() = origin + offset, timestamp() = wall_origin + offset.
/// sleep(d) advances internal time by d without actually sleeping, so it is
/// meant for driving single evaluations, not the background loops.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Pin the wall clock to a known instant (useful for exact-text assertions).
    pub fn starting_at(wall_origin: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        let mut off = self.offset.lock();
        *off = off.saturating_add(d);
    }

    /// Set the absolute offset relative to origin.
    pub fn set_offset(&self, d: Duration) {
        *self.offset.lock() = d;
    }

    fn offset(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        let off =
            chrono::Duration::from_std(self.offset()).unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_origin
            .checked_add_signed(off)
            .unwrap_or(self.wall_origin)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
