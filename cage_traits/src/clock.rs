use chrono::NaiveDateTime;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Time source for the controller.
///
/// - now(): monotonic Instant, used for every timeout (grace period, debounce)
/// - wall_now(): local calendar time, used for timestamps and day rollover
/// - sleep(): implementations may simulate
pub trait Clock {
    fn now(&self) -> Instant;
    fn wall_now(&self) -> NaiveDateTime;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        dur.as_millis() as u64
    }
}

/// Real clock: `Instant` for timing, `chrono::Local` for the calendar.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn wall_now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
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
/// now() = origin + offset, wall_now() = wall_origin + offset.
/// sleep(d) advances both by d without actually sleeping. Clones share time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: NaiveDateTime,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn starting_at(wall_origin: NaiveDateTime) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }

    fn offset(&self) -> Duration {
        self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset()
    }

    fn wall_now(&self) -> NaiveDateTime {
        let off = chrono::Duration::from_std(self.offset()).unwrap_or(chrono::Duration::zero());
        self.wall_origin + off
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn manual_clock_moves_both_timelines() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap();
        let clk = ManualClock::starting_at(start);
        let t0 = clk.now();
        clk.sleep(Duration::from_secs(90));
        assert_eq!(clk.ms_since(t0), 90_000);
        let wall = clk.wall_now();
        assert_eq!(wall.date(), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(wall.minute(), 0);
        assert_eq!(wall.second(), 30);
    }

    #[test]
    fn clones_share_time() {
        let clk = ManualClock::starting_at(chrono::NaiveDateTime::default());
        let other = clk.clone();
        let t0 = clk.now();
        other.advance(Duration::from_millis(250));
        assert_eq!(clk.ms_since(t0), 250);
    }
}
