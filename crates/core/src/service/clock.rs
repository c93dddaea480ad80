//! Wall-clock source for scheduling and snapshot timestamps

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Supplies the current wall time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall time derived from the tokio clock, anchored at a fixed instant.
///
/// Advances with `tokio::time::advance` and paused-time auto-advance, so
/// scheduling can be driven without real sleeping.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin_wall: DateTime<Utc>,
    origin: tokio::time::Instant,
}

impl TokioClock {
    /// Must be called inside a tokio runtime.
    pub fn starting_at(origin_wall: DateTime<Utc>) -> Self {
        Self {
            origin_wall,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now().duration_since(self.origin);
        chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|d| self.origin_wall.checked_add_signed(d))
            .unwrap_or(self.origin_wall)
    }
}

/// First multiple of `period` (counted from the Unix epoch) strictly after
/// `now`. An hourly period yields the top of the next hour.
pub fn next_aligned_tick(now: DateTime<Utc>, period: Duration) -> DateTime<Utc> {
    let period_ms = i64::try_from(period.as_millis()).unwrap_or(i64::MAX).max(1);
    let now_ms = now.timestamp_millis();
    let next_ms = (now_ms.div_euclid(period_ms) + 1).saturating_mul(period_ms);
    Utc.timestamp_millis_opt(next_ms)
        .single()
        .unwrap_or(now)
}

/// Time to wait from `now` until the next aligned tick.
pub fn until_next_tick(now: DateTime<Utc>, period: Duration) -> Duration {
    (next_aligned_tick(now, period) - now)
        .to_std()
        .unwrap_or(period)
}
