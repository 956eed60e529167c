//! Injectable time source
//!
//! Renewal decisions are the engine's only time-dependent behavior, so the
//! clock is passed to the chain constructor instead of read from a global.
//! Tests use [`FakeClock`] to pin evaluation to a fixed instant.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use std::sync::Mutex;

/// A source of the current time
pub trait Clock: Send + Sync {
    /// The current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for tests
///
/// Defaults to the zero time (`0001-01-01 00:00:00 +0000 UTC`).
#[derive(Debug)]
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    /// Create a fake clock pinned to `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Move the clock to `now`
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    /// Advance the clock by `delta`
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(zero_time())
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// The zero instant, year 1
pub fn zero_time() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0) {
        chrono::LocalResult::Single(t) => t,
        _ => DateTime::<Utc>::MIN_UTC,
    }
}

/// Render a timestamp in the canonical form used in policy messages:
/// `2006-01-02 15:04:05.999999999 +0000 UTC`, with trailing zeros of the
/// fractional second trimmed and the fraction omitted entirely when zero.
///
/// Messages embed times only through this function so that controller
/// status transitions are byte-stable.
pub fn timestamp_string(t: DateTime<Utc>) -> String {
    let mut out = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        t.year(),
        t.month(),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    );
    let nanos = t.nanosecond();
    if nanos > 0 && nanos < 1_000_000_000 {
        let mut frac = format!("{nanos:09}");
        while frac.ends_with('0') {
            frac.pop();
        }
        out.push('.');
        out.push_str(&frac);
    }
    out.push_str(" +0000 UTC");
    out
}
