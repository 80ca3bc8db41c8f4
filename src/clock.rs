//! Wall-clock abstraction so lockout expiry, bucket refill and token expiry
//! can be driven deterministically in tests.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Largest span `to_chrono` produces.
const MAX_MILLIS: i64 = i64::MAX / 1_000;

/// Convert a std duration to a chrono one at millisecond precision, clamping
/// spans chrono cannot represent.
pub fn to_chrono(d: std::time::Duration) -> Duration {
    let ms = i64::try_from(d.as_millis()).unwrap_or(MAX_MILLIS);
    Duration::milliseconds(ms.min(MAX_MILLIS))
}

/// `at + d`, saturating at the latest representable instant.
pub fn add_saturating(at: DateTime<Utc>, d: std::time::Duration) -> DateTime<Utc> {
    at.checked_add_signed(to_chrono(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Clamp a chrono duration into a non-negative std duration.
pub fn to_std(d: Duration) -> std::time::Duration {
    d.to_std().unwrap_or_default()
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
