//! Wall-clock access
//!
//! Time-of-flight is measured against the sender's UTC timestamp, so nodes
//! read wall-clock time through [`Clock`] and tests can pin it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of UTC time
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> u64;

    /// Seconds since the Unix epoch
    fn now_secs(&self) -> u64 {
        self.now_millis() / 1000
    }
}

/// The host's system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    /// Start at a whole-second UTC time
    pub fn at_secs(secs: u64) -> Self {
        Self::new(secs * 1000)
    }

    pub fn set_millis(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, delta: u64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }
}

/// Current UTC time in seconds
pub fn unix_timestamp() -> u64 {
    SystemClock.now_secs()
}

/// Elapsed milliseconds between a whole-second origination time and `now_millis`.
///
/// Saturates at zero when the sender's clock runs ahead of ours and at
/// `u32::MAX` for absurdly old timestamps.
pub fn time_of_flight_ms(origin_secs: u64, now_millis: u64) -> u32 {
    let elapsed = now_millis.saturating_sub(origin_secs.saturating_mul(1000));
    u32::try_from(elapsed).unwrap_or(u32::MAX)
}
