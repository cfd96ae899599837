use std::ops::Add;
use std::{
    sync::RwLock,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Source of wall-clock time.
///
/// Query window validation is relative to "now", so the gateway takes a
/// `Clock` rather than calling [`SystemTime::now`] directly.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;

    /// Current time as epoch nanoseconds, saturating at the `i64` range.
    fn now_nanos(&self) -> i64 {
        to_epoch_nanos(self.now())
    }
}

/// Converts a `SystemTime` into signed epoch nanoseconds.
pub fn to_epoch_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_nanos())
            .map(|n| -n)
            .unwrap_or(i64::MIN),
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Debug)]
pub struct MockClock {
    now: RwLock<SystemTime>,
}

impl Clock for MockClock {
    fn now(&self) -> SystemTime {
        *self.now.read().unwrap()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    pub fn with_time(time: SystemTime) -> Self {
        Self {
            now: RwLock::new(time),
        }
    }

    /// A clock frozen at the given epoch nanoseconds.
    pub fn at_nanos(nanos: i64) -> Self {
        let time = if nanos >= 0 {
            UNIX_EPOCH + Duration::from_nanos(nanos as u64)
        } else {
            UNIX_EPOCH - Duration::from_nanos(nanos.unsigned_abs())
        };
        Self::with_time(time)
    }

    pub fn new() -> Self {
        Self::with_time(SystemTime::now())
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.write().unwrap();
        *now = now.add(duration);
    }

    pub fn set_time(&self, time: SystemTime) {
        *self.now.write().unwrap() = time;
    }
}
