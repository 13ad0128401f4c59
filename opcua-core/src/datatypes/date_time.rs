//! UTC timestamps as 100-nanosecond ticks since 1601-01-01

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Ticks between 1601-01-01 and 1970-01-01
const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// OPC UA DateTime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DateTime(i64);

impl DateTime {
    /// The null date (ticks = 0)
    pub const fn null() -> Self {
        DateTime(0)
    }

    pub const fn from_ticks(ticks: i64) -> Self {
        DateTime(ticks)
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        let ticks = match time.duration_since(UNIX_EPOCH) {
            Ok(since) => UNIX_EPOCH_TICKS + duration_ticks(since),
            Err(before) => UNIX_EPOCH_TICKS - duration_ticks(before.duration()),
        };
        DateTime(ticks.max(0))
    }

    pub const fn ticks(&self) -> i64 {
        self.0
    }

    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Seconds since the Unix epoch, negative before 1970
    pub const fn unix_seconds(&self) -> i64 {
        (self.0 - UNIX_EPOCH_TICKS) / TICKS_PER_SECOND
    }

    /// Offset this timestamp by a duration
    pub fn add(&self, duration: Duration) -> Self {
        DateTime(self.0.saturating_add(duration_ticks(duration)))
    }
}

fn duration_ticks(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos() / 100).unwrap_or(i64::MAX)
}
