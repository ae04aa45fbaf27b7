//! Deterministic clock for tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};

use seckill_core::Clock;

/// A clock frozen at a settable instant.
///
/// Identifier timestamps, daily counter keys and order commit times all
/// come from the injected [`Clock`], so freezing it makes those values
/// assertable.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// A clock frozen at the given instant.
    #[must_use]
    pub const fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to a new instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Default for FixedClock {
    /// Noon UTC on 2022-06-01, comfortably after the identifier epoch.
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2022, 6, 1, 12, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
