//! Wall-clock access for the pipeline
//!
//! The pipeline samples time through this trait so cycles can be replayed
//! at any instant in tests.

use chrono::{DateTime, Timelike, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Minute of the hour (0..=59) used for account rotation
    fn minute_of_hour(&self) -> u32 {
        self.now().minute()
    }
}

/// The real UTC clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock_minute() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 10, 42, 7).unwrap());
        assert_eq!(clock.minute_of_hour(), 42);

        clock.advance(chrono::Duration::minutes(20));
        assert_eq!(clock.minute_of_hour(), 2);
    }
}
