//! Time source and day-boundary discipline
//!
//! Both the load-time rollover check and the watchdog's midnight window go
//! through [`DayBoundary`], so they always agree on when a day starts.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Which calendar decides where one tracking day ends and the next begins
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayBoundary {
    #[default]
    Utc,
    Local,
}

impl DayBoundary {
    pub fn date_of(&self, t: DateTime<Utc>) -> NaiveDate {
        match self {
            DayBoundary::Utc => t.date_naive(),
            DayBoundary::Local => t.with_timezone(&Local).date_naive(),
        }
    }

    pub fn time_of_day(&self, t: DateTime<Utc>) -> NaiveTime {
        match self {
            DayBoundary::Utc => t.time(),
            DayBoundary::Local => t.with_timezone(&Local).time(),
        }
    }

    /// True when `earlier` falls on a previous calendar day relative to `now`
    pub fn is_previous_day(&self, earlier: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.date_of(now) > self.date_of(earlier)
    }
}

#[cfg(test)]
pub(crate) mod test_clock {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Settable clock for tests
    pub struct FixedClock(Mutex<DateTime<Utc>>);

    impl FixedClock {
        pub fn at(t: DateTime<Utc>) -> Self {
            Self(Mutex::new(t))
        }

        pub fn set(&self, t: DateTime<Utc>) {
            *self.0.lock().unwrap() = t;
        }

        pub fn advance(&self, by: chrono::Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    /// Instant of a wall-clock time in the machine's local zone
    pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }
}
