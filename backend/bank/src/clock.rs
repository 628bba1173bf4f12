//! Wall-clock source for month unlocking.
//!
//! The current month is the calendar month of the clock's local instant,
//! 1-indexed. Without a pinned offset this is whatever the host considers
//! local time, so two hosts either side of a month boundary can disagree.
use std::sync::Mutex;

use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    fn current_month(&self) -> u8 {
        self.now().month() as u8
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock {
    offset: Option<FixedOffset>,
}

impl SystemClock {
    /// Host local time.
    pub fn local() -> Self {
        Self { offset: None }
    }

    /// Pin the calendar to a fixed UTC offset regardless of host settings.
    pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self {
            offset: Some(offset),
        })
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.offset {
            Some(offset) => Utc::now().with_timezone(&offset),
            None => Local::now().fixed_offset(),
        }
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Midday UTC on the first of `month` in `year`.
    pub fn at_month(year: i32, month: u32) -> Option<Self> {
        let date = chrono::NaiveDate::from_ymd_opt(year, month, 1)?;
        let now = date.and_hms_opt(12, 0, 0)?.and_utc().fixed_offset();

        Some(Self::new(now))
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_month_boundary() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let clock = ManualClock::new(offset.with_ymd_and_hms(2026, 3, 31, 23, 59, 59).unwrap());
        assert_eq!(clock.current_month(), 3);

        clock.advance(Duration::seconds(1));
        assert_eq!(clock.current_month(), 4);
    }

    #[test]
    fn test_offset_decides_month() {
        // Same instant, different calendars.
        let instant = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap();

        let utc = ManualClock::new(instant.fixed_offset());
        let behind = ManualClock::new(instant.with_timezone(&FixedOffset::west_opt(5 * 3600).unwrap()));

        assert_eq!(utc.current_month(), 1);
        assert_eq!(behind.current_month(), 12);
        assert_eq!(utc.now_utc(), behind.now_utc());
    }

    #[test]
    fn test_december_rolls_to_january() {
        let clock = ManualClock::at_month(2025, 12).unwrap();
        assert_eq!(clock.current_month(), 12);

        clock.advance(Duration::days(31));
        assert_eq!(clock.current_month(), 1);
    }

    #[test]
    fn test_offset_bounds() {
        assert!(SystemClock::with_offset_minutes(-300).is_some());
        assert!(SystemClock::with_offset_minutes(24 * 60).is_none());
    }
}
