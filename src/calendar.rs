use crate::catalog::{Catalog, TimeBlock};
use chrono::{Datelike, Days, Duration, Local, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_HORIZON_DAYS: u32 = 7;
/// Longest booking window accepted from configuration or callers.
pub const MAX_HORIZON_DAYS: u32 = 366;

/// Source of "now" for the time-window rules.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Wall clock in the school's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolCalendar {
    holidays: HashSet<NaiveDate>,
    non_working_days: HashSet<Weekday>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchoolCalendarConfig {
    #[serde(default)]
    holidays: Vec<NaiveDate>,
}

impl Default for SchoolCalendar {
    fn default() -> Self {
        Self {
            holidays: HashSet::new(),
            non_working_days: HashSet::from([Weekday::Sat, Weekday::Sun]),
        }
    }
}

impl SchoolCalendar {
    pub fn with_holidays<I>(holidays: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut calendar = Self::default();
        calendar.holidays.extend(holidays);
        calendar
    }

    pub fn from_config(config: &SchoolCalendarConfig) -> Self {
        Self::with_holidays(config.holidays.iter().copied())
    }

    pub fn to_config(&self) -> SchoolCalendarConfig {
        SchoolCalendarConfig::from(self)
    }

    /// Add a single holiday
    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    /// Add multiple holidays at once
    pub fn add_holidays(&mut self, dates: &[NaiveDate]) {
        self.holidays.extend(dates);
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Weekday that is not a holiday.
    pub fn is_school_day(&self, date: NaiveDate) -> bool {
        !self.holidays.contains(&date) && !self.non_working_days.contains(&date.weekday())
    }

    /// Find the next school day after a given date
    pub fn next_school_day(&self, from: NaiveDate) -> NaiveDate {
        let mut current = from + Duration::days(1);
        while !self.is_school_day(current) {
            current = current + Duration::days(1);
        }
        current
    }

    /// All school days in a date range (inclusive)
    pub fn school_days_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut current = start;

        while current <= end {
            if self.is_school_day(current) {
                days.push(current);
            }
            current = current + Duration::days(1);
        }
        days
    }

    /// True once `now` has reached the end of the last block of `date`.
    ///
    /// Dates before today are always passed; the cutoff for today comes from
    /// the catalog's generic grid for that day type.
    pub fn is_day_passed(&self, catalog: &Catalog, date: NaiveDate, now: NaiveDateTime) -> bool {
        let today = now.date();
        if date < today {
            return true;
        }
        if date > today {
            return false;
        }
        match catalog.generic_template(date).ok().and_then(|t| t.day_end()) {
            Some(day_end) => now.time() >= day_end,
            None => true,
        }
    }

    /// Whole minutes only: a block ending at 13:50 stays open until 13:51.
    pub fn is_block_passed(&self, block: &TimeBlock, date: NaiveDate, now: NaiveDateTime) -> bool {
        let minute = now
            .time()
            .with_second(0)
            .and_then(|time| time.with_nanosecond(0))
            .unwrap_or(now.time());
        date == now.date() && minute > block.end
    }

    /// Whether `date` can still be booked at `now` within `horizon_days`.
    pub fn is_selectable(
        &self,
        catalog: &Catalog,
        date: NaiveDate,
        now: NaiveDateTime,
        horizon_days: u32,
    ) -> bool {
        let last = last_bookable_date(now.date(), horizon_days);
        self.is_school_day(date) && date <= last && !self.is_day_passed(catalog, date, now)
    }

    /// Bookable dates from today through `today + horizon_days`.
    pub fn available_dates(
        &self,
        catalog: &Catalog,
        now: NaiveDateTime,
        horizon_days: u32,
    ) -> Vec<NaiveDate> {
        let today = now.date();
        let last = last_bookable_date(today, horizon_days);
        self.school_days_in_range(today, last)
            .into_iter()
            .filter(|date| !self.is_day_passed(catalog, *date, now))
            .collect()
    }
}

/// `today + horizon_days`, with the horizon capped at [`MAX_HORIZON_DAYS`].
pub fn last_bookable_date(today: NaiveDate, horizon_days: u32) -> NaiveDate {
    let days = Days::new(u64::from(horizon_days.min(MAX_HORIZON_DAYS)));
    today.checked_add_days(days).unwrap_or(NaiveDate::MAX)
}

impl SchoolCalendarConfig {
    pub fn new<I>(holidays: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut holidays: Vec<NaiveDate> = holidays.into_iter().collect();
        holidays.sort();
        holidays.dedup();
        Self { holidays }
    }

    pub fn holidays(&self) -> &[NaiveDate] {
        &self.holidays
    }
}

impl From<&SchoolCalendar> for SchoolCalendarConfig {
    fn from(calendar: &SchoolCalendar) -> Self {
        Self::new(calendar.holidays.iter().copied())
    }
}
