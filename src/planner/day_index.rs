//! Maps wall clock dates onto the 1-based day of the observance period.
//!
//! The day is never stored. Every consumer calls [resolve] or [resolve_at] with the current start
//! date, so changing the start date is immediately reflected everywhere.

use std::{fmt::Display, str::FromStr};

use anyhow::anyhow;
use chrono::{DateTime, Days, NaiveDate, TimeZone};
use now::DateTimeNow;
use serde::{Deserialize, Serialize};

/// Number of days tracked. Fixed.
pub const OBSERVANCE_LENGTH: u8 = 30;

/// Position inside the observance period, always within `1..=30`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayIndex(u8);

impl DayIndex {
    pub const FIRST: DayIndex = DayIndex(1);
    pub const LAST: DayIndex = DayIndex(OBSERVANCE_LENGTH);

    pub fn new_opt(value: i64) -> Option<DayIndex> {
        if (1..=OBSERVANCE_LENGTH as i64).contains(&value) {
            Some(DayIndex(value as u8))
        } else {
            None
        }
    }

    /// Bounds arbitrary arithmetic into the period instead of failing. Day numbers computed
    /// near the period edges routinely fall one step outside.
    pub fn clamped(value: i64) -> DayIndex {
        DayIndex(value.clamp(1, OBSERVANCE_LENGTH as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero based position, handy for indexing 30 element arrays.
    pub fn offset(self) -> usize {
        (self.0 - 1) as usize
    }

    /// Every day of the period in order.
    pub fn all() -> impl DoubleEndedIterator<Item = DayIndex> {
        (1..=OBSERVANCE_LENGTH).map(DayIndex)
    }

    /// Days `1..=self`.
    pub fn up_to(self) -> impl DoubleEndedIterator<Item = DayIndex> {
        (1..=self.0).map(DayIndex)
    }

    pub fn ashra(self) -> Ashra {
        match self.0 {
            1..=10 => Ashra::Mercy,
            11..=20 => Ashra::Forgiveness,
            _ => Ashra::Salvation,
        }
    }
}

impl TryFrom<u8> for DayIndex {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        DayIndex::new_opt(value as i64)
            .ok_or_else(|| anyhow!("day {value} is outside 1..={OBSERVANCE_LENGTH}"))
    }
}

impl From<DayIndex> for u8 {
    fn from(value: DayIndex) -> Self {
        value.0
    }
}

impl FromStr for DayIndex {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<u8>()?;
        DayIndex::try_from(value)
    }
}

impl Display for DayIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three ten-day thirds of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ashra {
    Mercy,
    Forgiveness,
    Salvation,
}

impl Display for Ashra {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ashra::Mercy => write!(f, "Mercy"),
            Ashra::Forgiveness => write!(f, "Forgiveness"),
            Ashra::Salvation => write!(f, "Salvation"),
        }
    }
}

/// The tracked span. Only the start date is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservancePeriod {
    start_date: NaiveDate,
}

impl ObservancePeriod {
    pub fn new(start_date: NaiveDate) -> Self {
        Self { start_date }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn length(&self) -> u8 {
        OBSERVANCE_LENGTH
    }

    /// Calendar date a day of the period falls on.
    pub fn date_of(&self, day: DayIndex) -> NaiveDate {
        self.start_date + Days::new(day.offset() as u64)
    }

    pub fn end_date(&self) -> NaiveDate {
        self.date_of(DayIndex::LAST)
    }

    pub fn day_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> DayIndex {
        resolve_at(self.start_date, now)
    }
}

/// Day of the period `today` falls on.
///
/// Past and future are not symmetric: any date before the start resolves to day 1 and any date
/// 30 or more days after the start resolves to day 30.
pub fn resolve(start_date: NaiveDate, today: NaiveDate) -> DayIndex {
    let elapsed = (today - start_date).num_days();
    DayIndex::clamped(elapsed + 1)
}

/// [resolve] for a wall clock moment. The moment is reduced to its local midnight first, so the
/// time of day never changes the result.
pub fn resolve_at<Tz: TimeZone>(start_date: NaiveDate, now: DateTime<Tz>) -> DayIndex {
    resolve(start_date, now.beginning_of_day().date_naive())
}
