//! Finding the start of the observance from a lunar calendar.
//!
//! The calendar service maps Gregorian days to lunar months. The start date is the first day
//! whose lunar month is the target month, shifted by a per-timezone offset for regions that
//! usually sight the moon a day later.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

pub mod aladhan;

/// Ninth month of the lunar calendar.
pub const DEFAULT_TARGET_MONTH: u8 = 9;

/// How many Gregorian months are searched before giving up.
const SEARCH_MONTHS: u32 = 12;

#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    City { city: String, country: String },
    Coordinates { latitude: f64, longitude: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub gregorian: NaiveDate,
    pub lunar_month: u8,
}

/// One Gregorian month of the lunar calendar, days ordered by date.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LunarCalendar {
    pub timezone: Option<String>,
    pub days: Vec<CalendarDay>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTimings {
    /// Imsak, when the pre-dawn meal should end.
    pub sehri: String,
    /// Fajr.
    pub khatam_sehri: String,
    /// Maghrib.
    pub iftar: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait LunarCalendarSource: Send + Sync {
    async fn calendar(&self, location: &Location, year: i32, month: u32) -> Result<LunarCalendar>;

    async fn timings(&self, location: &Location, date: NaiveDate) -> Result<DailyTimings>;
}

/// Settings of the start date lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupPolicy {
    pub target_month: u8,
    /// Days added to the found date, keyed by IANA timezone.
    pub sighting_offsets: BTreeMap<String, i64>,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            target_month: DEFAULT_TARGET_MONTH,
            sighting_offsets: BTreeMap::from([("Asia/Kolkata".to_string(), 1)]),
        }
    }
}

impl LookupPolicy {
    fn offset_for(&self, timezone: Option<&str>) -> i64 {
        timezone
            .and_then(|tz| self.sighting_offsets.get(tz))
            .copied()
            .unwrap_or(0)
    }

    /// `first_day` of the target month moved by the sighting offset of `timezone`.
    fn shift(&self, first_day: NaiveDate, timezone: Option<&str>) -> Option<NaiveDate> {
        let offset = self.offset_for(timezone);
        let days = Days::new(offset.unsigned_abs());
        if offset >= 0 {
            first_day.checked_add_days(days)
        } else {
            first_day.checked_sub_days(days)
        }
    }

    fn start_on(&self, first_day: NaiveDate, timezone: Option<&str>) -> Result<NaiveDate> {
        let start = self
            .shift(first_day, timezone)
            .ok_or_else(|| anyhow!("Sighting offset moves {first_day} out of range"))?;
        info!("Observance starts on {start}");
        Ok(start)
    }
}

/// Position of the target month relative to one Gregorian month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// The target month begins on this day.
    Starts(NaiveDate),
    /// The first day already belongs to the target month.
    Began,
    Absent,
}

fn boundary(days: &[CalendarDay], target_month: u8) -> Boundary {
    match days.iter().position(|d| d.lunar_month == target_month) {
        None => Boundary::Absent,
        Some(0) => Boundary::Began,
        Some(i) => Boundary::Starts(days[i].gregorian),
    }
}

/// Day the target month begins within `calendar`, with the sighting offset applied. `None` when
/// it begins in another Gregorian month.
pub fn find_observance_start(calendar: &LunarCalendar, policy: &LookupPolicy) -> Option<NaiveDate> {
    match boundary(&calendar.days, policy.target_month) {
        Boundary::Starts(first_day) => policy.shift(first_day, calendar.timezone.as_deref()),
        Boundary::Began | Boundary::Absent => None,
    }
}

/// Searches month by month for the beginning of the target month, starting at the month of
/// `from`. When `from` is already inside the target month the search walks back to where it
/// began, otherwise it walks forward.
pub async fn lookup_start_date(
    source: &dyn LunarCalendarSource,
    location: &Location,
    from: NaiveDate,
    policy: &LookupPolicy,
) -> Result<NaiveDate> {
    let mut month = from.with_day(1).unwrap_or(from);
    // Set while walking back: the month after `month`, whose first day may be the start.
    let mut later: Option<LunarCalendar> = None;
    for _ in 0..SEARCH_MONTHS {
        debug!("Looking for lunar month in {}-{}", month.year(), month.month());
        let calendar = source.calendar(location, month.year(), month.month()).await?;
        let next = match boundary(&calendar.days, policy.target_month) {
            Boundary::Starts(first_day) => {
                return policy.start_on(first_day, calendar.timezone.as_deref());
            }
            Boundary::Began => {
                later = Some(calendar);
                month.checked_sub_months(Months::new(1))
            }
            Boundary::Absent => {
                if let Some(later) = &later {
                    if let Some(first) = later.days.first() {
                        return policy.start_on(first.gregorian, later.timezone.as_deref());
                    }
                }
                month.checked_add_months(Months::new(1))
            }
        };
        let Some(next) = next else {
            break;
        };
        month = next;
    }
    bail!(
        "Lunar month {} not found within {SEARCH_MONTHS} months of {from}",
        policy.target_month
    )
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use mockall::predicate::eq;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn february(timezone: &str) -> LunarCalendar {
        LunarCalendar {
            timezone: Some(timezone.into()),
            days: (1..=28)
                .map(|day| CalendarDay {
                    gregorian: date(2026, 2, day),
                    lunar_month: if day < 18 { 8 } else { 9 },
                })
                .collect(),
        }
    }

    /// March 2026 with the target month lasting until `last_day`.
    fn march(timezone: &str, last_day: u32) -> LunarCalendar {
        LunarCalendar {
            timezone: Some(timezone.into()),
            days: (1..=31)
                .map(|day| CalendarDay {
                    gregorian: date(2026, 3, day),
                    lunar_month: if day <= last_day { 9 } else { 10 },
                })
                .collect(),
        }
    }

    #[test]
    fn first_day_of_target_month() {
        let policy = LookupPolicy::default();
        assert_eq!(
            find_observance_start(&february("Africa/Cairo"), &policy),
            Some(date(2026, 2, 18))
        );
    }

    #[test]
    fn applies_sighting_offset() {
        let policy = LookupPolicy::default();
        assert_eq!(
            find_observance_start(&february("Asia/Kolkata"), &policy),
            Some(date(2026, 2, 19))
        );
    }

    #[test]
    fn missing_month_is_none() {
        let mut calendar = february("UTC");
        calendar.days.retain(|d| d.lunar_month == 8);
        assert_eq!(
            find_observance_start(&calendar, &LookupPolicy::default()),
            None
        );
    }

    #[test]
    fn month_under_way_is_not_a_start() {
        assert_eq!(
            find_observance_start(&march("Asia/Kolkata", 19), &LookupPolicy::default()),
            None
        );
    }

    #[tokio::test]
    async fn lookup_during_the_month_walks_back() -> Result<()> {
        let mut source = MockLunarCalendarSource::new();
        source
            .expect_calendar()
            .with(mockall::predicate::always(), eq(2026), eq(3))
            .times(1)
            .returning(|_, _, _| Ok(march("Asia/Kolkata", 19)));
        source
            .expect_calendar()
            .with(mockall::predicate::always(), eq(2026), eq(2))
            .times(1)
            .returning(|_, _, _| Ok(february("Asia/Kolkata")));

        let location = Location::City {
            city: "Dadri".into(),
            country: "India".into(),
        };
        let start =
            lookup_start_date(&source, &location, date(2026, 3, 5), &LookupPolicy::default())
                .await?;
        assert_eq!(start, date(2026, 2, 19));
        Ok(())
    }

    #[tokio::test]
    async fn month_beginning_on_the_first() -> Result<()> {
        let mut source = MockLunarCalendarSource::new();
        source
            .expect_calendar()
            .with(mockall::predicate::always(), eq(2026), eq(3))
            .times(1)
            .returning(|_, _, _| Ok(march("Africa/Cairo", 29)));
        source
            .expect_calendar()
            .with(mockall::predicate::always(), eq(2026), eq(2))
            .times(1)
            .returning(|_, _, _| {
                let mut calendar = february("Africa/Cairo");
                calendar.days.iter_mut().for_each(|d| d.lunar_month = 8);
                Ok(calendar)
            });

        let location = Location::Coordinates {
            latitude: 30.04,
            longitude: 31.24,
        };
        let start =
            lookup_start_date(&source, &location, date(2026, 3, 10), &LookupPolicy::default())
                .await?;
        assert_eq!(start, date(2026, 3, 1));
        Ok(())
    }

    #[tokio::test]
    async fn searches_following_months() -> Result<()> {
        let mut source = MockLunarCalendarSource::new();
        source
            .expect_calendar()
            .with(eq(Location::City {
                city: "Dadri".into(),
                country: "India".into(),
            }), eq(2026), eq(1))
            .returning(|_, _, _| {
                Ok(LunarCalendar {
                    timezone: Some("Asia/Kolkata".into()),
                    days: vec![CalendarDay {
                        gregorian: date(2026, 1, 20),
                        lunar_month: 8,
                    }],
                })
            });
        source
            .expect_calendar()
            .with(mockall::predicate::always(), eq(2026), eq(2))
            .returning(|_, _, _| Ok(february("Asia/Kolkata")));

        let location = Location::City {
            city: "Dadri".into(),
            country: "India".into(),
        };
        let start =
            lookup_start_date(&source, &location, date(2026, 1, 10), &LookupPolicy::default())
                .await?;
        assert_eq!(start, date(2026, 2, 19));
        Ok(())
    }

    #[tokio::test]
    async fn service_errors_propagate() {
        let mut source = MockLunarCalendarSource::new();
        source
            .expect_calendar()
            .returning(|_, _, _| Err(anyhow!("timeout")));
        let location = Location::Coordinates {
            latitude: 28.55,
            longitude: 77.55,
        };
        let result =
            lookup_start_date(&source, &location, date(2026, 1, 1), &LookupPolicy::default()).await;
        assert!(result.is_err());
    }
}
