use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use super::{CalendarDay, DailyTimings, Location, LunarCalendar, LunarCalendarSource};

pub const DEFAULT_BASE_URL: &str = "https://api.aladhan.com/v1";

/// Calculation method of the prayer times service. 5 is the Egyptian General Authority of Survey.
pub const DEFAULT_METHOD: u8 = 5;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct CalendarEntry {
    date: EntryDate,
    meta: Option<EntryMeta>,
}

#[derive(Deserialize)]
struct EntryDate {
    gregorian: GregorianDate,
    hijri: HijriDate,
}

#[derive(Deserialize)]
struct GregorianDate {
    /// DD-MM-YYYY
    date: String,
}

#[derive(Deserialize)]
struct HijriDate {
    month: HijriMonth,
}

#[derive(Deserialize)]
struct HijriMonth {
    number: u8,
}

#[derive(Deserialize)]
struct EntryMeta {
    timezone: Option<String>,
}

#[derive(Deserialize)]
struct TimingsData {
    timings: Timings,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Timings {
    imsak: String,
    fajr: String,
    maghrib: String,
}

/// Client of the public aladhan.com calendar.
pub struct AladhanClient {
    client: Client,
    base_url: String,
    method: u8,
}

impl AladhanClient {
    pub fn new(base_url: &str, method: u8) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            method,
        })
    }

    fn location_query(&self, location: &Location) -> Vec<(&'static str, String)> {
        let mut query = match location {
            Location::City { city, country } => {
                vec![("city", city.clone()), ("country", country.clone())]
            }
            Location::Coordinates {
                latitude,
                longitude,
            } => vec![
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
            ],
        };
        query.push(("method", self.method.to_string()));
        query
    }

    fn calendar_url(&self, location: &Location, year: i32, month: u32) -> String {
        match location {
            Location::City { .. } => format!("{}/calendarByCity/{year}/{month}", self.base_url),
            Location::Coordinates { .. } => format!("{}/calendar/{year}/{month}", self.base_url),
        }
    }

    fn timings_url(&self, location: &Location, date: NaiveDate) -> String {
        let date = date.format("%d-%m-%Y");
        match location {
            Location::City { .. } => format!("{}/timingsByCity/{date}", self.base_url),
            Location::Coordinates { .. } => format!("{}/timings/{date}", self.base_url),
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: String, location: &Location) -> Result<T> {
        debug!("Requesting {url}");
        let envelope: Envelope<T> = self
            .client
            .get(&url)
            .query(&self.location_query(location))
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Unexpected response from {url}"))?;
        Ok(envelope.data)
    }
}

fn parse_calendar(entries: Vec<CalendarEntry>) -> Result<LunarCalendar> {
    let timezone = entries
        .first()
        .and_then(|v| v.meta.as_ref())
        .and_then(|v| v.timezone.clone());
    let mut days: Vec<CalendarDay> = entries
        .into_iter()
        .map(|entry| {
            let gregorian = NaiveDate::parse_from_str(&entry.date.gregorian.date, "%d-%m-%Y")
                .with_context(|| format!("Bad date {:?}", entry.date.gregorian.date))?;
            Ok(CalendarDay {
                gregorian,
                lunar_month: entry.date.hijri.month.number,
            })
        })
        .collect::<Result<_>>()?;
    days.sort_by_key(|d| d.gregorian);
    Ok(LunarCalendar { timezone, days })
}

/// Times come as `04:52` or `04:52 (IST)`.
fn clean_time(time: &str) -> String {
    time.split_whitespace().next().unwrap_or_default().to_string()
}

impl From<Timings> for DailyTimings {
    fn from(value: Timings) -> Self {
        Self {
            sehri: clean_time(&value.imsak),
            khatam_sehri: clean_time(&value.fajr),
            iftar: clean_time(&value.maghrib),
        }
    }
}

#[async_trait]
impl LunarCalendarSource for AladhanClient {
    async fn calendar(&self, location: &Location, year: i32, month: u32) -> Result<LunarCalendar> {
        let entries: Vec<CalendarEntry> = self
            .get(self.calendar_url(location, year, month), location)
            .await?;
        parse_calendar(entries)
    }

    async fn timings(&self, location: &Location, date: NaiveDate) -> Result<DailyTimings> {
        let data: TimingsData = self.get(self.timings_url(location, date), location).await?;
        Ok(data.timings.into())
    }
}
