use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Subcommand, ValueEnum};
use tracing::warn;

use crate::{
    lunar::{lookup_start_date, LunarCalendarSource, Location},
    planner::{commands::Command, day_index::DayIndex, state::PlannerState},
    utils::{clock::Clock, time::date_to_string},
};

use super::{Args, Session};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Clone, Copy, clap::Args)]
pub struct Coordinates {
    #[arg(long, requires = "longitude", allow_negative_numbers = true)]
    latitude: Option<f64>,
    #[arg(long, requires = "latitude", allow_negative_numbers = true)]
    longitude: Option<f64>,
}

impl Coordinates {
    /// Explicit coordinates win over the saved city.
    fn location(self, state: &PlannerState) -> Location {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Location::Coordinates {
                latitude,
                longitude,
            },
            _ => Location::City {
                city: state.user_city.clone(),
                country: state.user_country.clone(),
            },
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    #[command(about = "Set the first day of Ramadan")]
    StartDate {
        #[arg(help = "Examples are \"today\", \"yesterday\", \"18/02/2026\", \"2026-02-18\"")]
        date: String,
        #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
        date_style: DateStyle,
    },
    #[command(about = "Set the city used for calendar and prayer time lookups")]
    Location { city: String, country: String },
    #[command(about = "Enable or disable reminders")]
    Notifications {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    #[command(about = "Look up the first day of Ramadan from the lunar calendar")]
    LookupStart {
        #[command(flatten)]
        coordinates: Coordinates,
        #[arg(long, help = "Month to start searching from. Defaults to the current month")]
        from: Option<String>,
        #[arg(long, default_value_t = DateStyle::Uk)]
        date_style: DateStyle,
    },
    #[command(about = "Fetch sehri and iftar times for the day")]
    Timings {
        #[command(flatten)]
        coordinates: Coordinates,
    },
}

fn parse_date(value: &str, now: DateTime<Local>, style: DateStyle) -> Result<NaiveDate> {
    // Plain ISO dates are not always understood by the natural language parser.
    if let Ok(date) = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        return Ok(date);
    }
    match parse_date_string(value, now, style.into()) {
        Ok(v) => Ok(v.date_naive()),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {value}: {e}"),
            )
            .into()),
    }
}

/// Fetches today's timings and files them under the meal plan of `day`.
async fn meal_timings(
    source: &dyn LunarCalendarSource,
    location: &Location,
    today: NaiveDate,
    day: DayIndex,
) -> Result<Command> {
    let timings = source.timings(location, today).await?;
    println!(
        "Sehri {}\tFajr {}\tIftar {}",
        timings.sehri, timings.khatam_sehri, timings.iftar
    );
    Ok(Command::SetMealTimings {
        day,
        suhoor: timings.sehri,
        iftar: timings.iftar,
    })
}

pub async fn process_settings_command(
    action: SettingsAction,
    session: &Session,
    day: DayIndex,
) -> Result<()> {
    let state = session.planner.snapshot().await;
    match action {
        SettingsAction::StartDate { date, date_style } => {
            let date = parse_date(&date, Local::now(), date_style)?;
            session.execute(Command::SetStartDate(date)).await
        }
        SettingsAction::Location { city, country } => {
            session.execute(Command::SetLocation { city, country }).await
        }
        SettingsAction::Notifications { enabled } => {
            session.execute(Command::SetNotifications(enabled)).await
        }
        SettingsAction::LookupStart {
            coordinates,
            from,
            date_style,
        } => {
            let from = match from {
                Some(from) => parse_date(&from, Local::now(), date_style)?,
                None => Local::now().date_naive(),
            };
            let client = session.config.lunar.client()?;
            let location = coordinates.location(&state);
            let found =
                lookup_start_date(&client, &location, from, &session.config.lunar.policy).await;
            match found {
                Ok(date) => {
                    println!("Ramadan starts on {}", date_to_string(date));
                    session.execute(Command::SetStartDate(date)).await
                }
                Err(e) => {
                    warn!("Start date lookup failed {e:?}");
                    println!(
                        "Couldn't look up the start date, keeping {}",
                        date_to_string(state.period.start_date())
                    );
                    Ok(())
                }
            }
        }
        SettingsAction::Timings { coordinates } => {
            let client = session.config.lunar.client()?;
            let location = coordinates.location(&state);
            let command = meal_timings(&client, &location, session.clock.today(), day).await?;
            session.execute(command).await
        }
    }
}
