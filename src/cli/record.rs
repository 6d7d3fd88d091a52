//! Subcommands that record something for a day. Each one maps to exactly one [Command].

use anyhow::{ensure, Result};
use chrono::{DateTime, NaiveTime, Utc};
use clap::{ArgAction, Subcommand};

use crate::{
    planner::{
        commands::Command,
        day_index::DayIndex,
        records::{
            DietaryGoal, DietaryProfile, FastingStatus, HealthCondition, KhatamPlan, MealSlot,
            Prayer, PrayerStatus, QuranBookmark, Region, TimeOfDay,
        },
    },
    utils::time::parse_hhmm,
};

#[derive(Debug, Subcommand)]
pub enum PrayerAction {
    #[command(about = "Set the status of a prayer")]
    Set {
        prayer: Prayer,
        status: PrayerStatus,
    },
    #[command(about = "Move a prayer to its next status: completed, missed, qadha, unset")]
    Cycle { prayer: Prayer },
    #[command(about = "Forget the status of a prayer")]
    Clear { prayer: Prayer },
    #[command(about = "Mark sehri as eaten or not")]
    Sehri {
        #[arg(action = ArgAction::Set)]
        done: bool,
    },
    #[command(about = "Mark iftar as eaten or not")]
    Iftar {
        #[arg(action = ArgAction::Set)]
        done: bool,
    },
}

impl PrayerAction {
    pub fn into_command(self, day: DayIndex) -> Command {
        match self {
            PrayerAction::Set { prayer, status } => Command::SetPrayer {
                day,
                prayer,
                status: Some(status),
            },
            PrayerAction::Cycle { prayer } => Command::CyclePrayer { day, prayer },
            PrayerAction::Clear { prayer } => Command::SetPrayer {
                day,
                prayer,
                status: None,
            },
            PrayerAction::Sehri { done } => Command::SetSehri { day, done },
            PrayerAction::Iftar { done } => Command::SetIftar { day, done },
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum HabitAction {
    Add {
        name: String,
        #[arg(long, value_enum, default_value = "morning")]
        time_of_day: TimeOfDay,
    },
    Toggle { id: String },
    Remove { id: String },
}

impl HabitAction {
    pub fn into_command(self, day: DayIndex) -> Command {
        match self {
            HabitAction::Add { name, time_of_day } => Command::AddHabit {
                day,
                name,
                time_of_day,
            },
            HabitAction::Toggle { id } => Command::ToggleHabit { day, id },
            HabitAction::Remove { id } => Command::RemoveHabit { day, id },
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum TaskAction {
    Add {
        text: String,
        #[arg(long, help = "Reminder time as HH:MM")]
        time: Option<String>,
    },
    Edit {
        id: String,
        text: String,
        #[arg(long, help = "Reminder time as HH:MM")]
        time: Option<String>,
    },
    Toggle { id: String },
    Remove { id: String },
}

fn optional_time(time: Option<String>) -> Result<Option<NaiveTime>> {
    time.as_deref().map(parse_hhmm).transpose()
}

impl TaskAction {
    pub fn into_command(self, day: DayIndex) -> Result<Command> {
        Ok(match self {
            TaskAction::Add { text, time } => Command::AddTask {
                day,
                text,
                time: optional_time(time)?,
            },
            TaskAction::Edit { id, text, time } => Command::EditTask {
                day,
                id,
                text,
                time: optional_time(time)?,
            },
            TaskAction::Toggle { id } => Command::ToggleTask { day, id },
            TaskAction::Remove { id } => Command::RemoveTask { day, id },
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum ChallengeAction {
    #[command(about = "Mark the day's challenge as completed")]
    Done,
    #[command(about = "Mark the day's challenge as not completed")]
    Undo,
    #[command(about = "Replace the text of the day's challenge")]
    Edit { task: String },
}

impl ChallengeAction {
    pub fn into_command(self, day: DayIndex) -> Command {
        match self {
            ChallengeAction::Done => Command::SetChallenge {
                day,
                completed: true,
            },
            ChallengeAction::Undo => Command::SetChallenge {
                day,
                completed: false,
            },
            ChallengeAction::Edit { task } => Command::EditChallenge { day, task },
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum QuranAction {
    #[command(about = "Set how many pages were read on the day")]
    Pages {
        #[arg(allow_negative_numbers = true)]
        pages: i64,
    },
    #[command(about = "Toggle completion of a juz (1-30)")]
    Juz { juz: u8 },
    #[command(about = "Clear every juz to start a new reading")]
    ResetJuz,
    #[command(about = "Count a finished reading of the whole Quran")]
    CompleteJourney,
    #[command(about = "Set the number of finished readings")]
    Completions { count: i64 },
    #[command(about = "Plan the reading pace")]
    Plan {
        #[arg(long, default_value_t = 604)]
        total_pages: u32,
        #[arg(long, default_value_t = 20)]
        pages_per_day: u32,
    },
    #[command(about = "Remember where reading stopped")]
    Bookmark { para: u8, aya: u32 },
}

impl QuranAction {
    pub fn into_command(self, day: DayIndex) -> Command {
        match self {
            QuranAction::Pages { pages } => Command::SetDailyPages { day, pages },
            QuranAction::Juz { juz } => Command::ToggleJuz { juz },
            QuranAction::ResetJuz => Command::ResetJuz,
            QuranAction::CompleteJourney => Command::CompleteQuranJourney,
            QuranAction::Completions { count } => Command::SetQuranCompletionCount { count },
            QuranAction::Plan {
                total_pages,
                pages_per_day,
            } => Command::SetKhatamPlan(KhatamPlan {
                total_pages,
                pages_per_day,
            }),
            QuranAction::Bookmark { para, aya } => {
                Command::SetBookmark(QuranBookmark { para, aya })
            }
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum MealAction {
    Add { slot: MealSlot, meal_id: String },
    Remove { slot: MealSlot, meal_id: String },
    Clear { slot: MealSlot },
    #[command(about = "Set the dietary profile used for meal suggestions")]
    Profile {
        #[arg(long, value_enum, default_value = "maintenance")]
        goal: DietaryGoal,
        #[arg(long, value_enum, default_value = "none")]
        condition: HealthCondition,
        #[arg(long, value_enum, default_value = "desi")]
        region: Region,
    },
}

impl MealAction {
    pub fn into_command(self, day: DayIndex) -> Command {
        match self {
            MealAction::Add { slot, meal_id } => Command::AddMeal { day, slot, meal_id },
            MealAction::Remove { slot, meal_id } => Command::RemoveMeal { day, slot, meal_id },
            MealAction::Clear { slot } => Command::ClearMeal { day, slot },
            MealAction::Profile {
                goal,
                condition,
                region,
            } => Command::SetDietaryProfile(DietaryProfile {
                goal,
                condition,
                region,
            }),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum NoteAction {
    Add { content: String },
    Edit { id: String, content: String },
    Remove { id: String },
}

impl NoteAction {
    pub fn into_command(self, day: DayIndex, now: DateTime<Utc>) -> Command {
        match self {
            NoteAction::Add { content } => Command::AddNote {
                day,
                date: now,
                content,
            },
            NoteAction::Edit { id, content } => Command::EditNote { id, content },
            NoteAction::Remove { id } => Command::RemoveNote { id },
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum AlarmAction {
    Add {
        #[arg(help = "Kind of the alarm, for example Suhoor or Tahajjud")]
        kind: String,
        #[arg(help = "HH:MM")]
        time: String,
    },
    Toggle { id: String },
    Time {
        id: String,
        #[arg(help = "HH:MM")]
        time: String,
    },
    Remove { id: String },
}

impl AlarmAction {
    pub fn into_command(self, day: DayIndex) -> Result<Command> {
        Ok(match self {
            AlarmAction::Add { kind, time } => Command::AddAlarm {
                day,
                kind,
                time: parse_hhmm(&time)?,
            },
            AlarmAction::Toggle { id } => Command::ToggleAlarm { id },
            AlarmAction::Time { id, time } => Command::SetAlarmTime {
                id,
                time: parse_hhmm(&time)?,
            },
            AlarmAction::Remove { id } => Command::RemoveAlarm { id },
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum DuaAction {
    Add {
        title: String,
        #[arg(long, default_value = "")]
        arabic: String,
        #[arg(long, default_value = "")]
        transliteration: String,
        #[arg(long, default_value = "")]
        translation: String,
    },
    Favorite { id: String },
    Remove { id: String },
}

impl DuaAction {
    pub fn into_command(self) -> Result<Command> {
        Ok(match self {
            DuaAction::Add {
                title,
                arabic,
                transliteration,
                translation,
            } => {
                ensure!(
                    !arabic.trim().is_empty() || !translation.trim().is_empty(),
                    "A dua needs either --arabic or --translation"
                );
                Command::AddDua {
                    title,
                    arabic,
                    transliteration,
                    translation,
                }
            }
            DuaAction::Favorite { id } => Command::ToggleFavoriteDua { id },
            DuaAction::Remove { id } => Command::RemoveDua { id },
        })
    }
}

/// `fast <status>` sets, a bare `fast` clears.
pub fn fasting_command(day: DayIndex, status: Option<FastingStatus>) -> Command {
    Command::SetFasting { day, status }
}
