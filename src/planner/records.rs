//! Record types kept for each day of the period and the global collections around them.
//!
//! Field names serialize in camelCase so a backup taken by the browser planner imports
//! without conversion.

use std::fmt::Display;

use chrono::{DateTime, NaiveTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::utils::time::hhmm;

use super::day_index::DayIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrayerStatus {
    Completed,
    Missed,
    /// Prayed later as a make-up (qadha).
    #[serde(rename = "qadha")]
    #[value(name = "qadha", alias = "made-up")]
    MadeUp,
}

impl PrayerStatus {
    /// Order a tap on a prayer goes through: unset, completed, missed, made up, unset.
    pub fn cycle(current: Option<PrayerStatus>) -> Option<PrayerStatus> {
        match current {
            None => Some(PrayerStatus::Completed),
            Some(PrayerStatus::Completed) => Some(PrayerStatus::Missed),
            Some(PrayerStatus::Missed) => Some(PrayerStatus::MadeUp),
            Some(PrayerStatus::MadeUp) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FastingStatus {
    Completed,
    Missed,
    Excused,
}

impl FastingStatus {
    /// An excused day counts the same as a kept fast.
    pub fn counts_as_done(self) -> bool {
        matches!(self, FastingStatus::Completed | FastingStatus::Excused)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Prayer {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
    Sunnah,
    Taraweeh,
    Tahajjud,
    Witr,
}

impl Prayer {
    /// The five obligatory prayers. Only these take part in progress figures.
    pub const CORE: [Prayer; 5] = [
        Prayer::Fajr,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    pub const ALL: [Prayer; 9] = [
        Prayer::Fajr,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
        Prayer::Sunnah,
        Prayer::Taraweeh,
        Prayer::Tahajjud,
        Prayer::Witr,
    ];
}

impl Display for Prayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Prayer::Fajr => "Fajr",
            Prayer::Dhuhr => "Dhuhr",
            Prayer::Asr => "Asr",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
            Prayer::Sunnah => "Sunnah",
            Prayer::Taraweeh => "Taraweeh",
            Prayer::Tahajjud => "Tahajjud",
            Prayer::Witr => "Witr",
        };
        write!(f, "{name}")
    }
}

/// Prayer log for one day. Every slot starts unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyPrayers {
    pub fajr: Option<PrayerStatus>,
    pub dhuhr: Option<PrayerStatus>,
    pub asr: Option<PrayerStatus>,
    pub maghrib: Option<PrayerStatus>,
    pub isha: Option<PrayerStatus>,
    pub sunnah: Option<PrayerStatus>,
    pub taraweeh: Option<PrayerStatus>,
    pub tahajjud: Option<PrayerStatus>,
    pub witr: Option<PrayerStatus>,
    pub sehri: bool,
    pub iftar: bool,
}

impl DailyPrayers {
    pub fn status(&self, prayer: Prayer) -> Option<PrayerStatus> {
        *self.slot(prayer)
    }

    pub fn set_status(&mut self, prayer: Prayer, status: Option<PrayerStatus>) {
        *self.slot_mut(prayer) = status;
    }

    pub fn core_completed(&self) -> usize {
        Prayer::CORE
            .iter()
            .filter(|p| self.status(**p) == Some(PrayerStatus::Completed))
            .count()
    }

    fn slot(&self, prayer: Prayer) -> &Option<PrayerStatus> {
        match prayer {
            Prayer::Fajr => &self.fajr,
            Prayer::Dhuhr => &self.dhuhr,
            Prayer::Asr => &self.asr,
            Prayer::Maghrib => &self.maghrib,
            Prayer::Isha => &self.isha,
            Prayer::Sunnah => &self.sunnah,
            Prayer::Taraweeh => &self.taraweeh,
            Prayer::Tahajjud => &self.tahajjud,
            Prayer::Witr => &self.witr,
        }
    }

    fn slot_mut(&mut self, prayer: Prayer) -> &mut Option<PrayerStatus> {
        match prayer {
            Prayer::Fajr => &mut self.fajr,
            Prayer::Dhuhr => &mut self.dhuhr,
            Prayer::Asr => &mut self.asr,
            Prayer::Maghrib => &mut self.maghrib,
            Prayer::Isha => &mut self.isha,
            Prayer::Sunnah => &mut self.sunnah,
            Prayer::Taraweeh => &mut self.taraweeh,
            Prayer::Tahajjud => &mut self.tahajjud,
            Prayer::Witr => &mut self.witr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Night,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub time_of_day: TimeOfDay,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub day: DayIndex,
    pub text: String,
    pub completed: bool,
    #[serde(
        with = "hhmm::option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<NaiveTime>,
}

/// The single gamified challenge of a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    pub day: DayIndex,
    pub task: String,
    pub completed: bool,
    pub points: u32,
    pub is_mystery: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MealSlot {
    Suhoor,
    Iftar,
    Snack,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MealPlan {
    /// Start of suhoor as reported by the timings service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suhoor: Option<String>,
    /// Iftar time as reported by the timings service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iftar: Option<String>,
    pub suhoor_ids: Vec<String>,
    pub iftar_ids: Vec<String>,
    pub snack_ids: Vec<String>,
}

impl MealPlan {
    pub fn ids(&self, slot: MealSlot) -> &[String] {
        match slot {
            MealSlot::Suhoor => &self.suhoor_ids,
            MealSlot::Iftar => &self.iftar_ids,
            MealSlot::Snack => &self.snack_ids,
        }
    }

    pub fn ids_mut(&mut self, slot: MealSlot) -> &mut Vec<String> {
        match slot {
            MealSlot::Suhoor => &mut self.suhoor_ids,
            MealSlot::Iftar => &mut self.iftar_ids,
            MealSlot::Snack => &mut self.snack_ids,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum DietaryGoal {
    #[default]
    Maintenance,
    FatLoss,
    MuscleGain,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum HealthCondition {
    #[default]
    None,
    Diabetic,
    Hypertension,
    GlutenFree,
    LactoseIntolerant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Region {
    #[default]
    Desi,
    MiddleEastern,
    Western,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DietaryProfile {
    pub goal: DietaryGoal,
    pub condition: HealthCondition,
    pub region: Region,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub day: DayIndex,
    pub date: DateTime<Utc>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: String,
    pub day: DayIndex,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dua {
    pub id: String,
    pub title: String,
    pub arabic: String,
    pub transliteration: String,
    pub translation: String,
    pub is_custom: bool,
    pub is_favorite: bool,
    #[serde(default)]
    pub is_highlighted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuranBookmark {
    pub para: u8,
    pub aya: u32,
}

impl Default for QuranBookmark {
    fn default() -> Self {
        Self { para: 1, aya: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KhatamPlan {
    pub total_pages: u32,
    pub pages_per_day: u32,
}

impl Default for KhatamPlan {
    fn default() -> Self {
        Self {
            total_pages: 604,
            pages_per_day: 20,
        }
    }
}

impl KhatamPlan {
    /// Days needed to finish at the planned pace, rounded up.
    pub fn days_needed(&self) -> u32 {
        if self.pages_per_day == 0 {
            return 0;
        }
        self.total_pages.div_ceil(self.pages_per_day)
    }
}
