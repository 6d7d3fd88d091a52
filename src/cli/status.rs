use std::fmt::{self, Display};

use clap::ValueEnum;

use crate::{
    planner::{
        day_index::DayIndex,
        progress::{
            challenge_streak, completion_streak, daily_tally, hasanat_points, overall_progress,
        },
        records::{MealSlot, Prayer, PrayerStatus},
        state::PlannerState,
    },
    utils::{percentage::Percentage, time::date_to_string},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShowTarget {
    Habits,
    Tasks,
    Challenges,
    Quran,
    Meals,
    Notes,
    Alarms,
    Duas,
}

fn prayer_mark(status: Option<PrayerStatus>) -> &'static str {
    match status {
        Some(PrayerStatus::Completed) => "done",
        Some(PrayerStatus::Missed) => "missed",
        Some(PrayerStatus::MadeUp) => "qadha",
        None => "-",
    }
}

fn check(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Summary of a day plus the figures of the whole period up to it.
pub struct StatusReport<'a> {
    pub state: &'a PlannerState,
    pub day: DayIndex,
    pub threshold: Percentage,
}

impl Display for StatusReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            state,
            day,
            threshold,
        } = *self;
        writeln!(
            f,
            "Day {day} of {} ({}), ashra of {}, ends {}",
            state.period.length(),
            date_to_string(state.period.date_of(day)),
            day.ashra(),
            date_to_string(state.period.end_date())
        )?;

        let prayers = state.prayers_for(day).cloned().unwrap_or_default();
        let line = Prayer::CORE
            .iter()
            .map(|p| format!("{p} {}", prayer_mark(prayers.status(*p))))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(f, "Prayers\t{line}")?;
        writeln!(
            f,
            "Meals\tsehri {}  iftar {}",
            check(prayers.sehri),
            check(prayers.iftar)
        )?;
        let fasting = state
            .fasting_for(day)
            .map_or("-".to_string(), |v| format!("{v:?}").to_lowercase());
        writeln!(f, "Fasting\t{fasting}")?;
        if let Some(challenge) = state.challenge_for(day) {
            let mystery = if challenge.is_mystery { " (mystery)" } else { "" };
            writeln!(
                f,
                "Challenge\t{} {}{mystery}, {} points",
                check(challenge.completed),
                challenge.task,
                challenge.points
            )?;
        }

        let tally = daily_tally(state, day);
        writeln!(
            f,
            "Today\t{}\t{}/{}",
            Percentage::of(tally.completed, tally.total),
            tally.completed,
            tally.total
        )?;
        writeln!(
            f,
            "Streak\t{} days at {threshold} or more, challenge streak {}",
            completion_streak(state, threshold, day),
            challenge_streak(state)
        )?;

        let overall = overall_progress(state, day);
        writeln!(
            f,
            "Overall\t{}\tprayers {}  fasting {}  quran {}",
            overall.overall, overall.prayers, overall.fasting, overall.quran
        )?;
        writeln!(
            f,
            "Quran\t{} pages today, {} in total, {}/30 juz",
            state.pages_for(day),
            state.total_pages(),
            state.completed_juz()
        )?;
        write!(f, "Hasanat\t{}", hasanat_points(state))
    }
}

/// One collection, per day collections shown for `day`.
pub struct Listing<'a> {
    pub state: &'a PlannerState,
    pub day: DayIndex,
    pub target: ShowTarget,
}

impl Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { state, day, target } = *self;
        match target {
            ShowTarget::Habits => {
                for habit in state.habits_for(day) {
                    writeln!(
                        f,
                        "{}\t{}\t{:?}\t{}",
                        habit.id,
                        check(habit.completed),
                        habit.time_of_day,
                        habit.name
                    )?;
                }
            }
            ShowTarget::Tasks => {
                for task in state.tasks_for(day) {
                    let time = task
                        .time
                        .map_or(String::new(), |v| v.format("%H:%M").to_string());
                    writeln!(
                        f,
                        "{}\t{}\t{time}\t{}",
                        task.id,
                        check(task.completed),
                        task.text
                    )?;
                }
            }
            ShowTarget::Challenges => {
                for challenge in &state.challenges {
                    writeln!(
                        f,
                        "{}\t{}\t{}\t{}",
                        challenge.day,
                        check(challenge.completed),
                        challenge.points,
                        challenge.task
                    )?;
                }
            }
            ShowTarget::Quran => {
                let juz = state
                    .juz_completed
                    .iter()
                    .enumerate()
                    .filter(|(_, done)| **done)
                    .map(|(i, _)| (i + 1).to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(f, "Juz done\t{juz}")?;
                writeln!(
                    f,
                    "Bookmark\tpara {} aya {}",
                    state.quran_bookmark.para, state.quran_bookmark.aya
                )?;
                writeln!(
                    f,
                    "Plan\t{} pages at {} a day, {} days",
                    state.khatam_plan.total_pages,
                    state.khatam_plan.pages_per_day,
                    state.khatam_plan.days_needed()
                )?;
                writeln!(f, "Completions\t{}", state.quran_completion_count)?;
            }
            ShowTarget::Meals => {
                let plan = state.meals.get(&day).cloned().unwrap_or_default();
                if let (Some(suhoor), Some(iftar)) = (&plan.suhoor, &plan.iftar) {
                    writeln!(f, "Timings\tsuhoor {suhoor}  iftar {iftar}")?;
                }
                for slot in [MealSlot::Suhoor, MealSlot::Iftar, MealSlot::Snack] {
                    writeln!(f, "{slot:?}\t{}", plan.ids(slot).join(", "))?;
                }
                let profile = state.dietary_profile;
                writeln!(
                    f,
                    "Profile\t{:?} {:?} {:?}",
                    profile.goal, profile.condition, profile.region
                )?;
            }
            ShowTarget::Notes => {
                for note in &state.notes {
                    writeln!(
                        f,
                        "{}\tday {}\t{}\t{}",
                        note.id,
                        note.day,
                        note.date.format("%Y-%m-%d %H:%M"),
                        note.content
                    )?;
                }
            }
            ShowTarget::Alarms => {
                for alarm in &state.alarms {
                    writeln!(
                        f,
                        "{}\t{}\t{}\t{}",
                        alarm.id,
                        if alarm.enabled { "on" } else { "off" },
                        alarm.time.format("%H:%M"),
                        alarm.kind
                    )?;
                }
            }
            ShowTarget::Duas => {
                for dua in &state.duas {
                    let favorite = if dua.is_favorite { "*" } else { " " };
                    writeln!(f, "{}\t{favorite}\t{}", dua.id, dua.title)?;
                }
            }
        }
        Ok(())
    }
}
