//! Derived progress figures. Nothing here is stored; every value is recomputed from the current
//! [PlannerState] so adding or removing habits and tasks after the fact is always reflected.
//!
//! Two different streaks exist and they are not interchangeable:
//! - [completion_streak] counts days whose [daily_completion] reaches a threshold.
//! - [challenge_streak] only looks at the gamified challenge list.

use serde::Serialize;

use crate::utils::percentage::{mean, Percentage};

use super::{
    day_index::{DayIndex, OBSERVANCE_LENGTH},
    records::Prayer,
    state::PlannerState,
};

/// Threshold, in percent, used by [completion_streak] unless configured otherwise.
pub const DEFAULT_STREAK_THRESHOLD: f64 = 70.;

/// Counted and completed items of a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DailyTally {
    pub completed: usize,
    pub total: usize,
}

impl DailyTally {
    /// Ratio in `[0, 1]`. A day without items is 0.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.;
        }
        self.completed.min(self.total) as f64 / self.total as f64
    }

    /// Whether the ratio is at least `threshold`. Compared on item counts, so 7 of 10 meets 70%.
    pub fn reaches(&self, threshold: Percentage) -> bool {
        if self.total == 0 {
            return *threshold == 0.;
        }
        self.completed.min(self.total) as f64 * 100. >= *threshold * self.total as f64
    }
}

/// Builds the item universe of a day: the five core prayers, the fast, every habit, every task
/// and the day's challenge when one exists.
pub fn daily_tally(state: &PlannerState, day: DayIndex) -> DailyTally {
    let habits = state.habits_for(day);
    let tasks = state.tasks_for(day);
    let challenge = state.challenge_for(day);

    let total = Prayer::CORE.len()
        + 1
        + habits.len()
        + tasks.len()
        + usize::from(challenge.is_some());

    let prayers = state.prayers_for(day).map_or(0, |p| p.core_completed());
    let fasting = state.fasting_for(day).is_some_and(|v| v.counts_as_done());
    let completed = prayers
        + usize::from(fasting)
        + habits.iter().filter(|h| h.completed).count()
        + tasks.iter().filter(|t| t.completed).count()
        + usize::from(challenge.is_some_and(|c| c.completed));

    DailyTally { completed, total }
}

pub fn daily_completion(state: &PlannerState, day: DayIndex) -> f64 {
    daily_tally(state, day).ratio()
}

/// Consecutive days, walking back from `upto`, whose completion reaches `threshold`. The walk stops
/// at the first day below the threshold or without any records.
pub fn completion_streak(state: &PlannerState, threshold: Percentage, upto: DayIndex) -> u32 {
    let mut streak = 0;
    for day in upto.up_to().rev() {
        if !state.has_records(day) || !daily_tally(state, day).reaches(threshold) {
            break;
        }
        streak += 1;
    }
    streak
}

/// Length of the run of completed challenge days that ends at the last completed one. Days are
/// compared by number, not by calendar date.
pub fn challenge_streak(state: &PlannerState) -> u32 {
    let mut days = state
        .challenges
        .iter()
        .filter(|c| c.completed)
        .map(|c| c.day.get())
        .collect::<Vec<_>>();
    days.sort_unstable();
    days.dedup();

    let Some(mut previous) = days.pop() else {
        return 0;
    };
    let mut streak = 1;
    while let Some(day) = days.pop() {
        if previous - day != 1 {
            break;
        }
        streak += 1;
        previous = day;
    }
    streak
}

/// Points earned through completed challenges.
pub fn hasanat_points(state: &PlannerState) -> u32 {
    state
        .challenges
        .iter()
        .filter(|c| c.completed)
        .map(|c| c.points)
        .sum()
}

/// Summary across the whole period. This is coarser than [daily_completion]: each domain is a
/// percentage of its own and the overall figure is their unweighted mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverallProgress {
    pub prayers: Percentage,
    pub fasting: Percentage,
    pub quran: Percentage,
    pub overall: Percentage,
}

pub fn overall_progress(state: &PlannerState, current: DayIndex) -> OverallProgress {
    let days = current.get() as usize;

    let prayed = current
        .up_to()
        .filter_map(|day| state.prayers_for(day))
        .map(|p| p.core_completed())
        .sum::<usize>();
    let prayers = Percentage::of(prayed, days * Prayer::CORE.len());

    let fasted = current
        .up_to()
        .filter(|day| state.fasting_for(*day).is_some_and(|v| v.counts_as_done()))
        .count();
    let fasting = Percentage::of(fasted, days);

    let quran = Percentage::of(state.completed_juz(), OBSERVANCE_LENGTH as usize);

    OverallProgress {
        prayers,
        fasting,
        quran,
        overall: mean(&[prayers, fasting, quran]),
    }
}
