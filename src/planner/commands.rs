//! Every change to [PlannerState] goes through a [Command]. Inputs are validated here, so the rest
//! of the crate can assume day bounds and enum membership already hold.

use anyhow::{anyhow, bail, ensure, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::debug;

use super::{
    day_index::{DayIndex, ObservancePeriod, OBSERVANCE_LENGTH},
    records::{
        Alarm, Challenge, DietaryProfile, Dua, FastingStatus, Habit, KhatamPlan, MealSlot, Note,
        Prayer, PrayerStatus, QuranBookmark, Task, TimeOfDay,
    },
    state::PlannerState,
};

/// Named mutation of the planner.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetPrayer {
        day: DayIndex,
        prayer: Prayer,
        status: Option<PrayerStatus>,
    },
    CyclePrayer {
        day: DayIndex,
        prayer: Prayer,
    },
    SetSehri {
        day: DayIndex,
        done: bool,
    },
    SetIftar {
        day: DayIndex,
        done: bool,
    },
    SetFasting {
        day: DayIndex,
        status: Option<FastingStatus>,
    },

    AddHabit {
        day: DayIndex,
        name: String,
        time_of_day: TimeOfDay,
    },
    ToggleHabit {
        day: DayIndex,
        id: String,
    },
    RemoveHabit {
        day: DayIndex,
        id: String,
    },

    AddTask {
        day: DayIndex,
        text: String,
        time: Option<NaiveTime>,
    },
    EditTask {
        day: DayIndex,
        id: String,
        text: String,
        time: Option<NaiveTime>,
    },
    ToggleTask {
        day: DayIndex,
        id: String,
    },
    RemoveTask {
        day: DayIndex,
        id: String,
    },

    SetChallenge {
        day: DayIndex,
        completed: bool,
    },
    EditChallenge {
        day: DayIndex,
        task: String,
    },

    /// Negative counts are stored as zero.
    SetDailyPages {
        day: DayIndex,
        pages: i64,
    },
    ToggleJuz {
        juz: u8,
    },
    ResetJuz,
    CompleteQuranJourney,
    SetQuranCompletionCount {
        count: i64,
    },
    SetKhatamPlan(KhatamPlan),
    SetBookmark(QuranBookmark),

    AddMeal {
        day: DayIndex,
        slot: MealSlot,
        meal_id: String,
    },
    RemoveMeal {
        day: DayIndex,
        slot: MealSlot,
        meal_id: String,
    },
    ClearMeal {
        day: DayIndex,
        slot: MealSlot,
    },
    SetMealTimings {
        day: DayIndex,
        suhoor: String,
        iftar: String,
    },
    SetDietaryProfile(DietaryProfile),

    AddNote {
        day: DayIndex,
        date: DateTime<Utc>,
        content: String,
    },
    EditNote {
        id: String,
        content: String,
    },
    RemoveNote {
        id: String,
    },

    AddAlarm {
        day: DayIndex,
        kind: String,
        time: NaiveTime,
    },
    ToggleAlarm {
        id: String,
    },
    SetAlarmTime {
        id: String,
        time: NaiveTime,
    },
    RemoveAlarm {
        id: String,
    },

    AddDua {
        title: String,
        arabic: String,
        transliteration: String,
        translation: String,
    },
    ToggleFavoriteDua {
        id: String,
    },
    RemoveDua {
        id: String,
    },

    SetStartDate(NaiveDate),
    SetLocation {
        city: String,
        country: String,
    },
    SetNotifications(bool),

    /// Wipes tracked data. Start date, location, duas and challenge texts survive.
    ResetAll,
}

impl PlannerState {
    /// Applies a command. On error the state is left exactly as it was.
    pub fn apply(&mut self, command: Command) -> Result<()> {
        let mut scratch = self.clone();
        scratch.apply_in_place(command)?;
        *self = scratch;
        Ok(())
    }

    fn apply_in_place(&mut self, command: Command) -> Result<()> {
        debug!("Applying {command:?}");
        match command {
            Command::SetPrayer {
                day,
                prayer,
                status,
            } => {
                self.prayers.entry(day).or_default().set_status(prayer, status);
            }
            Command::CyclePrayer { day, prayer } => {
                let prayers = self.prayers.entry(day).or_default();
                let next = PrayerStatus::cycle(prayers.status(prayer));
                prayers.set_status(prayer, next);
            }
            Command::SetSehri { day, done } => {
                self.prayers.entry(day).or_default().sehri = done;
            }
            Command::SetIftar { day, done } => {
                self.prayers.entry(day).or_default().iftar = done;
            }
            Command::SetFasting { day, status } => {
                self.fasting.insert(day, status);
            }

            Command::AddHabit {
                day,
                name,
                time_of_day,
            } => {
                let name = non_empty(name, "habit name")?;
                let id = self.next_id();
                self.habits.entry(day).or_default().push(Habit {
                    id,
                    name,
                    time_of_day,
                    completed: false,
                });
            }
            Command::ToggleHabit { day, id } => {
                let habit = find_mut(self.habits.get_mut(&day), |h: &Habit| h.id == id)
                    .ok_or_else(|| anyhow!("No habit {id} on day {day}"))?;
                habit.completed = !habit.completed;
            }
            Command::RemoveHabit { day, id } => {
                remove_where(self.habits.get_mut(&day), |h: &Habit| h.id == id)
                    .ok_or_else(|| anyhow!("No habit {id} on day {day}"))?;
            }

            Command::AddTask { day, text, time } => {
                let text = non_empty(text, "task text")?;
                let id = self.next_id();
                self.tasks.entry(day).or_default().push(Task {
                    id,
                    day,
                    text,
                    completed: false,
                    time,
                });
            }
            Command::EditTask { day, id, text, time } => {
                let text = non_empty(text, "task text")?;
                let task = find_mut(self.tasks.get_mut(&day), |t: &Task| t.id == id)
                    .ok_or_else(|| anyhow!("No task {id} on day {day}"))?;
                task.text = text;
                task.time = time;
            }
            Command::ToggleTask { day, id } => {
                let task = find_mut(self.tasks.get_mut(&day), |t: &Task| t.id == id)
                    .ok_or_else(|| anyhow!("No task {id} on day {day}"))?;
                task.completed = !task.completed;
            }
            Command::RemoveTask { day, id } => {
                remove_where(self.tasks.get_mut(&day), |t: &Task| t.id == id)
                    .ok_or_else(|| anyhow!("No task {id} on day {day}"))?;
            }

            Command::SetChallenge { day, completed } => {
                self.challenge_mut(day)?.completed = completed;
            }
            Command::EditChallenge { day, task } => {
                let task = non_empty(task, "challenge text")?;
                self.challenge_mut(day)?.task = task;
            }

            Command::SetDailyPages { day, pages } => {
                let pages = u32::try_from(pages.max(0)).unwrap_or(u32::MAX);
                self.daily_pages.insert(day, pages);
            }
            Command::ToggleJuz { juz } => {
                ensure!(
                    (1..=OBSERVANCE_LENGTH).contains(&juz),
                    "Juz {juz} is outside 1..={OBSERVANCE_LENGTH}"
                );
                let slot = &mut self.juz_completed[(juz - 1) as usize];
                *slot = !*slot;
            }
            Command::ResetJuz => {
                self.juz_completed = [false; OBSERVANCE_LENGTH as usize];
            }
            Command::CompleteQuranJourney => {
                self.quran_completion_count += 1;
            }
            Command::SetQuranCompletionCount { count } => {
                self.quran_completion_count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);
            }
            Command::SetKhatamPlan(plan) => {
                ensure!(plan.total_pages > 0, "Total pages must be positive");
                ensure!(plan.pages_per_day > 0, "Pages per day must be positive");
                self.khatam_plan = plan;
            }
            Command::SetBookmark(bookmark) => {
                ensure!(
                    (1..=OBSERVANCE_LENGTH).contains(&bookmark.para),
                    "Para {} is outside 1..={OBSERVANCE_LENGTH}",
                    bookmark.para
                );
                ensure!(bookmark.aya >= 1, "Aya must be at least 1");
                self.quran_bookmark = bookmark;
            }

            Command::AddMeal { day, slot, meal_id } => {
                let meal_id = non_empty(meal_id, "meal id")?;
                let ids = self.meals.entry(day).or_default().ids_mut(slot);
                if !ids.contains(&meal_id) {
                    ids.push(meal_id);
                }
            }
            Command::RemoveMeal { day, slot, meal_id } => {
                if let Some(plan) = self.meals.get_mut(&day) {
                    plan.ids_mut(slot).retain(|v| *v != meal_id);
                }
            }
            Command::ClearMeal { day, slot } => {
                if let Some(plan) = self.meals.get_mut(&day) {
                    plan.ids_mut(slot).clear();
                }
            }
            Command::SetMealTimings { day, suhoor, iftar } => {
                let plan = self.meals.entry(day).or_default();
                plan.suhoor = Some(suhoor);
                plan.iftar = Some(iftar);
            }
            Command::SetDietaryProfile(profile) => {
                self.dietary_profile = profile;
            }

            Command::AddNote { day, date, content } => {
                let content = non_empty(content, "note")?;
                let id = self.next_id();
                self.notes.push(Note {
                    id,
                    day,
                    date,
                    content,
                });
            }
            Command::EditNote { id, content } => {
                let content = non_empty(content, "note")?;
                let note = self
                    .notes
                    .iter_mut()
                    .find(|n| n.id == id)
                    .ok_or_else(|| anyhow!("No note {id}"))?;
                note.content = content;
            }
            Command::RemoveNote { id } => {
                remove_where(Some(&mut self.notes), |n: &Note| n.id == id)
                    .ok_or_else(|| anyhow!("No note {id}"))?;
            }

            Command::AddAlarm { day, kind, time } => {
                let kind = non_empty(kind, "alarm type")?;
                let id = self.next_id();
                self.alarms.push(Alarm {
                    id,
                    day,
                    kind,
                    time,
                    enabled: true,
                });
            }
            Command::ToggleAlarm { id } => {
                let alarm = self.alarm_mut(&id)?;
                alarm.enabled = !alarm.enabled;
            }
            Command::SetAlarmTime { id, time } => {
                self.alarm_mut(&id)?.time = time;
            }
            Command::RemoveAlarm { id } => {
                remove_where(Some(&mut self.alarms), |a: &Alarm| a.id == id)
                    .ok_or_else(|| anyhow!("No alarm {id}"))?;
            }

            Command::AddDua {
                title,
                arabic,
                transliteration,
                translation,
            } => {
                let title = non_empty(title, "dua title")?;
                let id = self.next_id();
                self.duas.push(Dua {
                    id,
                    title,
                    arabic,
                    transliteration,
                    translation,
                    is_custom: true,
                    is_favorite: false,
                    is_highlighted: false,
                });
            }
            Command::ToggleFavoriteDua { id } => {
                let dua = self
                    .duas
                    .iter_mut()
                    .find(|d| d.id == id)
                    .ok_or_else(|| anyhow!("No dua {id}"))?;
                dua.is_favorite = !dua.is_favorite;
            }
            Command::RemoveDua { id } => {
                remove_where(Some(&mut self.duas), |d: &Dua| d.id == id)
                    .ok_or_else(|| anyhow!("No dua {id}"))?;
            }

            Command::SetStartDate(date) => {
                self.period = ObservancePeriod::new(date);
            }
            Command::SetLocation { city, country } => {
                self.user_city = non_empty(city, "city")?;
                self.user_country = non_empty(country, "country")?;
            }
            Command::SetNotifications(enabled) => {
                self.notifications_enabled = enabled;
            }

            Command::ResetAll => self.reset_tracking(),
        }
        Ok(())
    }

    fn reset_tracking(&mut self) {
        self.prayers.clear();
        self.fasting.clear();
        self.tasks.clear();
        self.habits.clear();
        self.meals.clear();
        self.daily_pages.clear();
        self.juz_completed = [false; OBSERVANCE_LENGTH as usize];
        self.notes.clear();
        self.alarms.clear();
        self.dietary_profile = DietaryProfile::default();
        for challenge in self.challenges.iter_mut() {
            challenge.completed = false;
        }
    }

    fn challenge_mut(&mut self, day: DayIndex) -> Result<&mut Challenge> {
        self.challenges
            .iter_mut()
            .find(|c| c.day == day)
            .ok_or_else(|| anyhow!("No challenge for day {day}"))
    }

    fn alarm_mut(&mut self, id: &str) -> Result<&mut Alarm> {
        self.alarms
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| anyhow!("No alarm {id}"))
    }
}

fn non_empty(value: String, what: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("The {what} can't be empty");
    }
    Ok(trimmed.to_string())
}

fn find_mut<T>(items: Option<&mut Vec<T>>, predicate: impl Fn(&T) -> bool) -> Option<&mut T> {
    items?.iter_mut().find(|v| predicate(&**v))
}

fn remove_where<T>(items: Option<&mut Vec<T>>, predicate: impl Fn(&T) -> bool) -> Option<T> {
    let items = items?;
    let position = items.iter().position(predicate)?;
    Some(items.remove(position))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn state() -> PlannerState {
        PlannerState::starting_on(NaiveDate::from_ymd_opt(2026, 2, 19).unwrap())
    }

    fn day(value: i64) -> DayIndex {
        DayIndex::clamped(value)
    }

    #[test]
    fn failed_command_leaves_state_untouched() {
        let mut state = state();
        state
            .apply(Command::AddHabit {
                day: day(2),
                name: "Walk".into(),
                time_of_day: TimeOfDay::Morning,
            })
            .unwrap();
        let before = state.clone();

        assert!(state.apply(Command::ToggleJuz { juz: 31 }).is_err());
        assert!(state
            .apply(Command::ToggleHabit {
                day: day(3),
                id: "1".into()
            })
            .is_err());
        assert!(state
            .apply(Command::AddTask {
                day: day(2),
                text: "   ".into(),
                time: None
            })
            .is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut state = state();
        for name in ["a", "b", "c"] {
            state
                .apply(Command::AddHabit {
                    day: day(1),
                    name: name.into(),
                    time_of_day: TimeOfDay::Night,
                })
                .unwrap();
        }
        let mut ids = state
            .habits_for(day(1))
            .iter()
            .map(|h| h.id.clone())
            .collect::<Vec<_>>();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn task_lifecycle() {
        let mut state = state();
        let time = NaiveTime::from_hms_opt(18, 0, 0);
        state
            .apply(Command::AddTask {
                day: day(4),
                text: "Call family".into(),
                time,
            })
            .unwrap();
        let id = state.tasks_for(day(4))[0].id.clone();

        state
            .apply(Command::ToggleTask {
                day: day(4),
                id: id.clone(),
            })
            .unwrap();
        assert!(state.tasks_for(day(4))[0].completed);

        state
            .apply(Command::EditTask {
                day: day(4),
                id: id.clone(),
                text: "Call parents".into(),
                time: None,
            })
            .unwrap();
        assert_eq!(state.tasks_for(day(4))[0].text, "Call parents");
        assert_eq!(state.tasks_for(day(4))[0].time, None);

        state.apply(Command::RemoveTask { day: day(4), id }).unwrap();
        assert!(state.tasks_for(day(4)).is_empty());
    }

    #[test]
    fn pages_are_never_negative() {
        let mut state = state();
        state
            .apply(Command::SetDailyPages {
                day: day(1),
                pages: -4,
            })
            .unwrap();
        assert_eq!(state.pages_for(day(1)), 0);
    }

    #[test]
    fn meals_do_not_duplicate() {
        let mut state = state();
        for _ in 0..2 {
            state
                .apply(Command::AddMeal {
                    day: day(1),
                    slot: MealSlot::Iftar,
                    meal_id: "dates".into(),
                })
                .unwrap();
        }
        assert_eq!(state.meals[&day(1)].ids(MealSlot::Iftar), ["dates"]);
        state
            .apply(Command::ClearMeal {
                day: day(1),
                slot: MealSlot::Iftar,
            })
            .unwrap();
        assert!(state.meals[&day(1)].ids(MealSlot::Iftar).is_empty());
    }

    #[test]
    fn reset_keeps_settings_and_challenge_texts() {
        let mut state = state();
        state
            .apply(Command::SetLocation {
                city: "Cairo".into(),
                country: "Egypt".into(),
            })
            .unwrap();
        state
            .apply(Command::EditChallenge {
                day: day(3),
                task: "Custom".into(),
            })
            .unwrap();
        state
            .apply(Command::SetChallenge {
                day: day(3),
                completed: true,
            })
            .unwrap();
        state
            .apply(Command::SetFasting {
                day: day(3),
                status: Some(FastingStatus::Completed),
            })
            .unwrap();
        state.apply(Command::ToggleJuz { juz: 1 }).unwrap();

        state.apply(Command::ResetAll).unwrap();

        assert_eq!(state.user_city, "Cairo");
        assert_eq!(state.challenge_for(day(3)).unwrap().task, "Custom");
        assert!(!state.challenge_for(day(3)).unwrap().completed);
        assert!(state.fasting.is_empty());
        assert_eq!(state.completed_juz(), 0);
        assert_eq!(
            state.period.start_date(),
            NaiveDate::from_ymd_opt(2026, 2, 19).unwrap()
        );
    }

    #[test]
    fn bookmark_is_validated() {
        let mut state = state();
        assert!(state
            .apply(Command::SetBookmark(QuranBookmark { para: 0, aya: 1 }))
            .is_err());
        state
            .apply(Command::SetBookmark(QuranBookmark { para: 12, aya: 40 }))
            .unwrap();
        assert_eq!(state.quran_bookmark.para, 12);
    }
}
