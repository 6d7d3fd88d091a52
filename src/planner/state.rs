use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{
    day_index::{DayIndex, ObservancePeriod, OBSERVANCE_LENGTH},
    records::{
        Alarm, Challenge, DailyPrayers, DietaryProfile, Dua, FastingStatus, Habit, KhatamPlan,
        MealPlan, Note, QuranBookmark, Task,
    },
};

const DEFAULT_CITY: &str = "Dadri";
const DEFAULT_COUNTRY: &str = "India";

/// Points for an ordinary challenge day.
pub const CHALLENGE_POINTS: u32 = 10;
/// Points for every fifth, "mystery", day.
pub const MYSTERY_CHALLENGE_POINTS: u32 = 50;

const CHALLENGE_TASKS: [&str; OBSERVANCE_LENGTH as usize] = [
    "Donate money to a charity",
    "Learn a new dua",
    "Read a story of our prophets",
    "Pray an extra sunnah prayer",
    "Listen to an Islamic podcast",
    "Memorize a short Surah",
    "Visit someone who is ill",
    "Give up a bad habit for the day",
    "Do extra Dhikr after prayers",
    "Pray Tahajjud tonight",
    "Read 5 pages of the Quran with translation",
    "Help your family with Iftar prep",
    "Share food with a neighbor or the needy",
    "Make heartfelt Dua for your parents",
    "Visit the mosque for congregational prayer",
    "Read a book on Islamic History",
    "Learn the meaning of your favorite Ayah",
    "Reach out to reunite with an old friend",
    "Listen to a full Surah recitation",
    "Perform a random act of kindness",
    "Sponsor an orphan or feed a fasting person",
    "Learn the 99 Names of Allah (Al Asma Ul Husna)",
    "Avoid backbiting, gossip, and arguments all day",
    "Spend 15 minutes contemplating in silence",
    "Do 100x Istighfar (seeking forgiveness)",
    "Clean the mosque or your local prayer area",
    "Forgive someone in your heart who wronged you",
    "Write down 5 things you are grateful for today",
    "Pray 20 rakat Taraweeh",
    "Make a grand, heartfelt Dua for the entire Ummah",
];

/// Complete local state. This is the unit that gets persisted, exported and synchronised; it is
/// always replaced as a whole, never patched field by field from outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerState {
    #[serde(rename = "ramadanStartDate")]
    pub period: ObservancePeriod,
    pub notifications_enabled: bool,
    pub user_city: String,
    pub user_country: String,

    pub prayers: BTreeMap<DayIndex, DailyPrayers>,
    pub fasting: BTreeMap<DayIndex, Option<FastingStatus>>,
    pub tasks: BTreeMap<DayIndex, Vec<Task>>,
    pub habits: BTreeMap<DayIndex, Vec<Habit>>,
    pub meals: BTreeMap<DayIndex, MealPlan>,
    pub daily_pages: BTreeMap<DayIndex, u32>,

    pub juz_completed: [bool; OBSERVANCE_LENGTH as usize],
    pub challenges: Vec<Challenge>,
    pub duas: Vec<Dua>,
    pub notes: Vec<Note>,
    pub alarms: Vec<Alarm>,

    pub dietary_profile: DietaryProfile,
    pub quran_bookmark: QuranBookmark,
    pub quran_completion_count: u32,
    pub khatam_plan: KhatamPlan,

    /// Source for generated record ids.
    pub id_sequence: u64,
}

impl Default for PlannerState {
    fn default() -> Self {
        Self::starting_on(Local::now().date_naive())
    }
}

impl PlannerState {
    pub fn starting_on(start_date: NaiveDate) -> Self {
        Self {
            period: ObservancePeriod::new(start_date),
            notifications_enabled: true,
            user_city: DEFAULT_CITY.into(),
            user_country: DEFAULT_COUNTRY.into(),
            prayers: BTreeMap::new(),
            fasting: BTreeMap::new(),
            tasks: BTreeMap::new(),
            habits: BTreeMap::new(),
            meals: BTreeMap::new(),
            daily_pages: BTreeMap::new(),
            juz_completed: [false; OBSERVANCE_LENGTH as usize],
            challenges: default_challenges(),
            duas: default_duas(),
            notes: vec![],
            alarms: vec![],
            dietary_profile: DietaryProfile::default(),
            quran_bookmark: QuranBookmark::default(),
            quran_completion_count: 0,
            khatam_plan: KhatamPlan::default(),
            id_sequence: 0,
        }
    }

    pub fn prayers_for(&self, day: DayIndex) -> Option<&DailyPrayers> {
        self.prayers.get(&day)
    }

    pub fn fasting_for(&self, day: DayIndex) -> Option<FastingStatus> {
        self.fasting.get(&day).copied().flatten()
    }

    pub fn habits_for(&self, day: DayIndex) -> &[Habit] {
        self.habits.get(&day).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn tasks_for(&self, day: DayIndex) -> &[Task] {
        self.tasks.get(&day).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn challenge_for(&self, day: DayIndex) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.day == day)
    }

    pub fn pages_for(&self, day: DayIndex) -> u32 {
        self.daily_pages.get(&day).copied().unwrap_or(0)
    }

    pub fn total_pages(&self) -> u32 {
        self.daily_pages.values().sum()
    }

    pub fn completed_juz(&self) -> usize {
        self.juz_completed.iter().filter(|v| **v).count()
    }

    /// Whether anything at all was logged for the day.
    pub fn has_records(&self, day: DayIndex) -> bool {
        self.prayers.contains_key(&day)
            || self.fasting_for(day).is_some()
            || !self.habits_for(day).is_empty()
            || !self.tasks_for(day).is_empty()
            || self.challenge_for(day).is_some_and(|c| c.completed)
            || self.pages_for(day) > 0
    }

    /// Returns an id that no record uses yet. Imported data brings its own ids, so the sequence
    /// skips over any that are taken.
    pub(crate) fn next_id(&mut self) -> String {
        loop {
            self.id_sequence += 1;
            let id = self.id_sequence.to_string();
            if !self.id_in_use(&id) {
                return id;
            }
        }
    }

    fn id_in_use(&self, id: &str) -> bool {
        self.habits.values().flatten().any(|h| h.id == id)
            || self.tasks.values().flatten().any(|t| t.id == id)
            || self.notes.iter().any(|n| n.id == id)
            || self.alarms.iter().any(|a| a.id == id)
            || self.duas.iter().any(|d| d.id == id)
    }
}

/// Seeded challenge list, one task per day.
pub fn default_challenges() -> Vec<Challenge> {
    DayIndex::all()
        .map(|day| {
            let is_mystery = day.get() % 5 == 0;
            Challenge {
                id: day.to_string(),
                day,
                task: CHALLENGE_TASKS[day.offset()].into(),
                completed: false,
                points: if is_mystery {
                    MYSTERY_CHALLENGE_POINTS
                } else {
                    CHALLENGE_POINTS
                },
                is_mystery,
            }
        })
        .collect()
}

pub fn default_duas() -> Vec<Dua> {
    let dua = |id: &str, title: &str, arabic: &str, transliteration: &str, translation: &str| Dua {
        id: id.into(),
        title: title.into(),
        arabic: arabic.into(),
        transliteration: transliteration.into(),
        translation: translation.into(),
        is_custom: false,
        is_favorite: false,
        is_highlighted: true,
    };
    vec![
        dua(
            "1",
            "Niyyah for Fasting",
            "نَوَيْتُ صَوْمَ غَدٍ عَنْ أَدَاءِ فَرْضِ شَهْرِ رَمَضَانَ هَذِهِ السَّنَةِ لِلَّهِ تَعَالَى",
            "Nawaitu sauma ghadin...",
            "I intend to keep the fast...",
        ),
        dua(
            "2",
            "Dua for Iftar",
            "ذَهَبَ الظَّمَأُ وَابْتَلَّتِ الْعُرُوقُ وَثَبَتَ الأَجْرُ إِنْ شَاءَ اللَّهُ",
            "Dhahaba az-zamau...",
            "The thirst has gone...",
        ),
        dua(
            "3",
            "Dua for Laylatul Qadr",
            "اللَّهُمَّ إِنَّكَ عَفُوٌّ تُحِبُّ الْعَفْوَ فَاعْفُ عَنِّي",
            "Allahumma innaka...",
            "O Allah, You are Forgiving...",
        ),
    ]
}
