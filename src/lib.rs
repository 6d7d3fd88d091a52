//! Planner for the 30 days of Ramadan: prayers, fasting, Quran reading, habits, tasks and daily
//! challenges, with progress figures and streaks. The cli records everything into a local
//! snapshot and a small daemon keeps it in sync with a remote store and fires reminders.
//!

pub mod cli;
pub mod config;
pub mod daemon;
pub mod lunar;
pub mod planner;
pub mod storage;
pub mod sync;
pub mod utils;
