pub mod daemon_path;
pub mod data;
pub mod process;
pub mod record;
pub mod settings;
pub mod status;

use std::{env, path::PathBuf};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use daemon_path::to_daemon_path;
use data::SyncAction;
use process::{kill_previous_servers, restart_server};
use record::{
    fasting_command, AlarmAction, ChallengeAction, DuaAction, HabitAction, MealAction, NoteAction,
    PrayerAction, QuranAction, TaskAction,
};
use settings::{process_settings_command, SettingsAction};
use status::{Listing, ShowTarget, StatusReport};
use tracing::{info, level_filters::LevelFilter};

use crate::{
    config::Config,
    daemon::start_daemon,
    planner::{
        commands::Command,
        day_index::DayIndex,
        records::FastingStatus,
        Planner,
    },
    storage::snapshot::FileSnapshotStorage,
    utils::{
        clock::{Clock, DefaultClock},
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "ramadan-planner", version, long_about = None)]
#[command(about = "Track prayers, fasting, Quran reading and challenges through Ramadan")]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $XDG_STATE_HOME/ramadan-planner or $HOME/.local/state/ramadan-planner"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        short,
        global = true,
        help = "Day of Ramadan (1-30). Defaults to the current day"
    )]
    day: Option<DayIndex>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Summary of the day and of the month so far")]
    Status,
    #[command(about = "List habits, tasks, notes and other collections")]
    Show { target: ShowTarget },
    #[command(subcommand, about = "Record prayers, sehri and iftar")]
    Prayer(PrayerAction),
    #[command(about = "Record the fast of the day. Without a status the record is cleared")]
    Fast { status: Option<FastingStatus> },
    #[command(subcommand, about = "Manage daily habits")]
    Habit(HabitAction),
    #[command(subcommand, about = "Manage daily tasks")]
    Task(TaskAction),
    #[command(subcommand, about = "Complete or edit the daily challenge")]
    Challenge(ChallengeAction),
    #[command(subcommand, about = "Track Quran reading")]
    Quran(QuranAction),
    #[command(subcommand, about = "Plan suhoor, iftar and snacks")]
    Meal(MealAction),
    #[command(subcommand, about = "Keep a journal")]
    Note(NoteAction),
    #[command(subcommand, about = "Manage reminders")]
    Alarm(AlarmAction),
    #[command(subcommand, about = "Manage the dua collection")]
    Dua(DuaAction),
    #[command(subcommand, about = "Start date, location and notifications")]
    Settings(SettingsAction),
    #[command(about = "Write a backup document")]
    Export {
        #[arg(long, short, help = "File to write. Prints to stdout by default")]
        output: Option<PathBuf>,
    },
    #[command(about = "Replace all data with a backup document")]
    Import { file: PathBuf },
    #[command(about = "Wipe tracked data. Start date and location are kept")]
    Reset {
        #[arg(long)]
        yes: bool,
    },
    #[command(subcommand, about = "Synchronise with the configured remote once")]
    Sync(SyncAction),
    #[command(about = "Starts a daemon for the application")]
    Init,
    #[command(
        about = "Run a daemon directly in current console. Used for debugging"
    )]
    Serve,
    #[command(about = "Stop currently running daemon.")]
    Stop,
}

/// Everything a single invocation works with.
pub struct Session {
    pub config: Config,
    pub planner: Planner<FileSnapshotStorage>,
    clock: DefaultClock,
}

impl Session {
    async fn open(dir: PathBuf) -> Result<Self> {
        let config = Config::load(&dir)?;
        let planner = Planner::open(FileSnapshotStorage::in_dir(dir)).await?;
        Ok(Self {
            config,
            planner,
            clock: DefaultClock,
        })
    }

    /// Day of the period today falls on.
    async fn current_day(&self) -> DayIndex {
        let state = self.planner.snapshot().await;
        state.period.day_at(self.clock.local_time())
    }

    pub async fn execute(&self, command: Command) -> Result<()> {
        let revision = self.planner.execute(command).await?;
        info!("Saved revision {revision}");
        println!("Saved");
        Ok(())
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir.join("logs"), logging_level, args.log)?;

    let daemon = to_daemon_path(env::current_exe()?);
    match args.commands {
        Commands::Init => return restart_server(&daemon, Some(dir)),
        Commands::Stop => {
            let stopped = kill_previous_servers(&daemon)?;
            println!("Stopped {stopped} daemon(s)");
            return Ok(());
        }
        Commands::Serve => return start_daemon(dir).await,
        _ => (),
    }

    let session = Session::open(dir).await?;
    let day = match args.day {
        Some(day) => day,
        None => session.current_day().await,
    };

    match args.commands {
        Commands::Status => {
            let state = session.planner.snapshot().await;
            let report = StatusReport {
                state: &state,
                day,
                threshold: session.config.streak_threshold,
            };
            println!("{report}");
            Ok(())
        }
        Commands::Show { target } => {
            let state = session.planner.snapshot().await;
            let listing = Listing {
                state: &state,
                day,
                target,
            };
            print!("{listing}");
            Ok(())
        }
        Commands::Prayer(action) => session.execute(action.into_command(day)).await,
        Commands::Fast { status } => session.execute(fasting_command(day, status)).await,
        Commands::Habit(action) => session.execute(action.into_command(day)).await,
        Commands::Task(action) => session.execute(action.into_command(day)?).await,
        Commands::Challenge(action) => session.execute(action.into_command(day)).await,
        Commands::Quran(action) => session.execute(action.into_command(day)).await,
        Commands::Meal(action) => session.execute(action.into_command(day)).await,
        Commands::Note(action) => {
            let now = session.clock.time();
            session.execute(action.into_command(day, now)).await
        }
        Commands::Alarm(action) => session.execute(action.into_command(day)?).await,
        Commands::Dua(action) => session.execute(action.into_command()?).await,
        Commands::Settings(action) => process_settings_command(action, &session, day).await,
        Commands::Export { output } => data::export(&session, output).await,
        Commands::Import { file } => data::import(&session, file).await,
        Commands::Reset { yes } => data::reset(&session, yes).await,
        Commands::Sync(action) => data::sync(&session, action).await,
        Commands::Init | Commands::Stop | Commands::Serve => {
            Err(anyhow!("Daemon commands are handled before opening the planner"))
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn day_flag_is_validated() {
        let args = Args::try_parse_from(["ramadan-planner", "fast", "excused", "--day", "7"])
            .unwrap();
        assert_eq!(args.day, DayIndex::new_opt(7));
        assert!(matches!(
            args.commands,
            Commands::Fast {
                status: Some(FastingStatus::Excused)
            }
        ));

        assert!(Args::try_parse_from(["ramadan-planner", "status", "--day", "31"]).is_err());
        assert!(Args::try_parse_from(["ramadan-planner", "status", "--day", "0"]).is_err());
    }

    #[test]
    fn bare_fast_clears() {
        let args = Args::try_parse_from(["ramadan-planner", "fast"]).unwrap();
        assert!(matches!(args.commands, Commands::Fast { status: None }));
    }

    #[tokio::test]
    async fn session_resolves_today() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let session = Session::open(dir.path().to_path_buf()).await?;
        // A fresh state starts today.
        assert_eq!(session.current_day().await, DayIndex::FIRST);
        session
            .execute(Command::SetStartDate(
                session.clock.today() - chrono::Duration::days(4),
            ))
            .await?;
        assert_eq!(session.current_day().await, DayIndex::clamped(5));
        Ok(())
    }
}
