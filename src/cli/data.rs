use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use crate::{daemon::create_reconciler, planner::commands::Command};

use super::Session;

#[derive(Debug, Subcommand)]
pub enum SyncAction {
    #[command(about = "Replace local data with the remote snapshot")]
    Pull,
    #[command(about = "Upload local data, overwriting the remote snapshot")]
    Push,
}

pub async fn export(session: &Session, output: Option<PathBuf>) -> Result<()> {
    let document = session.planner.export_backup().await?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, document)
                .await
                .with_context(|| format!("Can't write {path:?}"))?;
            println!("Exported to {}", path.display());
        }
        None => println!("{document}"),
    }
    Ok(())
}

pub async fn import(session: &Session, file: PathBuf) -> Result<()> {
    let text = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Can't read {file:?}"))?;
    let revision = session.planner.import_backup(&text).await?;
    println!("Imported {} as revision {revision}", file.display());
    Ok(())
}

pub async fn reset(session: &Session, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("This wipes every tracked record, pass --yes to continue");
    }
    session.execute(Command::ResetAll).await
}

pub async fn sync(session: &Session, action: SyncAction) -> Result<()> {
    let Some(mut reconciler) =
        create_reconciler(&session.config, &session.planner, &CancellationToken::new()).await?
    else {
        bail!("No remote is configured in config.json");
    };
    match action {
        SyncAction::Pull => match reconciler.pull().await? {
            Some(updated_at) => println!("Pulled snapshot from {updated_at}"),
            None => println!("Nothing stored remotely yet"),
        },
        SyncAction::Push => {
            reconciler.push().await?;
            println!("Pushed local state");
        }
    }
    Ok(())
}
