//! Backup document: the whole [PlannerState] as JSON plus a `schemaVersion` field.
//!
//! Imports go through a chain of migrations that rewrite the raw JSON up to [SCHEMA_VERSION]
//! before the typed decode. Remote snapshots use the same path.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::planner::state::{default_challenges, PlannerState};

pub const SCHEMA_VERSION: u64 = 2;

const VERSION_KEY: &str = "schemaVersion";

/// Documents without a version come from the first planner release.
const UNVERSIONED: u64 = 1;

type Migration = fn(&mut Map<String, Value>) -> Result<()>;

/// `MIGRATIONS[i]` upgrades a document from version `i + 1` to `i + 2`.
const MIGRATIONS: [Migration; (SCHEMA_VERSION - 1) as usize] = [rebuild_legacy_challenges];

pub fn export_value(state: &PlannerState) -> Result<Value> {
    let mut value = serde_json::to_value(state)?;
    let Value::Object(fields) = &mut value else {
        bail!("Planner state didn't serialize into an object");
    };
    fields.insert(VERSION_KEY.into(), SCHEMA_VERSION.into());
    Ok(value)
}

/// Pretty printed backup document.
pub fn export(state: &PlannerState) -> Result<String> {
    Ok(serde_json::to_string_pretty(&export_value(state)?)?)
}

pub fn import(text: &str) -> Result<PlannerState> {
    let value = serde_json::from_str::<Value>(text).context("Backup is not valid JSON")?;
    import_value(value)
}

/// Migrates and decodes a backup document. Nothing is returned unless every step succeeds.
pub fn import_value(mut value: Value) -> Result<PlannerState> {
    let Value::Object(fields) = &mut value else {
        bail!("Backup must be a JSON object");
    };

    let version = match fields.remove(VERSION_KEY) {
        None => UNVERSIONED,
        Some(v) => v
            .as_u64()
            .with_context(|| format!("{VERSION_KEY} must be a positive integer, got {v}"))?,
    };
    if version == 0 || version > SCHEMA_VERSION {
        bail!("Unsupported backup version {version}, expected at most {SCHEMA_VERSION}");
    }

    normalize_start_date(fields);

    for (index, migration) in MIGRATIONS.iter().enumerate().skip((version - 1) as usize) {
        debug!("Migrating backup from version {}", index + 1);
        migration(fields)?;
    }

    serde_json::from_value(value).context("Backup doesn't match the planner state")
}

/// The browser planner stored the start date as a full ISO timestamp.
fn normalize_start_date(fields: &mut Map<String, Value>) {
    if let Some(Value::String(date)) = fields.get_mut("ramadanStartDate") {
        if let Some((day, _)) = date.split_once('T') {
            *date = day.to_string();
        }
    }
}

/// Early releases seeded challenges as `Day N Challenge` without points. Such lists are replaced
/// by the default template, keeping the completed flag of each position.
fn rebuild_legacy_challenges(fields: &mut Map<String, Value>) -> Result<()> {
    let Some(Value::Array(challenges)) = fields.get("challenges") else {
        return Ok(());
    };

    let is_legacy = challenges.iter().any(|c| {
        let task = c.get("task").and_then(Value::as_str).unwrap_or_default();
        c.get("points").is_none()
            || c.get("isMystery").is_none()
            || (task.starts_with("Day ") && task.ends_with(" Challenge"))
    });
    if !is_legacy {
        return Ok(());
    }

    info!("Rebuilding legacy challenge list");
    let completed = challenges
        .iter()
        .map(|c| c.get("completed").and_then(Value::as_bool).unwrap_or(false))
        .collect::<Vec<_>>();

    let mut rebuilt = default_challenges();
    for (challenge, completed) in rebuilt.iter_mut().zip(completed) {
        challenge.completed = completed;
    }
    fields.insert("challenges".into(), serde_json::to_value(rebuilt)?);
    Ok(())
}
