//! `config.json` in the application directory. Every field has a default, a missing file is the
//! same as an empty one.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    lunar::{
        aladhan::{AladhanClient, DEFAULT_BASE_URL, DEFAULT_METHOD},
        LookupPolicy,
    },
    planner::progress::DEFAULT_STREAK_THRESHOLD,
    sync::{
        remote::{DirectoryRemoteStore, RemoteStore},
        rest::RestRemoteStore,
        DEFAULT_DEBOUNCE,
    },
    utils::percentage::Percentage,
};

pub const CONFIG_FILE: &str = "config.json";

/// Used when `api_key` is not written in the config file.
pub const API_KEY_VAR: &str = "RAMADAN_PLANNER_API_KEY";

const DEFAULT_USER_ID: &str = "default_user";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub user_id: String,
    pub remote: RemoteConfig,
    pub debounce_ms: u64,
    pub streak_threshold: Percentage,
    pub lunar: LunarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.into(),
            remote: RemoteConfig::None,
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            streak_threshold: Percentage::new_opt(DEFAULT_STREAK_THRESHOLD)
                .unwrap_or(Percentage::ZERO),
            lunar: LunarConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteConfig {
    #[default]
    None,
    Directory {
        path: PathBuf,
    },
    Rest {
        url: String,
        table: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LunarConfig {
    pub base_url: String,
    pub method: u8,
    #[serde(flatten)]
    pub policy: LookupPolicy,
}

impl Default for LunarConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            method: DEFAULT_METHOD,
            policy: LookupPolicy::default(),
        }
    }
}

impl LunarConfig {
    pub fn client(&self) -> Result<AladhanClient> {
        AladhanClient::new(&self.base_url, self.method)
    }
}

impl Config {
    pub fn load(dir: &Path) -> Result<Config> {
        let path = dir.join(CONFIG_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {path:?}, using defaults");
                return Ok(Config::default());
            }
            Err(e) => Err(e).with_context(|| format!("Can't read {path:?}"))?,
        };
        serde_json::from_str(&text).with_context(|| format!("Config at {path:?} is invalid"))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Builds the configured remote store, `None` when synchronisation is off.
    pub fn remote_store(&self) -> Result<Option<Box<dyn RemoteStore>>> {
        let store: Box<dyn RemoteStore> = match &self.remote {
            RemoteConfig::None => return Ok(None),
            RemoteConfig::Directory { path } => Box::new(DirectoryRemoteStore::new(path.clone())?),
            RemoteConfig::Rest {
                url,
                table,
                api_key,
            } => {
                let api_key = match api_key {
                    Some(key) => key.clone(),
                    None => std::env::var(API_KEY_VAR)
                        .with_context(|| format!("Neither api_key nor {API_KEY_VAR} is set"))?,
                };
                Box::new(RestRemoteStore::new(url, table, api_key)?)
            }
        };
        Ok(Some(store))
    }
}
