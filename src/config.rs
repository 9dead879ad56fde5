use std::{env, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Result};
use config::{Config as config_config, File as config_file};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::declare::{FetchMode, RunMode};

const CONFIG_PATH: &str = "app.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct App {
    #[serde(default)]
    pub notion: Notion,
    #[serde(default)]
    pub system: System,
}

const NOTION_TOKEN: &str = "NOTION_TOKEN";
const NOTION_DATABASE_ID: &str = "NOTION_DATABASE_ID";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Notion {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub database_id: String,
}

const SYNC_PROXY: &str = "SYNC_PROXY";
const SYNC_INTERVAL_SECS: &str = "SYNC_INTERVAL_SECS";
const SYNC_JITTER_SECS: &str = "SYNC_JITTER_SECS";
const SYNC_REQUEST_DELAY_MS: &str = "SYNC_REQUEST_DELAY_MS";
const SYNC_BULK: &str = "SYNC_BULK";
const CI_MARKER: &str = "CI";

const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_JITTER_SECS: u64 = 30;
const DEFAULT_REQUEST_DELAY_MS: u64 = 500;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct System {
    /// Optional outbound HTTP proxy URL; requests go direct when empty.
    #[serde(default)]
    pub proxy: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// true fetches every pair in one request per pass instead of one request per record.
    #[serde(default)]
    pub bulk: bool,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_jitter_secs() -> u64 {
    DEFAULT_JITTER_SECS
}

fn default_request_delay_ms() -> u64 {
    DEFAULT_REQUEST_DELAY_MS
}

impl Default for System {
    fn default() -> Self {
        System {
            proxy: String::new(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            jitter_secs: DEFAULT_JITTER_SECS,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            bulk: false,
        }
    }
}

pub static SETTINGS: Lazy<App> = Lazy::new(|| App::get().expect("Config error"));

impl App {
    fn get() -> Result<Self> {
        let config_path = config_path();
        if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()?;
            return Ok(config.override_with_env());
        }

        Ok(App::from_env())
    }

    fn from_env() -> Self {
        App {
            notion: Notion {
                token: env::var(NOTION_TOKEN).unwrap_or_default(),
                database_id: env::var(NOTION_DATABASE_ID).unwrap_or_default(),
            },
            system: System::default(),
        }
        .override_with_env()
    }

    fn override_with_env(mut self) -> Self {
        if let Ok(token) = env::var(NOTION_TOKEN) {
            self.notion.token = token;
        }

        if let Ok(database_id) = env::var(NOTION_DATABASE_ID) {
            self.notion.database_id = database_id;
        }

        if let Ok(proxy) = env::var(SYNC_PROXY) {
            self.system.proxy = proxy;
        }

        if let Ok(interval) = env::var(SYNC_INTERVAL_SECS) {
            self.system.interval_secs =
                u64::from_str(&interval).unwrap_or(DEFAULT_INTERVAL_SECS);
        }

        if let Ok(jitter) = env::var(SYNC_JITTER_SECS) {
            self.system.jitter_secs = u64::from_str(&jitter).unwrap_or(DEFAULT_JITTER_SECS);
        }

        if let Ok(delay) = env::var(SYNC_REQUEST_DELAY_MS) {
            self.system.request_delay_ms =
                u64::from_str(&delay).unwrap_or(DEFAULT_REQUEST_DELAY_MS);
        }

        if let Ok(bulk) = env::var(SYNC_BULK) {
            self.system.bulk = matches!(bulk.trim(), "1" | "true" | "TRUE" | "True");
        }

        self
    }

    /// Missing credentials are fatal before any pass runs.
    pub fn ensure_required(&self) -> Result<()> {
        if self.notion.token.trim().is_empty() {
            return Err(anyhow!("{} is not set", NOTION_TOKEN));
        }

        if self.notion.database_id.trim().is_empty() {
            return Err(anyhow!("{} is not set", NOTION_DATABASE_ID));
        }

        Ok(())
    }

    pub fn fetch_mode(&self) -> FetchMode {
        if self.system.bulk {
            FetchMode::Bulk
        } else {
            FetchMode::PerSymbol
        }
    }

    /// A CI environment marker selects one-shot execution.
    pub fn run_mode(&self) -> RunMode {
        if env::var(CI_MARKER).is_ok() {
            RunMode::OneShot
        } else {
            RunMode::Continuous
        }
    }
}

fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_defaults() {
        let system = System::default();
        assert_eq!(system.interval_secs, 300);
        assert_eq!(system.jitter_secs, 30);
        assert_eq!(system.request_delay_ms, 500);
        assert!(!system.bulk);
        assert!(system.proxy.is_empty());
    }

    #[test]
    fn test_ensure_required_rejects_missing_credentials() {
        let app = App::default();
        assert!(app.ensure_required().is_err());

        let app = App {
            notion: Notion {
                token: "secret".to_string(),
                database_id: "d0c".to_string(),
            },
            system: System::default(),
        };
        assert!(app.ensure_required().is_ok());
    }

    #[test]
    fn test_fetch_mode_follows_bulk_flag() {
        let mut app = App::default();
        assert_eq!(app.fetch_mode(), FetchMode::PerSymbol);

        app.system.bulk = true;
        assert_eq!(app.fetch_mode(), FetchMode::Bulk);
    }
}
