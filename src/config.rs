use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TickError};
use crate::model::Priority;
use crate::rollover::RolloverAction;

pub const CONFIG_VERSION: u32 = 1;

/// Contents of `.ticklist/config.json`. Relative paths resolve against the
/// `.ticklist` directory; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub data_file: PathBuf,
    /// `null` disables archiving on finalize.
    pub history_file: Option<PathBuf>,
    pub backups: BackupConfig,
    pub rollover: RolloverConfig,
    pub default_priority: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub keep: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloverConfig {
    /// Local wall-clock time, `HH:MM`.
    pub at: String,
    pub action: RolloverAction,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            data_file: PathBuf::from("tasks.txt"),
            history_file: Some(PathBuf::from("history.txt")),
            backups: BackupConfig::default(),
            rollover: RolloverConfig::default(),
            default_priority: Priority::default().get(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("backups"),
            keep: 20,
        }
    }
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self {
            at: "22:00".to_string(),
            action: RolloverAction::default(),
        }
    }
}

impl RolloverConfig {
    pub fn time(&self) -> Result<NaiveTime> {
        parse_time(&self.at)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&data)
            .map_err(|e| TickError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.version > CONFIG_VERSION {
            return Err(TickError::Config(format!(
                "config version {} is newer than supported version {CONFIG_VERSION}",
                self.version
            )));
        }
        if self.data_file.as_os_str().is_empty() {
            return Err(TickError::Config("data_file must not be empty".into()));
        }
        self.rollover.time()?;
        self.priority()?;
        Ok(())
    }

    pub fn priority(&self) -> Result<Priority> {
        Priority::new(self.default_priority)
            .map_err(|_| TickError::Config(format!("invalid default_priority {}", self.default_priority)))
    }
}

/// Parse an `HH:MM` time of day.
pub fn parse_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| TickError::Config(format!("invalid time '{raw}', expected HH:MM")))
}
