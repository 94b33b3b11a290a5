use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Result, TickError};
use crate::store::files::{BackupPolicy, LoadReport, TaskFile};
use crate::store::history::HistoryLog;
use crate::tracker::Tracker;

pub const DIR_NAME: &str = ".ticklist";
const CONFIG_FILE: &str = "config.json";

/// The `.ticklist` directory of a project: configuration plus the files it names.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Open an existing `.ticklist` directory under `base`.
    pub fn open(base: &Path) -> Result<Self> {
        let root = base.join(DIR_NAME);
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(TickError::NotInitialized);
        }
        let config = Config::load(&config_path)?;
        Ok(Self { root, config })
    }

    /// Walk up from `start` to the nearest directory holding a `.ticklist`.
    pub fn discover(start: &Path) -> Result<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(DIR_NAME).join(CONFIG_FILE).exists())
            .map(Path::to_path_buf)
            .ok_or(TickError::NotInitialized)
    }

    /// Create `.ticklist/` under `base` with a default configuration.
    pub fn init(base: &Path) -> Result<Self> {
        let root = base.join(DIR_NAME);
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(TickError::AlreadyInitialized);
        }
        fs::create_dir_all(&root)?;
        let config = Config::default();
        config.save(&config_path)?;
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a configured path against the workspace root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn task_file(&self) -> TaskFile {
        let file = TaskFile::new(self.resolve(&self.config.data_file));
        if self.config.backups.enabled {
            file.with_backups(BackupPolicy {
                dir: self.resolve(&self.config.backups.dir),
                keep: self.config.backups.keep,
            })
        } else {
            file
        }
    }

    pub fn history_log(&self) -> Option<HistoryLog> {
        self.config
            .history_file
            .as_deref()
            .map(|p| HistoryLog::new(self.resolve(p)))
    }

    /// Load the task file into a tracker wired up with this workspace's settings.
    pub fn open_tracker(&self, clock: Arc<dyn Clock>) -> Result<(Tracker, LoadReport)> {
        let (tracker, report) = Tracker::open(self.task_file(), clock)?;
        let tracker = tracker.with_default_priority(self.config.priority()?);
        let tracker = match self.history_log() {
            Some(history) => tracker.with_history(history),
            None => tracker,
        };
        Ok((tracker, report))
    }
}
