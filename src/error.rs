use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TickError {
    #[error("not a ticklist directory (run `ticklist init` first)")]
    NotInitialized,

    #[error("ticklist already initialized in this directory")]
    AlreadyInitialized,

    #[error("{op}: {reason}")]
    Validation { op: &'static str, reason: String },

    #[error("{op}: position {position} is out of range (task count is {len})")]
    OutOfRange {
        op: &'static str,
        position: usize,
        len: usize,
    },

    #[error("no task matching '{0}'")]
    TaskNotFound(String),

    #[error("{op} failed for '{}': {source}", path.display())]
    Persistence {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{op}: '{}' is locked by another process", path.display())]
    Locked { op: &'static str, path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TickError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::AlreadyInitialized => "already_initialized",
            Self::Validation { .. } => "validation_error",
            Self::OutOfRange { .. } => "out_of_range",
            Self::TaskNotFound(_) => "task_not_found",
            Self::Persistence { .. } => "persistence_error",
            Self::Locked { .. } => "locked",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }

    pub(crate) fn validation(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            op,
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            op,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TickError>;
