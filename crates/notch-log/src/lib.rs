//! Observation log store
//!
//! Keeps weather observations in a comma-separated file, newest first,
//! and migrates logs written by the legacy combined-timestamp layout.

pub mod migration;
pub mod schema;
pub mod store;

pub use migration::*;
pub use schema::*;
pub use store::*;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed log: {0}")]
    Csv(#[from] csv::Error),

    #[error("Migration failed, log restored from {}: {reason}", .backup.display())]
    MigrationFailed { backup: PathBuf, reason: String },

    #[error("Migration failed and restoring {} also failed: {reason}", .backup.display())]
    RestoreFailed { backup: PathBuf, reason: String },
}

impl LogError {
    /// True when the log may be left inconsistent and needs user intervention
    pub fn is_fatal(&self) -> bool {
        matches!(self, LogError::RestoreFailed { .. })
    }
}

pub type LogResult<T> = Result<T, LogError>;
