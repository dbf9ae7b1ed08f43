//! One-time rewrite of legacy logs into the current layout

use crate::store::write_rows;
use crate::{LogError, LogResult, LogStore, SchemaVersion};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tracing::{error, info, instrument, warn};

/// What a migration run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No file, or an empty one
    NoData,
    /// Header already matches the current layout
    AlreadyCurrent,
    Migrated { rows: usize },
}

impl LogStore {
    /// Rewrite a legacy log under the current header
    ///
    /// The file is copied to [`LogStore::backup_path`] before it is touched.
    /// If reading or rewriting fails the backup is copied back, so the log
    /// is never left half-written.
    #[instrument(skip(self), fields(path = %self.path().display()))]
    pub fn migrate(&self) -> LogResult<MigrationOutcome> {
        self.migrate_with(|path| Ok(Box::new(File::create(path)?)))
    }

    pub(crate) fn migrate_with<F>(&self, open_target: F) -> LogResult<MigrationOutcome>
    where
        F: FnOnce(&Path) -> io::Result<Box<dyn Write>>,
    {
        match self.schema()? {
            None => return Ok(MigrationOutcome::NoData),
            Some(SchemaVersion::Current) => return Ok(MigrationOutcome::AlreadyCurrent),
            Some(SchemaVersion::Legacy) => {}
        }

        let backup = self.backup_path();
        fs::copy(self.path(), &backup)?;
        info!(backup = %backup.display(), "Migrating legacy observation log");

        let rewrite = || -> LogResult<usize> {
            let rows = self.read_rows()?;
            let target = open_target(self.path())?;
            write_rows(target, &rows)?;
            Ok(rows.len())
        };

        match rewrite() {
            Ok(rows) => {
                info!(rows, "Observation log migrated");
                Ok(MigrationOutcome::Migrated { rows })
            }
            Err(e) => {
                warn!(error = %e, "Migration failed, restoring backup");
                match fs::copy(&backup, self.path()) {
                    Ok(_) => Err(LogError::MigrationFailed {
                        backup,
                        reason: e.to_string(),
                    }),
                    Err(restore) => {
                        error!(error = %restore, "Restoring observation log from backup failed");
                        Err(LogError::RestoreFailed {
                            backup,
                            reason: format!("{}; restore: {}", e, restore),
                        })
                    }
                }
            }
        }
    }
}
