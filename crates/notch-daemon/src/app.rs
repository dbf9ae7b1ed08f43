//! Single consumer of worker dispatches
//!
//! Owns the log store and the MIDI session, so all writes to either
//! happen on the task that drains the dispatch queue.

use crate::forward::derive_controls;
use crate::scheduler::Dispatch;
use notch_config::MappingConfig;
use notch_core::ObservationRecord;
use notch_log::{LogError, LogResult, LogStore, MigrationOutcome};
use notch_midi::{DeviceSession, PresetStore};
use tracing::{error, info, warn};

pub struct App {
    store: LogStore,
    session: DeviceSession,
    presets: PresetStore,
    mapping: MappingConfig,
    latest: Option<ObservationRecord>,
    status: String,
}

impl App {
    pub fn new(
        store: LogStore,
        session: DeviceSession,
        presets: PresetStore,
        mapping: MappingConfig,
    ) -> Self {
        Self {
            store,
            session,
            presets,
            mapping,
            latest: None,
            status: "Idle".to_string(),
        }
    }

    /// Bring a legacy log up to date and load the newest stored observation
    ///
    /// Only a failed restore is returned; other problems are logged.
    pub fn prepare_log(&mut self) -> LogResult<()> {
        match self.store.migrate() {
            Ok(MigrationOutcome::Migrated { rows }) => {
                info!(rows, backup = %self.store.backup_path().display(), "Migrated legacy observation log")
            }
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => error!(error = %e, "Log migration failed; original restored"),
        }

        match self.store.load_latest() {
            Ok(Some(record)) => {
                info!(%record, "Last stored observation");
                self.latest = Some(record);
            }
            Ok(None) => info!(path = %self.store.path().display(), "No stored observations yet"),
            Err(e) => warn!(error = %e, "Could not read observation log"),
        }
        Ok(())
    }

    /// Apply one worker outcome; only an unrecoverable log error is returned
    pub fn handle(&mut self, dispatch: Dispatch) -> Result<(), LogError> {
        match dispatch {
            Dispatch::FetchFailed(reason) => {
                self.status = format!("Fetch failed: {}", reason);
                warn!(%reason, "Skipping this update");
            }
            Dispatch::Observation(record) => {
                match self.store.append(&record) {
                    Ok(()) => {
                        self.status = format!("Weather updated: {}", record);
                        info!(%record, "Observation stored");
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        self.status = format!("Log write failed: {}", e);
                        error!(error = %e, "Observation lost");
                    }
                }
                self.forward(&record);
                self.latest = Some(record);
            }
        }
        Ok(())
    }

    fn forward(&self, record: &ObservationRecord) {
        if !self.session.is_open() {
            return;
        }
        let channel = self.presets.last_channel().number();
        for message in derive_controls(record, &self.mapping) {
            if let Err(e) = self.session.send_control(channel, message) {
                warn!(%message, error = %e, "Could not forward reading");
            }
        }
    }

    pub fn set_mapping(&mut self, mapping: MappingConfig) {
        self.mapping = mapping;
    }

    pub fn latest(&self) -> Option<&ObservationRecord> {
        self.latest.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }
}
