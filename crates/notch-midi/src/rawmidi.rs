//! Raw MIDI device nodes
//!
//! Writes messages straight to character devices such as ALSA's
//! `/dev/snd/midiC1D0` or the OSS `/dev/midi1`, needing no native library.

use crate::{BackendError, BackendResult, MidiBackend, OutputConnection, PortInfo};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tracing::debug;

/// Directory searched for device nodes whose names start with `prefix`
#[derive(Debug, Clone)]
pub struct DeviceDir {
    pub path: PathBuf,
    pub prefix: String,
}

impl DeviceDir {
    pub fn new(path: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prefix: prefix.into(),
        }
    }
}

pub struct RawMidiBackend {
    dirs: Vec<DeviceDir>,
}

impl RawMidiBackend {
    /// ALSA raw MIDI nodes first, then the OSS compatibility names
    pub fn new() -> Self {
        Self::with_dirs(vec![
            DeviceDir::new("/dev/snd", "midiC"),
            DeviceDir::new("/dev", "midi"),
            DeviceDir::new("/dev", "dmmidi"),
        ])
    }

    pub fn with_dirs(dirs: Vec<DeviceDir>) -> Self {
        Self { dirs }
    }

    fn node_path(&self, name: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|d| d.path.join(name))
            .find(|p| p.exists())
    }
}

impl Default for RawMidiBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiBackend for RawMidiBackend {
    fn name(&self) -> &'static str {
        "rawmidi"
    }

    fn probe(&mut self) -> BackendResult<usize> {
        if !self.dirs.iter().any(|d| d.path.is_dir()) {
            return Err(BackendError::Load(
                "no raw MIDI device directory present".to_string(),
            ));
        }
        Ok(self.ports()?.len())
    }

    fn ports(&mut self) -> BackendResult<Vec<PortInfo>> {
        let mut names = Vec::new();
        for dir in &self.dirs {
            let entries = match fs::read_dir(&dir.path) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %dir.path.display(), error = %e, "Skipping device directory");
                    continue;
                }
            };
            let mut found: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| name.starts_with(&dir.prefix))
                .filter(|name| !names.contains(name))
                .collect();
            found.sort();
            names.extend(found);
        }

        Ok(names
            .into_iter()
            .enumerate()
            .map(|(index, name)| PortInfo { index, name })
            .collect())
    }

    fn connect(&mut self, port: &PortInfo) -> BackendResult<Box<dyn OutputConnection>> {
        let path = self
            .node_path(&port.name)
            .ok_or_else(|| BackendError::PortNotFound(port.name.clone()))?;

        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => BackendError::PortNotFound(port.name.clone()),
                ErrorKind::ResourceBusy | ErrorKind::PermissionDenied => {
                    BackendError::Busy(format!("{}: {}", path.display(), e))
                }
                _ => BackendError::Io(e),
            })?;

        debug!(path = %path.display(), "Opened raw MIDI node");
        Ok(Box::new(RawMidiConnection { file }))
    }
}

struct RawMidiConnection {
    file: File,
}

impl OutputConnection for RawMidiConnection {
    fn send(&mut self, bytes: &[u8]) -> BackendResult<()> {
        self.file
            .write_all(bytes)
            .and_then(|_| self.file.flush())
            .map_err(|e| BackendError::Send(e.to_string()))
    }

    fn close(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_directories_fail_probe() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend =
            RawMidiBackend::with_dirs(vec![DeviceDir::new(dir.path().join("absent"), "midiC")]);

        assert!(matches!(backend.probe(), Err(BackendError::Load(_))));
    }

    #[test]
    fn test_empty_directory_probes_zero_ports() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = RawMidiBackend::with_dirs(vec![DeviceDir::new(dir.path(), "midiC")]);

        assert_eq!(backend.probe().unwrap(), 0);
    }

    #[test]
    fn test_ports_span_directories_in_order() {
        let snd = tempfile::tempdir().unwrap();
        let oss = tempfile::tempdir().unwrap();
        fs::write(snd.path().join("midiC1D0"), b"").unwrap();
        fs::write(snd.path().join("midiC0D0"), b"").unwrap();
        fs::write(snd.path().join("pcmC0D0p"), b"").unwrap();
        fs::write(oss.path().join("midi2"), b"").unwrap();

        let mut backend = RawMidiBackend::with_dirs(vec![
            DeviceDir::new(snd.path(), "midiC"),
            DeviceDir::new(oss.path(), "midi"),
        ]);
        let names: Vec<_> = backend.ports().unwrap().into_iter().map(|p| p.name).collect();

        assert_eq!(names, ["midiC0D0", "midiC1D0", "midi2"]);
    }

    #[test]
    fn test_connection_writes_bytes_to_node() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("midiC0D0");
        fs::write(&node, b"").unwrap();

        let mut backend = RawMidiBackend::with_dirs(vec![DeviceDir::new(dir.path(), "midiC")]);
        let port = backend.ports().unwrap().remove(0);
        let mut conn = backend.connect(&port).unwrap();
        conn.send(&[0xB0, 7, 100]).unwrap();
        conn.close();

        assert_eq!(fs::read(&node).unwrap(), vec![0xB0, 7, 100]);
    }
}
