//! Named message templates persisted as one JSON snapshot

use crate::{Channel, ControlMessage, DeviceResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("Preset file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preset file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid preset: {0}")]
    Invalid(String),
}

pub type PresetResult<T> = Result<T, PresetError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiPreset {
    pub name: String,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    #[serde(rename = "cc")]
    pub control_number: u8,
    #[serde(rename = "cc_value")]
    pub control_value: u8,
}

impl MidiPreset {
    pub fn channel(&self) -> DeviceResult<Channel> {
        Channel::new(self.channel)
    }

    pub fn note_on(&self) -> ControlMessage {
        ControlMessage::NoteOn {
            note: self.note,
            velocity: self.velocity,
        }
    }

    pub fn note_off(&self) -> ControlMessage {
        ControlMessage::NoteOff { note: self.note }
    }

    pub fn control_change(&self) -> ControlMessage {
        ControlMessage::ControlChange {
            controller: self.control_number,
            value: self.control_value,
        }
    }

    fn validate(&self) -> PresetResult<()> {
        let invalid = |e: crate::DeviceError| PresetError::Invalid(format!("{}: {}", self.name, e));
        self.channel().map_err(invalid)?;
        for message in [self.note_on(), self.control_change()] {
            message.validate().map_err(invalid)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PresetFile {
    #[serde(default)]
    presets: Vec<MidiPreset>,
    #[serde(default = "default_channel")]
    last_channel: i64,
}

fn default_channel() -> i64 {
    1
}

/// Ordered preset collection keyed by name, plus the last channel used
#[derive(Debug)]
pub struct PresetStore {
    path: PathBuf,
    presets: Vec<MidiPreset>,
    last_channel: Channel,
}

impl PresetStore {
    /// Read the snapshot at `path`; a missing file yields an empty store
    pub fn load(path: impl Into<PathBuf>) -> PresetResult<Self> {
        let path = path.into();
        let file: PresetFile = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No preset file yet");
                PresetFile {
                    presets: Vec::new(),
                    last_channel: default_channel(),
                }
            }
            Err(e) => return Err(e.into()),
        };

        let clamped = file.last_channel.clamp(1, 16) as u8;
        let last_channel = Channel::new(clamped).unwrap_or_default();
        info!(path = %path.display(), presets = file.presets.len(), channel = %last_channel, "Loaded MIDI presets");

        Ok(Self {
            path,
            presets: file.presets,
            last_channel,
        })
    }

    /// Empty store that persists to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            presets: Vec::new(),
            last_channel: Channel::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn presets(&self) -> &[MidiPreset] {
        &self.presets
    }

    pub fn get(&self, index: usize) -> Option<&MidiPreset> {
        self.presets.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&MidiPreset> {
        self.presets.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn last_channel(&self) -> Channel {
        self.last_channel
    }

    pub fn set_last_channel(&mut self, channel: Channel) {
        self.last_channel = channel;
    }

    /// Upsert by name and return the preset's position
    ///
    /// An existing name keeps its slot; an empty name becomes `Preset N`.
    pub fn save(&mut self, mut preset: MidiPreset) -> PresetResult<usize> {
        if preset.name.is_empty() {
            preset.name = format!("Preset {}", self.presets.len() + 1);
        }
        preset.validate()?;

        let index = match self.presets.iter().position(|p| p.name == preset.name) {
            Some(index) => {
                self.presets[index] = preset;
                index
            }
            None => {
                self.presets.push(preset);
                self.presets.len() - 1
            }
        };
        debug!(index, name = %self.presets[index].name, "Saved preset");
        Ok(index)
    }

    /// Remove by position; out-of-range indices are ignored
    pub fn delete(&mut self, index: usize) -> Option<MidiPreset> {
        if index < self.presets.len() {
            Some(self.presets.remove(index))
        } else {
            None
        }
    }

    /// Write the whole collection to this store's path
    pub fn persist(&self) -> PresetResult<()> {
        persist_all(&self.path, &self.presets, self.last_channel)
    }
}

/// Whole-collection snapshot write
pub fn persist_all(path: &Path, presets: &[MidiPreset], last_channel: Channel) -> PresetResult<()> {
    let file = PresetFile {
        presets: presets.to_vec(),
        last_channel: i64::from(last_channel.number()),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&file)?)?;
    info!(path = %path.display(), presets = presets.len(), "Persisted MIDI presets");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(name: &str, note: u8) -> MidiPreset {
        MidiPreset {
            name: name.to_string(),
            channel: 1,
            note,
            velocity: 100,
            control_number: 7,
            control_value: 64,
        }
    }

    #[test]
    fn test_save_overwrites_in_place() {
        let mut store = PresetStore::empty("unused.json");
        store.save(preset("Bass", 36)).unwrap();
        store.save(preset("Lead", 72)).unwrap();
        store.save(preset("Pad", 60)).unwrap();

        let index = store.save(preset("Lead", 74)).unwrap();

        assert_eq!(index, 1);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(1).unwrap().note, 74);
    }

    #[test]
    fn test_empty_name_gets_default() {
        let mut store = PresetStore::empty("unused.json");
        store.save(preset("First", 60)).unwrap();
        let index = store.save(preset("", 61)).unwrap();
        assert_eq!(store.get(index).unwrap().name, "Preset 2");
    }

    #[test]
    fn test_delete_out_of_range_is_noop() {
        let mut store = PresetStore::empty("unused.json");
        store.save(preset("Only", 60)).unwrap();

        assert!(store.delete(5).is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.delete(0).unwrap().name, "Only");
        assert!(store.is_empty());
    }

    #[test]
    fn test_invalid_preset_rejected() {
        let mut store = PresetStore::empty("unused.json");
        let mut bad = preset("Bad", 60);
        bad.channel = 17;
        assert!(matches!(store.save(bad), Err(PresetError::Invalid(_))));

        let mut bad = preset("Bad", 60);
        bad.control_value = 128;
        assert!(matches!(store.save(bad), Err(PresetError::Invalid(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_string(&preset("Keys", 60)).unwrap();
        insta::assert_snapshot!(json, @r#"{"name":"Keys","channel":1,"note":60,"velocity":100,"cc":7,"cc_value":64}"#);
    }

    #[test]
    fn test_messages_from_preset() {
        let p = preset("Keys", 60);
        assert_eq!(p.note_on().encode(p.channel().unwrap()), [0x90, 60, 100]);
        assert_eq!(p.note_off().encode(p.channel().unwrap()), [0x80, 60, 0]);
        assert_eq!(p.control_change().encode(p.channel().unwrap()), [0xB0, 7, 64]);
    }
}
