//! Channel voice messages and their 3-byte wire encoding

use crate::{DeviceError, DeviceResult};
use std::fmt;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const DATA_MAX: u8 = 0x7F;

/// MIDI channel as users count it, 1-16
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    pub fn new(number: u8) -> DeviceResult<Self> {
        if (1..=16).contains(&number) {
            Ok(Self(number))
        } else {
            Err(DeviceError::InvalidMessage(format!(
                "channel {} outside 1-16",
                number
            )))
        }
    }

    /// 1-based channel number
    pub fn number(self) -> u8 {
        self.0
    }

    /// 0-based channel nibble used on the wire
    fn nibble(self) -> u8 {
        self.0 - 1
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message kinds the tool can transmit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ControlChange { controller: u8, value: u8 },
}

impl ControlMessage {
    /// Reject data bytes above 127
    pub fn validate(&self) -> DeviceResult<()> {
        let (first, second) = self.data();
        for (label, value) in [("first", first), ("second", second)] {
            if value > DATA_MAX {
                return Err(DeviceError::InvalidMessage(format!(
                    "{} data byte {} outside 0-127 in {}",
                    label, value, self
                )));
            }
        }
        Ok(())
    }

    /// `[status | channel, data1, data2]`; note-off always carries velocity 0
    pub fn encode(&self, channel: Channel) -> [u8; 3] {
        let (first, second) = self.data();
        [self.status() | channel.nibble(), first, second]
    }

    fn status(&self) -> u8 {
        match self {
            ControlMessage::NoteOn { .. } => NOTE_ON,
            ControlMessage::NoteOff { .. } => NOTE_OFF,
            ControlMessage::ControlChange { .. } => CONTROL_CHANGE,
        }
    }

    fn data(&self) -> (u8, u8) {
        match *self {
            ControlMessage::NoteOn { note, velocity } => (note, velocity),
            ControlMessage::NoteOff { note } => (note, 0),
            ControlMessage::ControlChange { controller, value } => (controller, value),
        }
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMessage::NoteOn { note, velocity } => {
                write!(f, "note on {} velocity {}", note, velocity)
            }
            ControlMessage::NoteOff { note } => write!(f, "note off {}", note),
            ControlMessage::ControlChange { controller, value } => {
                write!(f, "CC {} = {}", controller, value)
            }
        }
    }
}
