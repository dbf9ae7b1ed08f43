//! MIDI output for the NOTCH weather tool
//!
//! Backends are probed once by a [`BackendSelector`]; a [`DeviceSession`]
//! owns the single open output target and sends typed control messages
//! over it. Presets are stored independently of the session.

pub mod backend;
pub mod loopback;
pub mod message;
#[cfg(feature = "midir")]
pub mod midir_backend;
pub mod presets;
pub mod rawmidi;
pub mod selector;
pub mod session;

pub use backend::*;
pub use loopback::*;
pub use message::*;
pub use presets::*;
pub use rawmidi::*;
pub use selector::*;
pub use session::*;

use thiserror::Error;

/// Errors reported by a [`DeviceSession`]; none of them is fatal to the process
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("No MIDI backend available: {0}")]
    BackendUnavailable(String),

    #[error("MIDI target not found: {0}")]
    TargetNotFound(String),

    #[error("MIDI device busy: {0}")]
    DeviceBusy(String),

    #[error("No MIDI target is open")]
    NotConnected,

    #[error("MIDI transport error: {0}")]
    TransportError(String),

    #[error("Invalid MIDI message: {0}")]
    InvalidMessage(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;
