//! Interface every MIDI output backend implements

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend's native library or driver could not be initialised
    #[error("Backend failed to load: {0}")]
    Load(String),

    #[error("Port enumeration failed: {0}")]
    Enumerate(String),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Port busy: {0}")]
    Busy(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Backend panicked: {0}")]
    Panicked(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// One output port as a backend enumerates it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
}

/// An enumerated output device, tagged with the backend that found it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceTarget {
    pub backend: String,
    pub index: usize,
    pub name: String,
}

impl DeviceTarget {
    pub fn port(&self) -> PortInfo {
        PortInfo {
            index: self.index,
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} #{})", self.name, self.backend, self.index)
    }
}

/// Output device library or driver
pub trait MidiBackend: Send {
    /// Backend name/identifier
    fn name(&self) -> &'static str;

    /// Instantiate the backend's output client and count its ports
    ///
    /// Zero ports is a healthy result; only an error marks the backend broken.
    fn probe(&mut self) -> BackendResult<usize>;

    /// Enumerate output ports afresh
    fn ports(&mut self) -> BackendResult<Vec<PortInfo>>;

    /// Acquire exclusive access to `port`
    fn connect(&mut self, port: &PortInfo) -> BackendResult<Box<dyn OutputConnection>>;
}

/// An open output port
pub trait OutputConnection: Send {
    /// Transmit one complete message
    fn send(&mut self, bytes: &[u8]) -> BackendResult<()>;

    /// Release the port
    fn close(self: Box<Self>);
}
