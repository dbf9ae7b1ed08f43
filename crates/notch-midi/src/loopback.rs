//! In-memory loopback output for dry runs and tests

use crate::{BackendError, BackendResult, MidiBackend, OutputConnection, PortInfo};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// A message captured by the loopback backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub port: String,
    pub bytes: Vec<u8>,
}

/// Shared view of everything sent through a [`LoopbackBackend`]
#[derive(Debug, Clone, Default)]
pub struct Capture {
    messages: Arc<Mutex<Vec<Captured>>>,
}

impl Capture {
    pub fn messages(&self) -> Vec<Captured> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, message: Captured) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

/// Virtual output with a fixed set of ports that records every message
pub struct LoopbackBackend {
    ports: Vec<String>,
    capture: Capture,
    log_messages: bool,
}

impl LoopbackBackend {
    pub fn new<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ports: ports.into_iter().map(Into::into).collect(),
            capture: Capture::default(),
            log_messages: false,
        }
    }

    /// Also log each message at info level
    pub fn logging(mut self) -> Self {
        self.log_messages = true;
        self
    }

    pub fn capture(&self) -> Capture {
        self.capture.clone()
    }
}

impl MidiBackend for LoopbackBackend {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn probe(&mut self) -> BackendResult<usize> {
        Ok(self.ports.len())
    }

    fn ports(&mut self) -> BackendResult<Vec<PortInfo>> {
        Ok(self
            .ports
            .iter()
            .enumerate()
            .map(|(index, name)| PortInfo {
                index,
                name: name.clone(),
            })
            .collect())
    }

    fn connect(&mut self, port: &PortInfo) -> BackendResult<Box<dyn OutputConnection>> {
        if self.ports.get(port.index) != Some(&port.name) {
            return Err(BackendError::PortNotFound(port.name.clone()));
        }
        Ok(Box::new(LoopbackConnection {
            port: port.name.clone(),
            capture: self.capture.clone(),
            log_messages: self.log_messages,
        }))
    }
}

struct LoopbackConnection {
    port: String,
    capture: Capture,
    log_messages: bool,
}

impl OutputConnection for LoopbackConnection {
    fn send(&mut self, bytes: &[u8]) -> BackendResult<()> {
        if self.log_messages {
            info!(port = %self.port, bytes = ?bytes, "Loopback MIDI message");
        }
        self.capture.push(Captured {
            port: self.port.clone(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn close(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_records_messages() {
        let mut backend = LoopbackBackend::new(["Virtual 1", "Virtual 2"]);
        let capture = backend.capture();

        assert_eq!(backend.probe().unwrap(), 2);

        let port = backend.ports().unwrap().remove(1);
        let mut conn = backend.connect(&port).unwrap();
        conn.send(&[0x90, 64, 90]).unwrap();

        assert_eq!(
            capture.messages(),
            vec![Captured {
                port: "Virtual 2".into(),
                bytes: vec![0x90, 64, 90]
            }]
        );
    }

    #[test]
    fn test_loopback_rejects_stale_port() {
        let mut backend = LoopbackBackend::new(["Virtual 1"]);
        let stale = PortInfo {
            index: 0,
            name: "Gone".into(),
        };
        assert!(matches!(
            backend.connect(&stale),
            Err(BackendError::PortNotFound(_))
        ));
    }
}
