//! Platform MIDI APIs (ALSA sequencer, CoreMIDI, WinMM) through `midir`

use crate::{BackendError, BackendResult, MidiBackend, OutputConnection, PortInfo};
use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};

pub struct MidirBackend {
    client_name: String,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn output(&self) -> BackendResult<MidiOutput> {
        MidiOutput::new(&self.client_name).map_err(|e| BackendError::Load(e.to_string()))
    }
}

impl MidiBackend for MidirBackend {
    fn name(&self) -> &'static str {
        "midir"
    }

    fn probe(&mut self) -> BackendResult<usize> {
        Ok(self.output()?.ports().len())
    }

    fn ports(&mut self) -> BackendResult<Vec<PortInfo>> {
        let output = self.output()?;
        output
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                output
                    .port_name(port)
                    .map(|name| PortInfo { index, name })
                    .map_err(|e| BackendError::Enumerate(e.to_string()))
            })
            .collect()
    }

    fn connect(&mut self, port: &PortInfo) -> BackendResult<Box<dyn OutputConnection>> {
        let output = self.output()?;
        let is_named = |p: &MidiOutputPort| {
            output
                .port_name(p)
                .map(|name| name == port.name)
                .unwrap_or(false)
        };
        let ports = output.ports();
        // Indices shift when devices come and go; the name must still match
        let handle = ports
            .get(port.index)
            .filter(|p| is_named(p))
            .or_else(|| ports.iter().find(|p| is_named(p)))
            .cloned()
            .ok_or_else(|| BackendError::PortNotFound(port.name.clone()))?;

        let connection = output
            .connect(&handle, &format!("{}-out", self.client_name))
            .map_err(|e| BackendError::Busy(e.to_string()))?;
        Ok(Box::new(MidirConnection { connection }))
    }
}

struct MidirConnection {
    connection: MidiOutputConnection,
}

impl OutputConnection for MidirConnection {
    fn send(&mut self, bytes: &[u8]) -> BackendResult<()> {
        self.connection
            .send(bytes)
            .map_err(|e| BackendError::Send(e.to_string()))
    }

    fn close(self: Box<Self>) {
        self.connection.close();
    }
}
