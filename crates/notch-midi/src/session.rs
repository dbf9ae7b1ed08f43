//! Exclusive ownership of the one open output target

use crate::{
    BackendError, BackendSelector, Channel, ControlMessage, DeviceError, DeviceResult,
    DeviceTarget, Discovery, OutputConnection,
};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

enum SessionState {
    Closed,
    Open {
        target: DeviceTarget,
        connection: Box<dyn OutputConnection>,
    },
}

struct SessionInner {
    selector: BackendSelector,
    state: SessionState,
}

impl SessionInner {
    fn available(&mut self) -> DeviceResult<()> {
        match self.selector.discovery() {
            Discovery::Available { .. } => Ok(()),
            Discovery::Unavailable { reason } => Err(DeviceError::BackendUnavailable(reason)),
        }
    }

    fn close(&mut self) {
        if let SessionState::Open { target, connection } =
            std::mem::replace(&mut self.state, SessionState::Closed)
        {
            connection.close();
            info!(target = %target, "Closed MIDI target");
        }
    }
}

/// Device session: `Closed` until a target is opened, re-openable after close
///
/// All calls serialise on an internal mutex, so a session can be shared
/// between callers without two of them ever touching the port at once.
pub struct DeviceSession {
    inner: Mutex<SessionInner>,
}

impl DeviceSession {
    pub fn new(mut selector: BackendSelector) -> Self {
        // Probe up front so later calls see a settled backend
        selector.discovery();
        Self {
            inner: Mutex::new(SessionInner {
                selector,
                state: SessionState::Closed,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn backend_status(&self) -> Discovery {
        self.lock().selector.discovery()
    }

    pub fn list_targets(&self) -> DeviceResult<Vec<DeviceTarget>> {
        let mut inner = self.lock();
        inner.available()?;
        Ok(inner.selector.list_targets())
    }

    /// Open `target`, closing any previously open one first
    ///
    /// The target is checked against a fresh enumeration before the current
    /// target is released, so an unknown target leaves the session as it was.
    pub fn open(&self, target: &DeviceTarget) -> DeviceResult<()> {
        let mut inner = self.lock();
        inner.available()?;

        let known = inner
            .selector
            .list_targets()
            .into_iter()
            .any(|t| t.index == target.index && t.name == target.name);
        if !known {
            warn!(target = %target, "MIDI target not present");
            return Err(DeviceError::TargetNotFound(target.name.clone()));
        }

        inner.close();
        let connection = inner.selector.connect(&target.port()).map_err(|e| {
            warn!(target = %target, error = %e, "Failed to open MIDI target");
            match e {
                BackendError::PortNotFound(name) => DeviceError::TargetNotFound(name),
                other => DeviceError::DeviceBusy(other.to_string()),
            }
        })?;

        info!(target = %target, "Opened MIDI target");
        inner.state = SessionState::Open {
            target: target.clone(),
            connection,
        };
        Ok(())
    }

    /// Open the first enumerated target whose name matches exactly
    pub fn open_by_name(&self, name: &str) -> DeviceResult<DeviceTarget> {
        let target = self
            .list_targets()?
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| DeviceError::TargetNotFound(name.to_string()))?;
        self.open(&target)?;
        Ok(target)
    }

    /// Release the open target; no-op when already closed
    pub fn close(&self) {
        self.lock().close();
    }

    pub fn current_target(&self) -> Option<DeviceTarget> {
        match &self.lock().state {
            SessionState::Open { target, .. } => Some(target.clone()),
            SessionState::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.lock().state, SessionState::Open { .. })
    }

    /// Transmit exactly one message on `channel` (1-16)
    ///
    /// No buffering and no retry. A failed send leaves the target open.
    pub fn send_control(&self, channel: u8, message: ControlMessage) -> DeviceResult<()> {
        let mut inner = self.lock();
        let SessionState::Open { target, connection } = &mut inner.state else {
            return Err(DeviceError::NotConnected);
        };

        let channel = Channel::new(channel)?;
        message.validate()?;
        let bytes = message.encode(channel);

        connection.send(&bytes).map_err(|e| {
            warn!(target = %target, %message, error = %e, "MIDI send failed");
            DeviceError::TransportError(e.to_string())
        })?;
        debug!(target = %target, channel = channel.number(), %message, "Sent MIDI message");
        Ok(())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
    }
}
