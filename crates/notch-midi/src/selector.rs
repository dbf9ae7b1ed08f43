//! Backend discovery and target enumeration

use crate::{
    BackendError, BackendResult, DeviceTarget, MidiBackend, OutputConnection, PortInfo,
    RawMidiBackend,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bounded re-enumeration for devices that register late
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Enumeration attempts before concluding "no targets right now"
    pub max_attempts: u32,
    /// Pause between attempts
    pub settle_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no sleeping
    pub fn immediate() -> Self {
        Self {
            max_attempts: 1,
            settle_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// A backend that failed its liveness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub backend: &'static str,
    pub error: String,
    /// The failure came from loading the native library or driver
    pub load_error: bool,
}

/// Result of probing the registered backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Available { backend: &'static str, ports: usize },
    Unavailable { reason: String },
}

impl Discovery {
    pub fn is_available(&self) -> bool {
        matches!(self, Discovery::Available { .. })
    }
}

/// Probes candidate backends in priority order and keeps the first that works
pub struct BackendSelector {
    candidates: Vec<Box<dyn MidiBackend>>,
    active: Option<usize>,
    failures: Vec<ProbeFailure>,
    discovery: Option<Discovery>,
    retry: RetryPolicy,
}

impl BackendSelector {
    pub fn new(candidates: Vec<Box<dyn MidiBackend>>, retry: RetryPolicy) -> Self {
        Self {
            candidates,
            active: None,
            failures: Vec::new(),
            discovery: None,
            retry,
        }
    }

    /// Backends compiled into this build, most capable first
    pub fn with_platform_backends(client_name: &str, retry: RetryPolicy) -> Self {
        let mut candidates: Vec<Box<dyn MidiBackend>> = Vec::new();
        #[cfg(feature = "midir")]
        candidates.push(Box::new(crate::midir_backend::MidirBackend::new(client_name)));
        #[cfg(not(feature = "midir"))]
        debug!(client = client_name, "midir backend not compiled in");
        candidates.push(Box::new(RawMidiBackend::new()));
        Self::new(candidates, retry)
    }

    /// Probe candidates in order, accepting the first that answers without error
    ///
    /// Never fails: broken backends are recorded in [`BackendSelector::failures`].
    pub fn discover(&mut self) -> Discovery {
        self.failures.clear();
        self.active = None;

        for (idx, backend) in self.candidates.iter_mut().enumerate() {
            let name = backend.name();
            match guarded(name, || backend.probe()) {
                Ok(ports) => {
                    info!(backend = name, ports, "MIDI backend selected");
                    self.active = Some(idx);
                    let found = Discovery::Available {
                        backend: name,
                        ports,
                    };
                    self.discovery = Some(found.clone());
                    return found;
                }
                Err(e) => {
                    warn!(backend = name, error = %e, "MIDI backend probe failed");
                    self.failures.push(ProbeFailure {
                        backend: name,
                        load_error: matches!(e, BackendError::Load(_)),
                        error: e.to_string(),
                    });
                }
            }
        }

        let reason = self.unavailable_reason();
        warn!(%reason, "No MIDI backend available");
        let missing = Discovery::Unavailable { reason };
        self.discovery = Some(missing.clone());
        missing
    }

    /// Last discovery result, probing now if that never happened
    pub fn discovery(&mut self) -> Discovery {
        match &self.discovery {
            Some(d) => d.clone(),
            None => self.discover(),
        }
    }

    pub fn active_backend(&self) -> Option<&'static str> {
        self.active.map(|idx| self.candidates[idx].name())
    }

    pub fn failures(&self) -> &[ProbeFailure] {
        &self.failures
    }

    /// Enumerate targets afresh, retrying per the policy while none show up
    ///
    /// An empty result means "nothing found now", not "nothing will appear".
    pub fn list_targets(&mut self) -> Vec<DeviceTarget> {
        if self.discovery.is_none() {
            self.discover();
        }
        let Some(idx) = self.active else {
            return Vec::new();
        };
        let backend = &mut self.candidates[idx];
        let name = backend.name();
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            match guarded(name, || backend.ports()) {
                Ok(ports) if !ports.is_empty() => {
                    debug!(backend = name, attempt, count = ports.len(), "Enumerated MIDI targets");
                    return ports
                        .into_iter()
                        .map(|p| DeviceTarget {
                            backend: name.to_string(),
                            index: p.index,
                            name: p.name,
                        })
                        .collect();
                }
                Ok(_) => debug!(backend = name, attempt, "No MIDI targets yet"),
                Err(e) => warn!(backend = name, attempt, error = %e, "MIDI enumeration failed"),
            }
            if attempt < attempts && !self.retry.settle_delay.is_zero() {
                thread::sleep(self.retry.settle_delay);
            }
        }
        Vec::new()
    }

    /// Open `port` on the active backend
    pub(crate) fn connect(&mut self, port: &PortInfo) -> BackendResult<Box<dyn OutputConnection>> {
        let idx = self
            .active
            .ok_or_else(|| BackendError::Load("no active backend".to_string()))?;
        let backend = &mut self.candidates[idx];
        let name = backend.name();
        guarded(name, || backend.connect(port))
    }

    fn unavailable_reason(&self) -> String {
        if self.candidates.is_empty() {
            return "no MIDI backends registered".to_string();
        }
        let load_errors: Vec<String> = self
            .failures
            .iter()
            .filter(|f| f.load_error)
            .map(|f| format!("{}: {}", f.backend, f.error))
            .collect();
        if load_errors.is_empty() {
            "no working MIDI backend found".to_string()
        } else {
            format!("library load failures: {}", load_errors.join("; "))
        }
    }
}

/// Run a backend call, turning a panic inside it into an error
fn guarded<T>(backend: &str, call: impl FnOnce() -> BackendResult<T>) -> BackendResult<T> {
    catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(BackendError::Panicked(format!("{}: {}", backend, detail)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoopbackBackend;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct BrokenBackend;

    impl MidiBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn probe(&mut self) -> BackendResult<usize> {
            Err(BackendError::Load("libportmidi.so: cannot open shared object file".into()))
        }

        fn ports(&mut self) -> BackendResult<Vec<PortInfo>> {
            unreachable!("never selected")
        }

        fn connect(&mut self, _: &PortInfo) -> BackendResult<Box<dyn OutputConnection>> {
            unreachable!("never selected")
        }
    }

    /// Reports no ports until `ready_after` enumerations have happened
    struct SlowBackend {
        calls: Arc<AtomicU32>,
        ready_after: u32,
    }

    impl MidiBackend for SlowBackend {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn probe(&mut self) -> BackendResult<usize> {
            Ok(0)
        }

        fn ports(&mut self) -> BackendResult<Vec<PortInfo>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.ready_after {
                Ok(vec![PortInfo {
                    index: 0,
                    name: "Late Synth".into(),
                }])
            } else {
                Ok(Vec::new())
            }
        }

        fn connect(&mut self, _: &PortInfo) -> BackendResult<Box<dyn OutputConnection>> {
            Err(BackendError::Busy("test".into()))
        }
    }

    #[test]
    fn test_first_working_backend_wins() {
        let mut selector = BackendSelector::new(
            vec![
                Box::new(BrokenBackend),
                Box::new(LoopbackBackend::new(Vec::<String>::new())),
                Box::new(LoopbackBackend::new(["unused"])),
            ],
            RetryPolicy::immediate(),
        );

        // Zero ports is still a healthy backend
        assert_eq!(
            selector.discover(),
            Discovery::Available {
                backend: "loopback",
                ports: 0
            }
        );
        assert_eq!(selector.failures().len(), 1);
        assert!(selector.failures()[0].load_error);
        assert!(selector.list_targets().is_empty());
    }

    #[test]
    fn test_retry_picks_up_late_devices() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut selector = BackendSelector::new(
            vec![Box::new(SlowBackend {
                calls: calls.clone(),
                ready_after: 3,
            })],
            RetryPolicy {
                max_attempts: 3,
                settle_delay: Duration::from_millis(1),
            },
        );

        let targets = selector.list_targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "Late Synth");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_is_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut selector = BackendSelector::new(
            vec![Box::new(SlowBackend {
                calls: calls.clone(),
                ready_after: u32::MAX,
            })],
            RetryPolicy {
                max_attempts: 4,
                settle_delay: Duration::ZERO,
            },
        );

        assert!(selector.list_targets().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    struct PanickyBackend;

    impl MidiBackend for PanickyBackend {
        fn name(&self) -> &'static str {
            "panicky"
        }

        fn probe(&mut self) -> BackendResult<usize> {
            panic!("driver exploded")
        }

        fn ports(&mut self) -> BackendResult<Vec<PortInfo>> {
            unreachable!("never selected")
        }

        fn connect(&mut self, _: &PortInfo) -> BackendResult<Box<dyn OutputConnection>> {
            unreachable!("never selected")
        }
    }

    #[test]
    fn test_panicking_backend_is_isolated() {
        let mut selector = BackendSelector::new(
            vec![
                Box::new(PanickyBackend),
                Box::new(LoopbackBackend::new(["Virtual 1"])),
            ],
            RetryPolicy::immediate(),
        );

        assert!(selector.discover().is_available());
        assert_eq!(selector.active_backend(), Some("loopback"));
        assert!(selector.failures()[0].error.contains("driver exploded"));
        assert!(!selector.failures()[0].load_error);
    }

    #[test]
    fn test_load_failures_named_in_reason() {
        let mut selector =
            BackendSelector::new(vec![Box::new(BrokenBackend)], RetryPolicy::immediate());
        match selector.discover() {
            Discovery::Unavailable { reason } => assert!(reason.contains("libportmidi.so")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_backends_is_unavailable() {
        let mut selector = BackendSelector::new(Vec::new(), RetryPolicy::immediate());
        assert!(matches!(
            selector.discover(),
            Discovery::Unavailable { .. }
        ));
        assert_eq!(selector.active_backend(), None);
    }
}
