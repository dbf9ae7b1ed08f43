//! Periodic fetch worker
//!
//! Exactly one worker task runs at a time. It never touches the log or the
//! MIDI session itself: every outcome is handed to the consumer over the
//! dispatch channel.

use notch_core::{ObservationRecord, WeatherSource};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const STOP_POLL: Duration = Duration::from_millis(10);
const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Outcome of one fetch cycle, delivered to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Observation(ObservationRecord),
    FetchFailed(String),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Update interval must be positive")]
    InvalidInterval,

    #[error("Worker {0} is already running")]
    AlreadyRunning(u64),

    #[error("Worker {id} did not exit within {grace:?}")]
    ShutdownTimeout { id: u64, grace: Duration },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

struct Worker {
    id: u64,
    interval: Duration,
    stop: watch::Sender<bool>,
    refresh: mpsc::UnboundedSender<()>,
    handle: JoinHandle<()>,
}

/// `Stopped` until started; `Running(interval)` while a worker exists
pub struct Scheduler {
    source: Arc<dyn WeatherSource>,
    dispatch: mpsc::UnboundedSender<Dispatch>,
    worker: Option<Worker>,
    next_id: u64,
    grace: Duration,
}

impl Scheduler {
    pub fn new(source: Arc<dyn WeatherSource>, dispatch: mpsc::UnboundedSender<Dispatch>) -> Self {
        Self {
            source,
            dispatch,
            worker: None,
            next_id: 1,
            grace: DEFAULT_GRACE,
        }
    }

    /// How long `stop` waits for the worker to exit
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.worker.as_ref().map(|w| w.interval)
    }

    pub fn worker_id(&self) -> Option<u64> {
        self.worker.as_ref().map(|w| w.id)
    }

    pub fn start(&mut self, interval: Duration) -> SchedulerResult<()> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }
        if let Some(worker) = &self.worker {
            return Err(SchedulerError::AlreadyRunning(worker.id));
        }

        let id = self.next_id;
        self.next_id += 1;
        let (stop, stop_rx) = watch::channel(false);
        let (refresh, refresh_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(
            id,
            interval,
            self.source.clone(),
            self.dispatch.clone(),
            stop_rx,
            refresh_rx,
        ));

        info!(worker = id, interval_secs = interval.as_secs_f64(), source = %self.source.describe(), "Update worker started");
        self.worker = Some(Worker {
            id,
            interval,
            stop,
            refresh,
            handle,
        });
        Ok(())
    }

    /// Signal the worker and wait, bounded, for it to exit; no-op when stopped
    ///
    /// On timeout the worker stays registered so no second one can start.
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let _ = worker.stop.send(true);

        let mut waited = Duration::ZERO;
        while !worker.handle.is_finished() {
            if waited >= self.grace {
                warn!(worker = worker.id, "Update worker did not exit in time");
                let id = worker.id;
                self.worker = Some(worker);
                return Err(SchedulerError::ShutdownTimeout {
                    id,
                    grace: self.grace,
                });
            }
            tokio::time::sleep(STOP_POLL).await;
            waited += STOP_POLL;
        }

        info!(worker = worker.id, "Update worker stopped");
        Ok(())
    }

    /// Stop the current worker, then start a fresh one at `interval`
    pub async fn reschedule(&mut self, interval: Duration) -> SchedulerResult<()> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval);
        }
        self.stop().await?;
        self.start(interval)
    }

    /// Swap the weather source, restarting a running worker at its interval
    pub async fn replace_source(&mut self, source: Arc<dyn WeatherSource>) -> SchedulerResult<()> {
        let interval = self.interval();
        self.stop().await?;
        self.source = source;
        match interval {
            Some(interval) => self.start(interval),
            None => Ok(()),
        }
    }

    /// Ask the running worker for an immediate fetch; false when stopped
    pub fn refresh_now(&self) -> bool {
        match &self.worker {
            Some(worker) => worker.refresh.send(()).is_ok(),
            None => false,
        }
    }
}

async fn run_worker(
    id: u64,
    interval: Duration,
    source: Arc<dyn WeatherSource>,
    dispatch: mpsc::UnboundedSender<Dispatch>,
    mut stop: watch::Receiver<bool>,
    mut refresh: mpsc::UnboundedReceiver<()>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            Some(()) = refresh.recv() => debug!(worker = id, "Manual refresh"),
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        // Nothing may reach the log once a stop was requested
        if *stop.borrow() {
            break;
        }

        let outcome = match source.fetch().await {
            Ok(payload) => {
                let now = chrono::Local::now().naive_local();
                Dispatch::Observation(ObservationRecord::from_payload(&payload, now))
            }
            Err(e) => {
                warn!(worker = id, error = %e, "Weather fetch failed");
                Dispatch::FetchFailed(e.to_string())
            }
        };
        if *stop.borrow() {
            break;
        }
        if dispatch.send(outcome).is_err() {
            warn!(worker = id, "Dispatch consumer gone");
            break;
        }
    }
    debug!(worker = id, "Update worker exiting");
}
