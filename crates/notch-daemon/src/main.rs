//! NOTCH Daemon - periodic weather logging and MIDI forwarding
//!
//! This binary coordinates:
//! - Weather fetches on a fixed interval (plus SIGUSR1 manual refresh)
//! - The newest-first observation log, migrated from the legacy layout on start
//! - Control Change forwarding to the configured MIDI target

use anyhow::{Context, Result};
use notch_config::{AppConfig, MidiConfig, WeatherConfig};
use notch_core::WeatherSource;
use notch_daemon::config::apply_env_overrides;
use notch_daemon::{App, Scheduler};
use notch_fetch::{geolocate_city, OpenWeatherClient, GEOLOCATION_URL};
use notch_log::LogStore;
use notch_midi::{
    BackendSelector, DeviceSession, Discovery, LoopbackBackend, PresetStore, RetryPolicy,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::trigger::Trigger;

const LOOPBACK_PORT: &str = "NOTCH Loopback";

#[tokio::main]
async fn main() -> Result<()> {
    notch_obs::init("notchd");
    info!("Starting NOTCH daemon");

    let config_path = notch_config::config_path();
    let mut config = load_config(&config_path).await?;
    info!(path = %config_path.display(), city = %config.weather.city, interval_secs = config.weather.interval_secs, "Loaded configuration");

    let presets = PresetStore::load(&config.midi.presets_file).unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring unreadable preset file");
        PresetStore::empty(&config.midi.presets_file)
    });
    let midi = config.midi.clone();
    let session = tokio::task::spawn_blocking(move || open_session(&midi))
        .await
        .context("MIDI setup task failed")?;

    let store = LogStore::new(&config.weather.log_file);
    let mut app = App::new(store, session, presets, config.midi.mapping);
    app.prepare_log()
        .context("Observation log needs manual repair")?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut scheduler = Scheduler::new(build_source(&config.weather)?, tx);
    start_updates(&mut scheduler, &config.weather)?;

    let mut reload = Trigger::reload().context("Failed to install reload handler")?;
    let mut refresh = Trigger::refresh().context("Failed to install refresh handler")?;

    info!("Daemon running - press Ctrl+C to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(dispatch) = rx.recv() => {
                // File rewrite and MIDI writes are synchronous
                tokio::task::block_in_place(|| app.handle(dispatch))
                    .context("Observation log is inconsistent; restore it from the backup")?;
            }
            _ = reload.fired() => {
                info!("Reloading configuration");
                if let Err(e) = apply_reload(&config_path, &mut config, &mut scheduler, &mut app).await {
                    error!("Reload failed: {:#}", e);
                }
            }
            _ = refresh.fired() => {
                if !scheduler.refresh_now() {
                    warn!("Manual refresh ignored: updates are not running");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    if let Err(e) = scheduler.stop().await {
        warn!("Error stopping scheduler: {}", e);
    }
    app.session().close();

    info!("NOTCH daemon stopped");
    Ok(())
}

/// TOML file, then environment overrides, then geolocation for an empty city
async fn load_config(path: &Path) -> Result<AppConfig> {
    let mut config = AppConfig::load_from(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    apply_env_overrides(&mut config)?;

    if config.weather.city.is_empty() {
        match geolocate_city(GEOLOCATION_URL).await {
            Some(city) => config.weather.city = city,
            None => warn!("City not configured and geolocation failed"),
        }
    }
    Ok(config)
}

fn build_source(weather: &WeatherConfig) -> Result<Arc<dyn WeatherSource>> {
    let client = OpenWeatherClient::new(&weather.city, &weather.api_key)
        .context("Failed to build weather client")?;
    Ok(Arc::new(client))
}

fn start_updates(scheduler: &mut Scheduler, weather: &WeatherConfig) -> Result<()> {
    if weather.api_key.is_empty() {
        warn!("API key not set; periodic updates disabled");
        return Ok(());
    }
    scheduler.start(Duration::from_secs(weather.interval_secs))?;
    // First observation right away rather than one interval from now
    scheduler.refresh_now();
    Ok(())
}

async fn apply_reload(
    path: &Path,
    current: &mut AppConfig,
    scheduler: &mut Scheduler,
    app: &mut App,
) -> Result<()> {
    let fresh = load_config(path).await?;

    let device_changed = fresh.midi.port != current.midi.port
        || fresh.midi.loopback != current.midi.loopback
        || fresh.midi.presets_file != current.midi.presets_file;
    if fresh.weather.log_file != current.weather.log_file || device_changed {
        warn!("Log file and MIDI device changes take effect after a restart");
    }
    app.set_mapping(fresh.midi.mapping);

    if fresh.weather.city != current.weather.city || fresh.weather.api_key != current.weather.api_key {
        scheduler.replace_source(build_source(&fresh.weather)?).await?;
        info!(city = %fresh.weather.city, "Weather source rebuilt");
    }

    let interval = Duration::from_secs(fresh.weather.interval_secs);
    if fresh.weather.api_key.is_empty() {
        scheduler.stop().await?;
    } else if !scheduler.is_running() {
        start_updates(scheduler, &fresh.weather)?;
    } else if scheduler.interval() != Some(interval) {
        scheduler.reschedule(interval).await?;
    }

    *current = fresh;
    Ok(())
}

/// Probe backends and open the configured target; never fails
fn open_session(midi: &MidiConfig) -> DeviceSession {
    let retry = RetryPolicy {
        max_attempts: midi.max_attempts,
        settle_delay: Duration::from_millis(midi.settle_ms),
    };
    let selector = if midi.loopback {
        BackendSelector::new(
            vec![Box::new(LoopbackBackend::new([LOOPBACK_PORT]).logging())],
            retry,
        )
    } else {
        BackendSelector::with_platform_backends("notch", retry)
    };
    let session = DeviceSession::new(selector);

    match session.backend_status() {
        Discovery::Available { backend, ports } => info!(backend, ports, "MIDI backend ready"),
        Discovery::Unavailable { reason } => warn!(%reason, "MIDI features disabled"),
    }

    let port = midi
        .port
        .clone()
        .or_else(|| midi.loopback.then(|| LOOPBACK_PORT.to_string()));
    if let Some(port) = port {
        match session.open_by_name(&port) {
            Ok(target) => info!(%target, "MIDI forwarding enabled"),
            Err(e) => warn!(%port, error = %e, "MIDI target unavailable"),
        }
    }
    session
}

#[cfg(unix)]
mod trigger {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    /// A Unix signal used as a control input
    pub struct Trigger(Signal);

    impl Trigger {
        /// SIGHUP
        pub fn reload() -> std::io::Result<Self> {
            signal(SignalKind::hangup()).map(Self)
        }

        /// SIGUSR1
        pub fn refresh() -> std::io::Result<Self> {
            signal(SignalKind::user_defined1()).map(Self)
        }

        pub async fn fired(&mut self) {
            if self.0.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
mod trigger {
    pub struct Trigger;

    impl Trigger {
        pub fn reload() -> std::io::Result<Self> {
            Ok(Self)
        }

        pub fn refresh() -> std::io::Result<Self> {
            Ok(Self)
        }

        pub async fn fired(&mut self) {
            std::future::pending::<()>().await;
        }
    }
}
