//! Environment overrides layered over the TOML config

use anyhow::{Context, Result};
use notch_config::AppConfig;
use std::env;

/// Apply `NOTCH_API_KEY`, `NOTCH_CITY` and `NOTCH_INTERVAL` when set
pub fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    if let Ok(key) = env::var("NOTCH_API_KEY") {
        config.weather.api_key = key;
    }

    if let Ok(city) = env::var("NOTCH_CITY") {
        config.weather.city = city;
    }

    if let Ok(interval) = env::var("NOTCH_INTERVAL") {
        config.weather.interval_secs = interval.parse().context("Invalid NOTCH_INTERVAL")?;
    }

    config.validate().context("Invalid configuration after overrides")?;
    Ok(())
}
