//! Core data types for weather observations

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date format used in the `date` column of the observation log
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time format used in the `time` column of the observation log
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Placeholder rendered for readings that are missing or unparseable
pub const UNKNOWN: &str = "unknown";

/// Geographic position reported by the weather API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

/// Decoded weather API response, as handed over by the fetch collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherPayload {
    /// Display name of the city the API resolved
    pub city: String,
    pub description: String,
    /// Degrees Celsius
    pub temperature: f64,
    /// Degrees Celsius
    pub feels_like: f64,
    /// Percent, 0-100
    pub humidity: u8,
    /// hPa
    pub pressure: i32,
    /// m/s
    pub wind_speed: f64,
    /// Degrees, 0-359
    pub wind_direction: Option<u16>,
    /// Meters
    pub visibility: Option<u32>,
    pub coordinates: Option<Coordinates>,
}

/// One weather sample as stored in the observation log
///
/// Records built from a [`WeatherPayload`] always carry every required
/// reading. Records read back from disk may contain `None` where the
/// stored value was missing or not a number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ObservationRecord {
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    /// Local clock time, `HH:MM:SS`
    pub time: String,
    pub city: String,
    pub description: String,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<u8>,
    pub pressure: Option<i32>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<u16>,
    pub visibility: Option<u32>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl ObservationRecord {
    /// Build a record from a fetched payload, stamped with the local observation time
    pub fn from_payload(payload: &WeatherPayload, observed_at: NaiveDateTime) -> Self {
        Self {
            date: observed_at.format(DATE_FORMAT).to_string(),
            time: observed_at.format(TIME_FORMAT).to_string(),
            city: payload.city.clone(),
            description: payload.description.clone(),
            temperature: Some(payload.temperature),
            feels_like: Some(payload.feels_like),
            humidity: Some(payload.humidity),
            pressure: Some(payload.pressure),
            wind_speed: Some(payload.wind_speed),
            wind_direction: payload.wind_direction,
            visibility: payload.visibility,
            longitude: payload.coordinates.map(|c| c.longitude),
            latitude: payload.coordinates.map(|c| c.latitude),
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.longitude, self.latitude) {
            (Some(longitude), Some(latitude)) => Some(Coordinates {
                longitude,
                latitude,
            }),
            _ => None,
        }
    }
}

/// Render an optional reading, substituting [`UNKNOWN`] when absent
pub fn reading<T: fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => UNKNOWN.to_string(),
    }
}

impl fmt::Display for ObservationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}: {}, {} °C (feels like {} °C), humidity {}%, pressure {} hPa, wind {} m/s",
            self.date,
            self.time,
            self.city,
            self.description,
            reading(&self.temperature),
            reading(&self.feels_like),
            reading(&self.humidity),
            reading(&self.pressure),
            reading(&self.wind_speed),
        )?;
        if let Some(deg) = self.wind_direction {
            write!(f, " from {}°", deg)?;
        }
        Ok(())
    }
}
