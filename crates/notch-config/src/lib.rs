use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key; empty disables periodic fetching
    pub api_key: String,
    /// Empty means "ask the geolocation service"
    pub city: String,
    pub interval_secs: u64,
    pub log_file: PathBuf,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            city: "London".to_string(),
            interval_secs: 120,
            log_file: PathBuf::from("weather.csv"),
        }
    }
}

/// Controller numbers weather readings are forwarded to; unset readings are not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub temperature_cc: Option<u8>,
    pub humidity_cc: Option<u8>,
    pub pressure_cc: Option<u8>,
    pub wind_speed_cc: Option<u8>,
}

impl MappingConfig {
    fn controllers(&self) -> [(&'static str, Option<u8>); 4] {
        [
            ("temperature_cc", self.temperature_cc),
            ("humidity_cc", self.humidity_cc),
            ("pressure_cc", self.pressure_cc),
            ("wind_speed_cc", self.wind_speed_cc),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.controllers().iter().all(|(_, cc)| cc.is_none())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    pub presets_file: PathBuf,
    /// Target opened at startup
    pub port: Option<String>,
    /// Register the in-memory loopback backend
    pub loopback: bool,
    pub settle_ms: u64,
    pub max_attempts: u32,
    pub mapping: MappingConfig,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            presets_file: PathBuf::from("midi_presets.json"),
            port: None,
            loopback: false,
            settle_ms: 500,
            max_attempts: 3,
            mapping: MappingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub weather: WeatherConfig,
    pub midi: MidiConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Cannot serialise config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Config file location: `NOTCH_CONFIG`, else `config.toml`
pub fn config_path() -> PathBuf {
    std::env::var_os("NOTCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

impl AppConfig {
    /// Missing file yields defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let cfg = if path.exists() {
            let s = fs::read_to_string(path)?;
            toml::from_str::<AppConfig>(&s)?
        } else {
            AppConfig::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.validate()?;
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.weather.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "weather.interval_secs must be positive".into(),
            ));
        }
        if self.weather.log_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("weather.log_file is empty".into()));
        }
        if self.midi.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "midi.max_attempts must be at least 1".into(),
            ));
        }
        for (key, cc) in self.midi.mapping.controllers() {
            if let Some(cc) = cc.filter(|cc| *cc > 127) {
                return Err(ConfigError::Invalid(format!(
                    "midi.mapping.{} = {} is outside 0-127",
                    key, cc
                )));
            }
        }
        Ok(())
    }
}
