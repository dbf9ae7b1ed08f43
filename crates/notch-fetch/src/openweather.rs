use notch_core::{Coordinates, FetchError, WeatherPayload, WeatherSource};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Current-conditions client for one city, metric units
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    city: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(city: impl Into<String>, api_key: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            city: city.into(),
            api_key: api_key.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait::async_trait]
impl WeatherSource for OpenWeatherClient {
    fn describe(&self) -> String {
        format!("openweathermap:{}", self.city)
    }

    async fn fetch(&self) -> Result<WeatherPayload, FetchError> {
        if self.api_key.is_empty() {
            return Err(FetchError::MissingApiKey);
        }

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", self.city.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if status != StatusCode::OK {
            let message = api_message(&body);
            warn!(city = %self.city, status = status.as_u16(), %message, "Weather API rejected request");
            return Err(FetchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload = decode_payload(&body)?;
        debug!(city = %payload.city, temperature = payload.temperature, "Fetched current weather");
        Ok(payload)
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// The `message` the API puts in its error bodies
fn api_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| "Unknown error".to_string())
}

#[derive(Deserialize)]
struct OwmResponse {
    name: String,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    main: OwmMain,
    wind: OwmWind,
    visibility: Option<u32>,
    coord: Option<OwmCoord>,
}

#[derive(Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
    pressure: i32,
}

#[derive(Deserialize)]
struct OwmWind {
    speed: f64,
    deg: Option<u16>,
}

#[derive(Deserialize)]
struct OwmCoord {
    lon: f64,
    lat: f64,
}

/// Decode a successful current-weather response body
pub fn decode_payload(body: &str) -> Result<WeatherPayload, FetchError> {
    let resp: OwmResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    let description = resp
        .weather
        .into_iter()
        .next()
        .map(|w| w.description)
        .ok_or_else(|| FetchError::Decode("response has no weather conditions".to_string()))?;

    Ok(WeatherPayload {
        city: resp.name,
        description,
        temperature: resp.main.temp,
        feels_like: resp.main.feels_like,
        humidity: resp.main.humidity,
        pressure: resp.main.pressure,
        wind_speed: resp.wind.speed,
        wind_direction: resp.wind.deg,
        visibility: resp.visibility,
        coordinates: resp.coord.map(|c| Coordinates {
            longitude: c.lon,
            latitude: c.lat,
        }),
    })
}
