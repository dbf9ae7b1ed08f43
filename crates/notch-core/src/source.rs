use crate::WeatherPayload;

/// Failure modes of a weather fetch; none of them is fatal to the update loop
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("API key not set")]
    MissingApiKey,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Anything that can produce the current weather on demand
#[async_trait::async_trait]
pub trait WeatherSource: Send + Sync {
    /// Human-readable identifier used in logs
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<WeatherPayload, FetchError>;
}
