use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

pub const GEOLOCATION_URL: &str = "http://ip-api.com/json/";

#[derive(Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    city: String,
}

/// Best-effort city name for the caller's public IP; `None` on any failure
pub async fn geolocate_city(url: &str) -> Option<String> {
    let resp = match Client::new().get(url).send().await {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            warn!(status = resp.status().as_u16(), "Geolocation request rejected");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Geolocation request failed");
            return None;
        }
    };

    let body = resp.text().await.ok()?;
    let city = parse_city(&body);
    match &city {
        Some(city) => info!(%city, "Location detected"),
        None => warn!("Could not determine city from geolocation response"),
    }
    city
}

fn parse_city(body: &str) -> Option<String> {
    let resp: IpApiResponse = serde_json::from_str(body).ok()?;
    (resp.status == "success" && !resp.city.is_empty()).then_some(resp.city)
}
