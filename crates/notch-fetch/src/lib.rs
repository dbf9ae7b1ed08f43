//! HTTP collaborators: current conditions from OpenWeatherMap and
//! best-effort city lookup from the caller's IP address.

pub mod geolocate;
pub mod openweather;

pub use geolocate::{geolocate_city, GEOLOCATION_URL};
pub use openweather::{decode_payload, OpenWeatherClient};
