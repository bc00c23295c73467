//! Current weather for the AR overlay
//!
//! Best-effort decoration only: callers keep the last good value when a
//! fetch fails. Backed by Open-Meteo's keyless `current_weather` endpoint.

use arlm_common::GeoPoint;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Weather request failed: {0}")]
    Network(String),

    #[error("Weather service returned HTTP {0}")]
    Status(u16),

    #[error("Weather response could not be decoded: {0}")]
    Decode(String),
}

/// Weather at the device location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temperature_c: f64,
    pub wind_speed_kmh: f64,
    /// WMO weather interpretation code
    pub weather_code: u16,
    pub fetched_at: DateTime<Utc>,
}

impl Weather {
    pub fn temperature_formatted(&self) -> String {
        format!("{:.0}°C", self.temperature_c)
    }

    pub fn icon_emoji(&self) -> &'static str {
        match self.weather_code {
            0 => "☀️",
            1 | 2 => "⛅",
            3 => "☁️",
            45 | 48 => "🌫️",
            51..=57 => "🌦️",
            61..=67 | 80..=82 => "🌧️",
            71..=77 | 85 | 86 => "🌨️",
            95..=99 => "⛈️",
            _ => "🌡️",
        }
    }
}

/// Source of weather readings
pub trait WeatherSource: Send + Sync {
    fn current(&self, location: GeoPoint) -> BoxFuture<'_, Result<Weather, WeatherError>>;
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: CurrentWeather,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature: f64,
    windspeed: f64,
    weathercode: u16,
}

/// Open-Meteo client
pub struct OpenMeteoClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(base_url: &str) -> Result<Self, WeatherError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| WeatherError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl WeatherSource for OpenMeteoClient {
    fn current(&self, location: GeoPoint) -> BoxFuture<'_, Result<Weather, WeatherError>> {
        async move {
            let url = format!(
                "{}?latitude={:.4}&longitude={:.4}&current_weather=true",
                self.base_url, location.latitude, location.longitude
            );
            debug!(url = %url, "Fetching weather");

            let response = self
                .http_client
                .get(&url)
                .send()
                .await
                .map_err(|e| WeatherError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(WeatherError::Status(status.as_u16()));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| WeatherError::Network(e.to_string()))?;
            parse_forecast(&body)
        }
        .boxed()
    }
}

fn parse_forecast(body: &[u8]) -> Result<Weather, WeatherError> {
    let forecast: ForecastResponse =
        serde_json::from_slice(body).map_err(|e| WeatherError::Decode(e.to_string()))?;
    Ok(Weather {
        temperature_c: forecast.current_weather.temperature,
        wind_speed_kmh: forecast.current_weather.windspeed,
        weather_code: forecast.current_weather.weathercode,
        fetched_at: Utc::now(),
    })
}
