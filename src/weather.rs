//! Current temperature from the Open-Meteo forecast API.

use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::config::WeatherLocation;

const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1";
const TIMEOUT: Duration = Duration::from_secs(5);

/// Text shown when the temperature cannot be fetched.
pub const UNAVAILABLE: &str = "Не удалось получить погоду.";

#[derive(Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
    location: WeatherLocation,
    timezone: String,
}

#[derive(Deserialize)]
struct Forecast {
    current: Current,
}

#[derive(Deserialize)]
struct Current {
    temperature_2m: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected forecast payload: {0}")]
    Parse(#[from] serde_json::Error),
}

impl WeatherClient {
    pub fn new(location: WeatherLocation, timezone: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            location,
            timezone: timezone.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn current_temperature(&self) -> Result<f64, Error> {
        let body = self
            .http
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("latitude", self.location.latitude.to_string()),
                ("longitude", self.location.longitude.to_string()),
                ("current", "temperature_2m".to_string()),
                ("timezone", self.timezone.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_temperature(&body)
    }

    /// One-line report for the chat; failures become [`UNAVAILABLE`].
    pub async fn report(&self) -> String {
        match self.current_temperature().await {
            Ok(t) => format_report(&self.location.city, t),
            Err(e) => {
                warn!("Weather lookup failed: {e}");
                UNAVAILABLE.to_string()
            }
        }
    }
}

fn parse_temperature(body: &str) -> Result<f64, Error> {
    let forecast: Forecast = serde_json::from_str(body)?;
    Ok(forecast.current.temperature_2m)
}

fn format_report(city: &str, temperature: f64) -> String {
    // Round half away from zero; `-0` prints as `0`.
    let rounded = temperature.round() as i64;
    format!("{city}: сейчас {rounded}°C")
}
