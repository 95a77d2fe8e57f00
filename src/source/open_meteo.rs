//! Open-Meteo geocoding and forecast client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{config::Settings, PipelineError, Result};

use super::{ForecastSource, Location};

pub const HOURLY_VARIABLES: &str =
    "temperature_2m,relative_humidity_2m,precipitation,wind_speed_10m";

#[derive(Debug, Clone)]
pub struct OpenMeteo {
    http: Client,
    geocoding_url: String,
    forecast_url: String,
    forecast_days: u8,
    /// Geocoding candidates requested; the first is always taken.
    result_count: u8,
}

impl OpenMeteo {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(OpenMeteo {
            http: build_client(settings.timeout)?,
            geocoding_url: settings.geocoding_url.clone(),
            forecast_url: settings.forecast_url.clone(),
            forecast_days: settings.forecast_days,
            result_count: settings.geocoding_results.max(1),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)], what: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| request_error(what, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error(what, &e))?;

        check_status(what, status, body)
    }
}

fn request_error(what: &str, err: &reqwest::Error) -> PipelineError {
    if err.is_timeout() {
        PipelineError::fetch(format!("{what} request timed out: {err}"))
    } else {
        PipelineError::fetch(format!("{what} request failed: {err}"))
    }
}

/// Passes the body through on success; anything else is a fetch failure.
fn check_status(what: &str, status: StatusCode, body: String) -> Result<String> {
    if !status.is_success() {
        return Err(PipelineError::fetch(format!(
            "{what} request failed with status {status}: {}",
            truncate_body(&body)
        )));
    }

    Ok(body)
}

/// The forecast body must be a JSON document.
fn parse_forecast(body: &str) -> Result<Value> {
    serde_json::from_str(body)
        .map_err(|e| PipelineError::fetch(format!("forecast response is not JSON: {e}")))
}

fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("weather-etl/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

#[async_trait]
impl ForecastSource for OpenMeteo {
    async fn resolve(&self, city: &str) -> Result<Location> {
        debug!(city, "geocoding");
        let query = [
            ("name", city.to_string()),
            ("count", self.result_count.to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];
        let body = self.get_json(&self.geocoding_url, &query, "geocoding").await?;

        parse_geocoding(city, &body)
    }

    async fn fetch(&self, location: &Location) -> Result<Value> {
        debug!(
            latitude = location.latitude,
            longitude = location.longitude,
            "fetching forecast"
        );
        let query = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("hourly", HOURLY_VARIABLES.to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", self.forecast_days.to_string()),
        ];
        let body = self.get_json(&self.forecast_url, &query, "forecast").await?;

        parse_forecast(&body)
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    results: Option<Vec<GeocodingResult>>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: Option<String>,
    country: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
}

/// Takes the first match. A match without coordinates counts as malformed.
pub fn parse_geocoding(city: &str, body: &str) -> Result<Location> {
    let parsed: GeocodingResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::resolution(format!("malformed geocoding response: {e}")))?;

    let top = parsed
        .results
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::resolution(format!("no geocoding results for city '{city}'")))?;

    let (Some(latitude), Some(longitude)) = (top.latitude, top.longitude) else {
        return Err(PipelineError::resolution(format!(
            "geocoding result for '{city}' has no coordinates"
        )));
    };

    Ok(Location {
        name: top.name.unwrap_or_else(|| city.to_string()),
        country: top.country,
        latitude,
        longitude,
        timezone: top.timezone,
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

// -- Tests -------------------------------------------------------------------
