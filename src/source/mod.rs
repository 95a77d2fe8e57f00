//! Where forecasts come from: resolving a city and fetching its hourly series.

pub mod open_meteo;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

pub use open_meteo::OpenMeteo;

/// A geocoded place. Embedded verbatim into every bronze snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: Option<String>,
}

/// Given a city name, return an hourly forecast series.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Resolve free text to the first geocoding match.
    async fn resolve(&self, city: &str) -> Result<Location>;

    /// Fetch the raw columnar hourly forecast for a location.
    async fn fetch(&self, location: &Location) -> Result<Value>;
}
