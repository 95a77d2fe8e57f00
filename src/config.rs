//! Runtime settings, read from the environment.

use std::{env, path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

const MAX_FORECAST_DAYS: u8 = 16;
const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_GEOCODING_RESULTS: u8 = 100;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the `bronze/` and `silver/` directories.
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub geocoding_url: String,
    pub forecast_url: String,
    pub forecast_days: u8,
    /// Geocoding candidates to request per lookup.
    pub geocoding_results: u8,
    pub timeout: Duration,
    /// Write `silver/<city>_hourly.parquet` alongside the database load.
    pub silver_parquet: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

impl Settings {
    /// Settings rooted at `data_dir`, everything else at its default.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Settings {
            database_path: data_dir.join("weather.sqlite"),
            data_dir,
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
            forecast_url: DEFAULT_FORECAST_URL.to_string(),
            forecast_days: 7,
            geocoding_results: 1,
            timeout: Duration::from_secs(30),
            silver_parquet: true,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup, so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("WEATHER_ETL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let mut settings = Settings::with_data_dir(data_dir);

        if let Some(path) = lookup("WEATHER_ETL_DATABASE") {
            settings.database_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("WEATHER_ETL_GEOCODING_URL") {
            settings.geocoding_url = url;
        }
        if let Some(url) = lookup("WEATHER_ETL_FORECAST_URL") {
            settings.forecast_url = url;
        }
        if let Some(days) = lookup("WEATHER_ETL_FORECAST_DAYS") {
            settings.forecast_days = days
                .trim()
                .parse()
                .with_context(|| format!("WEATHER_ETL_FORECAST_DAYS is not a number: {days}"))?;
        }
        if let Some(count) = lookup("WEATHER_ETL_GEOCODING_RESULTS") {
            settings.geocoding_results = count.trim().parse().with_context(|| {
                format!("WEATHER_ETL_GEOCODING_RESULTS is not a number: {count}")
            })?;
        }
        if let Some(secs) = lookup("WEATHER_ETL_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("WEATHER_ETL_TIMEOUT_SECS is not a number: {secs}"))?;
            settings.timeout = Duration::from_secs(secs);
        }
        if let Some(flag) = lookup("WEATHER_ETL_SILVER_PARQUET") {
            settings.silver_parquet = parse_flag(&flag)?;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.forecast_days == 0 || self.forecast_days > MAX_FORECAST_DAYS {
            return Err(anyhow!(
                "forecast days must be between 1 and {MAX_FORECAST_DAYS}, got {}",
                self.forecast_days
            ));
        }

        if self.geocoding_results == 0 || self.geocoding_results > MAX_GEOCODING_RESULTS {
            return Err(anyhow!(
                "geocoding results must be between 1 and {MAX_GEOCODING_RESULTS}, got {}",
                self.geocoding_results
            ));
        }

        let secs = self.timeout.as_secs();
        if secs == 0 || secs > MAX_TIMEOUT_SECS {
            return Err(anyhow!(
                "timeout must be between 1 and {MAX_TIMEOUT_SECS} seconds, got {secs}"
            ));
        }

        for url in [&self.geocoding_url, &self.forecast_url] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow!("endpoint must be an http(s) URL: {url}"));
            }
        }

        Ok(())
    }

    pub fn bronze_dir(&self) -> PathBuf {
        self.data_dir.join("bronze")
    }

    pub fn silver_dir(&self) -> PathBuf {
        self.data_dir.join("silver")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("weather-etl"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("expected a boolean flag, got '{other}'")),
    }
}

// -- Tests -------------------------------------------------------------------
