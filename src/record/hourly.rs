use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// One forecast hour for one city. `(city, time)` is unique in the fact table.
///
/// Measurements are `None` when the source value was missing or non-numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRecord {
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    /// IANA zone the hour belongs to, e.g. `America/Los_Angeles`.
    pub timezone: String,
    pub time: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed: Option<f64>,
}

impl HourlyRecord {
    /// Calendar date of this hour in its own timezone. Unknown zones fall back to UTC.
    pub fn local_date(&self) -> NaiveDate {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => self.time.with_timezone(&tz).date_naive(),
            Err(_) => self.time.date_naive(),
        }
    }
}

// -- Tests -------------------------------------------------------------------
