use chrono::{DateTime, NaiveDate, Utc};

use super::HourlyRecord;

/// Gold row: one city, one local calendar day. Fully derived from hourly records.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub city: String,
    pub date: NaiveDate,
    pub avg_temperature: Option<f64>,
    pub total_precipitation: Option<f64>,
    pub max_wind_speed: Option<f64>,
    pub hours_count: i64,
    pub computed_at: DateTime<Utc>,
}

impl DailySummary {
    /// Folds the hours of one `(city, date)` group.
    ///
    /// Missing measurements are skipped by the average, sum and max; every hour
    /// still counts towards `hours_count`. An aggregate with no values is `None`.
    pub fn from_hours<'a, I>(
        city: &str,
        date: NaiveDate,
        hours: I,
        computed_at: DateTime<Utc>,
    ) -> Self
    where
        I: IntoIterator<Item = &'a HourlyRecord>,
    {
        let mut hours_count = 0;
        let mut temp_sum = 0.0;
        let mut temp_n = 0usize;
        let mut precipitation: Option<f64> = None;
        let mut wind: Option<f64> = None;

        for hour in hours {
            hours_count += 1;
            if let Some(t) = hour.temperature {
                temp_sum += t;
                temp_n += 1;
            }
            if let Some(p) = hour.precipitation {
                precipitation = Some(precipitation.unwrap_or(0.0) + p);
            }
            if let Some(w) = hour.wind_speed {
                wind = Some(wind.map_or(w, |m| m.max(w)));
            }
        }

        DailySummary {
            city: city.to_string(),
            date,
            avg_temperature: (temp_n > 0).then(|| temp_sum / temp_n as f64),
            total_precipitation: precipitation,
            max_wind_speed: wind,
            hours_count,
            computed_at,
        }
    }
}

// -- Tests -------------------------------------------------------------------
