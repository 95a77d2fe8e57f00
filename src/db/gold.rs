//! Gold daily summaries, rebuilt in full from the silver fact table, plus the
//! read queries the dashboard runs against them.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use tracing::info;

use crate::{
    record::{DailySummary, HourlyRecord},
    Result,
};

use super::{format_date, parse_date, parse_time, silver};

pub const TABLE: &str = "gold_daily_weather";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS gold_daily_weather (
        city                TEXT NOT NULL,
        date                DATE NOT NULL,
        avg_temperature_2m  DOUBLE PRECISION,
        total_precipitation DOUBLE PRECISION,
        max_wind_speed_10m  DOUBLE PRECISION,
        hours_count         INTEGER NOT NULL,
        computed_at         TIMESTAMP NOT NULL,
        PRIMARY KEY (city, date)
    );
";

const UPSERT: &str = "
    INSERT INTO gold_daily_weather (
        city, date, avg_temperature_2m, total_precipitation,
        max_wind_speed_10m, hours_count, computed_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT (city, date) DO UPDATE SET
        avg_temperature_2m = excluded.avg_temperature_2m,
        total_precipitation = excluded.total_precipitation,
        max_wind_speed_10m = excluded.max_wind_speed_10m,
        hours_count = excluded.hours_count,
        computed_at = excluded.computed_at
";

/// Creates the summary table if it does not exist. Safe to call on every run.
pub fn ensure_gold_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.commit()?;

    Ok(())
}

/// Recomputes every `(city, local date)` present in the fact table.
pub fn recompute(conn: &mut Connection) -> Result<usize> {
    recompute_at(conn, Utc::now())
}

/// As [`recompute`], stamping rows with `computed_at`.
///
/// Summaries whose hours have since disappeared from the fact table are not
/// removed.
pub fn recompute_at(conn: &mut Connection, computed_at: DateTime<Utc>) -> Result<usize> {
    let tx = conn.transaction()?;

    let hours = silver::load_all(&tx)?;
    let summaries = summarise(&hours, computed_at);
    {
        let mut stmt = tx.prepare(UPSERT)?;
        for s in &summaries {
            stmt.execute(params![
                &s.city,
                format_date(&s.date),
                s.avg_temperature,
                s.total_precipitation,
                s.max_wind_speed,
                s.hours_count,
                s.computed_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ])?;
        }
    }
    tx.commit()?;

    info!(
        hours = hours.len(),
        summaries = summaries.len(),
        "recomputed {TABLE}"
    );
    Ok(summaries.len())
}

/// Groups hours by city and local calendar date, then folds each group.
pub fn summarise(hours: &[HourlyRecord], computed_at: DateTime<Utc>) -> Vec<DailySummary> {
    let mut groups: BTreeMap<(&str, NaiveDate), Vec<&HourlyRecord>> = BTreeMap::new();
    for hour in hours {
        groups
            .entry((hour.city.as_str(), hour.local_date()))
            .or_default()
            .push(hour);
    }

    groups
        .into_iter()
        .map(|((city, date), group)| {
            DailySummary::from_hours(city, date, group.into_iter(), computed_at)
        })
        .collect()
}

/// Distinct cities with at least one summary, alphabetically.
pub fn cities(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT city FROM gold_daily_weather ORDER BY city")?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
}

/// First and last summarised date for `city`, or `None` if it has no rows.
///
/// Cities are matched ignoring ASCII case, here and in [`summaries`].
pub fn date_bounds(conn: &Connection, city: &str) -> Result<Option<(NaiveDate, NaiveDate)>> {
    let (min, max): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(date), MAX(date) FROM gold_daily_weather WHERE city = ?1 COLLATE NOCASE",
        params![city],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    match (min, max) {
        (Some(min), Some(max)) => Ok(Some((parse_date(0, &min)?, parse_date(1, &max)?))),
        _ => Ok(None),
    }
}

/// Summaries for `city` with `from <= date <= to`, oldest first. Open bounds are unbounded.
pub fn summaries(
    conn: &Connection,
    city: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<DailySummary>> {
    let mut stmt = conn.prepare(
        "SELECT city, date, avg_temperature_2m, total_precipitation,
                max_wind_speed_10m, hours_count, computed_at
         FROM gold_daily_weather
         WHERE city = ?1 COLLATE NOCASE
           AND (?2 IS NULL OR date >= ?2)
           AND (?3 IS NULL OR date <= ?3)
         ORDER BY date",
    )?;
    let rows = stmt.query_map(
        params![
            city,
            from.as_ref().map(format_date),
            to.as_ref().map(format_date)
        ],
        from_row,
    )?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<DailySummary> {
    let date: String = row.get(1)?;
    let computed_at: String = row.get(6)?;

    Ok(DailySummary {
        city: row.get(0)?,
        date: parse_date(1, &date)?,
        avg_temperature: row.get(2)?,
        total_precipitation: row.get(3)?,
        max_wind_speed: row.get(4)?,
        hours_count: row.get(5)?,
        computed_at: parse_time(6, &computed_at)?,
    })
}

// -- Tests -------------------------------------------------------------------
