//! Silver fact table: one row per `(city, hour)`.

use rusqlite::{params, Connection, Row};
use tracing::info;

use crate::{cli::create_progress_bar, record::HourlyRecord, Result};

use super::{format_time, parse_time};

pub const TABLE: &str = "silver_hourly_weather";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS silver_hourly_weather (
        city                 TEXT NOT NULL,
        latitude             DOUBLE PRECISION NOT NULL,
        longitude            DOUBLE PRECISION NOT NULL,
        timezone             TEXT NOT NULL,
        time                 TIMESTAMP NOT NULL,
        temperature_2m       DOUBLE PRECISION,
        relative_humidity_2m DOUBLE PRECISION,
        precipitation        DOUBLE PRECISION,
        wind_speed_10m       DOUBLE PRECISION,
        PRIMARY KEY (city, time)
    );
";

const UPSERT: &str = "
    INSERT INTO silver_hourly_weather (
        city, latitude, longitude, timezone, time,
        temperature_2m, relative_humidity_2m, precipitation, wind_speed_10m
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT (city, time) DO UPDATE SET
        latitude = excluded.latitude,
        longitude = excluded.longitude,
        timezone = excluded.timezone,
        temperature_2m = excluded.temperature_2m,
        relative_humidity_2m = excluded.relative_humidity_2m,
        precipitation = excluded.precipitation,
        wind_speed_10m = excluded.wind_speed_10m
";

const SELECT: &str = "
    SELECT city, latitude, longitude, timezone, time,
           temperature_2m, relative_humidity_2m, precipitation, wind_speed_10m
    FROM silver_hourly_weather
";

/// Creates the fact table if it does not exist. Safe to call on every run.
pub fn ensure_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.commit()?;

    Ok(())
}

/// Inserts `records`, overwriting any existing row with the same `(city, time)`.
///
/// The whole batch is one transaction: on error nothing is applied. Rows not
/// present in `records` are left alone.
pub fn upsert(conn: &mut Connection, records: &[HourlyRecord]) -> Result<usize> {
    let pb = create_progress_bar(records.len() as u64, "Upserting silver rows".to_string());

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(UPSERT)?;
        for r in records {
            stmt.execute(params![
                &r.city,
                r.latitude,
                r.longitude,
                &r.timezone,
                format_time(&r.time),
                r.temperature,
                r.humidity,
                r.precipitation,
                r.wind_speed,
            ])?;
            pb.inc(1);
        }
    }
    tx.commit()?;

    pb.finish_with_message("Silver rows upserted");
    info!(rows = records.len(), "upserted into {TABLE}");

    Ok(records.len())
}

/// Every row in the fact table, ordered by city then time.
pub fn load_all(conn: &Connection) -> Result<Vec<HourlyRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY city, time"))?;
    let rows = stmt.query_map([], from_row)?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn for_city(conn: &Connection, city: &str) -> Result<Vec<HourlyRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT} WHERE city = ?1 ORDER BY time"))?;
    let rows = stmt.query_map(params![city], from_row)?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get(0))?)
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<HourlyRecord> {
    let time: String = row.get(4)?;

    Ok(HourlyRecord {
        city: row.get(0)?,
        latitude: row.get(1)?,
        longitude: row.get(2)?,
        timezone: row.get(3)?,
        time: parse_time(4, &time)?,
        temperature: row.get(5)?,
        humidity: row.get(6)?,
        precipitation: row.get(7)?,
        wind_speed: row.get(8)?,
    })
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;
    use crate::db;

    fn hour(h: u32, temp: Option<f64>) -> HourlyRecord {
        HourlyRecord {
            city: "Testville".to_string(),
            latitude: 1.5,
            longitude: 2.5,
            timezone: "UTC".to_string(),
            time: Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap(),
            temperature: temp,
            humidity: Some(80.0),
            precipitation: Some(0.0),
            wind_speed: Some(5.0),
        }
    }

    fn setup() -> (TempDir, Connection) {
        let dir = TempDir::new().unwrap();
        let mut conn = db::open(&dir.path().join("test.sqlite")).unwrap();
        ensure_schema(&mut conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn should_ensure_schema_twice() {
        let (_dir, mut conn) = setup();

        ensure_schema(&mut conn).unwrap();

        assert_eq!(count(&conn).unwrap(), 0);
    }

    #[test]
    fn should_be_idempotent() {
        let (_dir, mut conn) = setup();
        let records = vec![hour(0, Some(10.0)), hour(1, Some(12.0))];

        upsert(&mut conn, &records).unwrap();
        let first = load_all(&conn).unwrap();
        upsert(&mut conn, &records).unwrap();
        let second = load_all(&conn).unwrap();

        assert_eq!(count(&conn).unwrap(), 2);
        assert_eq!(first, second);
        assert_eq!(second, records);
    }

    #[test]
    fn should_overwrite_on_conflict() {
        let (_dir, mut conn) = setup();
        upsert(&mut conn, &[hour(0, Some(10.0))]).unwrap();

        let mut newer = hour(0, Some(99.0));
        newer.latitude = 3.0;
        newer.humidity = None;
        upsert(&mut conn, &[newer.clone()]).unwrap();

        let rows = for_city(&conn, "Testville").unwrap();
        assert_eq!(rows, vec![newer]);
    }

    #[test]
    fn should_not_delete_absent_hours() {
        let (_dir, mut conn) = setup();
        upsert(&mut conn, &[hour(0, Some(10.0)), hour(1, Some(11.0))]).unwrap();

        upsert(&mut conn, &[hour(1, Some(21.0))]).unwrap();

        let rows = for_city(&conn, "Testville").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].temperature, Some(10.0));
        assert_eq!(rows[1].temperature, Some(21.0));
    }

    #[test]
    fn should_store_missing_as_null() {
        let (_dir, mut conn) = setup();
        upsert(&mut conn, &[hour(0, None)]).unwrap();

        let nulls: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM silver_hourly_weather WHERE temperature_2m IS NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(nulls, 1);
    }

    #[test]
    fn should_roll_back_whole_batch_on_failure() {
        let (_dir, mut conn) = setup();
        upsert(&mut conn, &[hour(0, Some(10.0))]).unwrap();

        // Reject any row with a temperature above 50 so the second row of the batch fails.
        conn.execute_batch(
            "CREATE TRIGGER reject_hot BEFORE INSERT ON silver_hourly_weather
             WHEN NEW.temperature_2m > 50 BEGIN SELECT RAISE(ABORT, 'too hot'); END;",
        )
        .unwrap();

        let result = upsert(&mut conn, &[hour(1, Some(11.0)), hour(2, Some(60.0))]);

        assert!(result.is_err());
        let rows = for_city(&conn, "Testville").unwrap();
        assert_eq!(rows, vec![hour(0, Some(10.0))]);
    }
}
