//! Runs extract → transform → load → aggregate for one city.
//!
//! Stages run strictly in order and the first failure aborts the run. Nothing
//! is rolled back across stages: a failed aggregate after a successful load
//! leaves the facts updated and the summaries stale until the next run.

use std::path::PathBuf;

use rusqlite::Connection;
use tracing::info;

use crate::{
    bronze::SnapshotStore,
    cli::create_spinner,
    config::Settings,
    db::{self, gold, silver},
    normalise::normalise,
    parquet,
    record::HourlyRecord,
    source::ForecastSource,
    Result,
};

/// What one run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snapshot: PathBuf,
    pub silver_parquet: Option<PathBuf>,
    pub hourly_rows: usize,
    pub daily_summaries: usize,
}

pub async fn run<S: ForecastSource>(source: &S, settings: &Settings, city: &str) -> Result<RunReport> {
    let store = SnapshotStore::new(settings.bronze_dir());

    println!("Extracting...");
    let snapshot = extract(source, &store, city).await?;

    println!("Transforming...");
    let records = transform(&store, city)?;
    let silver_parquet = if settings.silver_parquet {
        let path = parquet::make_hourly_file_name(&settings.silver_dir(), city);
        parquet::save_hourly(&records, &path)?;
        Some(path)
    } else {
        None
    };

    let mut conn = db::open(&settings.database_path)?;

    println!("Loading Silver...");
    let hourly_rows = load(&mut conn, &records)?;

    println!("Aggregating Gold...");
    let daily_summaries = aggregate(&mut conn)?;

    println!("Done.");
    info!(city, hourly_rows, daily_summaries, "pipeline finished");

    Ok(RunReport {
        snapshot,
        silver_parquet,
        hourly_rows,
        daily_summaries,
    })
}

/// Resolve, fetch and persist a new bronze snapshot.
pub async fn extract<S: ForecastSource>(
    source: &S,
    store: &SnapshotStore,
    city: &str,
) -> Result<PathBuf> {
    let bar = create_spinner(format!("Resolving {city}..."));
    let location = source.resolve(city).await;
    bar.finish_and_clear();
    let location = location?;
    info!(
        city,
        resolved = %location.name,
        latitude = location.latitude,
        longitude = location.longitude,
        "resolved location"
    );

    let bar = create_spinner(format!("Fetching forecast for {}...", location.name));
    let payload = source.fetch(&location).await;
    bar.finish_and_clear();

    store.save(city, &location, payload?)
}

/// Normalise the latest bronze snapshot for `city`.
pub fn transform(store: &SnapshotStore, city: &str) -> Result<Vec<HourlyRecord>> {
    let snapshot = store.load_latest(city)?;
    normalise(&snapshot)
}

pub fn load(conn: &mut Connection, records: &[HourlyRecord]) -> Result<usize> {
    silver::ensure_schema(conn)?;
    silver::upsert(conn, records)
}

pub fn aggregate(conn: &mut Connection) -> Result<usize> {
    gold::ensure_gold_schema(conn)?;
    gold::recompute(conn)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use super::*;
    use crate::{source::Location, PipelineError};

    struct StubSource {
        payload: Value,
        resolvable: bool,
    }

    impl StubSource {
        fn testville() -> Self {
            StubSource {
                payload: json!({
                    "latitude": 1.5,
                    "longitude": 2.5,
                    "timezone": "UTC",
                    "hourly": {
                        "time": ["2024-01-01T00:00", "2024-01-01T01:00"],
                        "temperature_2m": [10.0, 12.0],
                        "precipitation": [0.0, 1.0],
                        "wind_speed_10m": [5.0, 7.0]
                    }
                }),
                resolvable: true,
            }
        }
    }

    #[async_trait]
    impl ForecastSource for StubSource {
        async fn resolve(&self, city: &str) -> Result<Location> {
            if !self.resolvable {
                return Err(PipelineError::resolution(format!("no match for {city}")));
            }
            Ok(Location {
                name: "Testville".to_string(),
                country: None,
                latitude: 1.5,
                longitude: 2.5,
                timezone: Some("UTC".to_string()),
            })
        }

        async fn fetch(&self, _location: &Location) -> Result<Value> {
            Ok(self.payload.clone())
        }
    }

    fn settings(dir: &TempDir) -> Settings {
        Settings::with_data_dir(dir.path().to_path_buf())
    }

    fn jan_1() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn should_run_testville_end_to_end() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);

        let report = run(&StubSource::testville(), &settings, "Testville")
            .await
            .unwrap();

        assert!(report.snapshot.exists());
        assert!(report.silver_parquet.as_ref().unwrap().exists());
        assert_eq!(report.hourly_rows, 2);
        assert_eq!(report.daily_summaries, 1);

        let conn = db::open(&settings.database_path).unwrap();
        let rows = gold::summaries(&conn, "Testville", Some(jan_1()), Some(jan_1())).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg_temperature, Some(11.0));
        assert_eq!(rows[0].total_precipitation, Some(1.0));
        assert_eq!(rows[0].max_wind_speed, Some(7.0));
        assert_eq!(rows[0].hours_count, 2);
    }

    #[tokio::test]
    async fn should_replay_snapshot_without_duplicates() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        run(&StubSource::testville(), &settings, "Testville")
            .await
            .unwrap();

        let store = SnapshotStore::new(settings.bronze_dir());
        let mut conn = db::open(&settings.database_path).unwrap();
        let records = transform(&store, "Testville").unwrap();
        load(&mut conn, &records).unwrap();
        aggregate(&mut conn).unwrap();

        assert_eq!(silver::count(&conn).unwrap(), 2);
        let rows = gold::summaries(&conn, "Testville", None, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg_temperature, Some(11.0));
    }

    #[tokio::test]
    async fn should_abort_before_writing_when_resolution_fails() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let source = StubSource {
            resolvable: false,
            ..StubSource::testville()
        };

        let err = run(&source, &settings, "Atlantis").await.unwrap_err();

        assert!(matches!(err, PipelineError::Resolution(_)));
        assert!(!settings.bronze_dir().exists());
        assert!(!settings.database_path.exists());
    }

    #[tokio::test]
    async fn should_keep_snapshot_but_skip_load_when_payload_is_malformed() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let source = StubSource {
            payload: json!({"timezone": "UTC"}),
            resolvable: true,
        };

        let err = run(&source, &settings, "Testville").await.unwrap_err();

        assert!(matches!(err, PipelineError::MalformedPayload(_)));
        let store = SnapshotStore::new(settings.bronze_dir());
        assert_eq!(store.list("Testville").unwrap().len(), 1);
        assert!(!settings.database_path.exists());
    }

    #[tokio::test]
    async fn should_skip_parquet_when_disabled() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir);
        settings.silver_parquet = false;

        let report = run(&StubSource::testville(), &settings, "Testville")
            .await
            .unwrap();

        assert!(report.silver_parquet.is_none());
        assert!(!settings.silver_dir().exists());
    }

    #[test]
    fn should_fail_transform_without_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        let err = transform(&store, "Testville").unwrap_err();

        assert!(matches!(err, PipelineError::NotFound(_)));
    }
}
