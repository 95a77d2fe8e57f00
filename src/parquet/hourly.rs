//! Save normalised hourly records to a parquet file for inspection.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::{ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray},
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};
use tracing::info;

use crate::{bronze::city_key, record::HourlyRecord, Result};

pub fn hourly_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("city", DataType::Utf8, false),
        Field::new("latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
        Field::new("timezone", DataType::Utf8, false),
        Field::new(
            "time",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("temperature_2m", DataType::Float64, true),
        Field::new("relative_humidity_2m", DataType::Float64, true),
        Field::new("precipitation", DataType::Float64, true),
        Field::new("wind_speed_10m", DataType::Float64, true),
    ]))
}

/// `<dir>/<city_key>_hourly.parquet`
pub fn make_hourly_file_name(dir: &Path, city: &str) -> PathBuf {
    dir.join(format!("{}_hourly.parquet", city_key(city)))
}

/// Writes `records` to `file_path`, replacing any previous file. Missing
/// measurements are written as nulls.
pub fn save_hourly(records: &[HourlyRecord], file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let schema = hourly_schema();

    let cities: Vec<&str> = records.iter().map(|r| r.city.as_str()).collect();
    let latitudes: Vec<f64> = records.iter().map(|r| r.latitude).collect();
    let longitudes: Vec<f64> = records.iter().map(|r| r.longitude).collect();
    let timezones: Vec<&str> = records.iter().map(|r| r.timezone.as_str()).collect();
    let times: Vec<i64> = records.iter().map(|r| r.time.timestamp_micros()).collect();
    let temperatures: Vec<Option<f64>> = records.iter().map(|r| r.temperature).collect();
    let humidities: Vec<Option<f64>> = records.iter().map(|r| r.humidity).collect();
    let precipitations: Vec<Option<f64>> = records.iter().map(|r| r.precipitation).collect();
    let wind_speeds: Vec<Option<f64>> = records.iter().map(|r| r.wind_speed).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(cities)),
        Arc::new(Float64Array::from(latitudes)),
        Arc::new(Float64Array::from(longitudes)),
        Arc::new(StringArray::from(timezones)),
        Arc::new(TimestampMicrosecondArray::from(times).with_timezone("UTC")),
        Arc::new(Float64Array::from(temperatures)),
        Arc::new(Float64Array::from(humidities)),
        Arc::new(Float64Array::from(precipitations)),
        Arc::new(Float64Array::from(wind_speeds)),
    ];

    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .set_dictionary_enabled(true)
        .build();

    let file = File::create(file_path)?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    info!(path = %file_path.display(), rows = records.len(), "saved silver parquet");
    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use arrow::array::{Array, Float64Array};
    use chrono::{TimeZone, Utc};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    use super::*;

    fn records_fixture() -> Vec<HourlyRecord> {
        (0..3)
            .map(|h| HourlyRecord {
                city: "Testville".to_string(),
                latitude: 1.5,
                longitude: 2.5,
                timezone: "UTC".to_string(),
                time: Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap(),
                temperature: if h == 1 { None } else { Some(10.0 + h as f64) },
                humidity: Some(80.0),
                precipitation: Some(0.0),
                wind_speed: Some(5.0),
            })
            .collect()
    }

    #[test]
    fn should_name_file_after_city() {
        let path = make_hourly_file_name(Path::new("/data/silver"), "San Jose");

        assert_eq!(path, PathBuf::from("/data/silver/san_jose_hourly.parquet"));
    }

    #[test]
    fn should_write_schema_and_nulls() {
        let dir = TempDir::new().unwrap();
        let path = make_hourly_file_name(dir.path(), "Testville");

        save_hourly(&records_fixture(), &path).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();

        let mut total_rows = 0;
        for batch in reader {
            let batch = batch.unwrap();
            total_rows += batch.num_rows();

            let schema = batch.schema();
            assert_eq!(schema.fields().len(), 9);
            assert_eq!(schema.field(0).name(), "city");
            assert_eq!(schema.field(4).name(), "time");
            assert_eq!(schema.field(5).name(), "temperature_2m");

            let temps = batch
                .column(5)
                .as_any()
                .downcast_ref::<Float64Array>()
                .unwrap();
            assert_eq!(temps.null_count(), 1);
            assert_eq!(temps.value(2), 12.0);
        }

        assert_eq!(total_rows, 3);
    }

    #[test]
    fn should_replace_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = make_hourly_file_name(dir.path(), "Testville");
        let records = records_fixture();

        save_hourly(&records, &path).unwrap();
        save_hourly(&records[..1], &path).unwrap();

        let file = File::open(&path).unwrap();
        let rows: usize = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap()
            .map(|b| b.unwrap().num_rows())
            .sum();
        assert_eq!(rows, 1);
    }
}
