//! Silver transform: reshape a bronze snapshot's columnar hourly arrays into
//! typed [`HourlyRecord`]s.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{bronze::Snapshot, record::HourlyRecord, PipelineError, Result};

pub const TEMPERATURE: &str = "temperature_2m";
pub const HUMIDITY: &str = "relative_humidity_2m";
pub const PRECIPITATION: &str = "precipitation";
pub const WIND_SPEED: &str = "wind_speed_10m";

#[derive(Debug, Deserialize)]
struct ForecastPayload {
    timezone: Option<String>,
    utc_offset_seconds: Option<i32>,
    hourly: Option<HourlyColumns>,
}

#[derive(Debug, Deserialize)]
struct HourlyColumns {
    time: Option<Vec<String>>,
    #[serde(flatten)]
    series: HashMap<String, Value>,
}

/// A `time` entry: either an absolute instant or a wall-clock time to localise.
#[derive(Debug, Clone, Copy)]
enum Stamp {
    Absolute(DateTime<Utc>),
    Wall(NaiveDateTime),
}

/// Builds one record per entry of `hourly.time`, deduplicated on `(city, time)`
/// (first occurrence wins) and sorted by time.
pub fn normalise(snapshot: &Snapshot) -> Result<Vec<HourlyRecord>> {
    let payload: ForecastPayload = serde_json::from_value(snapshot.data.clone())
        .map_err(|e| PipelineError::malformed(format!("forecast payload: {e}")))?;

    let hourly = payload
        .hourly
        .ok_or_else(|| PipelineError::malformed("payload is missing 'hourly'"))?;
    let times = hourly
        .time
        .ok_or_else(|| PipelineError::malformed("hourly data is missing 'time'"))?;

    let location = &snapshot.resolved_location;
    let timezone = payload
        .timezone
        .or_else(|| location.timezone.clone())
        .unwrap_or_else(|| "UTC".to_string());
    let tz: Tz = timezone
        .parse()
        .map_err(|_| PipelineError::malformed(format!("unknown timezone '{timezone}'")))?;
    let utc_offset = payload
        .utc_offset_seconds
        .map(|secs| {
            FixedOffset::east_opt(secs)
                .ok_or_else(|| PipelineError::malformed(format!("utc offset {secs}s is out of range")))
        })
        .transpose()?;

    let n = times.len();
    let temperature = series(&hourly.series, TEMPERATURE, n)?;
    let humidity = series(&hourly.series, HUMIDITY, n)?;
    let precipitation = series(&hourly.series, PRECIPITATION, n)?;
    let wind_speed = series(&hourly.series, WIND_SPEED, n)?;

    let stamps = times
        .iter()
        .map(|raw| parse_stamp(raw))
        .collect::<Result<Vec<_>>>()?;
    let instants = resolve_times(&stamps, tz, utc_offset);

    let mut seen = HashSet::with_capacity(n);
    let mut records = Vec::with_capacity(n);

    for (i, time) in instants.into_iter().enumerate() {
        if !seen.insert(time) {
            debug!(time = %times[i], "dropping duplicate hour");
            continue;
        }

        records.push(HourlyRecord {
            city: location.name.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            timezone: timezone.clone(),
            time,
            temperature: temperature[i],
            humidity: humidity[i],
            precipitation: precipitation[i],
            wind_speed: wind_speed[i],
        });
    }

    records.sort_by_key(|r| r.time);

    debug!(
        city = %location.name,
        rows = records.len(),
        source_rows = n,
        "normalised snapshot"
    );
    Ok(records)
}

// An absent series is all-missing; a present one must line up with `time`.
fn series(columns: &HashMap<String, Value>, name: &str, len: usize) -> Result<Vec<Option<f64>>> {
    match columns.get(name) {
        None | Some(Value::Null) => {
            warn!(series = name, "series absent from payload; treating as missing");
            Ok(vec![None; len])
        }
        Some(Value::Array(values)) => {
            if values.len() != len {
                return Err(PipelineError::malformed(format!(
                    "'{name}' has {} values but 'time' has {len}",
                    values.len()
                )));
            }
            Ok(values.iter().map(coerce).collect())
        }
        Some(other) => Err(PipelineError::malformed(format!(
            "'{name}' should be an array, found {other}"
        ))),
    }
}

/// Numbers and numeric strings become values; anything else is missing.
pub fn coerce(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn parse_stamp(raw: &str) -> Result<Stamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Stamp::Absolute(dt.with_timezone(&Utc)));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map(Stamp::Wall)
        .map_err(|_| PipelineError::malformed(format!("unparseable time '{raw}'")))
}

/// Wall-clock times to UTC instants, one per stamp.
///
/// With a payload `utc_offset_seconds` every wall time uses that offset. Without
/// one, wall times are localised in `tz`. A series that names an hour inside a
/// DST gap was not written with `tz`'s rules, so the whole series falls back to
/// the offset in force at its first wall time. Distinct wall times therefore
/// never share an instant.
fn resolve_times(stamps: &[Stamp], tz: Tz, utc_offset: Option<FixedOffset>) -> Vec<DateTime<Utc>> {
    if let Some(offset) = utc_offset {
        return with_offset(stamps, offset);
    }
    if let Some(instants) = with_zone(stamps, tz) {
        return instants;
    }

    let offset = first_offset(stamps, tz).unwrap_or_else(|| Utc.fix());
    warn!(timezone = %tz, %offset, "hourly times cross a DST gap; using a fixed offset");
    with_offset(stamps, offset)
}

fn with_offset(stamps: &[Stamp], offset: FixedOffset) -> Vec<DateTime<Utc>> {
    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
    stamps
        .iter()
        .map(|stamp| match stamp {
            Stamp::Absolute(t) => *t,
            Stamp::Wall(naive) => (*naive - shift).and_utc(),
        })
        .collect()
}

// `None` as soon as one wall time falls in a DST gap.
fn with_zone(stamps: &[Stamp], tz: Tz) -> Option<Vec<DateTime<Utc>>> {
    let mut instants = Vec::with_capacity(stamps.len());
    let mut previous: Option<DateTime<Utc>> = None;

    for stamp in stamps {
        let time = match stamp {
            Stamp::Absolute(t) => *t,
            Stamp::Wall(naive) => localise(*naive, tz, previous)?,
        };
        previous = Some(time);
        instants.push(time);
    }

    Some(instants)
}

fn first_offset(stamps: &[Stamp], tz: Tz) -> Option<FixedOffset> {
    let naive = stamps.iter().find_map(|stamp| match stamp {
        Stamp::Wall(naive) => Some(*naive),
        Stamp::Absolute(_) => None,
    })?;

    let offset = tz
        .offset_from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.offset_from_utc_datetime(&(naive - Duration::days(1))));
    Some(offset.fix())
}

/// Wall-clock time in `tz` to UTC, or `None` inside a DST gap.
///
/// A repeated wall time (DST fall-back) takes the earlier instant unless the
/// series has already passed it.
fn localise(naive: NaiveDateTime, tz: Tz, previous: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(early, late) => {
            let early = early.with_timezone(&Utc);
            match previous {
                Some(prev) if prev >= early => Some(late.with_timezone(&Utc)),
                _ => Some(early),
            }
        }
        LocalResult::None => None,
    }
}

// -- Tests -------------------------------------------------------------------
