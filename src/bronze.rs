//! Bronze layer: immutable raw forecast snapshots, one JSON file per fetch.
//!
//! Files are named `<city_key>_<YYYYMMDDTHHMMSSZ>.json`, so the newest snapshot
//! for a city can be found from the directory listing alone.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{source::Location, PipelineError, Result};

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// One fetch, exactly as it came off the wire plus where and when it was taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub requested_city: String,
    pub resolved_location: Location,
    pub fetched_at_utc: DateTime<Utc>,
    pub data: Value,
}

/// Lowercase, spaces replaced with underscores.
pub fn city_key(city: &str) -> String {
    city.trim().to_lowercase().replace(' ', "_")
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SnapshotStore { dir: dir.into() }
    }

    /// Persists a new snapshot taken now.
    pub fn save(&self, city: &str, location: &Location, payload: Value) -> Result<PathBuf> {
        self.save_at(city, location, payload, Utc::now())
    }

    /// Persists a snapshot stamped `fetched_at`. Never overwrites an existing file.
    pub fn save_at(
        &self,
        city: &str,
        location: &Location,
        payload: Value,
        fetched_at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let fetched_at = fetched_at.trunc_subsecs(0);
        let file_name = format!(
            "{}_{}.json",
            city_key(city),
            fetched_at.format(TIMESTAMP_FORMAT)
        );
        let path = self.dir.join(file_name);

        let snapshot = Snapshot {
            requested_city: city.to_string(),
            resolved_location: location.clone(),
            fetched_at_utc: fetched_at,
            data: payload,
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        info!(path = %path.display(), "saved bronze snapshot");
        Ok(path)
    }

    /// The most recent snapshot for `city`, by the timestamp in its file name.
    pub fn load_latest(&self, city: &str) -> Result<Snapshot> {
        let key = city_key(city);
        let (path, _) = self.latest_path(&key)?.ok_or_else(|| {
            PipelineError::NotFound(format!(
                "no bronze snapshots for city '{city}' in {} (expected files like {key}_*.json); run extraction first",
                self.dir.display()
            ))
        })?;

        debug!(path = %path.display(), "loading bronze snapshot");
        let contents = fs::read_to_string(&path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents).map_err(|e| {
            PipelineError::malformed(format!("snapshot {} is unreadable: {e}", path.display()))
        })?;

        Ok(snapshot)
    }

    /// All snapshot paths for `city`, oldest first.
    pub fn list(&self, city: &str) -> Result<Vec<PathBuf>> {
        let mut found = self.scan(&city_key(city))?;
        found.sort_by_key(|(_, ts)| *ts);

        Ok(found.into_iter().map(|(path, _)| path).collect())
    }

    fn latest_path(&self, key: &str) -> Result<Option<(PathBuf, NaiveDateTime)>> {
        Ok(self.scan(key)?.into_iter().max_by_key(|(_, ts)| *ts))
    }

    fn scan(&self, key: &str) -> Result<Vec<(PathBuf, NaiveDateTime)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(ts) = parse_file_name(name, key) {
                found.push((path, ts));
            }
        }

        Ok(found)
    }
}

// Matches `<key>_<timestamp>.json` exactly; `san` must not pick up `san_jose_*`.
fn parse_file_name(name: &str, key: &str) -> Option<NaiveDateTime> {
    let stem = name.strip_suffix(".json")?;
    let (file_key, ts) = stem.rsplit_once('_')?;
    if file_key != key {
        return None;
    }

    NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()
}

// -- Tests -------------------------------------------------------------------
