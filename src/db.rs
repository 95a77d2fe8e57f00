//! SQLite persistence for the silver and gold layers.
//!
//! Callers own the [`Connection`] for the length of a run and pass it in
//! explicitly; every write runs inside its own transaction.

pub mod gold;
pub mod silver;

use std::{fs, path::Path};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{types::Type, Connection};

use crate::Result;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Opens (or creates) the database at `path` in WAL mode.
pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    Ok(conn)
}

pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub(crate) fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_time(column: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, TIME_FORMAT) {
        return Ok(naive.and_utc());
    }

    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

pub(crate) fn parse_date(column: usize, text: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

// -- Tests -------------------------------------------------------------------
