//! Bronze/silver/gold ETL for Open-Meteo hourly forecasts.
//!
//! A run resolves a city, saves the raw forecast as an immutable bronze
//! snapshot, normalises the latest snapshot into hourly silver facts, upserts
//! them into SQLite and recomputes the gold daily summaries.

pub mod bronze;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod normalise;
pub mod parquet;
pub mod pipeline;
pub mod record;
pub mod source;

pub use error::PipelineError;

pub type Result<T> = std::result::Result<T, PipelineError>;
