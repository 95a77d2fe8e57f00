//! Handles serialising and saving silver data to disk in the _parquet_ file format.

pub mod hourly;

pub use hourly::{make_hourly_file_name, save_hourly};
