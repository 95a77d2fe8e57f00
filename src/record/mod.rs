//! Typed rows for the silver and gold layers.

pub mod daily;
pub mod hourly;

pub use daily::DailySummary;
pub use hourly::HourlyRecord;
