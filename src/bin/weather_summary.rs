//! Prints the gold daily summaries for one city as a text table.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use weather_etl::{
    config::Settings,
    db::{self, gold},
    record::DailySummary,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Show daily weather summaries for a city
struct Args {
    /// City as the geocoder named it, e.g. "San Jose" (case-insensitive)
    city: String,

    /// First date to show (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last date to show (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::from_env()?;

    let mut conn = db::open(&settings.database_path)?;
    gold::ensure_gold_schema(&mut conn)?;

    let Some((first, last)) = gold::date_bounds(&conn, &args.city)? else {
        let known = gold::cities(&conn)?;
        if known.is_empty() {
            println!("No summaries yet. Run `weather-etl <city>` first.");
        } else {
            println!("No summaries for '{}'. Known cities: {}", args.city, known.join(", "));
        }
        return Ok(());
    };

    let rows = gold::summaries(&conn, &args.city, args.from, args.to)?;
    println!("{} ({first} to {last})", args.city);
    println!(
        "{:<10}  {:>9}  {:>10}  {:>9}  {:>5}",
        "date", "avg temp", "total prcp", "max wind", "hours"
    );
    for row in &rows {
        println!("{}", format_row(row));
    }

    Ok(())
}

fn format_row(row: &DailySummary) -> String {
    format!(
        "{:<10}  {:>9}  {:>10}  {:>9}  {:>5}",
        row.date.to_string(),
        format_value(row.avg_temperature),
        format_value(row.total_precipitation),
        format_value(row.max_wind_speed),
        row.hours_count
    )
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}
