use anyhow::{Context, Result};
use clap::Parser;
use weather_etl::{
    cli::{init_logging, Cli},
    config::Settings,
    pipeline,
    source::OpenMeteo,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    let source = OpenMeteo::new(&settings)?;

    let report = pipeline::run(&source, &settings, &cli.city)
        .await
        .with_context(|| format!("pipeline failed for '{}'", cli.city))?;

    eprintln!("Snapshot saved to `{}`", report.snapshot.display());
    if let Some(path) = &report.silver_parquet {
        eprintln!("Silver parquet saved to `{}`", path.display());
    }
    eprintln!(
        "{} hourly rows loaded, {} daily summaries in `{}`",
        report.hourly_rows,
        report.daily_summaries,
        settings.database_path.display()
    );

    Ok(())
}
