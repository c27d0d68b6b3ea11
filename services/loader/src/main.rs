//! Loader - Replace the shared dataset from a local CSV file
//!
//! Runs the same ingest, normalize, filter and identify steps as the upload
//! and save endpoints, then performs the full replace directly against the
//! database.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dataset::{
    columns::normalize_label,
    config::{database_url_from_env, resolve_database_url},
    ingest::read_csv,
    pipeline::prepare_table,
    store::{self, record_columns},
    Record,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "loader", about = "Loads a CSV file into dados_filtrados")]
struct Args {
    /// CSV file to load
    #[arg(long)]
    file: PathBuf,

    /// Database URL (defaults to DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Dry run - parse and report, don't save to database
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Rows printed in dry-run mode
    #[arg(long, default_value = "5")]
    sample: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();
    let args = Args::parse();

    println!("=== Relatorios Loader ===");
    println!("File: {}", args.file.display());

    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let records = prepare(&bytes)?;
    let mut stdout = io::stdout();
    write_summary(&records, &mut stdout)?;

    if args.dry_run {
        write_dry_run(&records, args.sample, &mut stdout)?;
        return Ok(());
    }
    let url = match args.database_url {
        Some(raw) => resolve_database_url(&raw),
        None => database_url_from_env(),
    };
    let store = store::connect(&url, 2)
        .await
        .context("Failed to connect to database")?;

    let count = records.len();
    let version = store
        .replace_all(records)
        .await
        .context("Failed to replace dataset")?;

    tracing::info!(rows = count, version, "dataset loaded");
    println!("Saved {} row(s) to dados_filtrados (version {})", count, version);
    Ok(())
}

/// Parse, normalize, filter and identify the rows of a CSV file.
fn prepare(bytes: &[u8]) -> Result<Vec<Record>> {
    let table = read_csv(bytes).context("Failed to parse CSV")?;
    let labels: Vec<String> = table.columns().iter().map(|c| normalize_label(c)).collect();
    println!(
        "Parsed {} row(s), {} column(s): {}",
        table.len(),
        table.columns().len(),
        labels.join(", ")
    );

    prepare_table(table).context("Failed to prepare rows")
}

fn write_summary(records: &[Record], out: &mut impl Write) -> io::Result<()> {
    let columns: Vec<&str> = record_columns(records).iter().map(|c| c.as_str()).collect();
    writeln!(out, "Kept {} pertinent column(s): {}", columns.len(), columns.join(", "))?;
    writeln!(out, "Prepared {} row(s)", records.len())
}

fn write_dry_run(records: &[Record], sample: usize, out: &mut impl Write) -> Result<()> {
    writeln!(out, "\n[DRY RUN] Would replace dados_filtrados with {} row(s)", records.len())?;
    for record in records.iter().take(sample) {
        writeln!(out, "  {}", serde_json::to_string(record)?)?;
    }
    Ok(())
}
