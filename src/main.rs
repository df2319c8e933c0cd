use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use county_market::{
    import_csv, verify_count, AppConfig, DirectoryFilter, MarketEngine, Page, SqliteFactStore,
    YearMonth,
};

#[derive(Parser, Debug)]
#[command(name = "county-market", version, about = "County real-estate market metrics")]
struct Cli {
    /// TOML config file (else $COUNTY_MARKET_CONFIG, else ./county-market.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load county identities and monthly metrics from CSV into the database
    Import {
        #[arg(long)]
        counties: PathBuf,
        #[arg(long)]
        metrics: PathBuf,
    },
    /// Full monthly history for one county
    Series { id: i64 },
    /// Hotness / supply / demand / viewer scores over time
    Scores { id: i64 },
    /// Several counties side by side at one month
    Compare {
        #[arg(long)]
        date: YearMonth,
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// All-time average, maximum and minimum for one county
    Summary { id: i64 },
    /// Counties starting with a letter, or "all"
    Directory { letter: DirectoryFilter },
    /// Counties whose name contains a fragment
    Search { fragment: String },
    /// Every county at the latest month, one page at a time
    Latest {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Earliest and latest month in the database
    Dates,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Import { counties, metrics } => run_import(&config, &counties, &metrics),
        command => run_query(&config, command),
    }
}

fn run_import(config: &AppConfig, counties: &Path, metrics: &Path) -> Result<()> {
    println!("🗄️  County Market - Data Import - CSV → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n🔧 Opening database {:?}...", config.database_path);
    let store = SqliteFactStore::open(&config.database_path).context("Failed to open database")?;
    let conn = store
        .connection()
        .context("Failed to acquire database connection")?;

    println!("\n💾 Importing {:?} and {:?}...", counties, metrics);
    let summary = import_csv(&conn, counties, metrics).context("Import failed")?;
    println!("✓ Counties written: {}", summary.counties);
    println!("✓ Metric rows written: {}", summary.metric_rows);

    println!("\n🔍 Verifying database...");
    let (county_count, row_count) = verify_count(&conn)?;
    println!("✓ Database contains {} counties, {} metric rows", county_count, row_count);

    Ok(())
}

fn run_query(config: &AppConfig, command: Command) -> Result<()> {
    if !config.database_path.exists() {
        eprintln!("❌ Database not found at {:?}", config.database_path);
        eprintln!("   Run: county-market import --counties <csv> --metrics <csv>");
        std::process::exit(1);
    }

    let store = SqliteFactStore::open(&config.database_path).context("Failed to open database")?;
    let engine = MarketEngine::new(store).with_max_page_size(config.max_page_size);

    match command {
        Command::Series { id } => print_json(&engine.time_series(id)?),
        Command::Scores { id } => print_json(&engine.score_series(id)?),
        Command::Compare { date, ids } => print_json(&engine.at_date(&ids, date)?),
        Command::Summary { id } => print_json(&engine.summarize(id)?.rows()),
        Command::Directory { letter } => print_json(&engine.by_prefix(letter)?),
        Command::Search { fragment } => print_json(&engine.search(&fragment)?),
        Command::Latest { page, page_size } => {
            let page = Page::new(page, page_size.unwrap_or(config.default_page_size));
            print_json(&engine.latest_snapshot(page)?)
        }
        Command::Dates => {
            let (earliest, latest) = engine.date_range()?;
            print_json(&serde_json::json!({ "earliest": earliest, "latest": latest }))
        }
        Command::Import { .. } => anyhow::bail!("import does not run through the query engine"),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
