use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use jemallocator::Jemalloc;
use log::{info, warn, LevelFilter};
use serde::Serialize;
use simple_logger::SimpleLogger;
use tokio::io::AsyncReadExt;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use price_ledger::{Database, NewTokenPrice, Settings, TimedTokenPrice};

#[derive(Parser)]
#[command(name = "price-ledger")]
#[command(about = "Token price history storage backed by PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the price tables and apply column migrations
    Migrate,

    /// Print raw price history for a token
    Prices {
        token_address: String,

        /// Range start (unix seconds), defaults to 30 days ago
        #[arg(long)]
        from: Option<i64>,

        /// Range end (unix seconds), defaults to now
        #[arg(long)]
        to: Option<i64>,

        /// Return every row instead of a sample
        #[arg(long)]
        unlimited: bool,
    },

    /// Print the most recent bucket for a token and time type
    Latest { token_address: String, time_type: String },

    /// Print all buckets for a token and time type in a range
    Range {
        token_address: String,
        time_type: String,
        from: i64,
        to: i64,
    },

    /// Insert raw prices from a JSON array ({tokenAddress, priceInUsd, priceInKda})
    Insert {
        /// Read from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Insert time-bucketed prices from a JSON array
    InsertTimed {
        /// Read from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::new().context("Failed to load configuration")?;

    let level = settings.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    SimpleLogger::new()
        .with_level(level)
        .init()
        .context("Failed to initialize logger")?;

    let db = Database::new(settings.postgres.clone())
        .await
        .context("Failed to initialize database connection")?;

    let result = run(&db, cli.command).await;

    let failed = db.failed_statements();
    if failed > 0 {
        warn!("{} statements failed during this run", failed);
    }

    db.close();
    result
}

async fn run(db: &Database, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Migrate => {
            let failed = db.ensure_schema().await;
            if failed > 0 {
                anyhow::bail!("{} schema statements failed", failed);
            }
            info!("Schema is up to date");
        },
        Commands::Prices {
            token_address,
            from,
            to,
            unlimited,
        } => {
            let prices = db
                .get_token_prices(Some(token_address.as_str()), from, to, unlimited)
                .await;
            print_json(&prices)?;
        },
        Commands::Latest {
            token_address,
            time_type,
        } => {
            let latest = db
                .get_latest_token_price_for_time_type(&token_address, &time_type)
                .await;
            print_json(&latest)?;
        },
        Commands::Range {
            token_address,
            time_type,
            from,
            to,
        } => {
            let prices = db
                .get_time_type_token_prices(&token_address, &time_type, from, to)
                .await;
            print_json(&prices)?;
        },
        Commands::Insert { file } => {
            let prices: Vec<NewTokenPrice> = serde_json::from_str(&read_input(file).await?)
                .context("Failed to parse token prices")?;
            db.insert_token_prices(&prices).await;
            info!("Submitted {} token prices", prices.len());
        },
        Commands::InsertTimed { file } => {
            let prices: Vec<TimedTokenPrice> = serde_json::from_str(&read_input(file).await?)
                .context("Failed to parse timed token prices")?;
            db.insert_token_prices_time_type(&prices).await;
            info!("Submitted {} timed token prices", prices.len());
        },
    }

    Ok(())
}

async fn read_input(file: Option<PathBuf>) -> anyhow::Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("Failed to read stdin")?;
            Ok(input)
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
