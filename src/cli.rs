use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use realty_scout::analytics;
use realty_scout::ingest::Ingestor;
use realty_scout::models::AdvertFilter;
use realty_scout::scrapers::{CrawlParams, ExtractionMode, HttpFetcher};
use realty_scout::store::{AdvertStore, SqliteStore};

#[derive(Parser)]
#[command(name = "realty-scout")]
#[command(about = "Real-estate advert crawler and price statistics")]
#[command(version)]
pub struct Cli {
    /// Advert store (SQLite file)
    #[arg(long, global = true, env = "REALTY_DATABASE", default_value = "realty.db")]
    database: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the listings and upsert every advert into the store
    Crawl(CrawlArgs),

    /// Print the distinct values available for filtering
    Filters,

    /// Print the average price per square metre by publication date
    Series(SeriesArgs),
}

#[derive(Args)]
struct CrawlArgs {
    /// Stop at the first page without previously unseen adverts
    #[arg(long, env = "REALTY_NEW_ONLY")]
    new_only: bool,

    /// Report every bad field of an advert instead of only the first
    #[arg(long)]
    collect_all_errors: bool,

    /// Listing site
    #[arg(long, env = "REALTY_BASE_URL", default_value = "http://www.tomsk.ru09.ru")]
    base_url: String,

    /// First results page, relative to the site
    #[arg(long, default_value = "/realty/?type=1&otype=1&listview=1&perpage=50")]
    start_path: String,

    /// Pause between page requests in milliseconds
    #[arg(long, env = "REALTY_DELAY_MS", default_value_t = 1000)]
    delay_ms: u64,

    /// Attempts per page before giving up (1 disables retries)
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..=10))]
    fetch_attempts: u64,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

impl CrawlArgs {
    fn params(&self) -> CrawlParams {
        CrawlParams {
            base_url: self.base_url.clone(),
            start_path: self.start_path.clone(),
            page_delay: Duration::from_millis(self.delay_ms),
            fetch_attempts: self.fetch_attempts as usize,
            timeout: Duration::from_secs(self.timeout_secs),
            new_only: self.new_only,
            extraction_mode: if self.collect_all_errors {
                ExtractionMode::CollectAll
            } else {
                ExtractionMode::FailFast
            },
            ..CrawlParams::default()
        }
    }
}

#[derive(Args)]
struct SeriesArgs {
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    district: Option<String>,
    #[arg(long)]
    floor: Option<u32>,
    #[arg(long)]
    rooms: Option<u32>,
    /// Days of history to include [default: 180]
    #[arg(long)]
    days: Option<u64>,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let store = SqliteStore::open(&cli.database)
        .with_context(|| format!("Failed to open store {}", cli.database.display()))?;

    match cli.command {
        Commands::Crawl(args) => crawl(&store, &args).await,
        Commands::Filters => filters(&store).await,
        Commands::Series(args) => series(&store, &args).await,
    }
}

async fn crawl(store: &SqliteStore, args: &CrawlArgs) -> Result<()> {
    let params = args.params();
    let fetcher = HttpFetcher::new(params.timeout)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, stopping after the current page");
                on_ctrl_c.cancel();
            }
            Err(err) => warn!("Failed to listen for Ctrl-C: {}", err),
        }
    });

    let report = Ingestor::new(&fetcher, store, params)
        .with_cancellation(cancel)
        .run()
        .await
        .context("Crawl aborted")?;

    info!("💾 {} adverts stored in total", store.count()?);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn filters(store: &SqliteStore) -> Result<()> {
    let options = store.filter_options().await?;
    println!("{}", serde_json::to_string_pretty(&options)?);
    Ok(())
}

async fn series(store: &SqliteStore, args: &SeriesArgs) -> Result<()> {
    let today = Utc::now().date_naive();
    let since = match args.days {
        Some(days) => analytics::window_start(today, days),
        None => analytics::default_since(today),
    };

    let filter = AdvertFilter {
        category: args.category.clone(),
        district: args.district.clone(),
        floor_number: args.floor,
        room_count: args.rooms,
        published_since: Some(since),
    };

    let adverts = store.find(&filter).await?;
    info!("{} adverts match", adverts.len());

    let points = analytics::price_series(&adverts);
    println!("{}", serde_json::to_string_pretty(&points)?);
    Ok(())
}
