use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use cellar_scraper::catalog::{CatalogStore, InMemoryCatalog};
use cellar_scraper::logging;
use cellar_scraper::pipeline::ingestion::crawler::Crawler;
use cellar_scraper::pipeline::ingestion::registry::SourceRegistry;
use cellar_scraper::pipeline::ingestion::snapshot::LocalSnapshotStore;
use cellar_scraper::pipeline::processing::adapter::AdapterRegistry;
use cellar_scraper::pipeline::tasks::ingest_source;

#[derive(Parser)]
#[command(name = "cellar_scraper")]
#[command(about = "Wine listing ingestion pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the sources TOML file (falls back to SOURCES_CONFIG_PATH)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion pipeline for one source
    Ingest {
        /// Source name from the sources file
        #[arg(long)]
        source: String,
        /// Limit on the number of URLs to process
        #[arg(long)]
        max_urls: Option<usize>,
        /// Maximum concurrent fetches
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        /// Skip robots.txt checks (for sources that are known-safe)
        #[arg(long)]
        ignore_robots: bool,
    },
    /// List configured sources
    Sources,
    /// Show snapshot storage statistics
    Snapshots,
}

fn config_path(cli: &Cli) -> String {
    cli.config
        .clone()
        .or_else(|| std::env::var("SOURCES_CONFIG_PATH").ok())
        .unwrap_or_else(|| "config/sources.toml".to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let registry = SourceRegistry::load(config_path(&cli))?;

    match cli.command {
        Commands::Ingest {
            source,
            max_urls,
            concurrency,
            ignore_robots,
        } => {
            println!("🍷 Running ingestion for '{}'...", source);

            let global = registry.global_config();
            let crawler = Crawler::new(
                global.user_agent.clone(),
                Duration::from_secs(global.request_timeout_secs),
                global.max_retries,
                !ignore_robots,
            );
            let snapshots = LocalSnapshotStore::open(&global.snapshot_storage_path)?;
            let adapters = AdapterRegistry::with_builtins();
            let catalog: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalog::new());

            match ingest_source(
                &registry,
                &adapters,
                &crawler,
                &snapshots,
                catalog,
                &source,
                max_urls,
                concurrency,
            )
            .await
            {
                Ok(report) => {
                    println!("\n📊 Ingest results for {}:", source);
                    println!("   URLs discovered: {}", report.urls_discovered);
                    println!("   URLs fetched: {}", report.urls_fetched);
                    println!("   Snapshots stored: {}", report.snapshots_stored);
                    println!("   Listings processed: {}", report.listings_processed);
                    println!("   Entities created: {}", report.entities_created);
                    println!("   Entities matched: {}", report.entities_matched);
                    println!("   Review queue: {}", report.review_queue_count);
                    if let Some(duration) = report.duration_seconds() {
                        println!("   Duration: {:.2}s", duration);
                    }
                    if !report.errors.is_empty() {
                        println!("\n⚠️  Errors encountered:");
                        for err in &report.errors {
                            println!("   - {}", err);
                        }
                    }
                }
                Err(e) => {
                    error!("Ingest run failed: {}", e);
                    println!("❌ Ingest run failed: {}", e);
                }
            }
        }
        Commands::Sources => {
            println!("Configured sources:");
            for source in registry.list_sources() {
                let state = if source.enabled { "enabled" } else { "disabled" };
                println!(
                    "   {} ({}) [{}] adapter={} rate={}rps burst={}",
                    source.name,
                    source.domain,
                    state,
                    source.adapter,
                    source.rate_limit().requests_per_second,
                    source.rate_limit().burst_limit,
                );
            }
        }
        Commands::Snapshots => {
            let snapshots =
                LocalSnapshotStore::open(&registry.global_config().snapshot_storage_path)?;
            let stats = snapshots.storage_stats()?;
            println!("📦 Snapshot storage:");
            println!("   Snapshots: {}", stats.total_snapshots);
            println!("   Raw bytes: {}", stats.total_size_bytes);
            println!("   Compressed bytes: {}", stats.total_compressed_bytes);
            println!("   Compression ratio: {:.2}", stats.compression_ratio);
        }
    }

    Ok(())
}
