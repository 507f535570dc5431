use clap::{Parser, Subcommand};
use crashdb_scraper::config::Config;
use crashdb_scraper::constants;
use crashdb_scraper::logging;
use crashdb_scraper::pipeline::Pipeline;
use crashdb_scraper::sources::{AsnListing, NtsbApi};
use crashdb_scraper::storage::{InMemoryStorage, Storage};
use crashdb_scraper::types::CrashSource;
use std::sync::Arc;
use tracing::warn;

#[derive(Parser)]
#[command(name = "crashdb_scraper")]
#[command(about = "Aviation incident data scraper")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the data ingestion pipeline
    Ingester {
        /// Specific sources to run (comma-separated). Available: ntsb, asn
        #[arg(long)]
        sources: Option<String>,
        /// Listing year for the ASN source (defaults to the configured year)
        #[arg(long)]
        year: Option<u16>,
    },
    /// Apply the database schema migrations
    #[cfg(feature = "db")]
    Migrate,
}

fn create_source(
    source_name: &str,
    config: &Config,
    year: Option<u16>,
) -> Option<Arc<dyn CrashSource>> {
    match source_name {
        constants::NTSB_SOURCE => Some(Arc::new(NtsbApi::new(&config.scraper))),
        constants::ASN_SOURCE => Some(Arc::new(AsnListing::new(&config.scraper, year))),
        _ => None,
    }
}

async fn select_storage() -> Result<Arc<dyn Storage>, Box<dyn std::error::Error>> {
    #[cfg(feature = "db")]
    if Config::database_url().is_some() {
        let storage = crashdb_scraper::db::LibsqlStorage::from_env().await?;
        storage.run_migrations().await?;
        tracing::info!("Using libSQL crash store");
        return Ok(Arc::new(storage));
    }

    warn!("No database configured, falling back to in-memory storage");
    Ok(Arc::new(InMemoryStorage::new()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Ingester { sources, year } => {
            println!("🔄 Running ingestion pipeline...");

            let source_names: Vec<String> = if let Some(source_list) = sources {
                source_list
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect()
            } else {
                constants::supported_sources()
                    .into_iter()
                    .map(|s| s.to_string())
                    .collect()
            };

            let mut adapters: Vec<Arc<dyn CrashSource>> = Vec::new();
            for name in &source_names {
                if let Some(adapter) = create_source(name, &config, year) {
                    adapters.push(adapter);
                } else {
                    warn!("Unknown source specified");
                    println!("⚠️  Unknown source: {}", name);
                }
            }

            let storage = select_storage().await?;
            let pipeline = Pipeline::new(
                storage,
                config.data.raw_dir.clone(),
                config.data.processed_dir.clone(),
            );
            let summary = pipeline.run(adapters).await;

            for report in &summary.reports {
                println!("\n📊 Ingestion results for {}:", report.source);
                println!("   State: {}", report.state);
                println!("   Items fetched: {}", report.fetched);
                println!("   Records normalized: {}", report.normalized);
                println!("   Inserted: {}", report.inserted);
                println!("   Duplicates skipped: {}", report.duplicates);
                println!("   Failed: {}", report.failed);
                if let Some(path) = &report.export_file {
                    println!("   Export file: {}", path.display());
                }
                if !report.errors.is_empty() {
                    println!("\n⚠️  Errors encountered:");
                    for error in &report.errors {
                        println!("   - {}", error);
                    }
                }
            }

            println!(
                "\n✅ Run complete: {} source(s) done, {} failed",
                summary.done_count(),
                summary.failed_count()
            );
        }
        #[cfg(feature = "db")]
        Commands::Migrate => {
            println!("🔧 Applying database migrations...");
            let storage = crashdb_scraper::db::LibsqlStorage::from_env().await?;
            storage.run_migrations().await?;
            println!("✅ Migrations applied");
        }
    }
    Ok(())
}
