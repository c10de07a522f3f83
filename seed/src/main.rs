use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use server::{
    config::try_load, counter::RedisCounterStore, database::init_redis,
    documents::RedisDocumentStore,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON file keyed by collection name
    path: PathBuf,

    /// Defaults to the REDIS_URL environment variable
    #[arg(long)]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let redis_url = args
        .redis_url
        .unwrap_or_else(|| try_load("REDIS_URL", "redis://localhost:6379"));

    let data = seed::read_seed(&args.path)?;
    info!("Loaded {} documents from {}", data.documents.len(), args.path.display());

    let connection = init_redis(&redis_url).await?;
    let store = RedisDocumentStore::new(connection.clone());
    let counters = RedisCounterStore::new(connection);
    let report = seed::load_seed(&store, &counters, data).await?;

    println!("Inserted: {}", report.inserted);
    println!("Skipped: {}", report.skipped);
    for (category, value) in report.counters {
        println!("Counter {category}: {value}");
    }

    Ok(())
}
