use listing_crawler::{Config, ScrapingService};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cfg = Config::from_env()?;
    info!(
        seed = %cfg.seed_url,
        pagination = %cfg.pagination,
        max_concurrency = cfg.max_concurrency,
        "Starting crawl"
    );

    let service = ScrapingService::new(cfg)?;
    let summary = service.run().await?;

    println!("\n==============================");
    println!("TOTAL ITEMS WRITTEN: {}", summary.rows_written);
    println!("==============================\n");

    Ok(())
}
