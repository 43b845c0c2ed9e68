use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sura_scraper::app::{build_state, serve};
use sura_scraper::config::Config;
use sura_scraper::data_models::{DEFAULT_MAX_RESULTS, DEFAULT_TERM, SearchQuery};

#[derive(Debug, Parser)]
#[command(name = "sura-scraper", about = "Sura Scraper API", version)]
struct Args {
    /// Run one extraction before serving the API
    #[arg(long)]
    extract: bool,

    /// Search term for --extract
    #[arg(long, default_value = DEFAULT_TERM)]
    term: String,

    /// Maximum number of results for --extract
    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    max_results: usize,

    /// Show the browser window during extraction
    #[arg(long)]
    no_headless: bool,

    /// Port for the API, overrides PORT
    #[arg(long)]
    port: Option<u16>,

    /// Debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env().context("invalid configuration")?;

    let default_level = if args.debug || config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(true)
        .init();

    let state = build_state(&config).await?;

    if args.extract {
        let query = SearchQuery::new(&args.term, args.max_results, !args.no_headless)?;
        match state.extractor.extract(&query).await {
            Ok(report) => tracing::info!(
                "extraction completed: {} results for '{}'",
                report.records.len(),
                report.term
            ),
            // keep serving what is already stored
            Err(e) => tracing::error!("extraction failed: {:#}", anyhow::Error::from(e)),
        }
    }

    let port = args.port.unwrap_or(config.port);
    serve(state, port).await
}
