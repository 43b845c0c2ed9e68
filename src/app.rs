use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Url;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api::{AppState, create_router};
use crate::auth::TokenIssuer;
use crate::config::{Config, FetchBackend};
use crate::extractor::{
    BrowserSource, CatalogSource, Extractor, HttpSource, PageSource, ResultSchema, SchemaSelectors,
};
use crate::store::{Database, FileResultStore, MongoResultStore, ResultStore};

pub async fn load_schema(config: &Config) -> Result<ResultSchema> {
    let selectors = match &config.schema_file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read schema file {}", path.display()))?;
            serde_json::from_str::<SchemaSelectors>(&raw)
                .with_context(|| format!("invalid schema file {}", path.display()))?
        }
        None => SchemaSelectors::default(),
    };
    Ok(ResultSchema::compile(selectors)?)
}

pub async fn open_store(config: &Config) -> Result<Arc<dyn ResultStore>> {
    match &config.mongo {
        Some(mongo) => {
            let db = Database::new(&mongo.uri, &mongo.db_name)
                .await
                .context("Failed to connect to MongoDB")?;
            Ok(Arc::new(MongoResultStore::new(&db)))
        }
        None => {
            let store = FileResultStore::open(&config.data_dir)
                .await
                .with_context(|| format!("failed to open store in {}", config.data_dir.display()))?;
            Ok(Arc::new(store))
        }
    }
}

pub fn page_source(config: &Config, schema: &ResultSchema) -> Result<Arc<dyn PageSource>> {
    let source: Arc<dyn PageSource> = match config.backend {
        FetchBackend::Browser => Arc::new(BrowserSource::new(
            config.chrome_path.clone(),
            config.running_in_container,
        )),
        FetchBackend::Http => Arc::new(HttpSource::new(config.extraction_timeout)?),
        FetchBackend::Catalog => Arc::new(CatalogSource::new(schema.selectors().clone())),
    };
    Ok(source)
}

/// Wires store, extractor and token issuer from configuration.
pub async fn build_state(config: &Config) -> Result<AppState> {
    let schema = load_schema(config).await?;
    let store = open_store(config).await?;
    let source = page_source(config, &schema)?;
    let search_url = Url::parse(&format!("{}{}", config.base_url, config.search_path))
        .with_context(|| format!("invalid search url {}{}", config.base_url, config.search_path))?;

    info!(
        backend = source.name(),
        store = store.name(),
        search_url = %search_url,
        "scraper configured"
    );

    let extractor = Extractor::new(
        source,
        schema,
        store.clone(),
        search_url,
        config.extraction_timeout,
    );
    let tokens = TokenIssuer::new(
        &config.api_username,
        &config.api_password,
        &config.api_secret_key,
        config.token_ttl,
    );

    Ok(AppState::new(store, Arc::new(extractor), Arc::new(tokens)))
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!("API listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutting down"),
        Err(e) => {
            warn!("cannot listen for ctrl-c, serving until killed: {e}");
            std::future::pending::<()>().await;
        }
    }
}
