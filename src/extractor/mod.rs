use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::data_models::{ExtractionResult, SearchQuery};
use crate::store::{ResultStore, StoreError};

pub mod browser;
pub mod catalog;
pub mod schema;
pub mod source;

pub use browser::BrowserSource;
pub use catalog::CatalogSource;
pub use schema::{ParseError, ResultSchema, SchemaSelectors};
pub use source::{FetchRequest, HttpSource, PageSource};

/// Extra time a source that enforces the deadline itself gets to shut down
/// before the extractor stops waiting for it.
const CLEANUP_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to load {url}: {reason}")]
    Fetch {
        url: String,
        reason: String,
        transient: bool,
    },

    #[error("page did not load within {0:?}")]
    Timeout(Duration),

    #[error("browser unavailable: {0}")]
    Browser(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("stored {stored} results before failing: {source}")]
    Incomplete { stored: usize, source: ParseError },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExtractionError {
    pub fn fetch(url: &Url, reason: impl Into<String>, transient: bool) -> Self {
        ExtractionError::Fetch {
            url: url.to_string(),
            reason: reason.into(),
            transient,
        }
    }

    /// Worth one more attempt: navigation hiccups, connection resets, 5xx.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractionError::Fetch { transient: true, .. })
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ExtractionError::Fetch { .. } => "fetch_failed",
            ExtractionError::Timeout(_) => "timeout",
            ExtractionError::Browser(_) => "browser_unavailable",
            ExtractionError::Parse(_) => "parse_failed",
            ExtractionError::Incomplete { .. } => "incomplete",
            ExtractionError::Store(_) => "internal",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub term: String,
    pub requested: usize,
    pub backend: &'static str,
    pub records: Vec<ExtractionResult>,
}

/// Drives one page source against the search page and stores what it parses.
///
/// Only one extraction runs at a time; later callers wait for the session.
pub struct Extractor {
    source: Arc<dyn PageSource>,
    schema: ResultSchema,
    store: Arc<dyn ResultStore>,
    search_url: Url,
    timeout: Duration,
    session: Mutex<()>,
}

impl Extractor {
    pub fn new(
        source: Arc<dyn PageSource>,
        schema: ResultSchema,
        store: Arc<dyn ResultStore>,
        search_url: Url,
        timeout: Duration,
    ) -> Self {
        Extractor {
            source,
            schema,
            store,
            search_url,
            timeout,
            session: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.source.name()
    }

    pub fn search_url_for(&self, term: &str) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut().append_pair("q", term);
        url
    }

    pub async fn extract(&self, query: &SearchQuery) -> Result<ExtractionReport, ExtractionError> {
        let _session = match self.session.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!(term = %query.term, "waiting for the running extraction to finish");
                self.session.lock().await
            }
        };

        let request = FetchRequest {
            url: self.search_url_for(&query.term),
            term: query.term.clone(),
            headless: query.headless,
            ready_selector: self.schema.ready_selector().to_string(),
            timeout: self.timeout,
        };
        info!(
            term = %query.term,
            max_results = query.max_results,
            backend = self.backend(),
            "starting extraction"
        );

        let html = self.fetch_with_retry(&request).await?;
        let outcome = self.schema.parse(&html, &request.url, query.max_results)?;

        let mut records = Vec::with_capacity(outcome.items.len());
        for item in outcome.items {
            let record =
                ExtractionResult::new(item.title, item.description, item.url, query.term.clone());
            self.store.append(&record).await?;
            records.push(record);
        }

        if let Some(source) = outcome.failure {
            warn!(
                term = %query.term,
                stored = records.len(),
                "extraction stopped at a malformed result: {source}"
            );
            return Err(ExtractionError::Incomplete {
                stored: records.len(),
                source,
            });
        }

        info!(term = %query.term, extracted = records.len(), "extraction completed");
        Ok(ExtractionReport {
            term: query.term.clone(),
            requested: query.max_results,
            backend: self.backend(),
            records,
        })
    }

    async fn fetch_with_retry(&self, request: &FetchRequest) -> Result<String, ExtractionError> {
        match self.fetch_once(request).await {
            Err(e) if e.is_transient() => {
                warn!("retrying once after transient failure: {e}");
                self.fetch_once(request).await
            }
            other => other,
        }
    }

    async fn fetch_once(&self, request: &FetchRequest) -> Result<String, ExtractionError> {
        let limit = if self.source.enforces_deadline() {
            self.timeout + CLEANUP_GRACE
        } else {
            self.timeout
        };
        tokio::time::timeout(limit, self.source.fetch(request))
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout))?
    }
}
