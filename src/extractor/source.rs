use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use super::ExtractionError;

const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) sura-scraper/",
    env!("CARGO_PKG_VERSION")
);

/// Everything a page source needs to produce one search results document.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub term: String,
    pub headless: bool,
    pub ready_selector: String,
    pub timeout: Duration,
}

/// Produces the HTML of a search results page.
#[async_trait]
pub trait PageSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// True when `fetch` stops itself at `FetchRequest::timeout` and cleans up
    /// before returning. The extractor then allows a grace period instead of
    /// cutting the fetch off at the deadline.
    fn enforces_deadline(&self) -> bool {
        false
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<String, ExtractionError>;
}

/// Fetches the search results page directly, without rendering JavaScript.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractionError::Browser(format!("http client: {e}")))?;
        Ok(HttpSource { client })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<String, ExtractionError> {
        debug!(url = %request.url, "fetching search page");
        let res = self
            .client
            .get(request.url.clone())
            .send()
            .await
            .map_err(|e| request_error(request, e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(ExtractionError::fetch(
                &request.url,
                format!("HTTP {status}"),
                status.is_server_error(),
            ));
        }

        res.text().await.map_err(|e| request_error(request, e))
    }
}

// the client timeout matches the extraction deadline, so it is final too
fn request_error(request: &FetchRequest, e: reqwest::Error) -> ExtractionError {
    if e.is_timeout() {
        ExtractionError::Timeout(request.timeout)
    } else {
        ExtractionError::fetch(&request.url, e.to_string(), true)
    }
}
