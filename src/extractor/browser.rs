use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::ExtractionError;
use super::source::{FetchRequest, PageSource};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Renders the search page in a Chromium instance driven over CDP.
///
/// A browser is launched for every fetch and closed before returning, so a
/// failed extraction never leaves a stray session behind.
pub struct BrowserSource {
    chrome_path: Option<PathBuf>,
    in_container: bool,
}

impl BrowserSource {
    pub fn new(chrome_path: Option<PathBuf>, in_container: bool) -> Self {
        BrowserSource {
            chrome_path,
            in_container,
        }
    }

    fn browser_config(&self, request: &FetchRequest) -> Result<BrowserConfig, ExtractionError> {
        let mut builder = BrowserConfig::builder()
            .window_size(1280, 800)
            .request_timeout(request.timeout);

        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !request.headless {
            builder = builder.with_head();
        }
        if self.in_container {
            builder = builder
                .no_sandbox()
                .arg("--disable-dev-shm-usage")
                .arg("--disable-gpu");
        }

        builder.build().map_err(ExtractionError::Browser)
    }

    async fn render(browser: &Browser, request: &FetchRequest) -> Result<String, ExtractionError> {
        let navigation = |e: chromiumoxide::error::CdpError| {
            ExtractionError::fetch(&request.url, e.to_string(), true)
        };

        let page = browser
            .new_page(request.url.as_str())
            .await
            .map_err(navigation)?;
        page.wait_for_navigation().await.map_err(navigation)?;

        // results are rendered client side; past half the budget the page is
        // parsed as is so a missing container surfaces as a parse error
        let selector = request.ready_selector.as_str();
        let page_ref = &page;
        let ready = wait_until(
            || async move { page_ref.find_element(selector).await.is_ok() },
            request.timeout / 2,
            READY_POLL_INTERVAL,
        )
        .await;
        if !ready {
            warn!(selector, "results selector never appeared, reading the page as loaded");
        }

        let html = page.content().await.map_err(navigation)?;
        if let Err(e) = page.close().await {
            debug!("failed to close page: {e}");
        }
        Ok(html)
    }
}

#[async_trait]
impl PageSource for BrowserSource {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn enforces_deadline(&self) -> bool {
        true
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<String, ExtractionError> {
        let deadline = Instant::now() + request.timeout;
        let config = self.browser_config(request)?;
        let (mut browser, mut handler) = tokio::time::timeout_at(deadline, Browser::launch(config))
            .await
            .map_err(|_| ExtractionError::Timeout(request.timeout))?
            .map_err(|e| ExtractionError::Browser(e.to_string()))?;
        info!(headless = request.headless, "browser launched");

        let _events = HandlerTask(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser event error: {e}");
                }
            }
        }));

        let rendered = match tokio::time::timeout_at(deadline, Self::render(&browser, request)).await
        {
            Ok(rendered) => rendered,
            Err(_) => Err(ExtractionError::Timeout(request.timeout)),
        };

        if let Err(e) = browser.close().await {
            warn!("failed to close browser: {e}");
        }
        if let Err(e) = browser.wait().await {
            debug!("browser process did not exit cleanly: {e}");
        }

        rendered
    }
}

/// Aborts the CDP event loop when dropped, on every exit path of a fetch.
struct HandlerTask(JoinHandle<()>);

impl Drop for HandlerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Polls `ready` every `interval` until it reports true or `budget` is spent.
async fn wait_until<F, Fut>(mut ready: F, budget: Duration, interval: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let give_up = Instant::now() + budget;
    loop {
        if ready().await {
            return true;
        }
        let now = Instant::now();
        if now >= give_up {
            return false;
        }
        tokio::time::sleep(interval.min(give_up - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_wait_until_ready() {
        let counter = AtomicUsize::new(0);
        let polls = &counter;
        let ready = wait_until(
            || async move { polls.fetch_add(1, Ordering::SeqCst) >= 2 },
            Duration::from_secs(5),
            Duration::from_millis(5),
        )
        .await;
        assert!(ready);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_until_gives_up_after_budget() {
        let started = Instant::now();
        let ready = wait_until(
            || async { false },
            Duration::from_millis(60),
            Duration::from_millis(10),
        )
        .await;
        assert!(!ready);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(60));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_source_owns_its_deadline() {
        assert!(BrowserSource::new(None, true).enforces_deadline());
    }

    #[tokio::test]
    async fn test_handler_task_aborts_on_drop() {
        let (alive, closed) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _alive = alive;
            std::future::pending::<()>().await
        });
        drop(HandlerTask(handle));

        let outcome = tokio::time::timeout(Duration::from_secs(2), closed)
            .await
            .expect("handler task still running");
        assert!(outcome.is_err());
    }
}
