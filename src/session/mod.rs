//! Browser session provisioning and page loading.
//!
//! One [`BrowserSession`] is launched per scrape request and closed
//! unconditionally when the request finishes. The load sequence is a fixed
//! budget: a bounded wait for a heading element, a settle delay for
//! client-side rendering, then a scroll-to-bottom/scroll-back pass to
//! trigger lazy-loaded images.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::seq::SliceRandom;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, warn};

use crate::models::ScrapeError;

/// Bounded wait for a heading-shaped element after navigation.
const HEADING_WAIT: Duration = Duration::from_secs(20);
const HEADING_POLL: Duration = Duration::from_millis(500);
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Settle delay after navigation; Facebook renders listing content and
/// images client-side well after the document is ready.
pub const RENDER_SETTLE: Duration = Duration::from_secs(10);
/// Settle delay before the single retry pass.
pub const RETRY_SETTLE: Duration = Duration::from_secs(5);

const SCROLL_PAUSE: Duration = Duration::from_secs(3);
const SCROLL_BACK_PAUSE: Duration = Duration::from_secs(1);

/// Rotated per session to avoid trivial automation fingerprinting.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36",
];

/// A live, isolated headless-Chromium session. Exclusively owned by the
/// scrape operation that created it; [`BrowserSession::close`] must run on
/// every exit path.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
}

impl BrowserSession {
    /// Launch a headless browser with anti-detection parameters and a
    /// randomly drawn user agent.
    pub async fn launch() -> Result<Self, ScrapeError> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let config = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={user_agent}"))
            .window_size(1920, 1080)
            .build()
            .map_err(ScrapeError::Launch)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            ScrapeError::Launch(format!(
                "{e}. Is Chrome or Chromium installed and in PATH?"
            ))
        })?;

        // Drain CDP events until the browser goes away.
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        Ok(Self {
            browser,
            handler,
            page: None,
        })
    }

    /// Navigate to the target URL in a fresh page.
    pub async fn open(&mut self, url: &str) -> Result<(), ScrapeError> {
        let page = timeout(NAVIGATION_TIMEOUT, self.browser.new_page(url))
            .await
            .map_err(|_| ScrapeError::Navigation(format!("timed out opening {url}")))?
            .map_err(|e| ScrapeError::Navigation(e.to_string()))?;

        // Best effort; partial content is still worth parsing.
        let _ = timeout(Duration::from_secs(10), page.wait_for_navigation()).await;

        self.page = Some(page);
        Ok(())
    }

    /// Poll for any heading-shaped element for up to [`HEADING_WAIT`].
    /// A timeout is tolerated: extraction proceeds on whatever loaded.
    pub async fn wait_for_heading(&self) {
        let Some(page) = self.page.as_ref() else {
            return;
        };
        let deadline = Instant::now() + HEADING_WAIT;
        loop {
            if page.find_element("h1, [role='heading']").await.is_ok() {
                return;
            }
            if Instant::now() >= deadline {
                warn!("timed out waiting for a heading element, parsing anyway");
                return;
            }
            sleep(HEADING_POLL).await;
        }
    }

    /// Scroll to the bottom and partially back with pauses in between, so
    /// lazily loaded images get fetched.
    pub async fn scroll_sequence(&self) {
        let Some(page) = self.page.as_ref() else {
            return;
        };
        if let Err(e) = page
            .evaluate("window.scrollTo(0, document.body.scrollHeight);")
            .await
        {
            debug!(error = %e, "scroll to bottom failed");
        }
        sleep(SCROLL_PAUSE).await;
        if let Err(e) = page
            .evaluate("window.scrollTo(0, document.body.scrollHeight * 0.8);")
            .await
        {
            debug!(error = %e, "scroll back failed");
        }
        sleep(SCROLL_BACK_PAUSE).await;
    }

    /// Capture the rendered document as HTML.
    pub async fn snapshot(&self) -> Result<String, ScrapeError> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| ScrapeError::Navigation("no page open".to_string()))?;

        page.evaluate("document.documentElement.outerHTML")
            .await
            .map_err(|e| ScrapeError::Script(e.to_string()))?
            .into_value::<String>()
            .map_err(|e| ScrapeError::Script(e.to_string()))
    }

    /// Tear the session down. Called on every exit path.
    pub async fn close(mut self) {
        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            debug!(error = %e, "page close error");
        }
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close error");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}
