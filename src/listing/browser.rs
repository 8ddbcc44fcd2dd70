/// Chromium-backed YouTube listing source and watch-page resolver
use super::parse::{extract_candidates, parse_watch_page, YOUTUBE_ORIGIN};
use super::{Candidate, DetailResolver, ListingSource, Pacing, Resolution, ResolveError};
use crate::language::Language;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const VIDEO_RENDERER_SELECTOR: &str = "ytd-video-renderer";
const FILTER_CHIP_SELECTOR: &str = "yt-chip-cloud-chip-renderer";
const WATCH_METADATA_SELECTOR: &str = "#info span, .ytp-time-duration";
const SCROLL_TO_BOTTOM_JS: &str = "window.scrollTo(0, document.documentElement.scrollHeight)";
const VIDEOS_CHIP_LABELS: [&str; 5] = ["videos", "视频", "影片", "視頻", "動画"];
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Browser behaviour knobs, usually built from `CrawlerConfig`
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Show the browser window instead of running headless
    pub visible: bool,
    /// Click the "Videos" chip after searching so Shorts are left out
    pub exclude_shorts: bool,
    /// How long to wait for search results to render
    pub search_timeout: Duration,
    /// How long to wait for watch page metadata to render
    pub detail_timeout: Duration,
    /// Delay applied around navigation and scrolling
    pub pacing: Pacing,
    /// Explicit Chrome/Chromium binary, auto-detected when unset
    pub chrome_executable: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            visible: false,
            exclude_shorts: true,
            search_timeout: Duration::from_secs(15),
            detail_timeout: Duration::from_secs(10),
            pacing: Pacing::new(3.0, 6.0),
            chrome_executable: None,
        }
    }
}

/// Live browser state. Search results and watch pages use separate tabs so
/// resolving metadata never loses the scroll position of the listing.
struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
    search_page: Page,
    detail_page: Page,
}

/// YouTube search listing driven through a real browser
pub struct YouTubeBrowser {
    settings: BrowserSettings,
    session: Mutex<Option<Session>>,
}

impl YouTubeBrowser {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            session: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<Session> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(30))
            .window_size(1920, 1080)
            .arg(format!("--user-agent={}", USER_AGENT))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio");

        if self.settings.visible {
            builder = builder.with_head();
        }
        if let Some(path) = &self.settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("Browser handler error: {:?}", e);
                }
            }
            debug!("Browser event handler finished");
        });

        let (search_page, detail_page) = match Self::open_tabs(&browser).await {
            Ok(pages) => pages,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!("Failed to close browser after tab error: {}", close_err);
                }
                handler.abort();
                return Err(e);
            }
        };

        Ok(Session {
            browser,
            handler,
            search_page,
            detail_page,
        })
    }

    async fn open_tabs(browser: &Browser) -> Result<(Page, Page)> {
        let search_page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open search tab")?;
        let detail_page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open watch-page tab")?;
        Ok((search_page, detail_page))
    }

    /// Poll until `selector` matches something or `timeout` elapses
    async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> bool {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(200);

        loop {
            if page.find_element(selector).await.is_ok() {
                debug!("'{}' appeared after {:.2}s", selector, start.elapsed().as_secs_f64());
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Best effort: click the "Videos" filter chip when it is present
    async fn apply_videos_filter(&self, page: &Page) {
        let chips = match page.find_elements(FILTER_CHIP_SELECTOR).await {
            Ok(chips) => chips,
            Err(e) => {
                debug!("No filter chips found: {}", e);
                return;
            }
        };

        for chip in chips {
            let label = chip
                .inner_text()
                .await
                .ok()
                .flatten()
                .unwrap_or_default()
                .trim()
                .to_lowercase();

            if VIDEOS_CHIP_LABELS.contains(&label.as_str()) {
                if let Err(e) = chip.click().await {
                    debug!("Failed to click videos filter: {}", e);
                    return;
                }
                info!("🎬 Applied videos-only filter");
                Self::wait_for_selector(page, VIDEO_RENDERER_SELECTOR, self.settings.detail_timeout)
                    .await;
                return;
            }
        }
    }

    fn search_url(topic: &str, language: Language) -> String {
        let query = format!("{}{}", topic, language.query_hint());
        format!(
            "{}/results?search_query={}",
            YOUTUBE_ORIGIN,
            urlencoding::encode(&query)
        )
    }
}

#[async_trait]
impl ListingSource for YouTubeBrowser {
    async fn start(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }

        info!(
            "🌐 Launching Chromium (visible={}, exclude_shorts={})",
            self.settings.visible, self.settings.exclude_shorts
        );
        *session = Some(self.launch().await?);
        info!("✅ Browser session ready");
        Ok(())
    }

    async fn search(&self, topic: &str, language: Language) -> Result<()> {
        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Browser session not started"))?;
        let page = &session.search_page;

        let url = Self::search_url(topic, language);
        self.settings.pacing.wait().await;
        info!("🔍 Searching: {} ({})", topic, language);
        page.goto(url.as_str())
            .await
            .with_context(|| format!("Failed to open search page {}", url))?;

        if Self::wait_for_selector(page, VIDEO_RENDERER_SELECTOR, self.settings.search_timeout).await {
            info!("📄 Search results loaded");
        } else {
            warn!(
                "⚠️ No search results rendered within {}s",
                self.settings.search_timeout.as_secs()
            );
        }

        if self.settings.exclude_shorts {
            self.apply_videos_filter(page).await;
        }
        Ok(())
    }

    async fn scroll_step(&self) -> Result<()> {
        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Browser session not started"))?;

        self.settings.pacing.wait().await;
        session
            .search_page
            .evaluate(SCROLL_TO_BOTTOM_JS)
            .await
            .context("Failed to scroll search results")?;
        self.settings.pacing.wait().await;
        debug!("Scrolled to bottom of results");
        Ok(())
    }

    async fn extract_visible(&self) -> Result<Vec<Candidate>> {
        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Browser session not started"))?;

        let html = session
            .search_page
            .content()
            .await
            .context("Failed to read search page content")?;
        let candidates = extract_candidates(&html);
        debug!("Extracted {} visible results", candidates.len());
        Ok(candidates)
    }

    async fn shutdown(&self) {
        let Some(mut session) = self.session.lock().await.take() else {
            return;
        };

        if let Err(e) = session.search_page.close().await {
            warn!("Failed to close search tab: {}", e);
        }
        if let Err(e) = session.detail_page.close().await {
            warn!("Failed to close watch-page tab: {}", e);
        }
        if let Err(e) = session.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = session.browser.wait().await {
            warn!("Failed waiting for browser exit: {}", e);
        }
        session.handler.abort();
        info!("🛑 Browser session closed");
    }
}

#[async_trait]
impl DetailResolver for YouTubeBrowser {
    async fn resolve(&self, url: &str) -> Resolution {
        let guard = self.session.lock().await;
        let Some(session) = guard.as_ref() else {
            return Resolution::failed(ResolveError::SessionClosed);
        };
        let page = &session.detail_page;

        self.settings.pacing.wait().await;
        debug!("Opening watch page {}", url);
        if let Err(e) = page.goto(url).await {
            return Resolution::failed(ResolveError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }

        if !Self::wait_for_selector(page, WATCH_METADATA_SELECTOR, self.settings.detail_timeout).await {
            debug!("Watch page metadata did not render for {}", url);
        }

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => return Resolution::failed(ResolveError::Content(e.to_string())),
        };

        let resolution = parse_watch_page(&html);
        info!(
            "📊 {} -> {} views, {} min",
            url, resolution.details.popularity_score, resolution.details.duration_minutes
        );
        resolution
    }
}
