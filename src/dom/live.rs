//! Live DOM backend over a Chrome tab (CDP via chromiumoxide)
//!
//! chromiumoxide cannot turn an arbitrary JS object back into an [`Element`],
//! so relatives (parent, closest, common ancestor) are resolved by tagging the
//! target in-page with a `data-fbmedia-ref` attribute and querying for it.

use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{DomNode, NodeBox, NodeKey, PageSession};
use crate::config::BrowserConfig as BrowserSettings;
use crate::utils::error::DomError;

const REF_ATTR: &str = "data-fbmedia-ref";
const SEEN_ATTR: &str = "data-fbmedia-seen";

/// Common Chrome executable paths to check
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// Clicks away login walls, cookie banners and other dialogs
const DISMISS_POPUPS_SCRIPT: &str = r#"
(() => {
    let closed = 0;
    const labels = ['Close', 'Decline optional cookies', 'Only allow essential cookies', 'Not now'];
    for (const dialog of document.querySelectorAll('[role="dialog"]')) {
        for (const label of labels) {
            const button = dialog.querySelector(`[aria-label="${label}"][role="button"], [aria-label="${label}"]`);
            if (button) { button.click(); closed += 1; break; }
        }
    }
    return closed;
})()
"#;

/// Counts finished resource loads, used to detect network quiescence
const RESOURCE_COUNT_SCRIPT: &str = "performance.getEntriesByType('resource').length";

const SCROLL_SCRIPT: &str =
    "window.scrollTo(0, (document.scrollingElement || document.body).scrollHeight)";

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn browser_err(e: impl std::fmt::Display) -> DomError {
    DomError::Browser(e.to_string())
}

/// Element of a live page
#[derive(Clone)]
pub struct LiveNode {
    page: Page,
    el: Rc<Element>,
}

impl LiveNode {
    pub fn new(page: Page, el: Element) -> Self {
        Self {
            page,
            el: Rc::new(el),
        }
    }

    fn wrap<'d>(&self, el: Element) -> NodeBox<'d> {
        Box::new(Self::new(self.page.clone(), el))
    }

    /// Runs `function() { ... }` with `this` bound to the element
    async fn call(&self, function: &str) -> Option<Value> {
        match self.el.call_js_fn(function.to_string(), false).await {
            Ok(ret) => ret.result.value,
            Err(e) => {
                debug!(error = %e, "In-page function failed");
                None
            }
        }
    }

    /// Resolves the element produced by `expr` (evaluated with `this` bound)
    async fn resolve<'d>(&self, expr: &str) -> Option<NodeBox<'d>> {
        let function = format!(
            r#"function() {{
                const target = {expr};
                if (!target) return null;
                if (!target.hasAttribute('{REF_ATTR}')) {{
                    window.__fbmediaRef = (window.__fbmediaRef || 0) + 1;
                    target.setAttribute('{REF_ATTR}', String(window.__fbmediaRef));
                }}
                return target.getAttribute('{REF_ATTR}');
            }}"#
        );
        let id = self.call(&function).await?;
        let id = id.as_str()?;
        let el = self
            .page
            .find_element(format!("[{REF_ATTR}=\"{id}\"]"))
            .await
            .ok()?;
        Some(self.wrap(el))
    }
}

#[async_trait(?Send)]
impl<'d> DomNode<'d> for LiveNode {
    fn key(&self) -> NodeKey {
        NodeKey(*self.el.backend_node_id.inner() as u64)
    }

    fn clone_node(&self) -> NodeBox<'d> {
        Box::new(self.clone())
    }

    async fn find_one(&self, selector: &str) -> Option<NodeBox<'d>> {
        let el = self.el.find_element(selector).await.ok()?;
        Some(self.wrap(el))
    }

    async fn find_many(&self, selector: &str) -> Vec<NodeBox<'d>> {
        match self.el.find_elements(selector).await {
            Ok(els) => els.into_iter().map(|el| self.wrap(el)).collect(),
            Err(e) => {
                debug!(selector, error = %e, "Live query found nothing");
                Vec::new()
            }
        }
    }

    async fn children(&self) -> Vec<NodeBox<'d>> {
        self.find_many(":scope > *").await
    }

    async fn parent(&self) -> Option<NodeBox<'d>> {
        self.resolve("this.parentElement").await
    }

    async fn closest(&self, selector: &str) -> Option<NodeBox<'d>> {
        let expr = format!("this.closest({})", js_string(selector));
        self.resolve(&expr).await
    }

    async fn attr(&self, name: &str) -> Option<String> {
        self.el.attribute(name).await.ok().flatten()
    }

    async fn prop(&self, name: &str) -> Option<Value> {
        let function = format!(
            "function() {{ const v = this[{}]; return v === undefined || v === null ? null : JSON.stringify(v); }}",
            js_string(name)
        );
        let raw = self.call(&function).await?;
        serde_json::from_str(raw.as_str()?).ok()
    }

    async fn text(&self) -> Option<String> {
        self.el.inner_text().await.ok().flatten()
    }

    async fn click(&self) -> Result<bool, DomError> {
        self.el.click().await.map_err(browser_err)?;
        Ok(true)
    }

    async fn common_ancestor(&self, other: &dyn DomNode<'d>) -> Option<NodeBox<'d>> {
        // Tag the other node so the in-page walk can find it
        let other_ref = match other.attr(REF_ATTR).await {
            Some(id) => id,
            None => {
                other.closest("*").await?;
                other.attr(REF_ATTR).await?
            }
        };
        let expr = format!(
            r#"(() => {{
                const other = document.querySelector('[{REF_ATTR}="{other_ref}"]');
                let node = this;
                while (node && other && !node.contains(other)) node = node.parentElement;
                return node;
            }})()"#
        );
        self.resolve(&expr).await
    }

    async fn common_ancestor_from_selector(&self, selector: &str) -> Option<NodeBox<'d>> {
        let expr = format!(
            r#"(() => {{
                const nodes = Array.from(this.querySelectorAll({sel}));
                if (nodes.length === 0) return null;
                let node = nodes.length === 1 ? nodes[0].parentElement : nodes[0];
                for (const n of nodes.slice(1)) {{
                    while (node && !node.contains(n)) node = node.parentElement;
                }}
                return node;
            }})()"#,
            sel = js_string(selector)
        );
        self.resolve(&expr).await
    }

    async fn new_descendants(
        &self,
        selector: &str,
        seen: &mut std::collections::HashSet<NodeKey>,
    ) -> Vec<NodeBox<'d>> {
        // Mark unseen matches with a fresh batch number in-page so only new
        // elements cross the protocol boundary
        let function = format!(
            r#"function() {{
                const fresh = Array.from(this.querySelectorAll({sel}))
                    .filter(n => !n.hasAttribute('{SEEN_ATTR}'));
                if (fresh.length === 0) return null;
                window.__fbmediaBatch = (window.__fbmediaBatch || 0) + 1;
                const batch = String(window.__fbmediaBatch);
                fresh.forEach(n => n.setAttribute('{SEEN_ATTR}', batch));
                return batch;
            }}"#,
            sel = js_string(selector)
        );
        let Some(batch) = self.call(&function).await else {
            return Vec::new();
        };
        let Some(batch) = batch.as_str() else {
            return Vec::new();
        };
        self.find_many(&format!("[{SEEN_ATTR}=\"{batch}\"]"))
            .await
            .into_iter()
            .filter(|node| seen.insert(node.key()))
            .collect()
    }
}

/// Background task that keeps closing popups while a page is open
///
/// Aborted when dropped, so it never outlives the page it watches.
pub struct PopupDismisser {
    handle: JoinHandle<()>,
}

impl PopupDismisser {
    pub fn spawn(page: Page, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match page.evaluate(DISMISS_POPUPS_SCRIPT).await {
                    Ok(result) => {
                        let closed: u64 = result.into_value().unwrap_or(0);
                        if closed > 0 {
                            debug!(closed, "Dismissed popups");
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Popup watcher stopped");
                        break;
                    }
                }
            }
        });
        Self { handle }
    }
}

impl Drop for PopupDismisser {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A page open in the browser
///
/// The tab is closed and the popup watcher stopped when this is dropped.
pub struct LivePage {
    page: Page,
    url: String,
    _popups: PopupDismisser,
}

impl LivePage {
    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn resource_count(&self) -> Option<u64> {
        self.page
            .evaluate(RESOURCE_COUNT_SCRIPT)
            .await
            .ok()?
            .into_value()
            .ok()
    }
}

impl Drop for LivePage {
    fn drop(&mut self) {
        let page = self.page.clone();
        let url = std::mem::take(&mut self.url);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = page.close().await {
                    debug!(url = %url, error = %e, "Page close failed");
                }
            });
        }
    }
}

#[async_trait(?Send)]
impl PageSession for LivePage {
    fn url(&self) -> &str {
        &self.url
    }

    fn is_interactive(&self) -> bool {
        true
    }

    async fn markup(&self) -> Result<String, DomError> {
        self.page.content().await.map_err(browser_err)
    }

    async fn root(&self) -> Option<NodeBox<'_>> {
        let el = self.page.find_element("html").await.ok()?;
        Some(Box::new(LiveNode::new(self.page.clone(), el)))
    }

    async fn scroll(&self) -> Result<(), DomError> {
        self.page.evaluate(SCROLL_SCRIPT).await.map_err(browser_err)?;
        Ok(())
    }

    async fn settle(&self, idle: Duration, timeout: Duration) {
        let started = Instant::now();
        let poll = Duration::from_millis(100).min(idle);
        let mut last = self.resource_count().await;
        let mut quiet_since = Instant::now();

        while started.elapsed() < timeout {
            tokio::time::sleep(poll).await;
            let current = self.resource_count().await;
            if current != last {
                last = current;
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= idle {
                return;
            }
        }
        debug!(url = %self.url, "Network did not settle before timeout");
    }
}

/// Shared Chrome instance
pub struct LiveBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    settings: BrowserSettings,
}

impl LiveBrowser {
    fn find_chrome(configured: Option<&PathBuf>) -> Result<PathBuf, DomError> {
        if let Some(path) = configured {
            return Ok(path.clone());
        }
        CHROME_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or_else(|| DomError::Browser("Chrome/Chromium executable not found".into()))
    }

    /// Launches Chrome with the configured flags
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, DomError> {
        let chrome = Self::find_chrome(settings.chrome_path.as_ref())?;
        info!(chrome = %chrome.display(), headless = settings.headless, "Launching browser");

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .window_size(settings.window_width, settings.window_height);
        if !settings.headless {
            builder = builder.with_head();
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        if let Some(proxy) = &settings.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }

        let config = builder.build().map_err(DomError::Browser)?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            settings: settings.clone(),
        })
    }

    /// Opens `url` in a new tab and waits for the load to finish
    pub async fn open(&self, url: &str) -> Result<LivePage, DomError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| DomError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if let Err(e) = page.wait_for_navigation().await {
            warn!(url, error = %e, "Navigation did not complete cleanly");
        }

        let popups = PopupDismisser::spawn(
            page.clone(),
            Duration::from_millis(self.settings.popup_interval_ms),
        );

        Ok(LivePage {
            page,
            url: url.to_string(),
            _popups: popups,
        })
    }

    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Browser did not close cleanly");
        }
        self.handler.abort();
    }
}
