//! Chromium backend using chromiumoxide.
//!
//! Every page runs a pump task that pairs `Network.responseReceived` with
//! `Network.loadingFinished`, fetches bodies for comment API responses, and
//! publishes each response on the page's broadcast channel.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventResponseReceived,
    GetResponseBodyParams, RequestId,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::layout::Point;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use comment_harvest::{
    Browser, BrowserError, BrowserPage, BrowserResult, ContinueControl, ControlState,
    NetworkResponse, TriggerMethod,
};

use super::BrowserOptions;

/// Attribute placed on the located "load more" control.
const MARKER: &str = "data-harvest-continue";
const MARKER_SELECTOR: &str = "[data-harvest-continue]";

const RESPONSE_BUFFER: usize = 256;

/// Responses still waiting for `loadingFinished`.
const PENDING_CAPACITY: usize = 512;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. COMMENT_HARVEST_CHROMIUM env
    if let Ok(p) = std::env::var("COMMENT_HARVEST_CHROMIUM") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.comment-harvest/chromium/
    if let Some(home) = dirs::home_dir() {
        let local = home.join(".comment-harvest/chromium/chrome");
        if local.exists() {
            return Some(local);
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Map a CDP failure onto the engine's error kinds. Transport failures mean
/// the browser is gone.
fn map_cdp(context: &str, err: CdpError) -> BrowserError {
    match err {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse | CdpError::Io(_) => {
            BrowserError::SessionLost(format!("{context}: {err}"))
        }
        other => BrowserError::Interaction(format!("{context}: {other}")),
    }
}

/// A launched Chromium instance.
pub struct ChromiumBrowser {
    browser: Mutex<Option<CdpBrowser>>,
    handler: JoinHandle<()>,
    options: Arc<BrowserOptions>,
}

impl ChromiumBrowser {
    /// Launch Chromium with the configured window and headless mode.
    pub async fn launch(options: BrowserOptions) -> BrowserResult<Self> {
        let chrome_path = find_chromium().ok_or_else(|| {
            BrowserError::Launch(
                "Chromium not found. Install Chrome/Chromium or set COMMENT_HARVEST_CHROMIUM".into(),
            )
        })?;
        tracing::info!("launching Chromium: {}", chrome_path.display());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(options.window_width, options.window_height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage");
        builder = if options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(format!("failed to launch Chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler: {e}");
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler,
            options: Arc::new(options),
        })
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn open_page(&self) -> BrowserResult<Box<dyn BrowserPage>> {
        let page = {
            let guard = self.browser.lock().await;
            let browser = guard
                .as_ref()
                .ok_or_else(|| BrowserError::SessionLost("browser already shut down".into()))?;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| map_cdp("failed to create page", e))?
        };

        page.execute(EnableParams::default())
            .await
            .map_err(|e| map_cdp("failed to enable network events", e))?;

        let (tx, _) = broadcast::channel(RESPONSE_BUFFER);
        let pump = spawn_pump(page.clone(), tx.clone(), self.options.api_path.clone()).await?;

        Ok(Box::new(ChromiumPage {
            page,
            tx,
            pump,
            options: Arc::clone(&self.options),
        }))
    }

    async fn shutdown(&self) -> BrowserResult<()> {
        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.close().await {
                tracing::debug!("browser close: {e}");
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!("browser wait: {e}");
            }
        }
        self.handler.abort();
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
struct PendingResponse {
    url: String,
    status: u16,
}

/// Responses seen but not yet finished, keyed by request id.
///
/// Event streams and long polls never finish, so once `capacity` is
/// exceeded the oldest entry is evicted.
struct PendingResponses {
    entries: HashMap<String, PendingResponse>,
    order: VecDeque<String>,
    capacity: usize,
}

impl PendingResponses {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Track a response; returns the id evicted to make room, if any.
    fn insert(&mut self, id: String, response: PendingResponse) -> Option<String> {
        if self.entries.insert(id.clone(), response).is_none() {
            self.order.push_back(id);
        }
        if self.entries.len() <= self.capacity {
            return None;
        }
        while let Some(oldest) = self.order.pop_front() {
            if self.entries.remove(&oldest).is_some() {
                return Some(oldest);
            }
        }
        None
    }

    fn remove(&mut self, id: &str) -> Option<PendingResponse> {
        let removed = self.entries.remove(id);
        if self.order.len() > self.capacity * 2 {
            let entries = &self.entries;
            self.order.retain(|id| entries.contains_key(id));
        }
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Subscribe to the network events before returning, so nothing emitted
/// after `open_page` is missed.
async fn spawn_pump(
    page: Page,
    tx: broadcast::Sender<NetworkResponse>,
    api_path: String,
) -> BrowserResult<JoinHandle<()>> {
    let mut received = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(|e| map_cdp("failed to listen for responses", e))?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(|e| map_cdp("failed to listen for finished loads", e))?;
    let mut failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(|e| map_cdp("failed to listen for failed loads", e))?;

    Ok(tokio::spawn(async move {
        let mut pending = PendingResponses::new(PENDING_CAPACITY);
        loop {
            tokio::select! {
                Some(ev) = received.next() => {
                    let evicted = pending.insert(
                        ev.request_id.inner().clone(),
                        PendingResponse {
                            url: ev.response.url.clone(),
                            status: u16::try_from(ev.response.status).unwrap_or(0),
                        },
                    );
                    if let Some(id) = evicted {
                        tracing::debug!("dropped unfinished request {id} ({} pending)", pending.len());
                    }
                }
                Some(ev) = finished.next() => {
                    let Some(PendingResponse { url, status }) = pending.remove(ev.request_id.inner()) else {
                        continue;
                    };
                    let body = if url.contains(&api_path) {
                        fetch_body(&page, ev.request_id.clone()).await
                    } else {
                        None
                    };
                    let _ = tx.send(NetworkResponse { url, status, body });
                }
                Some(ev) = failed.next() => {
                    pending.remove(ev.request_id.inner());
                }
                else => break,
            }
        }
    }))
}

async fn fetch_body(page: &Page, request_id: RequestId) -> Option<String> {
    let reply = match page.execute(GetResponseBodyParams::new(request_id)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::debug!("response body unavailable: {e}");
            return None;
        }
    };
    if !reply.result.base64_encoded {
        return Some(reply.result.body.clone());
    }
    base64::engine::general_purpose::STANDARD
        .decode(&reply.result.body)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

#[derive(Deserialize)]
struct Located {
    found: bool,
    #[serde(default)]
    label: String,
}

/// A Chromium tab under automation.
pub struct ChromiumPage {
    page: Page,
    tx: broadcast::Sender<NetworkResponse>,
    pump: JoinHandle<()>,
    options: Arc<BrowserOptions>,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> BrowserResult<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| map_cdp("script failed", e))?;
        let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value)
            .map_err(|e| BrowserError::Interaction(format!("unexpected script result: {e}")))
    }

    /// Run a script against the marked control; `false` means it is gone.
    async fn with_control(&self, body: &str) -> BrowserResult<()> {
        let found: bool = self
            .eval(format!(
                "(() => {{ const el = document.querySelector('{MARKER_SELECTOR}'); if (!el) return false; {body}; return true; }})()"
            ))
            .await?;
        if found {
            Ok(())
        } else {
            Err(BrowserError::Interaction("load-more control is no longer attached".into()))
        }
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    fn responses(&self) -> broadcast::Receiver<NetworkResponse> {
        self.tx.subscribe()
    }

    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.page.goto(url).await.map_err(|e| match map_cdp("navigation", e) {
            BrowserError::Interaction(msg) => BrowserError::Navigation(msg),
            other => other,
        })?;
        Ok(())
    }

    async fn locate_continue_control(&self) -> BrowserResult<Option<ContinueControl>> {
        let label = serde_json::to_string(&self.options.continue_label.to_lowercase())
            .map_err(|e| BrowserError::Interaction(e.to_string()))?;
        let selector = serde_json::to_string(&self.options.continue_selector)
            .map_err(|e| BrowserError::Interaction(e.to_string()))?;
        let script = format!(
            r#"(() => {{
                document.querySelectorAll('{MARKER_SELECTOR}').forEach(e => e.removeAttribute('{MARKER}'));
                const text = el => (el.innerText || el.textContent || '').trim();
                let el = Array.from(document.querySelectorAll('button'))
                    .find(b => text(b).toLowerCase().includes({label}));
                if (!el) {{
                    try {{ el = document.querySelector({selector}); }} catch (e) {{ el = null; }}
                }}
                if (!el) return {{ found: false }};
                el.setAttribute('{MARKER}', '1');
                return {{ found: true, label: text(el) }};
            }})()"#
        );
        let located: Located = self.eval(script).await?;
        Ok(located.found.then(|| ContinueControl {
            label: located.label,
        }))
    }

    async fn scroll_control_into_view(&self) -> BrowserResult<()> {
        self.with_control("el.scrollIntoView({ block: 'center', inline: 'center' })")
            .await
    }

    async fn viewport_height(&self) -> BrowserResult<f64> {
        self.eval("window.innerHeight".to_string()).await
    }

    async fn scroll_by(&self, delta_y: f64) -> BrowserResult<()> {
        let _: serde_json::Value = self
            .eval(format!("(() => {{ window.scrollBy(0, {delta_y}); return true; }})()"))
            .await?;
        Ok(())
    }

    async fn control_state(&self) -> BrowserResult<ControlState> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{MARKER_SELECTOR}');
                if (!el) return {{ visible: false, enabled: false, bounds: null }};
                const r = el.getBoundingClientRect();
                const s = window.getComputedStyle(el);
                const visible = r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
                const enabled = !el.disabled && el.getAttribute('aria-disabled') !== 'true';
                return {{ visible, enabled, bounds: {{ x: r.x, y: r.y, width: r.width, height: r.height }} }};
            }})()"#
        );
        self.eval(script).await
    }

    async fn move_mouse(&self, x: f64, y: f64) -> BrowserResult<()> {
        self.page
            .move_mouse(Point::new(x, y))
            .await
            .map_err(|e| map_cdp("mouse move", e))?;
        Ok(())
    }

    async fn trigger_control(&self, method: TriggerMethod) -> BrowserResult<()> {
        match method {
            TriggerMethod::Native => {
                let element = self
                    .page
                    .find_element(MARKER_SELECTOR)
                    .await
                    .map_err(|e| map_cdp("control lookup", e))?;
                element.click().await.map_err(|e| map_cdp("native click", e))?;
            }
            TriggerMethod::Forced => {
                let state = self.control_state().await?;
                let (x, y) = state.bounds.map(|b| b.center()).ok_or_else(|| {
                    BrowserError::Interaction("control has no bounds for a forced click".into())
                })?;
                self.page
                    .click(Point::new(x, y))
                    .await
                    .map_err(|e| map_cdp("forced click", e))?;
            }
            TriggerMethod::Scripted => self.with_control("el.click()").await?,
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        let ChromiumPage { page, tx, pump, .. } = *self;
        pump.abort();
        drop(tx);
        page.close().await.map_err(|e| map_cdp("page close", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(url: &str) -> PendingResponse {
        PendingResponse {
            url: url.to_string(),
            status: 200,
        }
    }

    #[test]
    fn test_unfinished_requests_are_evicted_oldest_first() {
        let mut pending = PendingResponses::new(3);
        for i in 0..3 {
            assert_eq!(pending.insert(format!("r{i}"), response("https://site.test/stream")), None);
        }
        assert_eq!(
            pending.insert("r3".into(), response("https://site.test/graph")),
            Some("r0".to_string())
        );
        assert_eq!(pending.len(), 3);
        assert_eq!(pending.remove("r0"), None);
        assert_eq!(pending.remove("r3"), Some(response("https://site.test/graph")));
    }

    #[test]
    fn test_pending_stays_bounded_under_churn() {
        let mut pending = PendingResponses::new(4);
        for i in 0..1_000 {
            pending.insert(format!("stream{i}"), response("https://site.test/events"));
            let id = format!("fetch{i}");
            pending.insert(id.clone(), response("https://site.test/graph"));
            assert!(pending.remove(&id).is_some());
            assert!(pending.len() <= 4);
            assert!(pending.order.len() <= 8);
        }
    }

    #[test]
    fn test_reinserting_an_id_does_not_duplicate_it() {
        let mut pending = PendingResponses::new(2);
        pending.insert("a".into(), response("https://site.test/1"));
        pending.insert("a".into(), response("https://site.test/2"));
        assert_eq!(pending.order.len(), 1);
        assert_eq!(pending.remove("a"), Some(response("https://site.test/2")));
    }
}
