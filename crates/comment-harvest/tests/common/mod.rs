//! Scripted in-memory browser for driving full sessions without Chromium.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use comment_harvest::{
    Bounds, Browser, BrowserError, BrowserPage, BrowserResult, CommentablePage, ContinueControl,
    ControlState, FixedPacing, HarvestConfig, HarvestSession, NetworkResponse, TriggerMethod,
};
use serde_json::{json, Value};
use tokio::sync::broadcast;

pub const API_URL: &str = "https://site.test/graph";

// ── payload builders ──

/// A commentable with one edge per id and the given continuation signal.
pub fn commentable(cursor: Option<&str>, has_next: bool, ids: &[&str]) -> Value {
    let edges: Vec<Value> = ids
        .iter()
        .map(|id| json!({"node": {"id": id, "body": format!("comment {id}")}}))
        .collect();
    json!({
        "id": "PROJECT",
        "comments": {
            "edges": edges,
            "pageInfo": {"hasNextPage": has_next, "endCursor": cursor}
        }
    })
}

pub fn api_page(cursor: Option<&str>, has_next: bool, ids: &[&str]) -> NetworkResponse {
    api_body(json!([{"data": {"commentable": commentable(cursor, has_next, ids)}}]))
}

pub fn api_body(body: Value) -> NetworkResponse {
    NetworkResponse {
        url: API_URL.to_string(),
        status: 200,
        body: Some(body.to_string()),
    }
}

pub fn unrelated(url: &str) -> NetworkResponse {
    NetworkResponse {
        url: url.to_string(),
        status: 200,
        body: None,
    }
}

// ── script ──

/// What happens when the control is triggered.
#[derive(Debug, Clone)]
pub enum Step {
    Respond(Vec<NetworkResponse>),
    Silent,
    Fail(BrowserError),
}

#[derive(Debug, Clone)]
pub struct Script {
    /// Published during navigation.
    pub initial: Vec<NetworkResponse>,
    /// Consumed one per trigger; an empty queue behaves as `Silent`.
    pub steps: VecDeque<Step>,
    /// How many lookups find the control; `None` means always.
    pub control_lookups: Option<u32>,
    pub state: ControlState,
    pub navigate_error: Option<BrowserError>,
    pub open_error: Option<BrowserError>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            initial: Vec::new(),
            steps: VecDeque::new(),
            control_lookups: None,
            state: ControlState {
                visible: true,
                enabled: true,
                bounds: Some(Bounds {
                    x: 100.0,
                    y: 400.0,
                    width: 120.0,
                    height: 40.0,
                }),
            },
            navigate_error: None,
            open_error: None,
        }
    }
}

impl Script {
    pub fn new(initial: Vec<NetworkResponse>) -> Self {
        Self {
            initial,
            ..Self::default()
        }
    }

    pub fn then(mut self, step: Step) -> Self {
        self.steps.push_back(step);
        self
    }

    pub fn respond(self, response: NetworkResponse) -> Self {
        self.then(Step::Respond(vec![response]))
    }
}

/// What the page saw, for assertions.
#[derive(Debug, Default)]
pub struct Trace {
    pub navigated: Vec<String>,
    pub triggers: Vec<TriggerMethod>,
    pub lookups: u32,
    pub mouse_moves: u32,
    pub page_closed: bool,
    pub browser_shut_down: bool,
}

struct PageShared {
    tx: Option<broadcast::Sender<NetworkResponse>>,
    script: Script,
}

// ── browser ──

pub struct ScriptedBrowser {
    script: Mutex<Option<Script>>,
    pub trace: Arc<Mutex<Trace>>,
}

impl ScriptedBrowser {
    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            trace: Arc::new(Mutex::new(Trace::default())),
        }
    }

    pub fn triggers(&self) -> Vec<TriggerMethod> {
        self.trace.lock().unwrap().triggers.clone()
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn open_page(&self) -> BrowserResult<Box<dyn BrowserPage>> {
        let mut script = self
            .script
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BrowserError::Launch("page already opened".into()))?;
        if let Some(e) = script.open_error.take() {
            return Err(e);
        }
        let (tx, _) = broadcast::channel(64);
        Ok(Box::new(ScriptedPage {
            shared: Arc::new(Mutex::new(PageShared {
                tx: Some(tx),
                script,
            })),
            trace: Arc::clone(&self.trace),
        }))
    }

    async fn shutdown(&self) -> BrowserResult<()> {
        self.trace.lock().unwrap().browser_shut_down = true;
        Ok(())
    }
}

pub struct ScriptedPage {
    shared: Arc<Mutex<PageShared>>,
    trace: Arc<Mutex<Trace>>,
}

impl ScriptedPage {
    fn publish(&self, responses: Vec<NetworkResponse>) {
        let shared = self.shared.lock().unwrap();
        if let Some(tx) = &shared.tx {
            for r in responses {
                let _ = tx.send(r);
            }
        }
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    fn responses(&self) -> broadcast::Receiver<NetworkResponse> {
        match &self.shared.lock().unwrap().tx {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.trace.lock().unwrap().navigated.push(url.to_string());
        let initial = {
            let mut shared = self.shared.lock().unwrap();
            if let Some(e) = shared.script.navigate_error.take() {
                return Err(e);
            }
            std::mem::take(&mut shared.script.initial)
        };
        self.publish(initial);
        Ok(())
    }

    async fn locate_continue_control(&self) -> BrowserResult<Option<ContinueControl>> {
        self.trace.lock().unwrap().lookups += 1;
        let mut shared = self.shared.lock().unwrap();
        match shared.script.control_lookups.as_mut() {
            Some(0) => return Ok(None),
            Some(left) => *left -= 1,
            None => {}
        }
        Ok(Some(ContinueControl {
            label: "Load more".into(),
        }))
    }

    async fn scroll_control_into_view(&self) -> BrowserResult<()> {
        Ok(())
    }

    async fn viewport_height(&self) -> BrowserResult<f64> {
        Ok(900.0)
    }

    async fn scroll_by(&self, _delta_y: f64) -> BrowserResult<()> {
        Ok(())
    }

    async fn control_state(&self) -> BrowserResult<ControlState> {
        Ok(self.shared.lock().unwrap().script.state)
    }

    async fn move_mouse(&self, _x: f64, _y: f64) -> BrowserResult<()> {
        self.trace.lock().unwrap().mouse_moves += 1;
        Ok(())
    }

    async fn trigger_control(&self, method: TriggerMethod) -> BrowserResult<()> {
        self.trace.lock().unwrap().triggers.push(method);
        let step = self
            .shared
            .lock()
            .unwrap()
            .script
            .steps
            .pop_front()
            .unwrap_or(Step::Silent);
        match step {
            Step::Respond(responses) => {
                self.publish(responses);
                Ok(())
            }
            Step::Silent => Ok(()),
            Step::Fail(e) => Err(e),
        }
    }

    async fn close(self: Box<Self>) -> BrowserResult<()> {
        self.shared.lock().unwrap().tx = None;
        self.trace.lock().unwrap().page_closed = true;
        Ok(())
    }
}

// ── session helpers ──

/// Configuration with short waits suitable for tests.
pub fn fast_config() -> HarvestConfig {
    HarvestConfig {
        comments_page: Some("https://site.test/projects/demo/comments".into()),
        max_clicks: 10,
        click_timeout_ms: 150,
        initial_wait_ms: 0,
        probe_timeout_ms: 100,
        settle_ms: 0,
        ..HarvestConfig::default()
    }
}

pub fn session(config: HarvestConfig) -> HarvestSession {
    HarvestSession::new(config).with_pacing(Arc::new(FixedPacing {
        hover: Duration::ZERO,
    }))
}

/// End cursors of the collected pages, sorted.
pub fn cursors(pages: &[CommentablePage]) -> Vec<String> {
    let mut out: Vec<String> = pages
        .iter()
        .map(|p| {
            p.page_info()
                .end_cursor
                .map(|t| t.as_str().to_string())
                .unwrap_or_default()
        })
        .collect();
    out.sort();
    out
}
