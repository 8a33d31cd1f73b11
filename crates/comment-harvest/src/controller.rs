//! Active capture path: the "load more" loop.
//!
//! ```text
//! Idle -> Probing -> Advancing -> Exhausted
//!                         |
//!                         +----> Aborted   (browser or page handle lost)
//! ```
//!
//! Each attempt locates the control, scrolls it into view with jitter,
//! triggers it and waits, bounded by `click_timeout`, for the correlated API
//! response. The correlated copy decides whether to continue; it is also
//! offered to the shared admission point, where the passive copy of the
//! same network event has usually already been admitted.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::admission::AdmissionHandle;
use crate::browser::{BrowserPage, TriggerMethod};
use crate::config::HarvestConfig;
use crate::observer::ApiFilter;
use crate::pacing::InteractionPacing;
use crate::payload::{extract_commentable, read_continuation};
use crate::types::{BrowserError, BrowserResult, CaptureSource, NetworkResponse, PageInfo};

/// Viewport height assumed when the page cannot report one.
const FALLBACK_VIEWPORT_HEIGHT: f64 = 900.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Probing,
    Advancing,
    Exhausted,
    Aborted,
}

/// Why the loop stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The last correlated page reported `hasNextPage = false`.
    NoNextPage,
    /// The "load more" control is gone.
    ControlMissing,
    /// `max_clicks` attempts were made.
    AttemptBudget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Termination {
    Exhausted { reason: StopReason },
    Aborted { error: String },
}

impl Termination {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Termination::Aborted { .. })
    }
}

/// Summary of one controller run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerReport {
    pub termination: Termination,
    /// Advance attempts made (control found and triggered).
    pub attempts: u32,
    /// Attempts that produced a correlated API response.
    pub correlated: u32,
}

/// Timing and matching parameters for the loop.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub max_clicks: u32,
    pub click_timeout: Duration,
    pub initial_wait: Duration,
    pub probe_timeout: Duration,
    pub settle: Duration,
    pub filter: ApiFilter,
}

impl From<&HarvestConfig> for ControllerSettings {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            max_clicks: config.max_clicks,
            click_timeout: config.click_timeout(),
            initial_wait: config.initial_wait(),
            probe_timeout: config.probe_timeout(),
            settle: config.settle_delay(),
            filter: ApiFilter::new(config.api_path.clone()),
        }
    }
}

pub struct PaginationController {
    settings: ControllerSettings,
    pacing: Arc<dyn InteractionPacing>,
    admission: AdmissionHandle,
    state: ControllerState,
    attempts: u32,
    correlated: u32,
}

impl PaginationController {
    pub fn new(
        settings: ControllerSettings,
        pacing: Arc<dyn InteractionPacing>,
        admission: AdmissionHandle,
    ) -> Self {
        Self {
            settings,
            pacing,
            admission,
            state: ControllerState::Idle,
            attempts: 0,
            correlated: 0,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Drive the loop to a terminal state.
    ///
    /// `initial` must have been subscribed before navigation so the probe
    /// can see the first, pre-interaction API response.
    pub async fn run(
        &mut self,
        page: &dyn BrowserPage,
        initial: broadcast::Receiver<NetworkResponse>,
    ) -> ControllerReport {
        self.transition(ControllerState::Probing);
        if let Err(e) = self.probe(initial).await {
            return self.abort(e);
        }

        self.transition(ControllerState::Advancing);
        let max = self.settings.max_clicks;
        for attempt in 1..=max {
            tracing::info!("attempt {attempt}/{max}: looking for the load-more control");

            let control = match page.locate_continue_control().await {
                Ok(Some(control)) => control,
                Ok(None) => {
                    tracing::info!("attempt {attempt}/{max}: load-more control not found, pagination exhausted");
                    return self.exhaust(StopReason::ControlMissing);
                }
                Err(e) if e.is_fatal() => return self.abort(e),
                Err(e) => {
                    tracing::warn!("attempt {attempt}/{max}: control lookup failed, skipping: {e}");
                    self.settle().await;
                    continue;
                }
            };

            self.attempts += 1;
            tracing::debug!("attempt {attempt}/{max}: control found: {:?}", control.label);

            match self.advance(page, attempt).await {
                Ok(Some(response)) => {
                    self.correlated += 1;
                    if let Some(info) = self.read_signal(&response, attempt).await {
                        if !info.has_next_page {
                            tracing::info!("attempt {attempt}/{max}: hasNextPage is false, last page reached");
                            return self.exhaust(StopReason::NoNextPage);
                        }
                    }
                }
                Ok(None) => {
                    tracing::warn!("attempt {attempt}/{max}: no correlated API response, moving to next attempt");
                }
                Err(e) if e.is_fatal() => return self.abort(e),
                Err(e) => {
                    tracing::warn!("attempt {attempt}/{max}: interaction failed, skipping: {e}");
                }
            }

            self.settle().await;
        }

        tracing::info!("attempt budget of {max} used up");
        self.exhaust(StopReason::AttemptBudget)
    }

    /// Wait out the initial load, then give the first API response a bounded
    /// chance to arrive.
    async fn probe(&self, mut initial: broadcast::Receiver<NetworkResponse>) -> BrowserResult<()> {
        tokio::time::sleep(self.settings.initial_wait).await;

        let filter = &self.settings.filter;
        let first = tokio::time::timeout(self.settings.probe_timeout, async {
            loop {
                match initial.recv().await {
                    Ok(r) if filter.matches(&r) => return Ok(r),
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => {
                        return Err(BrowserError::SessionLost(
                            "response stream closed while probing".into(),
                        ))
                    }
                }
            }
        })
        .await;

        match first {
            Ok(Ok(r)) => tracing::info!("initial API response observed: {}", r.url),
            Ok(Err(e)) => return Err(e),
            Err(_) => tracing::info!(
                "no initial API response within {}ms, continuing",
                self.settings.probe_timeout.as_millis()
            ),
        }
        Ok(())
    }

    /// One attempt: position, jitter, trigger, and wait for the correlated
    /// response. `Ok(None)` means every trigger strategy timed out.
    async fn advance(
        &self,
        page: &dyn BrowserPage,
        attempt: u32,
    ) -> BrowserResult<Option<NetworkResponse>> {
        page.scroll_control_into_view().await?;
        self.jitter_scroll(page).await?;

        let state = page.control_state().await?;
        tracing::debug!("attempt {attempt}: control state {state:?}");

        if !state.is_clickable() {
            tracing::warn!(
                "attempt {attempt}: control not clickable (visible={}, enabled={}), using scripted click",
                state.visible,
                state.enabled
            );
            let response = self.trigger_and_wait(page, TriggerMethod::Scripted).await?;
            if response.is_none() {
                tracing::warn!(
                    "attempt {attempt}: scripted click got no API response within {}ms",
                    self.settings.click_timeout.as_millis()
                );
            }
            return Ok(response);
        }

        if let Some((x, y)) = state.bounds.map(|b| b.center()) {
            page.move_mouse(x, y).await?;
        }
        tokio::time::sleep(self.pacing.hover_pause()).await;

        if let Some(response) = self.trigger_and_wait(page, TriggerMethod::Native).await? {
            return Ok(Some(response));
        }
        tracing::warn!(
            "attempt {attempt}: no API response within {}ms after native click, retrying with forced click",
            self.settings.click_timeout.as_millis()
        );

        let response = self.trigger_and_wait(page, TriggerMethod::Forced).await?;
        if response.is_none() {
            tracing::warn!("attempt {attempt}: forced click timed out as well");
        }
        Ok(response)
    }

    async fn jitter_scroll(&self, page: &dyn BrowserPage) -> BrowserResult<()> {
        let viewport = match page.viewport_height().await {
            Ok(h) if h > 0.0 => h,
            Ok(_) => FALLBACK_VIEWPORT_HEIGHT,
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => FALLBACK_VIEWPORT_HEIGHT,
        };
        for step in self.pacing.scroll_plan(viewport) {
            page.scroll_by(step.delta_y).await?;
            tokio::time::sleep(step.pause).await;
        }
        Ok(())
    }

    /// Trigger the control and wait for the first matching response, both
    /// under one timeout. The subscription is taken before the trigger so
    /// a fast response cannot be missed.
    async fn trigger_and_wait(
        &self,
        page: &dyn BrowserPage,
        method: TriggerMethod,
    ) -> BrowserResult<Option<NetworkResponse>> {
        let rx = page.responses();
        let waited = tokio::time::timeout(
            self.settings.click_timeout,
            trigger_and_receive(page, method, rx, &self.settings.filter),
        )
        .await;

        match waited {
            Ok(Ok(response)) => Ok(Some(response)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Read the continuation signal from the correlated response and offer
    /// the page to the shared admission point. `None` if the response is not
    /// a usable comment page.
    async fn read_signal(&self, response: &NetworkResponse, attempt: u32) -> Option<PageInfo> {
        let Some(body) = response.body.as_deref() else {
            tracing::warn!("attempt {attempt}: correlated response has no readable body");
            return None;
        };

        let commentable = match extract_commentable(body) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("attempt {attempt}: correlated response skipped for continuation check: {e}");
                return None;
            }
        };

        let info = read_continuation(&commentable);
        tracing::info!(
            "[interaction#{attempt}] hasNextPage={}, endCursor={:?}",
            info.has_next_page,
            info.end_cursor.as_ref().map(|t| t.as_str())
        );

        match self
            .admission
            .admit(commentable, CaptureSource::Interaction)
            .await
        {
            Ok(result) => tracing::debug!("[interaction#{attempt}] admission: {result:?}"),
            Err(e) => tracing::warn!("[interaction#{attempt}] admission unavailable: {e}"),
        }

        Some(info)
    }

    async fn settle(&self) {
        tokio::time::sleep(self.settings.settle).await;
    }

    fn transition(&mut self, next: ControllerState) {
        tracing::debug!("controller {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn exhaust(&mut self, reason: StopReason) -> ControllerReport {
        self.transition(ControllerState::Exhausted);
        self.report(Termination::Exhausted { reason })
    }

    fn abort(&mut self, error: BrowserError) -> ControllerReport {
        tracing::error!("browser session lost, aborting pagination: {error}");
        self.transition(ControllerState::Aborted);
        self.report(Termination::Aborted {
            error: error.to_string(),
        })
    }

    fn report(&self, termination: Termination) -> ControllerReport {
        ControllerReport {
            termination,
            attempts: self.attempts,
            correlated: self.correlated,
        }
    }
}

async fn trigger_and_receive(
    page: &dyn BrowserPage,
    method: TriggerMethod,
    mut rx: broadcast::Receiver<NetworkResponse>,
    filter: &ApiFilter,
) -> BrowserResult<NetworkResponse> {
    page.trigger_control(method).await?;
    loop {
        match rx.recv().await {
            Ok(response) if filter.matches(&response) => return Ok(response),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("{method}: {skipped} responses skipped while waiting");
            }
            Err(RecvError::Closed) => {
                return Err(BrowserError::SessionLost(
                    "response stream closed while waiting for API response".into(),
                ))
            }
        }
    }
}
