//! Browser abstraction consumed by the capture engine.
//!
//! [`Browser`] hands out [`BrowserPage`]s. A page publishes every network
//! response it sees on a broadcast channel and exposes the handful of
//! interactions the pagination loop needs. The Chromium backend lives in
//! the CLI crate; tests drive the engine with scripted in-memory pages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{BrowserResult, NetworkResponse};

/// A browser engine that can open pages.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a fresh page (tab) with network observation already enabled.
    async fn open_page(&self) -> BrowserResult<Box<dyn BrowserPage>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> BrowserResult<()>;
}

/// A single page under automation.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Subscribe to network responses from this point on.
    fn responses(&self) -> broadcast::Receiver<NetworkResponse>;
    /// Navigate to a URL.
    async fn navigate(&mut self, url: &str) -> BrowserResult<()>;
    /// Find the "load more" control. `Ok(None)` means it is not on the page.
    async fn locate_continue_control(&self) -> BrowserResult<Option<ContinueControl>>;
    /// Scroll the located control to the middle of the viewport.
    async fn scroll_control_into_view(&self) -> BrowserResult<()>;
    /// Current viewport height in CSS pixels.
    async fn viewport_height(&self) -> BrowserResult<f64>;
    /// Scroll the window vertically.
    async fn scroll_by(&self, delta_y: f64) -> BrowserResult<()>;
    /// Visibility, enabled state and bounds of the located control.
    async fn control_state(&self) -> BrowserResult<ControlState>;
    /// Move the pointer to viewport coordinates.
    async fn move_mouse(&self, x: f64, y: f64) -> BrowserResult<()>;
    /// Activate the located control.
    async fn trigger_control(&self, method: TriggerMethod) -> BrowserResult<()>;
    /// Close this page.
    async fn close(self: Box<Self>) -> BrowserResult<()>;
}

/// A located "load more" control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueControl {
    /// Visible text, for logs.
    pub label: String,
}

/// Bounding box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Interactive state of the located control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub visible: bool,
    pub enabled: bool,
    pub bounds: Option<Bounds>,
}

impl ControlState {
    /// A pointer click can land on it.
    pub fn is_clickable(&self) -> bool {
        self.visible
            && self.enabled
            && self
                .bounds
                .is_some_and(|b| b.width > 0.0 && b.height > 0.0)
    }
}

/// How the control is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMethod {
    /// Pointer click with actionability checks.
    Native,
    /// Pointer click at the control's center without checks.
    Forced,
    /// `element.click()` from page script.
    Scripted,
}

impl std::fmt::Display for TriggerMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerMethod::Native => f.write_str("native click"),
            TriggerMethod::Forced => f.write_str("forced click"),
            TriggerMethod::Scripted => f.write_str("scripted click"),
        }
    }
}
