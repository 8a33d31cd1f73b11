//! Harvest configuration model.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::acceptor::TokenCollisionPolicy;
use crate::pacing::MAX_SCROLL_SLEEP_SECS;
use crate::types::{HarvestError, HarvestResult};

/// Every option recognized in the YAML file and on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Target comments page URL. Required for capture.
    #[serde(alias = "url")]
    pub comments_page: Option<String>,
    pub output_json: String,
    /// Spreadsheet path; derived from the JSON path when unset.
    #[serde(alias = "output_excel")]
    pub output_table: Option<String>,
    /// Capture sink to flatten in parse-only mode.
    pub input_json: Option<String>,
    pub max_clicks: u32,
    pub click_timeout_ms: u64,
    pub initial_wait_ms: u64,
    pub probe_timeout_ms: u64,
    pub settle_ms: u64,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub scroll_min: u32,
    pub scroll_max: u32,
    /// Seconds.
    pub scroll_sleep_min: f64,
    /// Seconds.
    pub scroll_sleep_max: f64,
    pub append_timestamp: bool,
    /// URL fragment identifying the comment API.
    pub api_path: String,
    /// Visible text of the "load more" control.
    pub continue_label: String,
    /// CSS fallback for the "load more" control.
    pub continue_selector: String,
    pub token_collision: TokenCollisionPolicy,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            comments_page: None,
            output_json: "comments.json".to_string(),
            output_table: None,
            input_json: None,
            max_clicks: 30,
            click_timeout_ms: 15_000,
            initial_wait_ms: 6_000,
            probe_timeout_ms: 5_000,
            settle_ms: 800,
            headless: true,
            window_width: 1400,
            window_height: 900,
            scroll_min: 50,
            scroll_max: 150,
            scroll_sleep_min: 0.1,
            scroll_sleep_max: 0.4,
            append_timestamp: true,
            api_path: "/graph".to_string(),
            continue_label: "Load more".to_string(),
            continue_selector: "button.kds-button[data-rac]".to_string(),
            token_collision: TokenCollisionPolicy::Recover,
        }
    }
}

impl HarvestConfig {
    /// Check everything a capture session needs.
    pub fn validate(&self) -> HarvestResult<()> {
        self.target_url()?;
        if self.api_path.trim().is_empty() {
            return Err(HarvestError::Config("api_path must not be empty".into()));
        }
        if self.scroll_min > self.scroll_max {
            return Err(HarvestError::Config(format!(
                "scroll_min ({}) is greater than scroll_max ({})",
                self.scroll_min, self.scroll_max
            )));
        }
        let sleep_ok = |secs: f64| secs.is_finite() && (0.0..=MAX_SCROLL_SLEEP_SECS).contains(&secs);
        if !(sleep_ok(self.scroll_sleep_min)
            && sleep_ok(self.scroll_sleep_max)
            && self.scroll_sleep_min <= self.scroll_sleep_max)
        {
            return Err(HarvestError::Config(format!(
                "scroll sleep bounds are invalid: min={} max={}",
                self.scroll_sleep_min, self.scroll_sleep_max
            )));
        }
        if self.window_width == 0 || self.window_height == 0 {
            return Err(HarvestError::Config("window size must be non-zero".into()));
        }
        Ok(())
    }

    /// The trimmed target URL.
    pub fn target_url(&self) -> HarvestResult<&str> {
        match self.comments_page.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(HarvestError::Config("comments_page is required".into())),
        }
    }

    pub fn click_timeout(&self) -> Duration {
        Duration::from_millis(self.click_timeout_ms)
    }

    pub fn initial_wait(&self) -> Duration {
        Duration::from_millis(self.initial_wait_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
